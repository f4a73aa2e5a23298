pub mod audit;
pub mod balance;
pub mod counterparty;
pub mod expense;
pub mod group;
pub mod payment;
