pub mod errors;
pub mod khata;
pub mod ledger;
pub mod models;
pub mod money;
pub mod services;
pub mod simplify;
pub mod split;
