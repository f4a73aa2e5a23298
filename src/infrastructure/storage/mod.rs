use crate::core::errors::LedgerError;
use crate::core::ledger::BalanceSheet;
use crate::core::models::{
    audit::GroupAudit,
    counterparty::{Counterparty, CounterpartyTransaction},
    expense::Expense,
    group::Group,
    payment::Payment,
};
use async_trait::async_trait;

/// Every row one group mutation writes. Applied all-or-nothing.
#[derive(Clone, Debug, Default)]
pub struct GroupBatch {
    pub group_id: String,
    pub group: Option<Group>,
    pub sheet: Option<BalanceSheet>,
    pub expense: Option<Expense>,
    pub payment: Option<Payment>,
}

impl GroupBatch {
    pub fn new(group_id: impl Into<String>) -> Self {
        GroupBatch {
            group_id: group_id.into(),
            ..Default::default()
        }
    }
}

/// Rewrite of one counterparty history. Applied all-or-nothing.
#[derive(Clone, Debug, Default)]
pub struct CounterpartyBatch {
    pub counterparty_id: String,
    pub upserts: Vec<CounterpartyTransaction>,
    pub removals: Vec<String>,
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn save_group(&self, group: Group) -> Result<(), LedgerError>;
    async fn get_group(&self, group_id: &str) -> Result<Option<Group>, LedgerError>;
    async fn get_user_groups(&self, user_id: &str) -> Result<Vec<Group>, LedgerError>;

    async fn get_expense(&self, expense_id: &str) -> Result<Option<Expense>, LedgerError>;
    async fn get_group_expenses(&self, group_id: &str) -> Result<Vec<Expense>, LedgerError>;
    async fn get_balance_sheet(&self, group_id: &str) -> Result<BalanceSheet, LedgerError>;
    async fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>, LedgerError>;
    async fn get_group_payments(&self, group_id: &str) -> Result<Vec<Payment>, LedgerError>;
    async fn commit_group_batch(&self, batch: GroupBatch) -> Result<(), LedgerError>;

    async fn save_counterparty(&self, counterparty: Counterparty) -> Result<(), LedgerError>;
    async fn get_counterparty(&self, counterparty_id: &str) -> Result<Option<Counterparty>, LedgerError>;
    async fn get_owner_counterparties(&self, owner_id: &str) -> Result<Vec<Counterparty>, LedgerError>;
    async fn delete_counterparty(&self, counterparty_id: &str) -> Result<(), LedgerError>;
    async fn get_counterparty_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<CounterpartyTransaction>, LedgerError>;
    /// Ordered by `(transaction_date, sequence)`.
    async fn get_counterparty_history(&self, counterparty_id: &str) -> Result<Vec<CounterpartyTransaction>, LedgerError>;
    async fn get_latest_counterparty_transaction(
        &self,
        counterparty_id: &str,
    ) -> Result<Option<CounterpartyTransaction>, LedgerError>;
    async fn next_transaction_sequence(&self) -> Result<u64, LedgerError>;
    async fn commit_counterparty_batch(&self, batch: CounterpartyBatch) -> Result<(), LedgerError>;

    async fn save_group_audit(&self, audit: GroupAudit) -> Result<(), LedgerError>;
    async fn get_group_audits(&self, group_id: &str) -> Result<Vec<GroupAudit>, LedgerError>;
}

pub mod in_memory;
