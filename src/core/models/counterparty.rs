use crate::core::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Counterparty {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    /// Owner hands money over; the counterparty owes more.
    Give,
    /// Owner receives money; the counterparty owes less.
    Get,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CounterpartyTransaction {
    pub id: String,
    pub owner_id: String,
    pub counterparty_id: String,
    pub kind: TransactionKind,
    pub amount: Money,
    pub currency: String,
    pub transaction_date: DateTime<Utc>,
    pub note: Option<String>,
    /// Creation order; breaks ties between equal dates.
    pub sequence: u64,
    /// Cached balance right after this entry. Derived, never authoritative.
    pub running_balance: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewCounterparty {
    pub owner_id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// Counterparty transaction intake.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewCounterpartyTransaction {
    pub owner_id: String,
    pub counterparty_id: String,
    pub kind: TransactionKind,
    pub amount: Money,
    pub currency: String,
    pub date: DateTime<Utc>,
    #[serde(default)]
    pub note: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransactionEdit {
    pub kind: Option<TransactionKind>,
    pub amount: Option<Money>,
    pub date: Option<DateTime<Utc>>,
    pub note: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct TransactionReceipt {
    pub transaction_id: String,
    pub running_balance: Money,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Standing {
    /// The counterparty owes the owner.
    Owed,
    /// The owner owes the counterparty.
    Owing,
    Settled,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct RunningBalance {
    pub counterparty_id: String,
    pub balance: Money,
    pub standing: Standing,
    pub as_of: Option<DateTime<Utc>>,
}

/// Owner-wide totals over each counterparty's latest running balance.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinancialSummary {
    /// Sum of what the owner owes, as a magnitude.
    pub total_give: Money,
    /// Sum of what counterparties owe the owner.
    pub total_get: Money,
}
