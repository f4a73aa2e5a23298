use crate::core::money::Money;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    Equal,
    Percentage,
    Shares,
    Exact,
}

impl std::fmt::Display for SplitStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SplitStrategy::Equal => "equal",
            SplitStrategy::Percentage => "percentage",
            SplitStrategy::Shares => "shares",
            SplitStrategy::Exact => "exact",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct EqualLine {
    pub user_id: String,
    #[serde(default)]
    pub amount: Option<Money>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PercentageLine {
    pub user_id: String,
    pub percentage: Decimal,
    #[serde(default)]
    pub amount: Option<Money>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ShareLine {
    pub user_id: String,
    pub shares: u32,
    #[serde(default)]
    pub amount: Option<Money>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExactLine {
    pub user_id: String,
    pub amount: Money,
}

/// Split request, tagged by strategy. `None` lines mean "every active member".
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "strategy", rename_all = "lowercase")]
pub enum SplitInput {
    Equal {
        #[serde(default)]
        splits: Option<Vec<EqualLine>>,
    },
    Percentage {
        #[serde(default)]
        splits: Option<Vec<PercentageLine>>,
    },
    Shares {
        #[serde(default)]
        splits: Option<Vec<ShareLine>>,
    },
    Exact {
        #[serde(default)]
        splits: Option<Vec<ExactLine>>,
    },
}

impl SplitInput {
    /// Input that splits across every active member under `strategy`.
    pub fn auto(strategy: SplitStrategy) -> Self {
        match strategy {
            SplitStrategy::Equal => SplitInput::Equal { splits: None },
            SplitStrategy::Percentage => SplitInput::Percentage { splits: None },
            SplitStrategy::Shares => SplitInput::Shares { splits: None },
            SplitStrategy::Exact => SplitInput::Exact { splits: None },
        }
    }

    pub fn strategy(&self) -> SplitStrategy {
        match self {
            SplitInput::Equal { .. } => SplitStrategy::Equal,
            SplitInput::Percentage { .. } => SplitStrategy::Percentage,
            SplitInput::Shares { .. } => SplitStrategy::Shares,
            SplitInput::Exact { .. } => SplitStrategy::Exact,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ExpenseSplit {
    pub user_id: String,
    pub amount: Money,
    pub percentage: Option<Decimal>,
    pub shares: Option<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Expense {
    pub id: String,
    pub group_id: String,
    pub title: String,
    pub category: Option<String>,
    pub total_amount: Money,
    pub payer_id: String,
    pub strategy: SplitStrategy,
    pub splits: Vec<ExpenseSplit>,
    pub expense_date: DateTime<Utc>,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl Expense {
    pub fn is_deleted(&self) -> bool {
        self.deleted_at.is_some()
    }

    pub fn share_of(&self, user_id: &str) -> Money {
        self.splits
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.amount)
            .sum()
    }
}

/// Expense intake from the expense-management collaborator.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewExpense {
    pub group_id: String,
    pub title: String,
    #[serde(default)]
    pub category: Option<String>,
    pub total_amount: Money,
    pub payer_id: String,
    /// Falls back to the group's default strategy across all active members.
    #[serde(default)]
    pub split: Option<SplitInput>,
    #[serde(default)]
    pub expense_date: Option<DateTime<Utc>>,
}

/// Editable fields. Changing the amount requires `split` as well.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ExpenseUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub total_amount: Option<Money>,
    pub expense_date: Option<DateTime<Utc>>,
    pub split: Option<SplitInput>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExpenseReceipt {
    pub expense_id: String,
    pub splits: Vec<ExpenseSplit>,
}
