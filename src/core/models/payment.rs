use crate::core::money::Money;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Recorded intent that `from_user_id` paid `to_user_id`. Balances move only
/// once it is confirmed; a voided payment never moves them.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub group_id: String,
    pub from_user_id: String,
    pub to_user_id: String,
    pub amount: Money,
    pub note: Option<String>,
    pub created_by: String,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    pub is_confirmed: bool,
    pub confirmed_by: Option<String>,
    #[serde(default)]
    pub voided_by: Option<String>,
}

impl Payment {
    pub fn is_voided(&self) -> bool {
        self.voided_by.is_some()
    }

    pub fn is_pending(&self) -> bool {
        !self.is_confirmed && !self.is_voided()
    }
}
