use crate::core::money::Money;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupBalance {
    pub group_id: String,
    pub user_id: String,
    pub balance: Money,
}

/// Computed settlement suggestion; never persisted.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct SettlementTransfer {
    pub from: String,
    pub to: String,
    pub amount: Money,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GroupPosition {
    pub group_id: String,
    pub balance: Money,
}

/// A user's standing across every group they hold a balance in.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserAggregate {
    pub user_id: String,
    /// Owed to the user.
    pub total_owed: Money,
    /// Owed by the user, as a magnitude.
    pub total_owing: Money,
    pub net: Money,
    pub groups: Vec<GroupPosition>,
}
