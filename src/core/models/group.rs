use super::expense::SplitStrategy;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")] // JSON carries "ADMIN" / "MEMBER"
pub enum Role {
    Admin,
    Member,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Admin => "ADMIN",
            Role::Member => "MEMBER",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GroupMember {
    pub user_id: String,
    pub role: Role,
    pub active: bool,
    pub joined_at: DateTime<Utc>,
}

impl GroupMember {
    pub fn is_admin(&self) -> bool {
        self.active && self.role == Role::Admin
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Group {
    pub id: String,
    pub name: String,
    pub currency: String,
    pub default_split: SplitStrategy,
    pub strict_settlement_mode: bool,
    pub members: Vec<GroupMember>,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn member(&self, user_id: &str) -> Option<&GroupMember> {
        self.members.iter().find(|m| m.user_id == user_id)
    }

    pub fn is_active_member(&self, user_id: &str) -> bool {
        self.member(user_id).is_some_and(|m| m.active)
    }

    pub fn is_admin(&self, user_id: &str) -> bool {
        self.member(user_id).is_some_and(GroupMember::is_admin)
    }

    /// Active member ids in ascending order.
    pub fn active_member_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .members
            .iter()
            .filter(|m| m.active)
            .map(|m| m.user_id.clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn admin_count(&self) -> usize {
        self.members.iter().filter(|m| m.is_admin()).count()
    }
}
