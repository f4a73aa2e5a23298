use super::LedgerService;
use crate::constants::constants::{
    GROUP_CREATED, MEMBER_ADDED, MEMBER_REMOVED, MEMBER_ROLE_CHANGED, STRICT_SETTLEMENT_MODE_TOGGLED,
};
use crate::core::errors::LedgerError;
use crate::core::ledger::BalanceSheet;
use crate::core::models::{
    audit::{AppLog, GroupAudit},
    expense::SplitStrategy,
    group::{Group, GroupMember, Role},
};
use crate::infrastructure::locks::group_key;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::{GroupBatch, Storage};
use chrono::Utc;
use serde_json::json;
use tracing::info;
use uuid::Uuid;

impl<L: LoggingService, S: Storage> LedgerService<L, S> {
    /// Creates a group with `created_by` as its first admin. `member_ids`
    /// join as plain members.
    pub async fn create_group(
        &self,
        name: String,
        currency: Option<String>,
        default_split: Option<SplitStrategy>,
        member_ids: Vec<String>,
        created_by: &str,
    ) -> Result<Group, LedgerError> {
        self.validate_string_input("name", &name)?;
        self.validate_string_input("user_id", created_by)?;
        for member_id in &member_ids {
            self.validate_string_input("user_id", member_id)?;
        }
        let currency = match currency {
            Some(c) => self.normalize_currency("currency", &c)?,
            None => self.limits.default_currency.clone(),
        };

        let now = Utc::now();
        let mut members = vec![GroupMember {
            user_id: created_by.to_string(),
            role: Role::Admin,
            active: true,
            joined_at: now,
        }];
        for member_id in member_ids {
            if members.iter().any(|m| m.user_id == member_id) {
                continue;
            }
            members.push(GroupMember {
                user_id: member_id,
                role: Role::Member,
                active: true,
                joined_at: now,
            });
        }

        let group = Group {
            id: Uuid::new_v4().to_string(),
            name,
            currency,
            default_split: default_split.unwrap_or(SplitStrategy::Equal),
            strict_settlement_mode: self.limits.strict_settlement_default,
            members,
            created_at: now,
        };

        let mut batch = GroupBatch::new(&group.id);
        batch.group = Some(group.clone());
        batch.sheet = Some(BalanceSheet::new(&group.id));
        self.storage.commit_group_batch(batch).await?;

        info!(group_id = %group.id, members = group.members.len(), "group created");
        self.log_and_audit(
            Some(&group.id),
            GROUP_CREATED,
            json!({
                "group_id": group.id,
                "name": group.name,
                "currency": group.currency,
                "member_ids": group.members.iter().map(|m| m.user_id.clone()).collect::<Vec<_>>()
            }),
            Some(created_by),
        )
        .await;

        Ok(group)
    }

    pub async fn get_group(&self, group_id: &str) -> Result<Group, LedgerError> {
        self.load_group(group_id).await
    }

    pub async fn get_user_groups(&self, user_id: &str) -> Result<Vec<Group>, LedgerError> {
        let groups = self.storage.get_user_groups(user_id).await?;
        Ok(groups.into_iter().filter(|g| g.is_active_member(user_id)).collect())
    }

    /// Adds `user_id` as a member. A previously removed member is reactivated.
    pub async fn add_member(&self, group_id: &str, user_id: &str, added_by: &str) -> Result<Group, LedgerError> {
        self.validate_string_input("user_id", user_id)?;
        let _guard = self.locks.acquire(&group_key(group_id)).await;
        let mut group = self.validate_group_and_admin(group_id, added_by).await?;

        match group.members.iter_mut().find(|m| m.user_id == user_id) {
            Some(member) if member.active => return Err(LedgerError::AlreadyGroupMember(user_id.to_string())),
            Some(member) => {
                member.active = true;
                member.role = Role::Member;
                member.joined_at = Utc::now();
            }
            None => group.members.push(GroupMember {
                user_id: user_id.to_string(),
                role: Role::Member,
                active: true,
                joined_at: Utc::now(),
            }),
        }

        let mut batch = GroupBatch::new(group_id);
        batch.group = Some(group.clone());
        self.storage.commit_group_batch(batch).await?;

        self.log_and_audit(
            Some(group_id),
            MEMBER_ADDED,
            json!({ "group_id": group_id, "user_id": user_id }),
            Some(added_by),
        )
        .await;
        Ok(group)
    }

    /// Deactivates a member. Their history stays; they must be settled up
    /// first and the group must keep an admin.
    pub async fn remove_member(&self, group_id: &str, user_id: &str, removed_by: &str) -> Result<Group, LedgerError> {
        let _guard = self.locks.acquire(&group_key(group_id)).await;
        let mut group = self.validate_group_and_admin(group_id, removed_by).await?;
        if !group.is_active_member(user_id) {
            return Err(LedgerError::MemberNotFound(group_id.to_string(), user_id.to_string()));
        }
        if group.is_admin(user_id) && group.admin_count() <= 1 {
            return Err(LedgerError::LastAdmin(group_id.to_string()));
        }

        let sheet = self.load_balanced_sheet(group_id).await?;
        let balance = sheet.balance_of(user_id);
        if !balance.is_zero() {
            return Err(LedgerError::OutstandingBalance(user_id.to_string(), balance));
        }

        if let Some(member) = group.members.iter_mut().find(|m| m.user_id == user_id) {
            member.active = false;
        }

        let mut batch = GroupBatch::new(group_id);
        batch.group = Some(group.clone());
        self.storage.commit_group_batch(batch).await?;

        info!(group_id, user_id, "member removed");
        self.log_and_audit(
            Some(group_id),
            MEMBER_REMOVED,
            json!({ "group_id": group_id, "user_id": user_id }),
            Some(removed_by),
        )
        .await;
        Ok(group)
    }

    pub async fn change_member_role(
        &self,
        group_id: &str,
        user_id: &str,
        role: Role,
        changed_by: &str,
    ) -> Result<Group, LedgerError> {
        let _guard = self.locks.acquire(&group_key(group_id)).await;
        let mut group = self.validate_group_and_admin(group_id, changed_by).await?;
        if !group.is_active_member(user_id) {
            return Err(LedgerError::MemberNotFound(group_id.to_string(), user_id.to_string()));
        }
        if role == Role::Member && group.is_admin(user_id) && group.admin_count() <= 1 {
            return Err(LedgerError::LastAdmin(group_id.to_string()));
        }

        if let Some(member) = group.members.iter_mut().find(|m| m.user_id == user_id) {
            member.role = role;
        }

        let mut batch = GroupBatch::new(group_id);
        batch.group = Some(group.clone());
        self.storage.commit_group_batch(batch).await?;

        self.log_and_audit(
            Some(group_id),
            MEMBER_ROLE_CHANGED,
            json!({ "group_id": group_id, "user_id": user_id, "role": role.to_string() }),
            Some(changed_by),
        )
        .await;
        Ok(group)
    }

    pub async fn toggle_strict_settlement_mode(
        &self,
        group_id: &str,
        enabled: bool,
        toggled_by: &str,
    ) -> Result<(), LedgerError> {
        let _guard = self.locks.acquire(&group_key(group_id)).await;
        let mut group = self.validate_group_and_admin(group_id, toggled_by).await?;
        group.strict_settlement_mode = enabled;

        let mut batch = GroupBatch::new(group_id);
        batch.group = Some(group);
        self.storage.commit_group_batch(batch).await?;

        self.log_and_audit(
            Some(group_id),
            STRICT_SETTLEMENT_MODE_TOGGLED,
            json!({ "group_id": group_id, "enabled": enabled }),
            Some(toggled_by),
        )
        .await;
        Ok(())
    }

    pub async fn get_group_audits(&self, group_id: &str) -> Result<Vec<GroupAudit>, LedgerError> {
        self.load_group(group_id).await?;
        self.storage.get_group_audits(group_id).await
    }

    pub async fn get_app_logs(&self) -> Result<Vec<AppLog>, LedgerError> {
        self.logging.get_logs().await
    }
}
