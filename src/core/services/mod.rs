use crate::config::Limits;
use crate::core::errors::{FieldError, LedgerError};
use crate::core::ledger::{BalanceLedger, BalanceSheet};
use crate::core::models::{audit::GroupAudit, counterparty::Counterparty, group::Group};
use crate::core::money::Money;
use crate::infrastructure::locks::KeyedLocks;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::Storage;
use chrono::Utc;
use tracing::{error, warn};
use uuid::Uuid;

mod counterparties;
mod expenses;
mod groups;
mod payments;

pub struct LedgerService<L: LoggingService, S: Storage> {
    storage: S,
    logging: L,
    locks: KeyedLocks,
    limits: Limits,
}

impl<L: LoggingService, S: Storage> LedgerService<L, S> {
    pub fn new(storage: S, logging: L) -> Self {
        Self::with_limits(storage, logging, Limits::default())
    }

    pub fn with_limits(storage: S, logging: L, limits: Limits) -> Self {
        LedgerService {
            storage,
            logging,
            locks: KeyedLocks::new(),
            limits,
        }
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    async fn load_group(&self, group_id: &str) -> Result<Group, LedgerError> {
        self.storage
            .get_group(group_id)
            .await?
            .ok_or_else(|| LedgerError::GroupNotFound(group_id.to_string()))
    }

    async fn validate_group_membership(&self, group_id: &str, user_id: &str) -> Result<Group, LedgerError> {
        let group = self.load_group(group_id).await?;
        if !group.is_active_member(user_id) {
            return Err(LedgerError::NotGroupMember(user_id.to_string()));
        }
        Ok(group)
    }

    async fn validate_group_and_admin(&self, group_id: &str, user_id: &str) -> Result<Group, LedgerError> {
        let group = self.validate_group_membership(group_id, user_id).await?;
        if !group.is_admin(user_id) {
            return Err(LedgerError::NotGroupAdmin(user_id.to_string()));
        }
        Ok(group)
    }

    /// Current balance sheet, refused if it already breaks the zero-sum rule.
    async fn load_balanced_sheet(&self, group_id: &str) -> Result<BalanceSheet, LedgerError> {
        let sheet = self.storage.get_balance_sheet(group_id).await?;
        Self::ensure_zero_sum(&sheet)?;
        Ok(sheet)
    }

    fn ensure_zero_sum(sheet: &BalanceSheet) -> Result<(), LedgerError> {
        BalanceLedger::check_zero_sum(sheet).inspect_err(|e| {
            error!(
                target: "settleup::consistency",
                group_id = %sheet.group_id,
                error = %e,
                "group balances do not sum to zero"
            );
        })
    }

    async fn validate_counterparty_owner(
        &self,
        owner_id: &str,
        counterparty_id: &str,
    ) -> Result<Counterparty, LedgerError> {
        let counterparty = self
            .storage
            .get_counterparty(counterparty_id)
            .await?
            .ok_or_else(|| LedgerError::CounterpartyNotFound(counterparty_id.to_string()))?;
        if counterparty.owner_id != owner_id {
            return Err(LedgerError::NotLedgerOwner(owner_id.to_string()));
        }
        Ok(counterparty)
    }

    /// Records the action after the mutation committed. Failures are logged
    /// and swallowed; the mutation stands.
    async fn log_and_audit(
        &self,
        group_id: Option<&str>,
        action: &str,
        log_details: serde_json::Value,
        user_id: Option<&str>,
    ) {
        if let Err(e) = self.logging.log_action(action, log_details.clone(), user_id).await {
            warn!(action, error = %e, "failed to write action log");
        }
        if let Some(gid) = group_id {
            let audit = GroupAudit {
                id: Uuid::new_v4().to_string(),
                group_id: gid.to_string(),
                action: action.to_string(),
                user_id: user_id.map(String::from),
                details: serde_json::from_value(log_details).unwrap_or_default(),
                timestamp: Utc::now(),
            };
            if let Err(e) = self.storage.save_group_audit(audit).await {
                warn!(action, group_id = gid, error = %e, "failed to write group audit");
            }
        }
    }

    fn validate_string_input(&self, field: &str, value: &str) -> Result<(), LedgerError> {
        let max_length = self.limits.max_text_length;
        if value.trim().is_empty() {
            return Err(LedgerError::InvalidInput(
                field.to_string(),
                FieldError {
                    field: field.to_string(),
                    title: format!("Invalid {}", field),
                    description: format!("{} cannot be empty", field),
                },
            ));
        }
        if value.chars().count() > max_length {
            return Err(LedgerError::InvalidInput(
                field.to_string(),
                FieldError {
                    field: field.to_string(),
                    title: format!("{} Too Long", field),
                    description: format!("{} cannot exceed {} characters", field, max_length),
                },
            ));
        }
        if value.chars().any(|c| c.is_control() || "<>{}[]".contains(c)) {
            return Err(LedgerError::InvalidInput(
                field.to_string(),
                FieldError {
                    field: field.to_string(),
                    title: format!("Invalid {}", field),
                    description: format!("{} contains invalid characters", field),
                },
            ));
        }
        Ok(())
    }

    fn validate_optional_string_input(&self, field: &str, value: Option<&str>) -> Result<(), LedgerError> {
        match value {
            Some(v) => self.validate_string_input(field, v),
            None => Ok(()),
        }
    }

    fn validate_amount_input(&self, field: &str, amount: Money) -> Result<(), LedgerError> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidInput(
                field.to_string(),
                FieldError {
                    field: field.to_string(),
                    title: "Invalid Amount".to_string(),
                    description: "Amount must be greater than 0".to_string(),
                },
            ));
        }
        self.validate_amount_ceiling(field, amount)
    }

    fn validate_amount_ceiling(&self, field: &str, amount: Money) -> Result<(), LedgerError> {
        if amount > self.limits.max_amount {
            return Err(LedgerError::InvalidInput(
                field.to_string(),
                FieldError {
                    field: field.to_string(),
                    title: "Amount Too Large".to_string(),
                    description: format!("Amount cannot exceed {}", self.limits.max_amount),
                },
            ));
        }
        Ok(())
    }

    fn normalize_currency(&self, field: &str, currency: &str) -> Result<String, LedgerError> {
        let code = currency.trim().to_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(LedgerError::InvalidInput(
                field.to_string(),
                FieldError {
                    field: field.to_string(),
                    title: "Invalid Currency".to_string(),
                    description: "Currency must be a three-letter code".to_string(),
                },
            ));
        }
        Ok(code)
    }
}
