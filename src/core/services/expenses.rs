use super::LedgerService;
use crate::constants::constants::{EXPENSE_ADDED, EXPENSE_DELETED, EXPENSE_UPDATED};
use crate::core::errors::{FieldError, LedgerError};
use crate::core::ledger::BalanceLedger;
use crate::core::models::{
    expense::{Expense, ExpenseReceipt, ExpenseUpdate, NewExpense, SplitInput},
    group::Group,
};
use crate::core::split::SplitCalculator;
use crate::infrastructure::locks::group_key;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::{GroupBatch, Storage};
use chrono::Utc;
use serde_json::json;
use tracing::{debug, info};
use uuid::Uuid;

impl<L: LoggingService, S: Storage> LedgerService<L, S> {
    /// Validates the split, stores the expense and moves the balances in one
    /// commit.
    pub async fn create_expense(&self, intake: NewExpense, created_by: &str) -> Result<ExpenseReceipt, LedgerError> {
        self.validate_string_input("title", &intake.title)?;
        self.validate_optional_string_input("category", intake.category.as_deref())?;
        self.validate_amount_ceiling("total_amount", intake.total_amount)?;

        let _guard = self.locks.acquire(&group_key(&intake.group_id)).await;
        let group = self.validate_group_membership(&intake.group_id, created_by).await?;
        Self::validate_payer(&group, &intake.payer_id)?;

        let split = intake.split.unwrap_or_else(|| SplitInput::auto(group.default_split));
        let splits = SplitCalculator.compute_or_validate(intake.total_amount, &split, &group.active_member_ids())?;

        let now = Utc::now();
        let expense = Expense {
            id: Uuid::new_v4().to_string(),
            group_id: group.id.clone(),
            title: intake.title,
            category: intake.category,
            total_amount: intake.total_amount,
            payer_id: intake.payer_id,
            strategy: split.strategy(),
            splits,
            expense_date: intake.expense_date.unwrap_or(now),
            created_by: created_by.to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let mut sheet = self.load_balanced_sheet(&group.id).await?;
        BalanceLedger::apply_expense(&mut sheet, &expense);
        Self::ensure_zero_sum(&sheet)?;

        let mut batch = GroupBatch::new(&group.id);
        batch.sheet = Some(sheet);
        batch.expense = Some(expense.clone());
        self.storage.commit_group_batch(batch).await?;

        info!(
            group_id = %group.id,
            expense_id = %expense.id,
            amount = %expense.total_amount,
            strategy = %expense.strategy,
            "expense recorded"
        );
        self.log_and_audit(
            Some(&group.id),
            EXPENSE_ADDED,
            json!({
                "expense_id": expense.id,
                "group_id": group.id,
                "title": expense.title,
                "amount": expense.total_amount,
                "payer_id": expense.payer_id,
                "strategy": expense.strategy,
                "participants": expense.splits.iter().map(|s| s.user_id.clone()).collect::<Vec<_>>()
            }),
            Some(created_by),
        )
        .await;

        Ok(ExpenseReceipt {
            expense_id: expense.id,
            splits: expense.splits,
        })
    }

    /// Metadata edits leave balances alone. A new amount needs a new split;
    /// the stored split is reversed and the new one applied in one commit.
    pub async fn update_expense(
        &self,
        expense_id: &str,
        update: ExpenseUpdate,
        updated_by: &str,
    ) -> Result<Expense, LedgerError> {
        if let Some(title) = &update.title {
            self.validate_string_input("title", title)?;
        }
        self.validate_optional_string_input("category", update.category.as_deref())?;
        if let Some(total) = update.total_amount {
            self.validate_amount_ceiling("total_amount", total)?;
        }

        let group_id = self.load_expense(expense_id).await?.group_id;
        let _guard = self.locks.acquire(&group_key(&group_id)).await;
        // Re-read under the lock: another writer may have touched it.
        let mut expense = self.load_expense(expense_id).await?;
        if expense.is_deleted() {
            return Err(LedgerError::ExpenseAlreadyDeleted(expense_id.to_string()));
        }
        let group = self.validate_group_membership(&group_id, updated_by).await?;
        Self::validate_expense_editor(&group, &expense, updated_by)?;

        let amount_changed = update.total_amount.is_some_and(|t| t != expense.total_amount);
        if amount_changed && update.split.is_none() {
            return Err(LedgerError::SplitsRequired(expense_id.to_string()));
        }

        let mut batch = GroupBatch::new(&group_id);
        let previous_amount = expense.total_amount;
        if let Some(split) = &update.split {
            let total = update.total_amount.unwrap_or(expense.total_amount);
            let splits = SplitCalculator.compute_or_validate(total, split, &group.active_member_ids())?;

            let mut sheet = self.load_balanced_sheet(&group_id).await?;
            BalanceLedger::reverse_expense(&mut sheet, &expense);
            expense.total_amount = total;
            expense.strategy = split.strategy();
            expense.splits = splits;
            BalanceLedger::apply_expense(&mut sheet, &expense);
            Self::ensure_zero_sum(&sheet)?;
            batch.sheet = Some(sheet);
        }

        if let Some(title) = update.title {
            expense.title = title;
        }
        if update.category.is_some() {
            expense.category = update.category;
        }
        if let Some(date) = update.expense_date {
            expense.expense_date = date;
        }
        expense.updated_at = Utc::now();

        let rebalanced = batch.sheet.is_some();
        batch.expense = Some(expense.clone());
        self.storage.commit_group_batch(batch).await?;

        debug!(expense_id, rebalanced, "expense updated");
        self.log_and_audit(
            Some(&group_id),
            EXPENSE_UPDATED,
            json!({
                "expense_id": expense_id,
                "group_id": group_id,
                "previous_amount": previous_amount,
                "amount": expense.total_amount,
                "rebalanced": rebalanced
            }),
            Some(updated_by),
        )
        .await;

        Ok(expense)
    }

    /// Soft delete. The stored split is reversed, so every balance returns to
    /// what it would be had the expense never been recorded.
    pub async fn delete_expense(&self, expense_id: &str, deleted_by: &str) -> Result<(), LedgerError> {
        let group_id = self.load_expense(expense_id).await?.group_id;
        let _guard = self.locks.acquire(&group_key(&group_id)).await;
        let mut expense = self.load_expense(expense_id).await?;
        if expense.is_deleted() {
            return Err(LedgerError::ExpenseAlreadyDeleted(expense_id.to_string()));
        }
        let group = self.validate_group_membership(&group_id, deleted_by).await?;
        Self::validate_expense_editor(&group, &expense, deleted_by)?;

        let mut sheet = self.load_balanced_sheet(&group_id).await?;
        BalanceLedger::reverse_expense(&mut sheet, &expense);
        Self::ensure_zero_sum(&sheet)?;

        let now = Utc::now();
        expense.deleted_at = Some(now);
        expense.updated_at = now;

        let mut batch = GroupBatch::new(&group_id);
        batch.sheet = Some(sheet);
        batch.expense = Some(expense.clone());
        self.storage.commit_group_batch(batch).await?;

        info!(group_id = %group_id, expense_id, "expense deleted");
        self.log_and_audit(
            Some(&group_id),
            EXPENSE_DELETED,
            json!({ "expense_id": expense_id, "group_id": group_id, "amount": expense.total_amount }),
            Some(deleted_by),
        )
        .await;
        Ok(())
    }

    pub async fn get_expense(&self, expense_id: &str) -> Result<Expense, LedgerError> {
        self.load_expense(expense_id).await
    }

    /// Live expenses of a group, oldest first.
    pub async fn list_expenses(&self, group_id: &str) -> Result<Vec<Expense>, LedgerError> {
        self.load_group(group_id).await?;
        let expenses = self.storage.get_group_expenses(group_id).await?;
        Ok(expenses.into_iter().filter(|e| !e.is_deleted()).collect())
    }

    async fn load_expense(&self, expense_id: &str) -> Result<Expense, LedgerError> {
        self.storage
            .get_expense(expense_id)
            .await?
            .ok_or_else(|| LedgerError::ExpenseNotFound(expense_id.to_string()))
    }

    fn validate_payer(group: &Group, payer_id: &str) -> Result<(), LedgerError> {
        if !group.is_active_member(payer_id) {
            return Err(LedgerError::InvalidInput(
                "payer_id".to_string(),
                FieldError {
                    field: "payer_id".to_string(),
                    title: "Invalid payer".to_string(),
                    description: format!("{} is not an active member of the group", payer_id),
                },
            ));
        }
        Ok(())
    }

    /// The creator or any admin may change an expense.
    fn validate_expense_editor(group: &Group, expense: &Expense, user_id: &str) -> Result<(), LedgerError> {
        if expense.created_by == user_id || group.is_admin(user_id) {
            Ok(())
        } else {
            Err(LedgerError::NotExpenseEditor(user_id.to_string()))
        }
    }
}
