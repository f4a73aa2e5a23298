use super::LedgerService;
use crate::constants::constants::{PAYMENT_CONFIRMED, PAYMENT_RECORDED, PAYMENT_VOIDED};
use crate::core::errors::LedgerError;
use crate::core::ledger::{BalanceLedger, BalanceSheet};
use crate::core::models::{
    balance::{GroupBalance, GroupPosition, SettlementTransfer, UserAggregate},
    payment::Payment,
};
use crate::core::money::Money;
use crate::core::simplify::DebtSimplifier;
use crate::infrastructure::locks::group_key;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::{GroupBatch, Storage};
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::json;
use std::collections::BTreeSet;
use tracing::{debug, error, info};
use uuid::Uuid;

impl<L: LoggingService, S: Storage> LedgerService<L, S> {
    /// Records that `from_user_id` paid `to_user_id`. Outside strict
    /// settlement mode the payment applies at once; otherwise it waits for
    /// the payee to confirm it. Either way it may not exceed the real debt.
    pub async fn record_payment(
        &self,
        group_id: &str,
        from_user_id: &str,
        to_user_id: &str,
        amount: Money,
        note: Option<String>,
        created_by: &str,
    ) -> Result<Payment, LedgerError> {
        if from_user_id == to_user_id {
            return Err(LedgerError::SelfPayment);
        }
        self.validate_amount_input("amount", amount)?;
        self.validate_optional_string_input("note", note.as_deref())?;

        let _guard = self.locks.acquire(&group_key(group_id)).await;
        let group = self.validate_group_membership(group_id, created_by).await?;
        for user_id in [from_user_id, to_user_id] {
            if group.member(user_id).is_none() {
                return Err(LedgerError::MemberNotFound(group_id.to_string(), user_id.to_string()));
            }
        }

        let mut sheet = self.load_balanced_sheet(group_id).await?;
        BalanceLedger::apply_payment(&mut sheet, from_user_id, to_user_id, amount)?;
        Self::ensure_zero_sum(&sheet)?;

        let confirmed = !group.strict_settlement_mode;
        let payment = Payment {
            id: Uuid::new_v4().to_string(),
            group_id: group_id.to_string(),
            from_user_id: from_user_id.to_string(),
            to_user_id: to_user_id.to_string(),
            amount,
            note,
            created_by: created_by.to_string(),
            created_at: Utc::now(),
            is_confirmed: confirmed,
            confirmed_by: confirmed.then(|| created_by.to_string()),
            voided_by: None,
        };

        let mut batch = GroupBatch::new(group_id);
        if confirmed {
            batch.sheet = Some(sheet);
        }
        batch.payment = Some(payment.clone());
        self.storage.commit_group_batch(batch).await?;

        info!(
            group_id,
            payment_id = %payment.id,
            amount = %amount,
            confirmed,
            "payment recorded"
        );
        self.log_and_audit(
            Some(group_id),
            PAYMENT_RECORDED,
            json!({
                "payment_id": payment.id,
                "group_id": group_id,
                "from_user_id": from_user_id,
                "to_user_id": to_user_id,
                "amount": amount,
                "confirmed": confirmed
            }),
            Some(created_by),
        )
        .await;

        Ok(payment)
    }

    /// Payee confirms a pending payment. It is checked against the balances
    /// as they stand now, not as they stood when it was recorded.
    pub async fn confirm_payment(&self, payment_id: &str, confirmed_by: &str) -> Result<Payment, LedgerError> {
        let group_id = self.load_payment(payment_id).await?.group_id;
        let _guard = self.locks.acquire(&group_key(&group_id)).await;
        let mut payment = self.load_payment(payment_id).await?;

        if payment.is_confirmed {
            return Err(LedgerError::PaymentAlreadyConfirmed(payment_id.to_string()));
        }
        if payment.is_voided() {
            return Err(LedgerError::PaymentVoided(payment_id.to_string()));
        }
        if payment.to_user_id != confirmed_by {
            return Err(LedgerError::UnauthorizedPaymentConfirmation(confirmed_by.to_string()));
        }
        self.load_group(&group_id).await?;

        let mut sheet = self.load_balanced_sheet(&group_id).await?;
        BalanceLedger::apply_payment(&mut sheet, &payment.from_user_id, &payment.to_user_id, payment.amount)?;
        Self::ensure_zero_sum(&sheet)?;

        payment.is_confirmed = true;
        payment.confirmed_by = Some(confirmed_by.to_string());

        let mut batch = GroupBatch::new(&group_id);
        batch.sheet = Some(sheet);
        batch.payment = Some(payment.clone());
        self.storage.commit_group_batch(batch).await?;

        info!(group_id = %group_id, payment_id, "payment confirmed");
        self.log_and_audit(
            Some(&group_id),
            PAYMENT_CONFIRMED,
            json!({ "payment_id": payment_id, "group_id": group_id, "amount": payment.amount }),
            Some(confirmed_by),
        )
        .await;
        Ok(payment)
    }

    /// Withdraws a pending payment: the payee rejects it or the payer cancels
    /// it. Balances are untouched, so no ledger check is needed.
    pub async fn void_payment(&self, payment_id: &str, voided_by: &str) -> Result<Payment, LedgerError> {
        let group_id = self.load_payment(payment_id).await?.group_id;
        let _guard = self.locks.acquire(&group_key(&group_id)).await;
        let mut payment = self.load_payment(payment_id).await?;

        if payment.is_confirmed {
            return Err(LedgerError::PaymentAlreadyConfirmed(payment_id.to_string()));
        }
        if payment.is_voided() {
            return Err(LedgerError::PaymentVoided(payment_id.to_string()));
        }
        if payment.to_user_id != voided_by && payment.from_user_id != voided_by {
            return Err(LedgerError::UnauthorizedPaymentConfirmation(voided_by.to_string()));
        }

        payment.voided_by = Some(voided_by.to_string());
        let mut batch = GroupBatch::new(&group_id);
        batch.payment = Some(payment.clone());
        self.storage.commit_group_batch(batch).await?;

        info!(group_id = %group_id, payment_id, "payment voided");
        self.log_and_audit(
            Some(&group_id),
            PAYMENT_VOIDED,
            json!({ "payment_id": payment_id, "group_id": group_id, "amount": payment.amount }),
            Some(voided_by),
        )
        .await;
        Ok(payment)
    }

    pub async fn get_pending_payments(&self, group_id: &str) -> Result<Vec<Payment>, LedgerError> {
        self.load_group(group_id).await?;
        let payments = self.storage.get_group_payments(group_id).await?;
        Ok(payments.into_iter().filter(Payment::is_pending).collect())
    }

    /// One row per member who ever held a balance or is active now, sorted
    /// by user id.
    pub async fn get_group_balances(&self, group_id: &str) -> Result<Vec<GroupBalance>, LedgerError> {
        let group = self.load_group(group_id).await?;
        let mut sheet = self.storage.get_balance_sheet(group_id).await?;
        for user_id in group.active_member_ids() {
            if !sheet.contains(&user_id) {
                sheet.adjust(&user_id, Money::ZERO);
            }
        }
        Ok(sheet.rows())
    }

    /// A user's position summed over every group they belong to or hold a
    /// balance in.
    pub async fn get_user_aggregate(&self, user_id: &str) -> Result<UserAggregate, LedgerError> {
        let groups = self.storage.get_user_groups(user_id).await?;
        let sheets = try_join_all(groups.iter().map(|g| self.storage.get_balance_sheet(&g.id))).await?;

        let mut aggregate = UserAggregate {
            user_id: user_id.to_string(),
            ..Default::default()
        };
        for sheet in sheets {
            let balance = sheet.balance_of(user_id);
            if balance.is_positive() {
                aggregate.total_owed += balance;
            } else {
                aggregate.total_owing += balance.abs();
            }
            aggregate.net += balance;
            aggregate.groups.push(GroupPosition {
                group_id: sheet.group_id.clone(),
                balance,
            });
        }
        debug!(user_id, groups = aggregate.groups.len(), net = %aggregate.net, "user aggregate computed");
        Ok(aggregate)
    }

    /// Suggested transfers that would settle the whole group. Read-only.
    pub async fn suggest_settlement(&self, group_id: &str) -> Result<Vec<SettlementTransfer>, LedgerError> {
        self.load_group(group_id).await?;
        let sheet = self.storage.get_balance_sheet(group_id).await?;
        DebtSimplifier.simplify(&sheet.rows())
    }

    /// Checks the stored balances sum to zero and match a replay of every
    /// live expense and confirmed payment.
    pub async fn validate_group_consistency(&self, group_id: &str) -> Result<(), LedgerError> {
        self.load_group(group_id).await?;
        let stored = self.storage.get_balance_sheet(group_id).await?;
        Self::ensure_zero_sum(&stored)?;

        let (expenses, payments) = futures::try_join!(
            self.storage.get_group_expenses(group_id),
            self.storage.get_group_payments(group_id)
        )?;
        let mut replayed = BalanceSheet::new(group_id);
        for expense in expenses.iter().filter(|e| !e.is_deleted()) {
            BalanceLedger::apply_expense(&mut replayed, expense);
        }
        for payment in payments.iter().filter(|p| p.is_confirmed) {
            replayed.adjust(&payment.from_user_id, payment.amount);
            replayed.adjust(&payment.to_user_id, -payment.amount);
        }

        let users: BTreeSet<&String> = stored.iter().map(|(u, _)| u).chain(replayed.iter().map(|(u, _)| u)).collect();
        for user_id in users {
            let (recorded, expected) = (stored.balance_of(user_id), replayed.balance_of(user_id));
            if recorded != expected {
                error!(
                    target: "settleup::consistency",
                    group_id,
                    user_id = %user_id,
                    stored = %recorded,
                    expected = %expected,
                    "stored balance disagrees with group history"
                );
                return Err(LedgerError::BalanceDrift {
                    group_id: group_id.to_string(),
                    user_id: user_id.clone(),
                    stored: recorded,
                    expected,
                });
            }
        }
        Ok(())
    }

    async fn load_payment(&self, payment_id: &str) -> Result<Payment, LedgerError> {
        self.storage
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| LedgerError::PaymentNotFound(payment_id.to_string()))
    }
}
