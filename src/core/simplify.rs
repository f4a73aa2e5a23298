//! Settlement suggestions for a group.
//!
//! Greedy two-pointer matching over creditors and debtors, both ordered by
//! user id so identical balances always produce identical transfers.
//!
//! Contract, for input that sums to zero:
//! * every creditor and every debtor ends exactly at zero;
//! * at most `creditors + debtors - 1` transfers are emitted.
//!
//! Each step moves `min(credit, debt)`, which retires at least one of the two
//! current parties, so there are at most `creditors + debtors` steps. Credits
//! and debts have equal totals, so the last step retires a creditor and a
//! debtor at once, saving one. This is not the true minimum (that problem is
//! NP-hard in general) but it is reproducible and bounded.

use crate::core::errors::LedgerError;
use crate::core::models::balance::{GroupBalance, SettlementTransfer};
use crate::core::money::Money;
use tracing::error;

/// Transfers smaller than this are not worth emitting.
pub const DUST_THRESHOLD: Money = Money::MINOR_UNIT;

pub struct DebtSimplifier;

impl DebtSimplifier {
    pub fn simplify(&self, balances: &[GroupBalance]) -> Result<Vec<SettlementTransfer>, LedgerError> {
        let imbalance: Money = balances.iter().map(|b| b.balance).sum();
        if !imbalance.is_zero() {
            let group_id = balances.first().map(|b| b.group_id.clone()).unwrap_or_default();
            error!(
                target: "settleup::consistency",
                group_id = %group_id,
                imbalance = %imbalance,
                "refusing to simplify balances that do not sum to zero"
            );
            return Err(LedgerError::ZeroSumViolation { group_id, imbalance });
        }

        let mut creditors: Vec<(&str, Money)> = balances
            .iter()
            .filter(|b| b.balance.is_positive())
            .map(|b| (b.user_id.as_str(), b.balance))
            .collect();
        let mut debtors: Vec<(&str, Money)> = balances
            .iter()
            .filter(|b| b.balance.is_negative())
            .map(|b| (b.user_id.as_str(), b.balance.abs()))
            .collect();
        creditors.sort_by(|a, b| a.0.cmp(b.0));
        debtors.sort_by(|a, b| a.0.cmp(b.0));

        let mut transfers = Vec::new();
        let mut i = 0;
        let mut j = 0;
        while i < creditors.len() && j < debtors.len() {
            let (creditor_id, credit) = creditors[i];
            let (debtor_id, debt) = debtors[j];
            let amount = credit.min(debt);

            if amount >= DUST_THRESHOLD {
                transfers.push(SettlementTransfer {
                    from: debtor_id.to_string(),
                    to: creditor_id.to_string(),
                    amount,
                });
            }

            creditors[i].1 -= amount;
            debtors[j].1 -= amount;
            if creditors[i].1.is_zero() {
                i += 1;
            }
            if debtors[j].1.is_zero() {
                j += 1;
            }
        }

        debug_assert!(transfers.len() <= (creditors.len() + debtors.len()).saturating_sub(1));
        Ok(transfers)
    }
}
