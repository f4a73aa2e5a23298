//! Zero-sum balance bookkeeping for a single group.

use crate::core::errors::LedgerError;
use crate::core::models::balance::GroupBalance;
use crate::core::models::expense::Expense;
use crate::core::money::Money;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One group's balances keyed by user id. Positive: the group owes the
/// member; negative: the member owes the group.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub group_id: String,
    balances: BTreeMap<String, Money>,
}

impl BalanceSheet {
    pub fn new(group_id: impl Into<String>) -> Self {
        BalanceSheet {
            group_id: group_id.into(),
            balances: BTreeMap::new(),
        }
    }

    pub fn from_rows(group_id: impl Into<String>, rows: impl IntoIterator<Item = (String, Money)>) -> Self {
        BalanceSheet {
            group_id: group_id.into(),
            balances: rows.into_iter().collect(),
        }
    }

    pub fn balance_of(&self, user_id: &str) -> Money {
        self.balances.get(user_id).copied().unwrap_or(Money::ZERO)
    }

    /// Rows are created on first touch.
    pub fn adjust(&mut self, user_id: &str, delta: Money) {
        *self.balances.entry(user_id.to_string()).or_insert(Money::ZERO) += delta;
    }

    pub fn total(&self) -> Money {
        self.balances.values().sum()
    }

    pub fn contains(&self, user_id: &str) -> bool {
        self.balances.contains_key(user_id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Money)> {
        self.balances.iter()
    }

    pub fn rows(&self) -> Vec<GroupBalance> {
        self.balances
            .iter()
            .map(|(user_id, balance)| GroupBalance {
                group_id: self.group_id.clone(),
                user_id: user_id.clone(),
                balance: *balance,
            })
            .collect()
    }
}

pub struct BalanceLedger;

impl BalanceLedger {
    /// Credits the payer for what they fronted and debits every participant
    /// their own consumption. Net effect on the payer: `total - own share`.
    pub fn apply_expense(sheet: &mut BalanceSheet, expense: &Expense) {
        sheet.adjust(&expense.payer_id, expense.total_amount);
        for split in &expense.splits {
            sheet.adjust(&split.user_id, -split.amount);
        }
    }

    /// Exact inverse of [`BalanceLedger::apply_expense`], driven by the stored
    /// splits rather than a recomputation.
    pub fn reverse_expense(sheet: &mut BalanceSheet, expense: &Expense) {
        sheet.adjust(&expense.payer_id, -expense.total_amount);
        for split in &expense.splits {
            sheet.adjust(&split.user_id, split.amount);
        }
    }

    /// `from` pays `to`. Only real debt can be settled: `from` must owe,
    /// `to` must be owed, and the amount may not exceed either position.
    pub fn apply_payment(sheet: &mut BalanceSheet, from: &str, to: &str, amount: Money) -> Result<(), LedgerError> {
        if from == to {
            return Err(LedgerError::SelfPayment);
        }
        if !amount.is_positive() {
            return Err(LedgerError::PaymentExceedsDebt {
                from: from.to_string(),
                to: to.to_string(),
                amount,
                outstanding: Money::ZERO,
            });
        }
        let debtor = sheet.balance_of(from);
        let creditor = sheet.balance_of(to);
        let outstanding = if debtor.is_negative() && creditor.is_positive() {
            debtor.abs().min(creditor)
        } else {
            Money::ZERO
        };
        if amount > outstanding {
            return Err(LedgerError::PaymentExceedsDebt {
                from: from.to_string(),
                to: to.to_string(),
                amount,
                outstanding,
            });
        }
        sheet.adjust(from, amount);
        sheet.adjust(to, -amount);
        Ok(())
    }

    pub fn check_zero_sum(sheet: &BalanceSheet) -> Result<(), LedgerError> {
        let imbalance = sheet.total();
        if !imbalance.is_zero() {
            return Err(LedgerError::ZeroSumViolation {
                group_id: sheet.group_id.clone(),
                imbalance,
            });
        }
        Ok(())
    }
}
