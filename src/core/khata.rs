//! Running-balance bookkeeping for a single (owner, counterparty) history.
//!
//! Entries are ordered by `(transaction_date, sequence)`. Every entry caches
//! the balance right after it; the cache is always rebuilt from zero by a
//! forward walk, so it never becomes a second source of truth.

use crate::core::models::counterparty::{CounterpartyTransaction, FinancialSummary, Standing, TransactionKind};
use crate::core::money::Money;
use chrono::{DateTime, Utc};

pub struct CounterpartyLedger;

impl CounterpartyLedger {
    pub fn signed_amount(kind: TransactionKind, amount: Money) -> Money {
        match kind {
            TransactionKind::Give => amount,
            TransactionKind::Get => -amount,
        }
    }

    pub fn standing(balance: Money) -> Standing {
        if balance.is_positive() {
            Standing::Owed
        } else if balance.is_negative() {
            Standing::Owing
        } else {
            Standing::Settled
        }
    }

    pub fn sort(history: &mut [CounterpartyTransaction]) {
        history.sort_by(|a, b| {
            a.transaction_date
                .cmp(&b.transaction_date)
                .then(a.sequence.cmp(&b.sequence))
        });
    }

    /// An entry dated before the current latest one lands mid-history.
    pub fn is_out_of_order(latest: Option<&CounterpartyTransaction>, date: DateTime<Utc>) -> bool {
        latest.is_some_and(|l| date < l.transaction_date)
    }

    /// Running balance for an entry appended after `latest`.
    pub fn next_running_balance(latest: Option<&CounterpartyTransaction>, kind: TransactionKind, amount: Money) -> Money {
        latest.map(|l| l.running_balance).unwrap_or(Money::ZERO) + Self::signed_amount(kind, amount)
    }

    /// Sorts `history` and rewrites every cached running balance from zero.
    /// Returns how many entries changed.
    pub fn recompute(history: &mut [CounterpartyTransaction]) -> usize {
        Self::sort(history);
        let mut running = Money::ZERO;
        let mut changed = 0;
        for tx in history.iter_mut() {
            running += Self::signed_amount(tx.kind, tx.amount);
            if tx.running_balance != running {
                tx.running_balance = running;
                changed += 1;
            }
        }
        changed
    }

    /// First entry whose cached balance disagrees with the ordered history,
    /// with the balance it should carry. `history` must already be sorted.
    pub fn first_drift(history: &[CounterpartyTransaction]) -> Option<(&CounterpartyTransaction, Money)> {
        let mut running = Money::ZERO;
        for tx in history {
            running += Self::signed_amount(tx.kind, tx.amount);
            if tx.running_balance != running {
                return Some((tx, running));
            }
        }
        None
    }

    /// Splits each counterparty's latest balance into what the owner owes
    /// (`total_give`) and what the owner is owed (`total_get`).
    pub fn summarize(latest_balances: impl IntoIterator<Item = Money>) -> FinancialSummary {
        latest_balances
            .into_iter()
            .fold(FinancialSummary::default(), |mut summary, balance| {
                if balance.is_negative() {
                    summary.total_give += balance.abs();
                } else {
                    summary.total_get += balance;
                }
                summary
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn day(n: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap() + Duration::days(n)
    }

    fn tx(id: &str, kind: TransactionKind, minor: i64, date: DateTime<Utc>, sequence: u64) -> CounterpartyTransaction {
        CounterpartyTransaction {
            id: id.to_string(),
            owner_id: "owner".to_string(),
            counterparty_id: "cp".to_string(),
            kind,
            amount: Money::from_minor(minor),
            currency: "INR".to_string(),
            transaction_date: date,
            note: None,
            sequence,
            running_balance: Money::ZERO,
            created_at: date,
            updated_at: date,
        }
    }

    #[test]
    fn recompute_walks_in_date_then_sequence_order() {
        let mut history = vec![
            tx("late", TransactionKind::Get, 200, day(5), 1),
            tx("early", TransactionKind::Give, 500, day(1), 2),
            tx("tie", TransactionKind::Give, 100, day(5), 3),
        ];
        CounterpartyLedger::recompute(&mut history);
        let view: Vec<(&str, i64)> = history
            .iter()
            .map(|t| (t.id.as_str(), t.running_balance.minor_units()))
            .collect();
        assert_eq!(view, vec![("early", 500), ("late", 300), ("tie", 400)]);
    }

    #[test]
    fn recompute_is_idempotent() {
        let mut history = vec![
            tx("a", TransactionKind::Give, 500, day(1), 1),
            tx("b", TransactionKind::Get, 700, day(2), 2),
        ];
        CounterpartyLedger::recompute(&mut history);
        let first = history.clone();
        assert_eq!(CounterpartyLedger::recompute(&mut history), 0);
        assert_eq!(history, first);
        assert!(CounterpartyLedger::first_drift(&history).is_none());
    }

    #[test]
    fn detects_drifted_cache() {
        let mut history = vec![tx("a", TransactionKind::Give, 500, day(1), 1)];
        CounterpartyLedger::recompute(&mut history);
        history[0].running_balance = Money::from_minor(1);
        let (drifted, expected) = CounterpartyLedger::first_drift(&history).unwrap();
        assert_eq!(drifted.id, "a");
        assert_eq!(expected, Money::from_minor(500));
    }

    #[test]
    fn summary_splits_latest_balances_by_sign() {
        let summary = CounterpartyLedger::summarize([
            Money::from_minor(300),
            Money::from_minor(-150),
            Money::ZERO,
            Money::from_minor(-50),
        ]);
        assert_eq!(summary.total_get, Money::from_minor(300));
        assert_eq!(summary.total_give, Money::from_minor(200));
    }

    #[test]
    fn standing_follows_sign() {
        assert_eq!(CounterpartyLedger::standing(Money::from_minor(1)), Standing::Owed);
        assert_eq!(CounterpartyLedger::standing(Money::from_minor(-1)), Standing::Owing);
        assert_eq!(CounterpartyLedger::standing(Money::ZERO), Standing::Settled);
    }
}
