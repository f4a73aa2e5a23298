use super::LedgerService;
use crate::constants::constants::{
    COUNTERPARTY_CREATED, COUNTERPARTY_DELETED, KHATA_ENTRY_DELETED, KHATA_ENTRY_EDITED, KHATA_ENTRY_RECORDED,
    KHATA_RECOMPUTED,
};
use crate::core::errors::LedgerError;
use crate::core::khata::CounterpartyLedger;
use crate::core::models::counterparty::{
    Counterparty, CounterpartyTransaction, FinancialSummary, NewCounterparty, NewCounterpartyTransaction,
    RunningBalance, TransactionEdit, TransactionReceipt,
};
use crate::core::money::Money;
use crate::infrastructure::locks::counterparty_key;
use crate::infrastructure::logging::LoggingService;
use crate::infrastructure::storage::{CounterpartyBatch, Storage};
use chrono::Utc;
use futures::future::try_join_all;
use serde_json::json;
use std::collections::BTreeMap;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

impl<L: LoggingService, S: Storage> LedgerService<L, S> {
    pub async fn create_counterparty(&self, input: NewCounterparty) -> Result<Counterparty, LedgerError> {
        self.validate_string_input("owner_id", &input.owner_id)?;
        self.validate_string_input("name", &input.name)?;
        self.validate_optional_string_input("phone", input.phone.as_deref())?;
        let currency = match input.currency {
            Some(c) => self.normalize_currency("currency", &c)?,
            None => self.limits.default_currency.clone(),
        };

        let counterparty = Counterparty {
            id: Uuid::new_v4().to_string(),
            owner_id: input.owner_id,
            name: input.name,
            phone: input.phone,
            currency,
            created_at: Utc::now(),
        };
        self.storage.save_counterparty(counterparty.clone()).await?;

        self.log_and_audit(
            None,
            COUNTERPARTY_CREATED,
            json!({
                "counterparty_id": counterparty.id,
                "name": counterparty.name,
                "currency": counterparty.currency
            }),
            Some(&counterparty.owner_id),
        )
        .await;
        Ok(counterparty)
    }

    pub async fn list_counterparties(&self, owner_id: &str) -> Result<Vec<Counterparty>, LedgerError> {
        self.storage.get_owner_counterparties(owner_id).await
    }

    /// Removes the counterparty together with its whole history.
    pub async fn delete_counterparty(&self, owner_id: &str, counterparty_id: &str) -> Result<(), LedgerError> {
        let _guard = self.locks.acquire(&counterparty_key(owner_id, counterparty_id)).await;
        self.validate_counterparty_owner(owner_id, counterparty_id).await?;
        self.storage.delete_counterparty(counterparty_id).await?;

        info!(owner_id, counterparty_id, "counterparty deleted");
        self.log_and_audit(
            None,
            COUNTERPARTY_DELETED,
            json!({ "counterparty_id": counterparty_id }),
            Some(owner_id),
        )
        .await;
        Ok(())
    }

    /// Appends when the entry is not older than the latest one; otherwise
    /// the entry lands mid-history and every later balance is rebuilt. Either
    /// way the stored history must be free of drift.
    pub async fn record_transaction(
        &self,
        input: NewCounterpartyTransaction,
    ) -> Result<TransactionReceipt, LedgerError> {
        self.validate_amount_input("amount", input.amount)?;
        self.validate_optional_string_input("note", input.note.as_deref())?;

        let _guard = self
            .locks
            .acquire(&counterparty_key(&input.owner_id, &input.counterparty_id))
            .await;
        let counterparty = self
            .validate_counterparty_owner(&input.owner_id, &input.counterparty_id)
            .await?;
        let currency = input.currency.trim().to_uppercase();
        if currency != counterparty.currency {
            return Err(LedgerError::CurrencyMismatch {
                expected: counterparty.currency,
                found: input.currency,
            });
        }

        // Appends build on the latest cached balance, so it is verified too.
        let mut history = self.load_verified_history(&counterparty.id).await?;
        let latest = history.last().cloned();
        let now = Utc::now();
        let mut transaction = CounterpartyTransaction {
            id: Uuid::new_v4().to_string(),
            owner_id: input.owner_id.clone(),
            counterparty_id: counterparty.id.clone(),
            kind: input.kind,
            amount: input.amount,
            currency,
            transaction_date: input.date,
            note: input.note,
            sequence: self.storage.next_transaction_sequence().await?,
            running_balance: Money::ZERO,
            created_at: now,
            updated_at: now,
        };

        let out_of_order = CounterpartyLedger::is_out_of_order(latest.as_ref(), transaction.transaction_date);
        let batch = if out_of_order {
            history.push(transaction.clone());
            CounterpartyLedger::recompute(&mut history);
            if let Some(stored) = history.iter().find(|t| t.id == transaction.id) {
                transaction.running_balance = stored.running_balance;
            }
            CounterpartyBatch {
                counterparty_id: counterparty.id.clone(),
                upserts: history,
                removals: Vec::new(),
            }
        } else {
            transaction.running_balance =
                CounterpartyLedger::next_running_balance(latest.as_ref(), transaction.kind, transaction.amount);
            CounterpartyBatch {
                counterparty_id: counterparty.id.clone(),
                upserts: vec![transaction.clone()],
                removals: Vec::new(),
            }
        };
        self.storage.commit_counterparty_batch(batch).await?;

        debug!(
            counterparty_id = %counterparty.id,
            transaction_id = %transaction.id,
            out_of_order,
            running_balance = %transaction.running_balance,
            "khata entry recorded"
        );
        self.log_and_audit(
            None,
            KHATA_ENTRY_RECORDED,
            json!({
                "transaction_id": transaction.id,
                "counterparty_id": counterparty.id,
                "kind": transaction.kind,
                "amount": transaction.amount,
                "out_of_order": out_of_order
            }),
            Some(&input.owner_id),
        )
        .await;

        Ok(TransactionReceipt {
            transaction_id: transaction.id,
            running_balance: transaction.running_balance,
        })
    }

    pub async fn edit_transaction(
        &self,
        owner_id: &str,
        transaction_id: &str,
        edit: TransactionEdit,
    ) -> Result<TransactionReceipt, LedgerError> {
        if let Some(amount) = edit.amount {
            self.validate_amount_input("amount", amount)?;
        }
        self.validate_optional_string_input("note", edit.note.as_deref())?;

        let counterparty_id = self.load_owned_transaction(owner_id, transaction_id).await?.counterparty_id;
        let _guard = self.locks.acquire(&counterparty_key(owner_id, &counterparty_id)).await;
        self.load_owned_transaction(owner_id, transaction_id).await?;

        let mut history = self.load_verified_history(&counterparty_id).await?;
        let Some(transaction) = history.iter_mut().find(|t| t.id == transaction_id) else {
            return Err(LedgerError::TransactionNotFound(transaction_id.to_string()));
        };
        if let Some(kind) = edit.kind {
            transaction.kind = kind;
        }
        if let Some(amount) = edit.amount {
            transaction.amount = amount;
        }
        if let Some(date) = edit.date {
            transaction.transaction_date = date;
        }
        if edit.note.is_some() {
            transaction.note = edit.note;
        }
        transaction.updated_at = Utc::now();

        CounterpartyLedger::recompute(&mut history);
        let running_balance = history
            .iter()
            .find(|t| t.id == transaction_id)
            .map(|t| t.running_balance)
            .unwrap_or(Money::ZERO);
        self.storage
            .commit_counterparty_batch(CounterpartyBatch {
                counterparty_id: counterparty_id.clone(),
                upserts: history,
                removals: Vec::new(),
            })
            .await?;

        self.log_and_audit(
            None,
            KHATA_ENTRY_EDITED,
            json!({ "transaction_id": transaction_id, "counterparty_id": counterparty_id }),
            Some(owner_id),
        )
        .await;

        Ok(TransactionReceipt {
            transaction_id: transaction_id.to_string(),
            running_balance,
        })
    }

    pub async fn delete_transaction(&self, owner_id: &str, transaction_id: &str) -> Result<(), LedgerError> {
        let counterparty_id = self.load_owned_transaction(owner_id, transaction_id).await?.counterparty_id;
        let _guard = self.locks.acquire(&counterparty_key(owner_id, &counterparty_id)).await;
        self.load_owned_transaction(owner_id, transaction_id).await?;

        let mut history = self.load_verified_history(&counterparty_id).await?;
        history.retain(|t| t.id != transaction_id);
        CounterpartyLedger::recompute(&mut history);
        self.storage
            .commit_counterparty_batch(CounterpartyBatch {
                counterparty_id: counterparty_id.clone(),
                upserts: history,
                removals: vec![transaction_id.to_string()],
            })
            .await?;

        self.log_and_audit(
            None,
            KHATA_ENTRY_DELETED,
            json!({ "transaction_id": transaction_id, "counterparty_id": counterparty_id }),
            Some(owner_id),
        )
        .await;
        Ok(())
    }

    pub async fn get_running_balance(&self, owner_id: &str, counterparty_id: &str) -> Result<RunningBalance, LedgerError> {
        self.validate_counterparty_owner(owner_id, counterparty_id).await?;
        let latest = self
            .storage
            .get_latest_counterparty_transaction(counterparty_id)
            .await?;
        let balance = latest.as_ref().map(|t| t.running_balance).unwrap_or(Money::ZERO);
        Ok(RunningBalance {
            counterparty_id: counterparty_id.to_string(),
            balance,
            standing: CounterpartyLedger::standing(balance),
            as_of: latest.map(|t| t.transaction_date),
        })
    }

    /// Entries in `(transaction_date, sequence)` order.
    pub async fn get_counterparty_history(
        &self,
        owner_id: &str,
        counterparty_id: &str,
    ) -> Result<Vec<CounterpartyTransaction>, LedgerError> {
        self.validate_counterparty_owner(owner_id, counterparty_id).await?;
        self.storage.get_counterparty_history(counterparty_id).await
    }

    /// Rebuilds every cached running balance from the ordered history,
    /// whatever their current state. Returns how many entries were fixed.
    pub async fn recompute_counterparty(&self, owner_id: &str, counterparty_id: &str) -> Result<usize, LedgerError> {
        let _guard = self.locks.acquire(&counterparty_key(owner_id, counterparty_id)).await;
        self.validate_counterparty_owner(owner_id, counterparty_id).await?;

        let mut history = self.storage.get_counterparty_history(counterparty_id).await?;
        let changed = CounterpartyLedger::recompute(&mut history);
        if changed == 0 {
            return Ok(0);
        }
        self.storage
            .commit_counterparty_batch(CounterpartyBatch {
                counterparty_id: counterparty_id.to_string(),
                upserts: history,
                removals: Vec::new(),
            })
            .await?;

        warn!(counterparty_id, changed, "repaired drifted running balances");
        self.log_and_audit(
            None,
            KHATA_RECOMPUTED,
            json!({ "counterparty_id": counterparty_id, "changed": changed }),
            Some(owner_id),
        )
        .await;
        Ok(changed)
    }

    pub async fn validate_counterparty_consistency(
        &self,
        owner_id: &str,
        counterparty_id: &str,
    ) -> Result<(), LedgerError> {
        self.validate_counterparty_owner(owner_id, counterparty_id).await?;
        self.load_verified_history(counterparty_id).await.map(|_| ())
    }

    /// Totals over each counterparty's latest running balance. Balances in
    /// different currencies are never added together; use
    /// [`get_financial_summary_by_currency`](Self::get_financial_summary_by_currency)
    /// for an owner whose ledgers span currencies.
    pub async fn get_financial_summary(&self, owner_id: &str) -> Result<FinancialSummary, LedgerError> {
        let mut by_currency = self.get_financial_summary_by_currency(owner_id).await?.into_iter();
        let Some((expected, summary)) = by_currency.next() else {
            return Ok(FinancialSummary::default());
        };
        if let Some((found, _)) = by_currency.next() {
            return Err(LedgerError::CurrencyMismatch { expected, found });
        }
        Ok(summary)
    }

    /// One summary per currency, over counterparties that have any entries.
    pub async fn get_financial_summary_by_currency(
        &self,
        owner_id: &str,
    ) -> Result<BTreeMap<String, FinancialSummary>, LedgerError> {
        let counterparties = self.storage.get_owner_counterparties(owner_id).await?;
        let latest = try_join_all(
            counterparties
                .iter()
                .map(|c| self.storage.get_latest_counterparty_transaction(&c.id)),
        )
        .await?;

        let mut balances: BTreeMap<String, Vec<Money>> = BTreeMap::new();
        for (counterparty, transaction) in counterparties.iter().zip(latest) {
            if let Some(transaction) = transaction {
                balances
                    .entry(counterparty.currency.clone())
                    .or_default()
                    .push(transaction.running_balance);
            }
        }
        Ok(balances
            .into_iter()
            .map(|(currency, latest)| (currency, CounterpartyLedger::summarize(latest)))
            .collect())
    }

    async fn load_owned_transaction(
        &self,
        owner_id: &str,
        transaction_id: &str,
    ) -> Result<CounterpartyTransaction, LedgerError> {
        let transaction = self
            .storage
            .get_counterparty_transaction(transaction_id)
            .await?
            .ok_or_else(|| LedgerError::TransactionNotFound(transaction_id.to_string()))?;
        if transaction.owner_id != owner_id {
            return Err(LedgerError::NotLedgerOwner(owner_id.to_string()));
        }
        Ok(transaction)
    }

    /// Ordered history whose cached balances agree with a fresh walk.
    async fn load_verified_history(&self, counterparty_id: &str) -> Result<Vec<CounterpartyTransaction>, LedgerError> {
        let history = self.storage.get_counterparty_history(counterparty_id).await?;
        if let Some((drifted, expected)) = CounterpartyLedger::first_drift(&history) {
            error!(
                target: "settleup::consistency",
                counterparty_id,
                transaction_id = %drifted.id,
                stored = %drifted.running_balance,
                expected = %expected,
                "running balance drifted from history"
            );
            return Err(LedgerError::RunningBalanceDrift {
                transaction_id: drifted.id.clone(),
                stored: drifted.running_balance,
                expected,
            });
        }
        Ok(history)
    }
}
