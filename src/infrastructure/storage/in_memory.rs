use crate::core::errors::LedgerError;
use crate::core::khata::CounterpartyLedger;
use crate::core::ledger::BalanceSheet;
use crate::core::models::{
    audit::GroupAudit,
    counterparty::{Counterparty, CounterpartyTransaction},
    expense::Expense,
    group::Group,
    payment::Payment,
};
use crate::infrastructure::storage::{CounterpartyBatch, GroupBatch, Storage};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct InMemoryStorage {
    groups: Arc<RwLock<HashMap<String, Group>>>,
    balances: Arc<RwLock<HashMap<String, BalanceSheet>>>,
    expenses: Arc<RwLock<HashMap<String, Expense>>>,
    payments: Arc<RwLock<HashMap<String, Payment>>>,
    counterparties: Arc<RwLock<HashMap<String, Counterparty>>>,
    // counterparty_id -> (transaction_id -> transaction)
    histories: Arc<RwLock<HashMap<String, HashMap<String, CounterpartyTransaction>>>>,
    // transaction_id -> counterparty_id
    transaction_index: Arc<RwLock<HashMap<String, String>>>,
    sequence: Arc<AtomicU64>,
    group_audits: Arc<RwLock<HashMap<String, Vec<GroupAudit>>>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage {
            groups: Arc::new(RwLock::new(HashMap::new())),
            balances: Arc::new(RwLock::new(HashMap::new())),
            expenses: Arc::new(RwLock::new(HashMap::new())),
            payments: Arc::new(RwLock::new(HashMap::new())),
            counterparties: Arc::new(RwLock::new(HashMap::new())),
            histories: Arc::new(RwLock::new(HashMap::new())),
            transaction_index: Arc::new(RwLock::new(HashMap::new())),
            sequence: Arc::new(AtomicU64::new(0)),
            group_audits: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Overwrites a stored balance sheet without any checks. Lets tests
    /// simulate state corrupted by an earlier defect.
    pub async fn overwrite_balance_sheet(&self, sheet: BalanceSheet) {
        self.balances.write().await.insert(sheet.group_id.clone(), sheet);
    }

    /// Overwrites a stored transaction without recomputing its neighbours.
    pub async fn overwrite_counterparty_transaction(&self, transaction: CounterpartyTransaction) {
        let mut histories = self.histories.write().await;
        histories
            .entry(transaction.counterparty_id.clone())
            .or_default()
            .insert(transaction.id.clone(), transaction);
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn save_group(&self, group: Group) -> Result<(), LedgerError> {
        let mut groups = self.groups.write().await;
        groups.insert(group.id.clone(), group);
        Ok(())
    }

    async fn get_group(&self, group_id: &str) -> Result<Option<Group>, LedgerError> {
        let groups = self.groups.read().await;
        Ok(groups.get(group_id).cloned())
    }

    async fn get_user_groups(&self, user_id: &str) -> Result<Vec<Group>, LedgerError> {
        let groups = self.groups.read().await;
        let mut found: Vec<Group> = groups
            .values()
            .filter(|g| g.members.iter().any(|m| m.user_id == user_id))
            .cloned()
            .collect();
        found.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(found)
    }

    async fn get_expense(&self, expense_id: &str) -> Result<Option<Expense>, LedgerError> {
        let expenses = self.expenses.read().await;
        Ok(expenses.get(expense_id).cloned())
    }

    async fn get_group_expenses(&self, group_id: &str) -> Result<Vec<Expense>, LedgerError> {
        let expenses = self.expenses.read().await;
        let mut found: Vec<Expense> = expenses.values().filter(|e| e.group_id == group_id).cloned().collect();
        found.sort_by(|a, b| a.expense_date.cmp(&b.expense_date).then(a.created_at.cmp(&b.created_at)));
        Ok(found)
    }

    async fn get_balance_sheet(&self, group_id: &str) -> Result<BalanceSheet, LedgerError> {
        let balances = self.balances.read().await;
        Ok(balances
            .get(group_id)
            .cloned()
            .unwrap_or_else(|| BalanceSheet::new(group_id)))
    }

    async fn get_payment(&self, payment_id: &str) -> Result<Option<Payment>, LedgerError> {
        let payments = self.payments.read().await;
        Ok(payments.get(payment_id).cloned())
    }

    async fn get_group_payments(&self, group_id: &str) -> Result<Vec<Payment>, LedgerError> {
        let payments = self.payments.read().await;
        let mut found: Vec<Payment> = payments.values().filter(|p| p.group_id == group_id).cloned().collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(found)
    }

    async fn commit_group_batch(&self, batch: GroupBatch) -> Result<(), LedgerError> {
        // All guards are taken before the first write so readers never see
        // half a batch.
        let mut groups = self.groups.write().await;
        let mut balances = self.balances.write().await;
        let mut expenses = self.expenses.write().await;
        let mut payments = self.payments.write().await;

        if let Some(sheet) = &batch.sheet {
            if sheet.group_id != batch.group_id {
                return Err(LedgerError::StorageError(format!(
                    "balance sheet for {} committed in batch for {}",
                    sheet.group_id, batch.group_id
                )));
            }
        }

        if let Some(group) = batch.group {
            groups.insert(group.id.clone(), group);
        }
        if let Some(sheet) = batch.sheet {
            balances.insert(batch.group_id.clone(), sheet);
        }
        if let Some(expense) = batch.expense {
            expenses.insert(expense.id.clone(), expense);
        }
        if let Some(payment) = batch.payment {
            payments.insert(payment.id.clone(), payment);
        }
        Ok(())
    }

    async fn save_counterparty(&self, counterparty: Counterparty) -> Result<(), LedgerError> {
        let mut counterparties = self.counterparties.write().await;
        counterparties.insert(counterparty.id.clone(), counterparty);
        Ok(())
    }

    async fn get_counterparty(&self, counterparty_id: &str) -> Result<Option<Counterparty>, LedgerError> {
        let counterparties = self.counterparties.read().await;
        Ok(counterparties.get(counterparty_id).cloned())
    }

    async fn get_owner_counterparties(&self, owner_id: &str) -> Result<Vec<Counterparty>, LedgerError> {
        let counterparties = self.counterparties.read().await;
        let mut found: Vec<Counterparty> = counterparties
            .values()
            .filter(|c| c.owner_id == owner_id)
            .cloned()
            .collect();
        found.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(found)
    }

    async fn delete_counterparty(&self, counterparty_id: &str) -> Result<(), LedgerError> {
        let mut counterparties = self.counterparties.write().await;
        let mut histories = self.histories.write().await;
        let mut index = self.transaction_index.write().await;
        counterparties.remove(counterparty_id);
        if let Some(history) = histories.remove(counterparty_id) {
            for transaction_id in history.keys() {
                index.remove(transaction_id);
            }
        }
        Ok(())
    }

    async fn get_counterparty_transaction(
        &self,
        transaction_id: &str,
    ) -> Result<Option<CounterpartyTransaction>, LedgerError> {
        // histories before index, same order as the writers
        let histories = self.histories.read().await;
        let index = self.transaction_index.read().await;
        Ok(index
            .get(transaction_id)
            .and_then(|cp| histories.get(cp))
            .and_then(|history| history.get(transaction_id))
            .cloned())
    }

    async fn get_counterparty_history(&self, counterparty_id: &str) -> Result<Vec<CounterpartyTransaction>, LedgerError> {
        let histories = self.histories.read().await;
        let mut history: Vec<CounterpartyTransaction> = histories
            .get(counterparty_id)
            .map(|h| h.values().cloned().collect())
            .unwrap_or_default();
        CounterpartyLedger::sort(&mut history);
        Ok(history)
    }

    async fn get_latest_counterparty_transaction(
        &self,
        counterparty_id: &str,
    ) -> Result<Option<CounterpartyTransaction>, LedgerError> {
        let histories = self.histories.read().await;
        Ok(histories.get(counterparty_id).and_then(|h| {
            h.values()
                .max_by(|a, b| {
                    a.transaction_date
                        .cmp(&b.transaction_date)
                        .then(a.sequence.cmp(&b.sequence))
                })
                .cloned()
        }))
    }

    async fn next_transaction_sequence(&self) -> Result<u64, LedgerError> {
        Ok(self.sequence.fetch_add(1, Ordering::SeqCst) + 1)
    }

    async fn commit_counterparty_batch(&self, batch: CounterpartyBatch) -> Result<(), LedgerError> {
        let mut histories = self.histories.write().await;
        let mut index = self.transaction_index.write().await;

        if let Some(stray) = batch.upserts.iter().find(|t| t.counterparty_id != batch.counterparty_id) {
            return Err(LedgerError::StorageError(format!(
                "transaction {} belongs to counterparty {}, not {}",
                stray.id, stray.counterparty_id, batch.counterparty_id
            )));
        }

        let history = histories.entry(batch.counterparty_id.clone()).or_default();
        for transaction_id in &batch.removals {
            history.remove(transaction_id);
            index.remove(transaction_id);
        }
        for transaction in batch.upserts {
            index.insert(transaction.id.clone(), batch.counterparty_id.clone());
            history.insert(transaction.id.clone(), transaction);
        }
        Ok(())
    }

    async fn save_group_audit(&self, audit: GroupAudit) -> Result<(), LedgerError> {
        let mut group_audits = self.group_audits.write().await;
        group_audits
            .entry(audit.group_id.clone())
            .or_insert_with(Vec::new)
            .push(audit);
        Ok(())
    }

    async fn get_group_audits(&self, group_id: &str) -> Result<Vec<GroupAudit>, LedgerError> {
        let group_audits = self.group_audits.read().await;
        Ok(group_audits.get(group_id).cloned().unwrap_or_default())
    }
}
