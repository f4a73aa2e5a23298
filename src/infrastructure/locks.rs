//! Per-key mutual exclusion for read-modify-write cycles.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Async lock registry. Holders of the same key run one at a time; distinct
/// keys never contend beyond the short registry lookup.
#[derive(Clone, Default)]
pub struct KeyedLocks {
    slots: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            // Drop slots nobody holds or waits on.
            slots.retain(|k, slot| k == key || Arc::strong_count(slot) > 1);
            slots.entry(key.to_string()).or_default().clone()
        };
        slot.lock_owned().await
    }
}

pub fn group_key(group_id: &str) -> String {
    format!("group:{}", group_id)
}

pub fn counterparty_key(owner_id: &str, counterparty_id: &str) -> String {
    format!("khata:{}:{}", owner_id, counterparty_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_key_is_exclusive() {
        let locks = KeyedLocks::new();
        let guard = locks.acquire("group:1").await;

        let contender = locks.clone();
        let waiting = tokio::spawn(async move {
            let _g = contender.acquire("group:1").await;
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiting.is_finished());

        drop(guard);
        waiting.await.unwrap();
    }

    #[tokio::test]
    async fn distinct_keys_do_not_block() {
        let locks = KeyedLocks::new();
        let _a = locks.acquire(&group_key("a")).await;
        let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire(&group_key("b"))).await;
        assert!(b.is_ok());
    }
}
