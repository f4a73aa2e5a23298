mod concurrency_tests;
mod expense_tests;
mod payment_tests;

use crate::config::{Limits, CONFIG};
use crate::core::money::Money;
use crate::core::services::LedgerService;
use crate::infrastructure::logging::in_memory::InMemoryLogging;
use crate::infrastructure::logging::init_tracing;
use crate::infrastructure::storage::in_memory::InMemoryStorage;

pub type TestService = LedgerService<InMemoryLogging, InMemoryStorage>;

pub fn test_limits() -> Limits {
    Limits {
        max_amount: Money::from_major(1_000_000),
        default_currency: "INR".to_string(),
        strict_settlement_default: false,
        max_text_length: 100,
    }
}

pub fn create_test_service() -> TestService {
    create_test_service_with_storage().0
}

/// Also hands back a handle on the shared storage so tests can tamper with it.
pub fn create_test_service_with_storage() -> (TestService, InMemoryStorage) {
    init_tracing(&CONFIG.log_level);
    let storage = InMemoryStorage::new();
    let logging = InMemoryLogging::new();
    (LedgerService::with_limits(storage.clone(), logging, test_limits()), storage)
}

pub fn money(value: &str) -> Money {
    value.parse().unwrap()
}
