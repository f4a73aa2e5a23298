use super::{create_test_service, money};
use crate::core::models::counterparty::{NewCounterparty, NewCounterpartyTransaction, TransactionKind};
use crate::core::models::expense::NewExpense;
use crate::core::money::Money;
use chrono::{Duration, TimeZone, Utc};
use std::sync::Arc;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_expenses_keep_group_balanced() {
    let service = Arc::new(create_test_service());
    let members: Vec<String> = ["a", "b", "c"].iter().map(|m| m.to_string()).collect();
    let group = service
        .create_group("Shared".to_string(), None, None, members.clone(), "a")
        .await
        .unwrap();

    let handles: Vec<_> = (0..30)
        .map(|i| {
            let service = Arc::clone(&service);
            let group_id = group.id.clone();
            let payer = members[i % members.len()].clone();
            tokio::spawn(async move {
                service
                    .create_expense(
                        NewExpense {
                            group_id,
                            title: format!("Round {}", i),
                            category: None,
                            total_amount: Money::from_minor(1000 + i as i64),
                            payer_id: payer.clone(),
                            split: None,
                            expense_date: None,
                        },
                        &payer,
                    )
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(service.list_expenses(&group.id).await.unwrap().len(), 30);
    let total: Money = service
        .get_group_balances(&group.id)
        .await
        .unwrap()
        .iter()
        .map(|b| b.balance)
        .sum();
    assert_eq!(total, Money::ZERO);
    service.validate_group_consistency(&group.id).await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_khata_entries_stay_ordered() {
    let service = Arc::new(create_test_service());
    let cp = service
        .create_counterparty(NewCounterparty {
            owner_id: "owner".to_string(),
            name: "Ramesh".to_string(),
            phone: None,
            currency: None,
        })
        .await
        .unwrap();
    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();

    // dates arrive shuffled, so appends and backdated inserts interleave
    let handles: Vec<_> = (0..20i64)
        .map(|i| {
            let service = Arc::clone(&service);
            let counterparty_id = cp.id.clone();
            tokio::spawn(async move {
                service
                    .record_transaction(NewCounterpartyTransaction {
                        owner_id: "owner".to_string(),
                        counterparty_id,
                        kind: if i % 3 == 0 { TransactionKind::Get } else { TransactionKind::Give },
                        amount: money("10.00"),
                        currency: "INR".to_string(),
                        date: start + Duration::days((i * 7) % 20),
                        note: None,
                    })
                    .await
            })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    service.validate_counterparty_consistency("owner", &cp.id).await.unwrap();
    let history = service.get_counterparty_history("owner", &cp.id).await.unwrap();
    assert_eq!(history.len(), 20);
    // 7 gets (i = 0, 3, ..., 18) and 13 gives
    let balance = service.get_running_balance("owner", &cp.id).await.unwrap();
    assert_eq!(balance.balance, money("60.00"));
    assert_eq!(history.last().map(|t| t.running_balance), Some(balance.balance));
}
