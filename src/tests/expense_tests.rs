use super::{create_test_service, create_test_service_with_storage, money, TestService};
use crate::core::errors::{ErrorKind, LedgerError};
use crate::core::ledger::BalanceSheet;
use crate::core::models::expense::{
    EqualLine, ExactLine, ExpenseUpdate, NewExpense, PercentageLine, ShareLine, SplitInput, SplitStrategy,
};
use crate::core::models::group::Group;
use crate::core::money::Money;
use rust_decimal::Decimal;
use std::collections::BTreeMap;

async fn group_of(service: &TestService, members: &[&str]) -> Group {
    service
        .create_group(
            "Flat".to_string(),
            None,
            None,
            members.iter().map(|m| m.to_string()).collect(),
            members[0],
        )
        .await
        .unwrap()
}

fn expense(group: &Group, payer: &str, total: &str, split: Option<SplitInput>) -> NewExpense {
    NewExpense {
        group_id: group.id.clone(),
        title: "Groceries".to_string(),
        category: Some("food".to_string()),
        total_amount: money(total),
        payer_id: payer.to_string(),
        split,
        expense_date: None,
    }
}

async fn balances(service: &TestService, group: &Group) -> BTreeMap<String, Money> {
    service
        .get_group_balances(&group.id)
        .await
        .unwrap()
        .into_iter()
        .map(|b| (b.user_id, b.balance))
        .collect()
}

async fn assert_zero_sum(service: &TestService, group: &Group) {
    let total: Money = balances(service, group).await.values().sum();
    assert_eq!(total, Money::ZERO);
    service.validate_group_consistency(&group.id).await.unwrap();
}

#[tokio::test]
async fn test_equal_split_assigns_remainder_by_user_id() {
    let service = create_test_service();
    let group = group_of(&service, &["a", "b", "c"]).await;

    let receipt = service
        .create_expense(expense(&group, "a", "100.00", Some(SplitInput::Equal { splits: None })), "a")
        .await
        .unwrap();
    let shares: Vec<(String, Money)> = receipt.splits.iter().map(|s| (s.user_id.clone(), s.amount)).collect();
    assert_eq!(
        shares,
        vec![
            ("a".to_string(), money("33.34")),
            ("b".to_string(), money("33.33")),
            ("c".to_string(), money("33.33")),
        ]
    );

    let balances = balances(&service, &group).await;
    assert_eq!(balances["a"], money("66.66"));
    assert_eq!(balances["b"], money("-33.33"));
    assert_eq!(balances["c"], money("-33.33"));
    assert_zero_sum(&service, &group).await;
}

#[tokio::test]
async fn test_exact_split_must_sum_to_total() {
    let service = create_test_service();
    let group = group_of(&service, &["x", "y"]).await;

    let lines = |y: &str| SplitInput::Exact {
        splits: Some(vec![
            ExactLine { user_id: "x".to_string(), amount: money("30.00") },
            ExactLine { user_id: "y".to_string(), amount: money(y) },
        ]),
    };

    let err = service
        .create_expense(expense(&group, "x", "50.00", Some(lines("19.99"))), "x")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert_eq!(err.reason(), "exact-sum-mismatch");
    assert!(balances(&service, &group).await.values().all(|b| b.is_zero()));
    assert!(service.list_expenses(&group.id).await.unwrap().is_empty());

    service
        .create_expense(expense(&group, "x", "50.00", Some(lines("20.00"))), "x")
        .await
        .unwrap();
    let balances = balances(&service, &group).await;
    assert_eq!(balances["x"], money("20.00"));
    assert_eq!(balances["y"], money("-20.00"));
}

#[tokio::test]
async fn test_percentage_and_shares_splits() {
    let service = create_test_service();
    let group = group_of(&service, &["a", "b"]).await;

    let receipt = service
        .create_expense(
            expense(
                &group,
                "a",
                "10.00",
                Some(SplitInput::Shares {
                    splits: Some(vec![
                        ShareLine { user_id: "a".to_string(), shares: 1, amount: None },
                        ShareLine { user_id: "b".to_string(), shares: 2, amount: None },
                    ]),
                }),
            ),
            "a",
        )
        .await
        .unwrap();
    assert_eq!(receipt.splits[0].amount, money("3.34"));
    assert_eq!(receipt.splits[1].amount, money("6.66"));
    assert_eq!(receipt.splits[1].shares, Some(2));

    let err = service
        .create_expense(
            expense(
                &group,
                "b",
                "80.00",
                Some(SplitInput::Percentage {
                    splits: Some(vec![
                        PercentageLine { user_id: "a".to_string(), percentage: Decimal::from(60), amount: None },
                        PercentageLine { user_id: "b".to_string(), percentage: Decimal::from(30), amount: None },
                    ]),
                }),
            ),
            "b",
        )
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "percentage-sum-invalid");

    let receipt = service
        .create_expense(
            expense(
                &group,
                "b",
                "80.00",
                Some(SplitInput::Percentage {
                    splits: Some(vec![
                        PercentageLine { user_id: "a".to_string(), percentage: Decimal::from(75), amount: None },
                        PercentageLine { user_id: "b".to_string(), percentage: Decimal::from(25), amount: None },
                    ]),
                }),
            ),
            "b",
        )
        .await
        .unwrap();
    assert_eq!(receipt.splits[0].amount, money("60.00"));
    assert_eq!(receipt.splits[1].amount, money("20.00"));
    assert_zero_sum(&service, &group).await;
}

#[tokio::test]
async fn test_split_rejects_non_members() {
    let service = create_test_service();
    let group = group_of(&service, &["a", "b"]).await;

    let err = service
        .create_expense(
            expense(
                &group,
                "a",
                "20.00",
                Some(SplitInput::Equal {
                    splits: Some(vec![
                        EqualLine { user_id: "a".to_string(), amount: None },
                        EqualLine { user_id: "z".to_string(), amount: None },
                    ]),
                }),
            ),
            "a",
        )
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "non-member-participant");

    let err = service
        .create_expense(expense(&group, "z", "20.00", None), "a")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(ref field, _) if field == "payer_id"));

    let err = service
        .create_expense(expense(&group, "a", "20.00", None), "z")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::NotGroupMember(_)));

    let err = service
        .create_expense(expense(&group, "a", "0.00", None), "a")
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "non-positive-total");
}

#[tokio::test]
async fn test_group_default_split_applies_when_split_missing() {
    let service = create_test_service();
    let group = service
        .create_group(
            "Flat".to_string(),
            None,
            Some(SplitStrategy::Shares),
            vec!["b".to_string()],
            "a",
        )
        .await
        .unwrap();

    let receipt = service
        .create_expense(expense(&group, "a", "9.99", None), "a")
        .await
        .unwrap();
    let stored = service.get_expense(&receipt.expense_id).await.unwrap();
    assert_eq!(stored.strategy, SplitStrategy::Shares);
    assert_eq!(stored.share_of("a"), money("5.00"));
    assert_eq!(stored.share_of("b"), money("4.99"));
}

#[tokio::test]
async fn test_delete_expense_restores_balances() {
    let service = create_test_service();
    let group = group_of(&service, &["a", "b", "c"]).await;

    service
        .create_expense(expense(&group, "b", "45.00", None), "b")
        .await
        .unwrap();
    let before = balances(&service, &group).await;

    let receipt = service
        .create_expense(expense(&group, "a", "100.00", None), "a")
        .await
        .unwrap();
    assert_ne!(balances(&service, &group).await, before);

    service.delete_expense(&receipt.expense_id, "a").await.unwrap();
    assert_eq!(balances(&service, &group).await, before);
    assert_zero_sum(&service, &group).await;

    let err = service.delete_expense(&receipt.expense_id, "a").await.unwrap_err();
    assert!(matches!(err, LedgerError::ExpenseAlreadyDeleted(_)));
    assert!(service.get_expense(&receipt.expense_id).await.unwrap().is_deleted());
    assert_eq!(service.list_expenses(&group.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_update_expense_amount_requires_splits() {
    let service = create_test_service();
    let group = group_of(&service, &["a", "b"]).await;
    let receipt = service
        .create_expense(expense(&group, "a", "10.00", None), "a")
        .await
        .unwrap();

    let err = service
        .update_expense(
            &receipt.expense_id,
            ExpenseUpdate {
                total_amount: Some(money("30.00")),
                ..Default::default()
            },
            "a",
        )
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "splits-required");

    let updated = service
        .update_expense(
            &receipt.expense_id,
            ExpenseUpdate {
                total_amount: Some(money("30.00")),
                split: Some(SplitInput::Exact {
                    splits: Some(vec![
                        ExactLine { user_id: "a".to_string(), amount: money("10.00") },
                        ExactLine { user_id: "b".to_string(), amount: money("20.00") },
                    ]),
                }),
                ..Default::default()
            },
            "a",
        )
        .await
        .unwrap();
    assert_eq!(updated.total_amount, money("30.00"));
    assert_eq!(updated.strategy, SplitStrategy::Exact);

    let balances = balances(&service, &group).await;
    assert_eq!(balances["a"], money("20.00"));
    assert_eq!(balances["b"], money("-20.00"));
    assert_zero_sum(&service, &group).await;
}

#[tokio::test]
async fn test_update_expense_metadata_keeps_balances() {
    let service = create_test_service();
    let group = group_of(&service, &["a", "b"]).await;
    let receipt = service
        .create_expense(expense(&group, "a", "10.00", None), "a")
        .await
        .unwrap();
    let before = balances(&service, &group).await;

    let updated = service
        .update_expense(
            &receipt.expense_id,
            ExpenseUpdate {
                title: Some("Vegetables".to_string()),
                total_amount: Some(money("10.00")),
                ..Default::default()
            },
            "a",
        )
        .await
        .unwrap();
    assert_eq!(updated.title, "Vegetables");
    assert_eq!(balances(&service, &group).await, before);
}

#[tokio::test]
async fn test_only_creator_or_admin_edits_expense() {
    let service = create_test_service();
    let group = group_of(&service, &["a", "b", "c"]).await;
    let receipt = service
        .create_expense(expense(&group, "b", "12.00", None), "b")
        .await
        .unwrap();

    let err = service.delete_expense(&receipt.expense_id, "c").await.unwrap_err();
    assert!(matches!(err, LedgerError::NotExpenseEditor(_)));
    assert_eq!(err.kind(), ErrorKind::Forbidden);

    // "a" created the group and is its admin
    service.delete_expense(&receipt.expense_id, "a").await.unwrap();
}

#[tokio::test]
async fn test_zero_sum_holds_across_mixed_operations() {
    let service = create_test_service();
    let group = group_of(&service, &["a", "b", "c", "d"]).await;

    let mut ids = Vec::new();
    for (payer, total) in [("a", "10.01"), ("b", "99.99"), ("c", "0.03"), ("d", "1234.57"), ("a", "7.77")] {
        let receipt = service
            .create_expense(expense(&group, payer, total, None), payer)
            .await
            .unwrap();
        ids.push(receipt.expense_id);
        assert_zero_sum(&service, &group).await;
    }
    service.delete_expense(&ids[1], "a").await.unwrap();
    assert_zero_sum(&service, &group).await;
    service
        .update_expense(
            &ids[3],
            ExpenseUpdate {
                total_amount: Some(money("1000.00")),
                split: Some(SplitInput::Equal { splits: None }),
                ..Default::default()
            },
            "d",
        )
        .await
        .unwrap();
    assert_zero_sum(&service, &group).await;
}

#[tokio::test]
async fn test_corrupted_balances_block_mutations() {
    let (service, storage) = create_test_service_with_storage();
    let group = group_of(&service, &["a", "b"]).await;

    storage
        .overwrite_balance_sheet(BalanceSheet::from_rows(
            group.id.clone(),
            [("a".to_string(), money("0.01"))],
        ))
        .await;

    let err = service
        .create_expense(expense(&group, "a", "10.00", None), "a")
        .await
        .unwrap_err();
    assert!(err.is_consistency());
    assert_eq!(err.reason(), "zero-sum-violation");

    let err = service.suggest_settlement(&group.id).await.unwrap_err();
    assert!(err.is_consistency());
}

#[tokio::test]
async fn test_consistency_check_detects_drift_from_history() {
    let (service, storage) = create_test_service_with_storage();
    let group = group_of(&service, &["a", "b"]).await;
    service
        .create_expense(expense(&group, "a", "10.00", None), "a")
        .await
        .unwrap();

    // still sums to zero, but no longer matches the recorded expense
    storage
        .overwrite_balance_sheet(BalanceSheet::from_rows(
            group.id.clone(),
            [("a".to_string(), money("6.00")), ("b".to_string(), money("-6.00"))],
        ))
        .await;

    let err = service.validate_group_consistency(&group.id).await.unwrap_err();
    assert!(matches!(err, LedgerError::BalanceDrift { ref user_id, .. } if user_id == "a"));
}
