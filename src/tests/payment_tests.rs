use super::{create_test_service, money, TestService};
use crate::core::errors::{ErrorKind, LedgerError};
use crate::core::models::balance::SettlementTransfer;
use crate::core::models::expense::{ExactLine, NewExpense, SplitInput};
use crate::core::models::group::Group;
use crate::core::money::Money;

async fn group_of(service: &TestService, members: &[&str]) -> Group {
    service
        .create_group(
            "Office".to_string(),
            None,
            None,
            members.iter().map(|m| m.to_string()).collect(),
            members[0],
        )
        .await
        .unwrap()
}

async fn exact_expense(service: &TestService, group: &Group, payer: &str, shares: &[(&str, &str)]) {
    let splits: Vec<ExactLine> = shares
        .iter()
        .map(|(user, amount)| ExactLine {
            user_id: user.to_string(),
            amount: money(amount),
        })
        .collect();
    let total: Money = splits.iter().map(|l| l.amount).sum();
    service
        .create_expense(
            NewExpense {
                group_id: group.id.clone(),
                title: "Lunch".to_string(),
                category: None,
                total_amount: total,
                payer_id: payer.to_string(),
                split: Some(SplitInput::Exact { splits: Some(splits) }),
                expense_date: None,
            },
            payer,
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_settlement_suggestion_clears_every_balance() {
    let service = create_test_service();
    let group = group_of(&service, &["c1", "c2", "d1", "d2"]).await;
    exact_expense(&service, &group, "c1", &[("d1", "40.00"), ("d2", "30.00")]).await;
    exact_expense(&service, &group, "c2", &[("d2", "30.00")]).await;

    let transfers = service.suggest_settlement(&group.id).await.unwrap();
    assert_eq!(
        transfers,
        vec![
            SettlementTransfer { from: "d1".into(), to: "c1".into(), amount: money("40.00") },
            SettlementTransfer { from: "d2".into(), to: "c1".into(), amount: money("30.00") },
            SettlementTransfer { from: "d2".into(), to: "c2".into(), amount: money("30.00") },
        ]
    );

    for transfer in &transfers {
        service
            .record_payment(&group.id, &transfer.from, &transfer.to, transfer.amount, None, &transfer.from)
            .await
            .unwrap();
    }
    let balances = service.get_group_balances(&group.id).await.unwrap();
    assert!(balances.iter().all(|b| b.balance.is_zero()));
    assert!(service.suggest_settlement(&group.id).await.unwrap().is_empty());
    service.validate_group_consistency(&group.id).await.unwrap();
}

#[tokio::test]
async fn test_payment_cannot_exceed_debt() {
    let service = create_test_service();
    let group = group_of(&service, &["a", "b"]).await;
    exact_expense(&service, &group, "a", &[("b", "25.00")]).await;

    let err = service
        .record_payment(&group.id, "b", "a", money("25.01"), None, "b")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::PaymentExceedsDebt { outstanding, .. } if outstanding == money("25.00")));
    assert_eq!(err.kind(), ErrorKind::Validation);

    // a is owed, so a paying b settles nothing
    let err = service
        .record_payment(&group.id, "a", "b", money("1.00"), None, "a")
        .await
        .unwrap_err();
    assert_eq!(err.reason(), "payment-exceeds-debt");

    let err = service
        .record_payment(&group.id, "b", "b", money("1.00"), None, "b")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::SelfPayment));

    let err = service
        .record_payment(&group.id, "b", "a", money("-1.00"), None, "b")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidInput(..)));

    let err = service
        .record_payment(&group.id, "b", "stranger", money("1.00"), None, "b")
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::MemberNotFound(..)));

    let payment = service
        .record_payment(&group.id, "b", "a", money("10.00"), Some("cash".to_string()), "b")
        .await
        .unwrap();
    assert!(payment.is_confirmed);
    assert_eq!(payment.confirmed_by.as_deref(), Some("b"));

    let balances = service.get_group_balances(&group.id).await.unwrap();
    assert_eq!(balances[0].balance, money("15.00"));
    assert_eq!(balances[1].balance, money("-15.00"));
}

#[tokio::test]
async fn test_strict_mode_payment_waits_for_payee() {
    let service = create_test_service();
    let group = group_of(&service, &["a", "b"]).await;
    service
        .toggle_strict_settlement_mode(&group.id, true, "a")
        .await
        .unwrap();
    exact_expense(&service, &group, "a", &[("b", "50.00")]).await;

    let payment = service
        .record_payment(&group.id, "b", "a", money("50.00"), None, "b")
        .await
        .unwrap();
    assert!(!payment.is_confirmed);
    assert_eq!(service.get_pending_payments(&group.id).await.unwrap().len(), 1);
    let balances = service.get_group_balances(&group.id).await.unwrap();
    assert_eq!(balances[1].balance, money("-50.00"));

    let err = service.confirm_payment(&payment.id, "b").await.unwrap_err();
    assert!(matches!(err, LedgerError::UnauthorizedPaymentConfirmation(_)));

    let confirmed = service.confirm_payment(&payment.id, "a").await.unwrap();
    assert!(confirmed.is_confirmed);
    assert_eq!(confirmed.confirmed_by.as_deref(), Some("a"));
    assert!(service.get_pending_payments(&group.id).await.unwrap().is_empty());
    assert!(service
        .get_group_balances(&group.id)
        .await
        .unwrap()
        .iter()
        .all(|b| b.balance.is_zero()));

    let err = service.confirm_payment(&payment.id, "a").await.unwrap_err();
    assert!(matches!(err, LedgerError::PaymentAlreadyConfirmed(_)));
}

#[tokio::test]
async fn test_confirmation_checks_current_balances() {
    let service = create_test_service();
    let group = group_of(&service, &["a", "b"]).await;
    service
        .toggle_strict_settlement_mode(&group.id, true, "a")
        .await
        .unwrap();
    exact_expense(&service, &group, "a", &[("b", "30.00")]).await;

    let first = service
        .record_payment(&group.id, "b", "a", money("20.00"), None, "b")
        .await
        .unwrap();
    let second = service
        .record_payment(&group.id, "b", "a", money("20.00"), None, "b")
        .await
        .unwrap();

    service.confirm_payment(&first.id, "a").await.unwrap();
    let err = service.confirm_payment(&second.id, "a").await.unwrap_err();
    assert!(matches!(err, LedgerError::PaymentExceedsDebt { outstanding, .. } if outstanding == money("10.00")));
    service.validate_group_consistency(&group.id).await.unwrap();

    // the stale duplicate can be withdrawn instead of lingering
    let err = service.void_payment(&second.id, "outsider").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Forbidden);
    let voided = service.void_payment(&second.id, "a").await.unwrap();
    assert!(voided.is_voided());
    assert!(service.get_pending_payments(&group.id).await.unwrap().is_empty());

    let err = service.confirm_payment(&second.id, "a").await.unwrap_err();
    assert_eq!(err.reason(), "payment-voided");
    let err = service.void_payment(&first.id, "b").await.unwrap_err();
    assert!(matches!(err, LedgerError::PaymentAlreadyConfirmed(_)));
    service.validate_group_consistency(&group.id).await.unwrap();
}

#[tokio::test]
async fn test_user_aggregate_spans_groups() {
    let service = create_test_service();
    let home = group_of(&service, &["a", "b"]).await;
    let trip = group_of(&service, &["b", "a", "c"]).await;
    exact_expense(&service, &home, "a", &[("b", "12.50")]).await;
    exact_expense(&service, &trip, "b", &[("a", "20.00"), ("c", "5.00")]).await;

    let aggregate = service.get_user_aggregate("a").await.unwrap();
    assert_eq!(aggregate.total_owed, money("12.50"));
    assert_eq!(aggregate.total_owing, money("20.00"));
    assert_eq!(aggregate.net, money("-7.50"));
    assert_eq!(aggregate.groups.len(), 2);

    let aggregate = service.get_user_aggregate("c").await.unwrap();
    assert_eq!(aggregate.net, money("-5.00"));
    assert_eq!(aggregate.groups.len(), 1);

    let aggregate = service.get_user_aggregate("nobody").await.unwrap();
    assert_eq!(aggregate.net, Money::ZERO);
    assert!(aggregate.groups.is_empty());
}
