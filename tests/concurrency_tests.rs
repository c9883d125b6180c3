mod common;

use bookstore_approvals::domain::payment::{PaymentId, PaymentStatus};
use bookstore_approvals::domain::workflow::WorkflowState;
use bookstore_approvals::error::ApprovalError;
use common::{Fault, Harness, payment, single_book_cart};
use rust_decimal_macros::dec;
use std::time::Duration;

#[tokio::test]
async fn test_concurrent_approvals_of_one_payment_are_serialized() {
    let h = Harness::new(vec![(
        payment(1, dec!(24.99), PaymentStatus::Pending),
        single_book_cart(dec!(24.99)),
    )])
    .await;
    // Keep the first approval inside its critical section for a while.
    h.confirm.push(Fault::Delay(Duration::from_millis(100)));

    let first = h.orchestrator.clone();
    let second = h.orchestrator.clone();
    let (a, b) = tokio::join!(first.approve(PaymentId(1)), second.approve(PaymentId(1)));

    let results = [a, b];
    let successes = results.iter().filter(|r| r.is_ok()).count();
    let refused = results
        .iter()
        .filter(|r| matches!(r, Err(ApprovalError::InvalidStateTransition { .. })))
        .count();
    assert_eq!(successes, 1);
    assert_eq!(refused, 1);
    assert_eq!(h.confirm.calls(), 1);
    assert_eq!(h.invoices.count().await, 1);
    assert_eq!(h.notifier.sent().await.len(), 1);
}

#[tokio::test]
async fn test_concurrent_approve_and_reject_one_wins() {
    let h = Harness::new(vec![(
        payment(2, dec!(24.99), PaymentStatus::Pending),
        single_book_cart(dec!(24.99)),
    )])
    .await;
    h.confirm.push(Fault::Delay(Duration::from_millis(50)));
    h.reject.push(Fault::Delay(Duration::from_millis(50)));

    let approver = h.orchestrator.clone();
    let rejecter = h.orchestrator.clone();
    let (approved, rejected) = tokio::join!(
        approver.approve(PaymentId(2)),
        rejecter.reject(PaymentId(2), "duplicate order")
    );

    assert!(approved.is_ok() != rejected.is_ok(), "exactly one call succeeds");
    let status = h.status(2).await;
    if approved.is_ok() {
        assert_eq!(status, PaymentStatus::Approved);
        assert_eq!(h.invoices.count().await, 1);
    } else {
        assert_eq!(status, PaymentStatus::Rejected);
        assert_eq!(h.invoices.count().await, 0);
    }
}

#[tokio::test]
async fn test_different_payments_do_not_block_each_other() {
    let h = Harness::new(vec![
        (
            payment(3, dec!(24.99), PaymentStatus::Pending),
            single_book_cart(dec!(24.99)),
        ),
        (
            payment(4, dec!(18.99), PaymentStatus::Pending),
            single_book_cart(dec!(18.99)),
        ),
    ])
    .await;
    h.confirm.push(Fault::Delay(Duration::from_millis(200)));

    let slow = h.orchestrator.clone();
    let slow_handle = tokio::spawn(async move { slow.approve(PaymentId(3)).await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let fast = tokio::time::timeout(
        Duration::from_millis(150),
        h.orchestrator.reject(PaymentId(4), "proof unreadable"),
    )
    .await
    .expect("rejection of another payment must not wait for the slow approval");
    assert!(fast.is_ok());

    assert!(slow_handle.await.unwrap().is_ok());
}

#[tokio::test]
async fn test_abandoned_caller_does_not_cancel_dispatched_step() {
    let h = Harness::new(vec![(
        payment(5, dec!(24.99), PaymentStatus::Pending),
        single_book_cart(dec!(24.99)),
    )])
    .await;
    h.confirm.push(Fault::Delay(Duration::from_millis(100)));

    let abandoned =
        tokio::time::timeout(Duration::from_millis(10), h.orchestrator.approve(PaymentId(5))).await;
    assert!(abandoned.is_err(), "caller gave up waiting");

    tokio::time::sleep(Duration::from_millis(400)).await;

    assert_eq!(h.status(5).await, PaymentStatus::Approved);
    let workflow = h.orchestrator.workflow(PaymentId(5)).await.unwrap().unwrap();
    assert_eq!(workflow.state, WorkflowState::NotificationSent);
    assert_eq!(h.invoices.count().await, 1);
}
