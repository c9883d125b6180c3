mod common;

use bookstore_approvals::domain::payment::{PaymentId, PaymentStatus};
use bookstore_approvals::domain::workflow::WorkflowState;
use bookstore_approvals::error::{AdapterError, ApprovalError};
use common::{Fault, Harness, payment, single_book_cart};
use rand::Rng;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal::Decimal;

const PAYMENTS: u64 = 8;

fn down() -> Fault {
    Fault::Fail(AdapterError::Unavailable("injected".to_string()))
}

/// Random admin clicks and random remote failures never break the payment invariants.
#[tokio::test]
async fn test_random_operations_preserve_invariants() {
    for seed in 0..20u64 {
        let mut rng = StdRng::seed_from_u64(seed);
        let seeded = (1..=PAYMENTS)
            .map(|id| {
                let price = Decimal::new(rng.gen_range(100..10_000), 2);
                (payment(id, price, PaymentStatus::Pending), single_book_cart(price))
            })
            .collect();
        let h = Harness::new(seeded).await;

        for _ in 0..60 {
            let id = PaymentId(rng.gen_range(1..=PAYMENTS));
            if rng.gen_bool(0.2) {
                h.confirm.push(down());
            }
            if rng.gen_bool(0.2) {
                h.create_invoice.push(down());
            }
            if rng.gen_bool(0.2) {
                h.send.push(down());
            }
            if rng.gen_bool(0.1) {
                h.reject.push(down());
            }

            let before = h.payment(id.0).await.status;
            let result = if rng.gen_bool(0.7) {
                h.orchestrator.approve(id).await
            } else {
                h.orchestrator.reject(id, "random").await
            };

            if let Err(ApprovalError::InvalidStateTransition { .. }) = &result {
                assert_eq!(h.payment(id.0).await.status, before, "seed {seed}");
            }
            if before.is_terminal() {
                assert_eq!(h.payment(id.0).await.status, before, "seed {seed}");
            }
        }

        for id in 1..=PAYMENTS {
            let status = h.status(id).await;
            let invoice = h.invoices.invoice_for(PaymentId(id)).await;
            let workflow = h.orchestrator.workflow(PaymentId(id)).await.unwrap();

            if status != PaymentStatus::Approved {
                assert!(invoice.is_none(), "seed {seed}: invoice for {status} payment {id}");
            }
            if let Some(wf) = workflow {
                if wf.state == WorkflowState::NotificationSent {
                    assert_eq!(status, PaymentStatus::Approved, "seed {seed}");
                    assert!(invoice.is_some(), "seed {seed}");
                    assert_eq!(wf.invoice_id, invoice.map(|i| i.id), "seed {seed}");
                }
                if wf.state == WorkflowState::Rejected {
                    assert_eq!(status, PaymentStatus::Rejected, "seed {seed}");
                }
            }
        }

        let sent = h.notifier.sent().await;
        let mut unique = sent.clone();
        unique.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        unique.dedup();
        assert_eq!(sent.len(), unique.len(), "seed {seed}: invoice emailed twice");
    }
}
