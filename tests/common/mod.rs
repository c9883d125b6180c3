#![allow(dead_code)]

use async_trait::async_trait;
use bookstore_approvals::application::orchestrator::ApprovalOrchestrator;
use bookstore_approvals::domain::invoice::{Invoice, InvoiceId, LineItem};
use bookstore_approvals::domain::payment::{Amount, Payment, PaymentId, PaymentStatus};
use bookstore_approvals::domain::ports::{
    InvoiceGenerator, NotificationDispatcher, PaymentStore, PortResult, WorkflowStore,
};
use bookstore_approvals::domain::workflow::ApprovalWorkflow;
use bookstore_approvals::error::AdapterError;
use bookstore_approvals::infrastructure::in_memory::{
    InMemoryInvoiceGenerator, InMemoryNotificationDispatcher, InMemoryPaymentStore,
    InMemoryWorkflowStore,
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What a faulty port does on its next call.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Performs the call unchanged.
    Pass,
    /// Fails immediately without touching the wrapped store.
    Fail(AdapterError),
    /// Sleeps, then fails; the wrapped store is never called.
    Hang(Duration),
    /// Sleeps, then performs the call.
    Delay(Duration),
    /// Performs the call, then sleeps before answering.
    LandThenHang(Duration),
}

/// Queue of faults consumed one per call, plus a call counter.
#[derive(Clone, Default)]
pub struct FaultPlan {
    queue: Arc<Mutex<VecDeque<Fault>>>,
    calls: Arc<AtomicUsize>,
}

impl FaultPlan {
    pub fn push(&self, fault: Fault) {
        self.queue.lock().unwrap().push_back(fault);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    async fn run<T>(&self, op: impl Future<Output = PortResult<T>>) -> PortResult<T> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.queue.lock().unwrap().pop_front();
        match next {
            None | Some(Fault::Pass) => op.await,
            Some(Fault::Fail(e)) => Err(e),
            Some(Fault::Hang(d)) => {
                tokio::time::sleep(d).await;
                Err(AdapterError::Unavailable("no response".to_string()))
            }
            Some(Fault::Delay(d)) => {
                tokio::time::sleep(d).await;
                op.await
            }
            Some(Fault::LandThenHang(d)) => {
                let result = op.await;
                tokio::time::sleep(d).await;
                result
            }
        }
    }
}

#[derive(Clone)]
pub struct FaultyPaymentStore {
    inner: InMemoryPaymentStore,
    confirm: FaultPlan,
    reject: FaultPlan,
}

#[async_trait]
impl PaymentStore for FaultyPaymentStore {
    async fn get(&self, id: PaymentId) -> PortResult<Option<Payment>> {
        PaymentStore::get(&self.inner, id).await
    }

    async fn confirm(&self, id: PaymentId, note: Option<&str>) -> PortResult<Payment> {
        self.confirm.run(self.inner.confirm(id, note)).await
    }

    async fn reject(&self, id: PaymentId, reason: &str) -> PortResult<Payment> {
        self.reject.run(self.inner.reject(id, reason)).await
    }
}

#[derive(Clone)]
pub struct FaultyInvoiceGenerator {
    inner: InMemoryInvoiceGenerator,
    plan: FaultPlan,
}

#[async_trait]
impl InvoiceGenerator for FaultyInvoiceGenerator {
    async fn create_for_payment(&self, payment_id: PaymentId) -> PortResult<Invoice> {
        self.plan.run(self.inner.create_for_payment(payment_id)).await
    }
}

#[derive(Clone)]
pub struct FaultyNotifier {
    inner: InMemoryNotificationDispatcher,
    plan: FaultPlan,
}

#[async_trait]
impl NotificationDispatcher for FaultyNotifier {
    async fn send_invoice(&self, invoice_id: &InvoiceId) -> PortResult<()> {
        self.plan.run(self.inner.send_invoice(invoice_id)).await
    }
}

/// Fails workflow saves on demand; reads always reach the wrapped store.
#[derive(Clone)]
pub struct FaultyWorkflowStore {
    inner: InMemoryWorkflowStore,
    plan: FaultPlan,
}

#[async_trait]
impl WorkflowStore for FaultyWorkflowStore {
    async fn get(&self, payment_id: PaymentId) -> PortResult<Option<ApprovalWorkflow>> {
        self.inner.get(payment_id).await
    }

    async fn store(&self, workflow: ApprovalWorkflow) -> PortResult<()> {
        self.plan.run(self.inner.store(workflow)).await
    }
}

/// An orchestrator wired to in-memory ports whose calls can be made to fail.
pub struct Harness {
    pub store: InMemoryPaymentStore,
    pub invoices: InMemoryInvoiceGenerator,
    pub notifier: InMemoryNotificationDispatcher,
    pub workflows: InMemoryWorkflowStore,
    pub confirm: FaultPlan,
    pub reject: FaultPlan,
    pub create_invoice: FaultPlan,
    pub send: FaultPlan,
    pub save_workflow: FaultPlan,
    pub orchestrator: ApprovalOrchestrator,
}

impl Harness {
    pub async fn new(payments: Vec<(Payment, Vec<LineItem>)>) -> Self {
        Self::with_timeout(payments, Duration::from_secs(5)).await
    }

    pub async fn with_timeout(payments: Vec<(Payment, Vec<LineItem>)>, step_timeout: Duration) -> Self {
        let store = InMemoryPaymentStore::new();
        for (payment, items) in payments {
            store.insert(payment, items).await;
        }
        let invoices = InMemoryInvoiceGenerator::new(store.clone());
        let notifier = InMemoryNotificationDispatcher::new();
        let workflows = InMemoryWorkflowStore::new();
        let confirm = FaultPlan::default();
        let reject = FaultPlan::default();
        let create_invoice = FaultPlan::default();
        let send = FaultPlan::default();
        let save_workflow = FaultPlan::default();

        let orchestrator = ApprovalOrchestrator::new(
            Box::new(FaultyPaymentStore {
                inner: store.clone(),
                confirm: confirm.clone(),
                reject: reject.clone(),
            }),
            Box::new(FaultyInvoiceGenerator {
                inner: invoices.clone(),
                plan: create_invoice.clone(),
            }),
            Box::new(FaultyNotifier {
                inner: notifier.clone(),
                plan: send.clone(),
            }),
            Box::new(FaultyWorkflowStore {
                inner: workflows.clone(),
                plan: save_workflow.clone(),
            }),
            step_timeout,
        );

        Self {
            store,
            invoices,
            notifier,
            workflows,
            confirm,
            reject,
            create_invoice,
            send,
            save_workflow,
            orchestrator,
        }
    }

    pub async fn payment(&self, id: u64) -> Payment {
        PaymentStore::get(&self.store, PaymentId(id))
            .await
            .unwrap()
            .expect("payment seeded")
    }

    pub async fn status(&self, id: u64) -> PaymentStatus {
        self.payment(id).await.status
    }
}

pub fn payment(id: u64, amount: Decimal, status: PaymentStatus) -> Payment {
    let mut payment = Payment::new(
        PaymentId(id),
        format!("ORD-2023-{:03}", id),
        Amount::new(amount).unwrap(),
        format!("https://proofs.example/{}.png", id),
    );
    payment.status = status;
    payment
}

pub fn book(book_id: u64, title: &str, quantity: u32, unit_price: Decimal) -> LineItem {
    LineItem {
        book_id,
        title: title.to_string(),
        quantity,
        unit_price,
    }
}

/// 19.99 + 2 x 12.99 = 45.97
pub fn adventure_and_bedtime_cart() -> Vec<LineItem> {
    vec![
        book(1, "The Great Adventure", 1, dec!(19.99)),
        book(4, "Bedtime Stories", 2, dec!(12.99)),
    ]
}

pub fn single_book_cart(price: Decimal) -> Vec<LineItem> {
    vec![book(5, "Fantasy World", 1, price)]
}
