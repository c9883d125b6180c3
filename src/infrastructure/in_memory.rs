use crate::domain::invoice::{Invoice, InvoiceId, LineItem};
use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{
    CartStore, InvoiceGenerator, NotificationDispatcher, PaymentStore, PortResult, WorkflowStore,
};
use crate::domain::workflow::ApprovalWorkflow;
use crate::error::AdapterError;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

/// A thread-safe in-memory payment store that also serves each payment's cart.
///
/// `Clone` shares the underlying maps, so an [`InMemoryInvoiceGenerator`] built
/// from a clone sees the same payments the orchestrator mutates.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
    carts: Arc<RwLock<HashMap<PaymentId, Vec<LineItem>>>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a payment together with the line items of its order.
    pub async fn insert(&self, payment: Payment, items: Vec<LineItem>) {
        let id = payment.id;
        self.payments.write().await.insert(id, payment);
        self.carts.write().await.insert(id, items);
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn get(&self, id: PaymentId) -> PortResult<Option<Payment>> {
        let payments = self.payments.read().await;
        Ok(payments.get(&id).cloned())
    }

    async fn confirm(&self, id: PaymentId, note: Option<&str>) -> PortResult<Payment> {
        let mut payments = self.payments.write().await;
        let payment = payments.get_mut(&id).ok_or(AdapterError::NotFound)?;
        payment
            .approve(note)
            .map_err(|e| AdapterError::Conflict(e.to_string()))?;
        Ok(payment.clone())
    }

    async fn reject(&self, id: PaymentId, reason: &str) -> PortResult<Payment> {
        let mut payments = self.payments.write().await;
        let payment = payments.get_mut(&id).ok_or(AdapterError::NotFound)?;
        payment
            .reject(reason)
            .map_err(|e| AdapterError::Conflict(e.to_string()))?;
        Ok(payment.clone())
    }
}

#[async_trait]
impl CartStore for InMemoryPaymentStore {
    async fn items_for_payment(&self, id: PaymentId) -> PortResult<Vec<LineItem>> {
        let carts = self.carts.read().await;
        carts.get(&id).cloned().ok_or(AdapterError::NotFound)
    }
}

/// Issues invoices from the carts of an [`InMemoryPaymentStore`].
///
/// Refuses payments that are not approved and returns the existing invoice
/// when asked twice for the same payment.
#[derive(Clone)]
pub struct InMemoryInvoiceGenerator {
    payments: InMemoryPaymentStore,
    invoices: Arc<RwLock<HashMap<PaymentId, Invoice>>>,
    next_id: Arc<AtomicU64>,
}

impl InMemoryInvoiceGenerator {
    pub fn new(payments: InMemoryPaymentStore) -> Self {
        Self {
            payments,
            invoices: Arc::new(RwLock::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub async fn invoice_for(&self, payment_id: PaymentId) -> Option<Invoice> {
        self.invoices.read().await.get(&payment_id).cloned()
    }

    pub async fn count(&self) -> usize {
        self.invoices.read().await.len()
    }
}

#[async_trait]
impl InvoiceGenerator for InMemoryInvoiceGenerator {
    async fn create_for_payment(&self, payment_id: PaymentId) -> PortResult<Invoice> {
        let mut invoices = self.invoices.write().await;
        if let Some(existing) = invoices.get(&payment_id) {
            return Ok(existing.clone());
        }

        let payment = PaymentStore::get(&self.payments, payment_id)
            .await?
            .ok_or(AdapterError::NotFound)?;
        if payment.status != PaymentStatus::Approved {
            return Err(AdapterError::Conflict(format!(
                "payment {} is {}",
                payment_id, payment.status
            )));
        }

        let items = self.payments.items_for_payment(payment_id).await?;
        let seq = self.next_id.fetch_add(1, Ordering::SeqCst);
        let invoice = Invoice::new(InvoiceId(format!("INV-{:06}", seq)), payment_id, items);
        invoices.insert(payment_id, invoice.clone());
        Ok(invoice)
    }
}

/// Records every invoice it is asked to send instead of emailing it.
#[derive(Default, Clone)]
pub struct InMemoryNotificationDispatcher {
    sent: Arc<RwLock<Vec<InvoiceId>>>,
}

impl InMemoryNotificationDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<InvoiceId> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl NotificationDispatcher for InMemoryNotificationDispatcher {
    async fn send_invoice(&self, invoice_id: &InvoiceId) -> PortResult<()> {
        self.sent.write().await.push(invoice_id.clone());
        Ok(())
    }
}

/// A thread-safe in-memory store for approval workflows.
#[derive(Default, Clone)]
pub struct InMemoryWorkflowStore {
    workflows: Arc<RwLock<HashMap<PaymentId, ApprovalWorkflow>>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn get(&self, payment_id: PaymentId) -> PortResult<Option<ApprovalWorkflow>> {
        let workflows = self.workflows.read().await;
        Ok(workflows.get(&payment_id).cloned())
    }

    async fn store(&self, workflow: ApprovalWorkflow) -> PortResult<()> {
        let mut workflows = self.workflows.write().await;
        workflows.insert(workflow.payment_id, workflow);
        Ok(())
    }
}
