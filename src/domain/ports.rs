use super::invoice::{Invoice, InvoiceId, LineItem};
use super::payment::{Payment, PaymentId};
use super::workflow::ApprovalWorkflow;
use crate::error::AdapterError;
use async_trait::async_trait;

pub type PortResult<T> = std::result::Result<T, AdapterError>;

/// System of record for payments.
#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn get(&self, id: PaymentId) -> PortResult<Option<Payment>>;
    /// Transitions a pending payment to approved, replacing its notes with `note` when given.
    async fn confirm(&self, id: PaymentId, note: Option<&str>) -> PortResult<Payment>;
    /// Transitions a pending payment to rejected, attaching `reason` as notes.
    async fn reject(&self, id: PaymentId, reason: &str) -> PortResult<Payment>;
}

/// Line items of the order a payment settles.
#[async_trait]
pub trait CartStore: Send + Sync {
    async fn items_for_payment(&self, id: PaymentId) -> PortResult<Vec<LineItem>>;
}

#[async_trait]
pub trait InvoiceGenerator: Send + Sync {
    /// Idempotent by payment id: a second call returns the invoice issued by the first.
    async fn create_for_payment(&self, payment_id: PaymentId) -> PortResult<Invoice>;
}

#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send_invoice(&self, invoice_id: &InvoiceId) -> PortResult<()>;
}

#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn get(&self, payment_id: PaymentId) -> PortResult<Option<ApprovalWorkflow>>;
    async fn store(&self, workflow: ApprovalWorkflow) -> PortResult<()>;
}

pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type CartStoreBox = Box<dyn CartStore>;
pub type InvoiceGeneratorBox = Box<dyn InvoiceGenerator>;
pub type NotificationDispatcherBox = Box<dyn NotificationDispatcher>;
pub type WorkflowStoreBox = Box<dyn WorkflowStore>;
