use crate::domain::invoice::InvoiceId;
use crate::domain::payment::{PaymentId, PaymentStatus};
use thiserror::Error;

/// Failure reported by a capability port (payment store, invoice service, mailer).
///
/// Adapters translate their transport-specific failures into one of these
/// variants; the orchestrator then attaches the step at which it happened.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("resource not found")]
    NotFound,
    #[error("request refused: {0}")]
    Conflict(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("malformed response: {0}")]
    Malformed(String),
}

#[derive(Error, Debug)]
pub enum ApprovalError {
    #[error("payment {payment_id} could not be confirmed: {reason}")]
    PaymentConfirmation { payment_id: PaymentId, reason: String },
    #[error("payment {payment_id} could not be rejected: {reason}")]
    PaymentRejection { payment_id: PaymentId, reason: String },
    #[error("invoice for payment {payment_id} could not be created: {reason}")]
    InvoiceCreation { payment_id: PaymentId, reason: String },
    #[error("invoice {invoice_id} for payment {payment_id} could not be sent: {reason}")]
    NotificationDispatch {
        payment_id: PaymentId,
        invoice_id: InvoiceId,
        reason: String,
    },
    #[error("cannot {operation} payment {payment_id} in state {state}")]
    InvalidStateTransition {
        payment_id: PaymentId,
        operation: &'static str,
        state: String,
    },
    #[error("payment {payment_id} not found")]
    NotFound { payment_id: PaymentId },
    #[error("workflow storage error: {0}")]
    Storage(String),
    #[error("validation error: {0}")]
    Validation(String),
    #[error("internal error: {0}")]
    Internal(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// How far an approval got before it stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// No remote state was changed by the failed call.
    Unchanged,
    /// The payment is approved but no invoice exists yet.
    PaymentApproved,
    /// The payment is approved and invoiced; only the email is missing.
    Invoiced,
}

/// The action an admin can take to resume a failed workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeAction {
    RetryApproval,
    RetryInvoice,
    ResendInvoice,
    RetryRejection,
}

impl ApprovalError {
    pub fn progress(&self) -> Progress {
        match self {
            ApprovalError::InvoiceCreation { .. } => Progress::PaymentApproved,
            ApprovalError::NotificationDispatch { .. } => Progress::Invoiced,
            _ => Progress::Unchanged,
        }
    }

    /// `None` when retrying would not help (bad state, missing payment, local failures).
    pub fn resume_action(&self) -> Option<ResumeAction> {
        match self {
            ApprovalError::PaymentConfirmation { .. } => Some(ResumeAction::RetryApproval),
            ApprovalError::InvoiceCreation { .. } => Some(ResumeAction::RetryInvoice),
            ApprovalError::NotificationDispatch { .. } => Some(ResumeAction::ResendInvoice),
            ApprovalError::PaymentRejection { .. } => Some(ResumeAction::RetryRejection),
            _ => None,
        }
    }

    pub(crate) fn invalid_transition(
        payment_id: PaymentId,
        operation: &'static str,
        status: PaymentStatus,
    ) -> Self {
        ApprovalError::InvalidStateTransition {
            payment_id,
            operation,
            state: status.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ApprovalError>;
