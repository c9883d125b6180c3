use super::invoice::InvoiceId;
use super::payment::PaymentId;
use crate::error::ApprovalError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single remote operation the orchestrator performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    Confirm,
    Invoice,
    Notify,
    Reject,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::Confirm => write!(f, "confirm"),
            Step::Invoice => write!(f, "invoice"),
            Step::Notify => write!(f, "notify"),
            Step::Reject => write!(f, "reject"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum WorkflowState {
    NotStarted,
    PaymentConfirmed,
    InvoiceCreated,
    NotificationSent,
    Rejected,
    Failed { step: Step, reason: String },
}

impl fmt::Display for WorkflowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkflowState::NotStarted => write!(f, "not_started"),
            WorkflowState::PaymentConfirmed => write!(f, "payment_confirmed"),
            WorkflowState::InvoiceCreated => write!(f, "invoice_created"),
            WorkflowState::NotificationSent => write!(f, "notification_sent"),
            WorkflowState::Rejected => write!(f, "rejected"),
            WorkflowState::Failed { step, .. } => write!(f, "failed({})", step),
        }
    }
}

/// Progress of one payment through confirm, invoice and notify.
///
/// The workflow is the only record of which remote effects have already
/// landed, so every transition goes through the methods below and none of
/// them can jump over a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalWorkflow {
    pub payment_id: PaymentId,
    #[serde(flatten)]
    pub state: WorkflowState,
    /// Set once the invoice step succeeds; the notify step sends this invoice.
    #[serde(default)]
    pub invoice_id: Option<InvoiceId>,
    /// Number of orchestrator invocations that acted on this workflow.
    #[serde(default)]
    pub attempts: u32,
    pub updated_at: DateTime<Utc>,
}

impl ApprovalWorkflow {
    pub fn new(payment_id: PaymentId) -> Self {
        Self {
            payment_id,
            state: WorkflowState::NotStarted,
            invoice_id: None,
            attempts: 0,
            updated_at: Utc::now(),
        }
    }

    /// The step an approval should run next, or `None` once the workflow has ended.
    pub fn next_approval_step(&self) -> Option<Step> {
        match &self.state {
            WorkflowState::NotStarted => Some(Step::Confirm),
            WorkflowState::PaymentConfirmed => Some(Step::Invoice),
            WorkflowState::InvoiceCreated => Some(Step::Notify),
            WorkflowState::NotificationSent | WorkflowState::Rejected => None,
            // A failed rejection left the payment pending.
            WorkflowState::Failed { step: Step::Reject, .. } => Some(Step::Confirm),
            WorkflowState::Failed { step, .. } => Some(*step),
        }
    }

    /// True while the payment is known to be untouched by a confirmation.
    pub fn can_reject(&self) -> bool {
        matches!(
            self.state,
            WorkflowState::NotStarted
                | WorkflowState::Failed {
                    step: Step::Confirm | Step::Reject,
                    ..
                }
        )
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self.state,
            WorkflowState::NotificationSent | WorkflowState::Rejected
        )
    }

    pub fn failed_step(&self) -> Option<Step> {
        match &self.state {
            WorkflowState::Failed { step, .. } => Some(*step),
            _ => None,
        }
    }

    pub fn record_confirmed(&mut self) -> Result<(), ApprovalError> {
        self.expect_next(Step::Confirm)?;
        self.transition(WorkflowState::PaymentConfirmed);
        Ok(())
    }

    pub fn record_invoiced(&mut self, invoice_id: InvoiceId) -> Result<(), ApprovalError> {
        self.expect_next(Step::Invoice)?;
        self.invoice_id = Some(invoice_id);
        self.transition(WorkflowState::InvoiceCreated);
        Ok(())
    }

    pub fn record_notified(&mut self) -> Result<(), ApprovalError> {
        self.expect_next(Step::Notify)?;
        if self.invoice_id.is_none() {
            return Err(self.out_of_order(Step::Notify));
        }
        self.transition(WorkflowState::NotificationSent);
        Ok(())
    }

    pub fn record_rejected(&mut self) -> Result<(), ApprovalError> {
        if !self.can_reject() {
            return Err(self.out_of_order(Step::Reject));
        }
        self.transition(WorkflowState::Rejected);
        Ok(())
    }

    /// Marks `step` as failed. Completed steps and the recorded invoice are kept.
    pub fn record_failure(&mut self, step: Step, reason: impl Into<String>) {
        self.transition(WorkflowState::Failed {
            step,
            reason: reason.into(),
        });
    }

    fn expect_next(&self, step: Step) -> Result<(), ApprovalError> {
        if self.next_approval_step() == Some(step) {
            Ok(())
        } else {
            Err(self.out_of_order(step))
        }
    }

    fn out_of_order(&self, step: Step) -> ApprovalError {
        ApprovalError::Validation(format!(
            "workflow for payment {} cannot record {} while {}",
            self.payment_id, step, self.state
        ))
    }

    fn transition(&mut self, state: WorkflowState) {
        self.state = state;
        self.updated_at = Utc::now();
    }
}
