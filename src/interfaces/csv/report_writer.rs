use crate::domain::payment::PaymentId;
use crate::domain::workflow::ApprovalWorkflow;
use crate::error::{ApprovalError, ResumeAction, Result};
use serde::Serialize;
use std::io::Write;

/// One line of the outcome report.
#[derive(Debug, Serialize, PartialEq)]
pub struct ReportRow {
    pub payment: PaymentId,
    pub action: String,
    pub state: String,
    pub invoice: String,
    /// What the admin can do next, empty when nothing is pending.
    pub resume: String,
    pub error: String,
}

impl ReportRow {
    pub fn from_workflow(action: &str, workflow: &ApprovalWorkflow) -> Self {
        Self {
            payment: workflow.payment_id,
            action: action.to_string(),
            state: workflow.state.to_string(),
            invoice: invoice_of(Some(workflow)),
            resume: String::new(),
            error: String::new(),
        }
    }

    /// Builds a row for a failed call. `workflow` is the state persisted after the failure.
    pub fn from_error(
        payment: PaymentId,
        action: &str,
        workflow: Option<&ApprovalWorkflow>,
        err: &ApprovalError,
    ) -> Self {
        Self {
            payment,
            action: action.to_string(),
            state: workflow
                .map(|wf| wf.state.to_string())
                .unwrap_or_else(|| "not_started".to_string()),
            invoice: invoice_of(workflow),
            resume: err.resume_action().map(resume_label).unwrap_or_default().to_string(),
            error: err.to_string(),
        }
    }
}

fn invoice_of(workflow: Option<&ApprovalWorkflow>) -> String {
    workflow
        .and_then(|wf| wf.invoice_id.as_ref())
        .map(|id| id.to_string())
        .unwrap_or_default()
}

fn resume_label(action: ResumeAction) -> &'static str {
    match action {
        ResumeAction::RetryApproval => "retry_approval",
        ResumeAction::RetryInvoice => "retry_invoice",
        ResumeAction::ResendInvoice => "resend_invoice",
        ResumeAction::RetryRejection => "retry_rejection",
    }
}

/// Writes outcome rows as CSV (`payment,action,state,invoice,resume,error`).
pub struct ReportWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write_row(&mut self, row: &ReportRow) -> Result<()> {
        self.writer.serialize(row)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
