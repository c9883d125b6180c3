use crate::domain::payment::{Payment, PaymentId, PaymentStatus};
use crate::domain::ports::{
    InvoiceGeneratorBox, NotificationDispatcherBox, PaymentStoreBox, PortResult,
    WorkflowStoreBox,
};
use crate::domain::workflow::{ApprovalWorkflow, Step};
use crate::error::{AdapterError, ApprovalError, Result};
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{error, info, instrument, warn};

pub const DEFAULT_STEP_TIMEOUT: Duration = Duration::from_secs(10);

const DEFAULT_REJECTION_NOTE: &str = "Payment rejected";

/// Reason recorded for a step whose remote call has been dispatched but not answered.
const IN_FLIGHT_REASON: &str = "in progress";

/// Drives a payment from pending through confirmation, invoicing and the
/// invoice email, or rejects it.
///
/// Every invocation is serialized per payment id, re-reads the payment from
/// the store before acting and persists the workflow before and after each
/// remote call. A failed
/// workflow is resumed by calling [`approve`](Self::approve) again, which only
/// runs the steps that have not completed yet.
///
/// `Clone` is cheap and shares the underlying ports and locks.
#[derive(Clone)]
pub struct ApprovalOrchestrator {
    inner: Arc<Inner>,
}

struct Inner {
    payments: PaymentStoreBox,
    invoices: InvoiceGeneratorBox,
    notifier: NotificationDispatcherBox,
    workflows: WorkflowStoreBox,
    locks: StdMutex<HashMap<PaymentId, Arc<Mutex<()>>>>,
    step_timeout: Duration,
}

impl ApprovalOrchestrator {
    /// Creates a new `ApprovalOrchestrator`.
    ///
    /// # Arguments
    ///
    /// * `payments` - System of record for payment status.
    /// * `invoices` - Issues invoices for approved payments.
    /// * `notifier` - Emails issued invoices to the customer.
    /// * `workflows` - Persists per-payment workflow progress.
    /// * `step_timeout` - Upper bound for each remote call.
    pub fn new(
        payments: PaymentStoreBox,
        invoices: InvoiceGeneratorBox,
        notifier: NotificationDispatcherBox,
        workflows: WorkflowStoreBox,
        step_timeout: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                payments,
                invoices,
                notifier,
                workflows,
                locks: StdMutex::new(HashMap::new()),
                step_timeout,
            }),
        }
    }

    /// Approves a payment, issues its invoice and sends it.
    ///
    /// Runs on a spawned task: if the caller stops waiting, a step that was
    /// already dispatched still completes and its outcome is persisted.
    pub async fn approve(&self, payment_id: PaymentId) -> Result<ApprovalWorkflow> {
        self.approve_with_note(payment_id, None).await
    }

    /// Like [`approve`](Self::approve), attaching `note` to the payment when it is confirmed.
    ///
    /// A blank note leaves the payment's existing notes untouched. The note is
    /// ignored when the payment was already confirmed by an earlier attempt.
    pub async fn approve_with_note(
        &self,
        payment_id: PaymentId,
        note: Option<&str>,
    ) -> Result<ApprovalWorkflow> {
        let inner = Arc::clone(&self.inner);
        let note = note
            .map(str::trim)
            .filter(|note| !note.is_empty())
            .map(str::to_string);
        tokio::spawn(async move { inner.approve(payment_id, note.as_deref()).await })
            .await
            .map_err(|e| ApprovalError::Internal(format!("approval task failed: {}", e)))?
    }

    /// Rejects a pending payment, attaching `reason` as its notes.
    pub async fn reject(&self, payment_id: PaymentId, reason: &str) -> Result<ApprovalWorkflow> {
        let inner = Arc::clone(&self.inner);
        let reason = reason.to_string();
        tokio::spawn(async move { inner.reject(payment_id, &reason).await })
            .await
            .map_err(|e| ApprovalError::Internal(format!("rejection task failed: {}", e)))?
    }

    /// The persisted workflow for a payment, if one was ever started.
    pub async fn workflow(&self, payment_id: PaymentId) -> Result<Option<ApprovalWorkflow>> {
        self.inner
            .workflows
            .get(payment_id)
            .await
            .map_err(|e| ApprovalError::Storage(e.to_string()))
    }
}

impl Inner {
    #[instrument(skip_all, fields(payment_id = %payment_id))]
    async fn approve(&self, payment_id: PaymentId, note: Option<&str>) -> Result<ApprovalWorkflow> {
        let _guard = self.lock(payment_id).await;
        let mut workflow = self.load_workflow(payment_id).await?;

        let Some(first_step) = workflow.next_approval_step() else {
            let payment = self.fetch(&workflow, Step::Confirm).await?;
            return Err(ApprovalError::invalid_transition(
                payment_id,
                "approve",
                payment.status,
            ));
        };
        let mut payment = self.fetch(&workflow, first_step).await?;
        let mut dispatched = false;

        while let Some(step) = workflow.next_approval_step() {
            match step {
                Step::Confirm => {
                    match payment.status {
                        PaymentStatus::Pending => {}
                        PaymentStatus::Approved if workflow.failed_step() == Some(Step::Confirm) => {
                            // A confirmation from an earlier attempt landed.
                            info!(step = %step, "adopting confirmation found in payment store");
                            workflow.record_confirmed()?;
                            self.save(&workflow).await?;
                            continue;
                        }
                        status => {
                            return Err(ApprovalError::invalid_transition(
                                payment_id, "approve", status,
                            ));
                        }
                    }

                    self.count_attempt(&mut workflow, &mut dispatched);
                    self.mark_in_flight(&mut workflow, step).await?;
                    match self.call(self.payments.confirm(payment_id, note)).await {
                        Ok(confirmed) => {
                            payment = confirmed;
                            workflow.record_confirmed()?;
                            self.save(&workflow).await?;
                            info!(step = %step, amount = %payment.amount, "payment confirmed");
                        }
                        Err(e) => {
                            return Err(self
                                .fail(&mut workflow, step, &e, |reason| {
                                    ApprovalError::PaymentConfirmation { payment_id, reason }
                                })
                                .await);
                        }
                    }
                }
                Step::Invoice => {
                    self.require_approved(&payment, "invoice")?;
                    self.count_attempt(&mut workflow, &mut dispatched);
                    self.mark_in_flight(&mut workflow, step).await?;
                    let created = self
                        .call(self.invoices.create_for_payment(payment_id))
                        .await
                        .and_then(|invoice| {
                            if invoice.payment_id == payment_id {
                                Ok(invoice)
                            } else {
                                Err(AdapterError::Malformed(format!(
                                    "invoice {} belongs to payment {}",
                                    invoice.id, invoice.payment_id
                                )))
                            }
                        });
                    match created {
                        Ok(invoice) => {
                            workflow.record_invoiced(invoice.id.clone())?;
                            self.save(&workflow).await?;
                            info!(step = %step, invoice_id = %invoice.id, total = %invoice.total, "invoice created");
                        }
                        Err(e) => {
                            return Err(self
                                .fail(&mut workflow, step, &e, |reason| {
                                    ApprovalError::InvoiceCreation { payment_id, reason }
                                })
                                .await);
                        }
                    }
                }
                Step::Notify => {
                    self.require_approved(&payment, "notify")?;
                    let invoice_id = workflow.invoice_id.clone().ok_or_else(|| {
                        ApprovalError::Validation(format!(
                            "workflow for payment {} has no invoice to send",
                            payment_id
                        ))
                    })?;
                    self.count_attempt(&mut workflow, &mut dispatched);
                    self.mark_in_flight(&mut workflow, step).await?;
                    match self.call(self.notifier.send_invoice(&invoice_id)).await {
                        Ok(()) => {
                            workflow.record_notified()?;
                            self.save(&workflow).await?;
                            info!(step = %step, invoice_id = %invoice_id, "invoice sent");
                        }
                        Err(e) => {
                            return Err(self
                                .fail(&mut workflow, step, &e, |reason| {
                                    ApprovalError::NotificationDispatch {
                                        payment_id,
                                        invoice_id: invoice_id.clone(),
                                        reason,
                                    }
                                })
                                .await);
                        }
                    }
                }
                Step::Reject => {
                    return Err(ApprovalError::Internal(
                        "rejection is not an approval step".to_string(),
                    ));
                }
            }
        }

        Ok(workflow)
    }

    #[instrument(skip_all, fields(payment_id = %payment_id))]
    async fn reject(&self, payment_id: PaymentId, reason: &str) -> Result<ApprovalWorkflow> {
        let _guard = self.lock(payment_id).await;
        let mut workflow = self.load_workflow(payment_id).await?;
        let payment = self.fetch(&workflow, Step::Reject).await?;

        match payment.status {
            PaymentStatus::Pending if workflow.can_reject() => {}
            PaymentStatus::Pending => {
                return Err(ApprovalError::InvalidStateTransition {
                    payment_id,
                    operation: "reject",
                    state: workflow.state.to_string(),
                });
            }
            PaymentStatus::Rejected if workflow.failed_step() == Some(Step::Reject) => {
                info!(step = %Step::Reject, "adopting rejection found in payment store");
                workflow.record_rejected()?;
                self.save(&workflow).await?;
                return Ok(workflow);
            }
            status => {
                return Err(ApprovalError::invalid_transition(payment_id, "reject", status));
            }
        }

        let note = if reason.trim().is_empty() {
            DEFAULT_REJECTION_NOTE
        } else {
            reason
        };

        workflow.attempts += 1;
        self.mark_in_flight(&mut workflow, Step::Reject).await?;
        match self.call(self.payments.reject(payment_id, note)).await {
            Ok(_) => {
                workflow.record_rejected()?;
                self.save(&workflow).await?;
                info!(step = %Step::Reject, reason = note, "payment rejected");
                Ok(workflow)
            }
            Err(e) => Err(self
                .fail(&mut workflow, Step::Reject, &e, |reason| {
                    ApprovalError::PaymentRejection { payment_id, reason }
                })
                .await),
        }
    }

    /// Runs one remote call under the step timeout. An elapsed timeout counts as a failure.
    async fn call<T>(&self, fut: impl Future<Output = PortResult<T>>) -> PortResult<T> {
        match tokio::time::timeout(self.step_timeout, fut).await {
            Ok(result) => result,
            Err(_) => Err(AdapterError::Unavailable(format!(
                "timed out after {}ms",
                self.step_timeout.as_millis()
            ))),
        }
    }

    /// Reads the payment fresh. A failed read is reported as a failure of `step`
    /// without touching the workflow.
    async fn fetch(&self, workflow: &ApprovalWorkflow, step: Step) -> Result<Payment> {
        let payment_id = workflow.payment_id;
        match self.call(self.payments.get(payment_id)).await {
            Ok(Some(payment)) => Ok(payment),
            Ok(None) | Err(AdapterError::NotFound) => Err(ApprovalError::NotFound { payment_id }),
            Err(e) => {
                warn!(step = %step, error = %e, "could not load payment");
                let reason = format!("could not load payment: {}", e);
                Err(match (step, workflow.invoice_id.clone()) {
                    (Step::Confirm, _) => ApprovalError::PaymentConfirmation { payment_id, reason },
                    (Step::Reject, _) => ApprovalError::PaymentRejection { payment_id, reason },
                    (Step::Invoice, _) => ApprovalError::InvoiceCreation { payment_id, reason },
                    (Step::Notify, Some(invoice_id)) => ApprovalError::NotificationDispatch {
                        payment_id,
                        invoice_id,
                        reason,
                    },
                    (Step::Notify, None) => ApprovalError::Validation(reason),
                })
            }
        }
    }

    fn require_approved(&self, payment: &Payment, operation: &'static str) -> Result<()> {
        if payment.status == PaymentStatus::Approved {
            Ok(())
        } else {
            Err(ApprovalError::invalid_transition(
                payment.id,
                operation,
                payment.status,
            ))
        }
    }

    /// Persists `step` as failed before its call goes out. A save that is lost
    /// after the call landed then resumes through the adoption path.
    async fn mark_in_flight(&self, workflow: &mut ApprovalWorkflow, step: Step) -> Result<()> {
        workflow.record_failure(step, IN_FLIGHT_REASON);
        self.save(workflow).await
    }

    fn count_attempt(&self, workflow: &mut ApprovalWorkflow, dispatched: &mut bool) {
        if !*dispatched {
            workflow.attempts += 1;
            *dispatched = true;
        }
    }

    async fn fail<F>(
        &self,
        workflow: &mut ApprovalWorkflow,
        step: Step,
        cause: &AdapterError,
        into_error: F,
    ) -> ApprovalError
    where
        F: FnOnce(String) -> ApprovalError,
    {
        let reason = cause.to_string();
        warn!(step = %step, reason = %reason, "workflow step failed");
        workflow.record_failure(step, reason.clone());
        if let Err(e) = self.save(workflow).await {
            return e;
        }
        into_error(reason)
    }

    async fn load_workflow(&self, payment_id: PaymentId) -> Result<ApprovalWorkflow> {
        self.workflows
            .get(payment_id)
            .await
            .map(|found| found.unwrap_or_else(|| ApprovalWorkflow::new(payment_id)))
            .map_err(|e| ApprovalError::Storage(e.to_string()))
    }

    async fn save(&self, workflow: &ApprovalWorkflow) -> Result<()> {
        self.workflows.store(workflow.clone()).await.map_err(|e| {
            error!(state = %workflow.state, error = %e, "failed to persist workflow");
            ApprovalError::Storage(e.to_string())
        })
    }

    async fn lock(&self, payment_id: PaymentId) -> PaymentGuard<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            Arc::clone(locks.entry(payment_id).or_default())
        };
        let guard = Arc::clone(&lock).lock_owned().await;
        PaymentGuard {
            locks: &self.locks,
            payment_id,
            lock,
            guard: Some(guard),
        }
    }
}

/// Holds the per-payment lock and drops the map entry once nobody else waits on it.
struct PaymentGuard<'a> {
    locks: &'a StdMutex<HashMap<PaymentId, Arc<Mutex<()>>>>,
    payment_id: PaymentId,
    lock: Arc<Mutex<()>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for PaymentGuard<'_> {
    fn drop(&mut self) {
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        // One reference in the map, one held here.
        if Arc::strong_count(&self.lock) == 2 {
            locks.remove(&self.payment_id);
        }
    }
}
