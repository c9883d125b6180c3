use crate::domain::payment::PaymentId;
use crate::error::{ApprovalError, Result};
use serde::Deserialize;
use std::fmt;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum DecisionAction {
    Approve,
    Reject,
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionAction::Approve => write!(f, "approve"),
            DecisionAction::Reject => write!(f, "reject"),
        }
    }
}

/// One admin verdict on a payment.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Decision {
    pub action: DecisionAction,
    pub payment: PaymentId,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Reads admin decisions from a CSV source with an `action, payment, reason` header.
///
/// Whitespace around fields is trimmed and the `reason` column may be left
/// out entirely for approvals.
pub struct DecisionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> DecisionReader<R> {
    /// Creates a new `DecisionReader` from any `Read` source (e.g., File, Stdin).
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Returns an iterator that lazily reads and deserializes decisions.
    pub fn decisions(self) -> impl Iterator<Item = Result<Decision>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(ApprovalError::from))
    }
}
