use crate::error::ApprovalError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(pub u64);

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A strictly positive monetary amount.
///
/// Wraps `rust_decimal::Decimal` so payment amounts never go through floating point.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, ApprovalError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(ApprovalError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = ApprovalError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Approved,
    Rejected,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, PaymentStatus::Pending)
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentStatus::Pending => write!(f, "pending"),
            PaymentStatus::Approved => write!(f, "approved"),
            PaymentStatus::Rejected => write!(f, "rejected"),
        }
    }
}

/// A customer's payment for one order, awaiting verification of its proof.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: PaymentId,
    /// The order this payment settles, e.g. `ORD-2023-001`.
    pub order_id: String,
    #[serde(default)]
    pub customer: String,
    pub amount: Amount,
    pub status: PaymentStatus,
    /// URI of the uploaded transfer receipt or screenshot.
    pub proof_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(id: PaymentId, order_id: impl Into<String>, amount: Amount, proof_url: impl Into<String>) -> Self {
        Self {
            id,
            order_id: order_id.into(),
            customer: String::new(),
            amount,
            status: PaymentStatus::Pending,
            proof_url: proof_url.into(),
            notes: None,
            created_at: Utc::now(),
        }
    }

    /// Moves a pending payment to approved. Existing notes are kept unless `note` is given.
    pub fn approve(&mut self, note: Option<&str>) -> Result<(), ApprovalError> {
        if self.status != PaymentStatus::Pending {
            return Err(ApprovalError::invalid_transition(self.id, "approve", self.status));
        }
        self.status = PaymentStatus::Approved;
        if let Some(note) = note {
            self.notes = Some(note.to_string());
        }
        Ok(())
    }

    /// Moves a pending payment to rejected, keeping the reason as notes.
    pub fn reject(&mut self, reason: &str) -> Result<(), ApprovalError> {
        if self.status != PaymentStatus::Pending {
            return Err(ApprovalError::invalid_transition(self.id, "reject", self.status));
        }
        self.status = PaymentStatus::Rejected;
        self.notes = Some(reason.to_string());
        Ok(())
    }
}
