use super::payment::PaymentId;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InvoiceId(pub String);

impl InvoiceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvoiceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One book on an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub book_id: u64,
    pub title: String,
    pub quantity: u32,
    pub unit_price: Decimal,
}

impl LineItem {
    pub fn subtotal(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// An invoice bound to exactly one approved payment. Immutable once issued.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invoice {
    pub id: InvoiceId,
    pub payment_id: PaymentId,
    pub items: Vec<LineItem>,
    pub total: Decimal,
    pub created_at: DateTime<Utc>,
}

impl Invoice {
    pub fn new(id: InvoiceId, payment_id: PaymentId, items: Vec<LineItem>) -> Self {
        let total = items.iter().map(LineItem::subtotal).sum();
        Self {
            id,
            payment_id,
            items,
            total,
            created_at: Utc::now(),
        }
    }
}
