use crate::domain::invoice::LineItem;
use crate::domain::payment::Payment;
use crate::error::Result;
use crate::infrastructure::in_memory::InMemoryPaymentStore;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct Fixture {
    payments: Vec<FixturePayment>,
}

#[derive(Debug, Deserialize)]
struct FixturePayment {
    #[serde(flatten)]
    payment: Payment,
    #[serde(default)]
    items: Vec<LineItem>,
}

/// Loads payments and their carts from a JSON fixture into `store`.
///
/// Returns the number of payments seeded.
pub async fn seed_from_reader<R: Read>(source: R, store: &InMemoryPaymentStore) -> Result<usize> {
    let fixture: Fixture = serde_json::from_reader(source)?;
    let count = fixture.payments.len();
    for entry in fixture.payments {
        store.insert(entry.payment, entry.items).await;
    }
    Ok(count)
}
