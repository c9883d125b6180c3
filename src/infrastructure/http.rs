//! Adapters for the bookstore REST API.
//!
//! One client realizes every capability port over JSON/HTTP:
//!
//! - `GET  /payments/{id}` and `GET /payments/{id}/cart`
//! - `POST /payments/{id}/confirm` and `POST /payments/{id}/reject`
//! - `POST /invoices` and `POST /invoices/{id}/send`

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::domain::invoice::{Invoice, InvoiceId, LineItem};
use crate::domain::payment::{Payment, PaymentId};
use crate::domain::ports::{
    CartStore, InvoiceGenerator, NotificationDispatcher, PaymentStore, PortResult,
};
use crate::error::AdapterError;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL of the bookstore API, e.g. `http://localhost:3001`.
    pub base_url: String,
    /// Transport-level timeout for a single request.
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Serialize)]
struct ConfirmRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<&'a str>,
}

#[derive(Serialize)]
struct RejectRequest<'a> {
    reason: &'a str,
}

#[derive(Serialize)]
struct CreateInvoiceRequest {
    payment_id: PaymentId,
}

/// HTTP client for the bookstore back office.
///
/// `Clone` is cheap; clones share the connection pool.
#[derive(Clone)]
pub struct HttpBookstoreApi {
    client: Client,
    base_url: Url,
}

impl HttpBookstoreApi {
    pub fn new(config: HttpConfig) -> Result<Self, AdapterError> {
        if config.base_url.is_empty() {
            return Err(AdapterError::Unavailable(
                "API base URL not configured".to_string(),
            ));
        }

        let base_url = Url::parse(&config.base_url).map_err(|e| {
            AdapterError::Unavailable(format!("invalid API base URL {}: {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(AdapterError::Unavailable(format!(
                "invalid API base URL {}",
                config.base_url
            )));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;

        Ok(Self { client, base_url })
    }

    /// Appends `segments` to the base URL, percent-encoding each one.
    fn url(&self, segments: &[&str]) -> PortResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| AdapterError::Unavailable(format!("invalid API base URL {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> PortResult<Response> {
        let response = request.send().await.map_err(transport_error)?;
        check_status(response).await
    }

    async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        segments: &[&str],
        body: &B,
    ) -> PortResult<T> {
        let url = self.url(segments)?;
        debug!(url = %url, "POST");
        let response = self.send(self.client.post(url).json(body)).await?;
        decode(response).await
    }
}

fn transport_error(err: reqwest::Error) -> AdapterError {
    if err.is_timeout() {
        AdapterError::Unavailable(format!("request timed out: {}", err))
    } else {
        AdapterError::Unavailable(err.to_string())
    }
}

async fn check_status(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => Err(AdapterError::NotFound),
        StatusCode::CONFLICT | StatusCode::UNPROCESSABLE_ENTITY => Err(AdapterError::Conflict(
            if body.is_empty() { status.to_string() } else { body },
        )),
        _ => Err(AdapterError::Unavailable(format!("HTTP {}: {}", status, body))),
    }
}

async fn decode<T: DeserializeOwned>(response: Response) -> PortResult<T> {
    response
        .json::<T>()
        .await
        .map_err(|e| AdapterError::Malformed(e.to_string()))
}

#[async_trait]
impl PaymentStore for HttpBookstoreApi {
    async fn get(&self, id: PaymentId) -> PortResult<Option<Payment>> {
        let id = id.to_string();
        let url = self.url(&["payments", id.as_str()])?;
        match self.send(self.client.get(url)).await {
            Ok(response) => decode(response).await.map(Some),
            Err(AdapterError::NotFound) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn confirm(&self, id: PaymentId, note: Option<&str>) -> PortResult<Payment> {
        let id = id.to_string();
        self.post_json(
            &["payments", id.as_str(), "confirm"],
            &ConfirmRequest { note },
        )
        .await
    }

    async fn reject(&self, id: PaymentId, reason: &str) -> PortResult<Payment> {
        let id = id.to_string();
        self.post_json(
            &["payments", id.as_str(), "reject"],
            &RejectRequest { reason },
        )
        .await
    }
}

#[async_trait]
impl CartStore for HttpBookstoreApi {
    async fn items_for_payment(&self, id: PaymentId) -> PortResult<Vec<LineItem>> {
        let id = id.to_string();
        let url = self.url(&["payments", id.as_str(), "cart"])?;
        let response = self.send(self.client.get(url)).await?;
        decode(response).await
    }
}

#[async_trait]
impl InvoiceGenerator for HttpBookstoreApi {
    async fn create_for_payment(&self, payment_id: PaymentId) -> PortResult<Invoice> {
        self.post_json(&["invoices"], &CreateInvoiceRequest { payment_id })
            .await
    }
}

#[async_trait]
impl NotificationDispatcher for HttpBookstoreApi {
    async fn send_invoice(&self, invoice_id: &InvoiceId) -> PortResult<()> {
        let url = self.url(&["invoices", invoice_id.as_str(), "send"])?;
        debug!(url = %url, "POST");
        self.send(self.client.post(url)).await?;
        Ok(())
    }
}
