//! HTTP client for the remote ledger API
//!
//! Stateless: one call, one request. `fetch_snapshot` is idempotent and safe
//! to retry; `submit_payment` is not, and retry policy belongs to the caller.
//! The `RemoteLedger` trait is the seam test doubles implement.

pub mod types;

use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use crate::config::RemoteConfig;
use crate::error::{LedgerError, Result};

pub use types::{DatasetSnapshot, PaymentAck, PaymentCommand};

/// Remote ledger operations (allows mocking in tests)
#[async_trait]
pub trait RemoteLedger: Send + Sync {
    /// Retrieve the full current dataset. Idempotent.
    async fn fetch_snapshot(&self) -> Result<DatasetSnapshot>;

    /// Submit a payment and return the ledger-assigned identifiers.
    /// NOT idempotent server-side.
    async fn submit_payment(&self, command: &PaymentCommand) -> Result<PaymentAck>;
}

/// HTTP implementation of `RemoteLedger`
///
/// # Example
///
/// ```rust,no_run
/// use market_ledger::{HttpLedgerClient, RemoteConfig};
///
/// let client = HttpLedgerClient::new(RemoteConfig {
///     base_url: "https://ledger.example.org".into(),
///     ..Default::default()
/// });
/// ```
pub struct HttpLedgerClient {
    config: RemoteConfig,
    client: Client,
}

impl HttpLedgerClient {
    /// Create a new client
    pub fn new(config: RemoteConfig) -> Self {
        let mut headers = header::HeaderMap::new();
        if let Some(ref api_key) = config.api_key {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", api_key))
                    .expect("Invalid API key"),
            );
        }

        let client = Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self { config, client }
    }

    async fn handle_response<T: serde::de::DeserializeOwned>(
        &self,
        response: reqwest::Response,
    ) -> Result<T> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Http {
                status,
                message: body,
            });
        }

        let body = response.json().await.map_err(|e| {
            LedgerError::Decode(format!("Response body: {}", e))
        })?;
        Ok(body)
    }
}

#[async_trait]
impl RemoteLedger for HttpLedgerClient {
    async fn fetch_snapshot(&self) -> Result<DatasetSnapshot> {
        let url = format!("{}/api/v1/snapshot", self.config.base_url);
        debug!("Fetching dataset snapshot from {}", url);

        let response = self.client.get(&url).send().await?;
        self.handle_response(response).await
    }

    async fn submit_payment(&self, command: &PaymentCommand) -> Result<PaymentAck> {
        let url = format!("{}/api/v1/payments", self.config.base_url);
        debug!(
            session_id = command.session_id,
            receipt_token_id = command.receipt_token_id,
            "Submitting payment to {}",
            url
        );

        let response = self
            .client
            .post(&url)
            .header(header::CONTENT_TYPE, "application/json")
            .json(command)
            .send()
            .await?;

        // 404 here means the referenced token or session is unknown remotely;
        // surface it like any other validation failure
        if response.status() == StatusCode::UNPROCESSABLE_ENTITY
            || response.status() == StatusCode::NOT_FOUND
        {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LedgerError::Http {
                status,
                message: body,
            });
        }

        self.handle_response(response).await
    }
}
