//! Sponsorship gateway client.
//!
//! When a third party pays for gas, the Host sends the transaction kind to
//! the gateway, receives sponsored bytes plus their digest, and later hands
//! back the user's signature for the gateway to execute.
//!
//! # Endpoints
//!
//! - `POST {base}/create` with `{address, network, transactionBlockKindBytes}`
//!   returns `{bytes, digest}`
//! - `POST {base}/execute` with `{digest, signature}`
//!
//! Any non-success status is a hard failure for the handshake step that
//! issued the call.

use crate::{Network, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[cfg(feature = "http")]
use crate::PairkitError;
#[cfg(feature = "http")]
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
#[cfg(feature = "http")]
use std::time::Duration;

/// Sponsored transaction returned by `create`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SponsoredTransaction {
    /// Full transaction bytes, base64.
    pub bytes: String,
    pub digest: String,
}

/// Gateway operations used by the sign handshake.
#[async_trait]
pub trait SponsorshipGateway: Send + Sync {
    /// Wrap `kind_bytes` into a sponsored transaction for `address`.
    async fn create(
        &self,
        address: &str,
        network: Network,
        kind_bytes: &[u8],
    ) -> Result<SponsoredTransaction>;

    /// Execute a sponsored transaction with the user's signature.
    async fn execute(&self, digest: &str, signature: &str) -> Result<()>;
}

#[cfg(feature = "http")]
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRequest<'a> {
    address: &'a str,
    network: &'a str,
    transaction_block_kind_bytes: String,
}

#[cfg(feature = "http")]
#[derive(Serialize)]
struct ExecuteRequest<'a> {
    digest: &'a str,
    signature: &'a str,
}

/// HTTP implementation of [`SponsorshipGateway`].
#[cfg(feature = "http")]
#[derive(Clone)]
pub struct HttpSponsorshipGateway {
    base_url: String,
    timeout_secs: u64,
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpSponsorshipGateway {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| PairkitError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into(),
            timeout_secs,
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }

    async fn post<B: Serialize>(&self, path: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| self.map_reqwest_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(PairkitError::Gateway(format!(
                "{} returned {}: {}",
                path,
                status.as_u16(),
                error_text
            )));
        }

        Ok(response)
    }

    fn map_reqwest_error(&self, e: reqwest::Error) -> PairkitError {
        if e.is_timeout() {
            PairkitError::Gateway(format!(
                "request timed out after {}ms",
                self.timeout_secs * 1000
            ))
        } else if e.is_connect() {
            PairkitError::Gateway(format!("cannot reach {}: {}", self.base_url, e))
        } else {
            PairkitError::Gateway(format!("request failed: {}", e))
        }
    }
}

#[cfg(feature = "http")]
#[async_trait]
impl SponsorshipGateway for HttpSponsorshipGateway {
    #[tracing::instrument(skip(self, kind_bytes), fields(kind_len = kind_bytes.len()))]
    async fn create(
        &self,
        address: &str,
        network: Network,
        kind_bytes: &[u8],
    ) -> Result<SponsoredTransaction> {
        let request = CreateRequest {
            address,
            network: network.as_str(),
            transaction_block_kind_bytes: BASE64.encode(kind_bytes),
        };

        let response = self.post("create", &request).await?;
        response.json::<SponsoredTransaction>().await.map_err(|e| {
            PairkitError::Gateway(format!("Failed to parse create response: {}", e))
        })
    }

    #[tracing::instrument(skip(self, signature))]
    async fn execute(&self, digest: &str, signature: &str) -> Result<()> {
        self.post("execute", &ExecuteRequest { digest, signature })
            .await
            .map(|_| ())
    }
}
