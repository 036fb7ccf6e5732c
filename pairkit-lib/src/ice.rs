//! Relay/ICE configuration fetcher.
//!
//! A Host may advertise where its relay configuration lives by embedding a
//! URL in its token. Both parties fetch `{base}/ice-conf.json` from it before
//! creating transports. Any failure, whether network error, bad status or
//! malformed body, is logged and answered with [`IceConfig::default`]: a
//! missing relay config never blocks a pairing.

use crate::{IceConfig, PairkitError, Result};
use std::time::Duration;

const ICE_CONFIG_FILE: &str = "ice-conf.json";

/// HTTP client for relay configuration.
#[derive(Clone)]
pub struct RelayConfigClient {
    client: reqwest::Client,
    timeout: Duration,
}

impl RelayConfigClient {
    /// Create a client whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PairkitError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, timeout })
    }

    /// Location of the configuration document under `base`.
    ///
    /// A reference that already names a `.json` document is used as is.
    pub fn config_url(base: &str) -> String {
        if base.ends_with(".json") {
            base.to_string()
        } else {
            format!("{}/{}", base.trim_end_matches('/'), ICE_CONFIG_FILE)
        }
    }

    /// Fetch and parse the configuration, reporting every failure.
    #[tracing::instrument(skip(self))]
    pub async fn fetch(&self, base: &str) -> Result<IceConfig> {
        let url = Self::config_url(base);

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                PairkitError::Transport(format!(
                    "relay config request timed out after {}ms",
                    self.timeout.as_millis()
                ))
            } else {
                PairkitError::Transport(format!("relay config request failed: {}", e))
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(PairkitError::Transport(format!(
                "relay config request returned {}",
                status.as_u16()
            )));
        }

        response.json::<IceConfig>().await.map_err(|e| {
            PairkitError::Serialization(format!("Failed to parse relay config: {}", e))
        })
    }

    /// Fetch the configuration, falling back to the default on any failure.
    pub async fn fetch_or_default(&self, base: Option<&str>) -> IceConfig {
        let Some(base) = base else {
            return IceConfig::default();
        };

        match self.fetch(base).await {
            Ok(config) => {
                tracing::debug!(
                    servers = config.ice_servers.len(),
                    "using fetched relay config"
                );
                config
            }
            Err(e) => {
                tracing::warn!("falling back to default relay config: {}", e);
                IceConfig::default()
            }
        }
    }
}
