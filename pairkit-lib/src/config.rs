//! Configuration types for pairing sessions.
//!
//! # Environment Variables
//!
//! [`PairingConfig::from_env`] reads:
//! - `PAIRKIT_NETWORK` - `mainnet`, `testnet`, `devnet` or `localnet`
//! - `PAIRKIT_RELAY_CONFIG_URL` - base URL serving `ice-conf.json`
//! - `PAIRKIT_SPONSOR_URL` - sponsorship gateway base URL
//! - `PAIRKIT_OPEN_TIMEOUT_MS` - per-phase link open timeout

use crate::{Network, PairkitError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Settings shared by both sides of a pairing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingConfig {
    /// Network this party operates on. Tokens for other networks are rejected.
    #[serde(default)]
    pub network: Network,

    /// How long each connection phase may take to open, in milliseconds.
    #[serde(default = "default_open_timeout_ms")]
    pub open_timeout_ms: u64,

    /// Budget for fetching relay configuration, in milliseconds.
    #[serde(default = "default_relay_config_timeout_ms")]
    pub relay_config_timeout_ms: u64,

    /// Where the Host publishes relay configuration (embedded in its tokens).
    #[serde(default)]
    pub relay_config_url: Option<String>,

    /// Sponsorship gateway base URL. Unset means transactions are unsponsored.
    #[serde(default)]
    pub sponsorship_url: Option<String>,

    /// Sponsorship gateway request timeout in seconds.
    #[serde(default = "default_gateway_timeout_secs")]
    pub gateway_timeout_secs: u64,
}

fn default_open_timeout_ms() -> u64 {
    8_000
}

fn default_relay_config_timeout_ms() -> u64 {
    5_000
}

fn default_gateway_timeout_secs() -> u64 {
    30
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self::new(Network::default())
    }
}

impl PairingConfig {
    /// Create a configuration for the given network with default timeouts.
    pub fn new(network: Network) -> Self {
        Self {
            network,
            open_timeout_ms: default_open_timeout_ms(),
            relay_config_timeout_ms: default_relay_config_timeout_ms(),
            relay_config_url: None,
            sponsorship_url: None,
            gateway_timeout_secs: default_gateway_timeout_secs(),
        }
    }

    /// Load from `PAIRKIT_*` environment variables over the defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = match std::env::var("PAIRKIT_NETWORK") {
            Ok(network) => Self::new(
                network
                    .parse()
                    .map_err(|_| PairkitError::Config(format!("unknown network: {}", network)))?,
            ),
            Err(_) => Self::default(),
        };

        if let Ok(url) = std::env::var("PAIRKIT_RELAY_CONFIG_URL") {
            config.relay_config_url = Some(url);
        }
        if let Ok(url) = std::env::var("PAIRKIT_SPONSOR_URL") {
            config.sponsorship_url = Some(url);
        }
        if let Ok(ms) = std::env::var("PAIRKIT_OPEN_TIMEOUT_MS") {
            config.open_timeout_ms = ms.parse().map_err(|_| {
                PairkitError::Config(format!("PAIRKIT_OPEN_TIMEOUT_MS is not a number: {}", ms))
            })?;
        }

        Ok(config)
    }

    pub fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_relay_config_url(mut self, url: impl Into<String>) -> Self {
        self.relay_config_url = Some(url.into());
        self
    }

    pub fn with_sponsorship_url(mut self, url: impl Into<String>) -> Self {
        self.sponsorship_url = Some(url.into());
        self
    }

    pub fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn relay_config_timeout(&self) -> Duration {
        Duration::from_millis(self.relay_config_timeout_ms)
    }
}

/// Which candidates a transport may use.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IceTransportPolicy {
    /// Direct and relayed candidates.
    All,
    /// Relayed candidates only.
    Relay,
}

/// One or more server URLs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum IceUrls {
    One(String),
    Many(Vec<String>),
}

/// A STUN or TURN server entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceServer {
    pub urls: IceUrls,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential: Option<String>,
}

impl IceServer {
    pub fn stun(url: impl Into<String>) -> Self {
        Self {
            urls: IceUrls::One(url.into()),
            username: None,
            credential: None,
        }
    }
}

/// Relay/ICE configuration as served by `ice-conf.json`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IceConfig {
    pub ice_servers: Vec<IceServer>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ice_transport_policy: Option<IceTransportPolicy>,
}

impl Default for IceConfig {
    fn default() -> Self {
        Self {
            ice_servers: vec![
                IceServer::stun("stun:stun.l.google.com:19302"),
                IceServer::stun("stun:stun1.l.google.com:19302"),
            ],
            ice_transport_policy: Some(IceTransportPolicy::All),
        }
    }
}

impl IceConfig {
    /// Copy of this configuration forced to relayed candidates only.
    pub fn relay_only(&self) -> Self {
        Self {
            ice_servers: self.ice_servers.clone(),
            ice_transport_policy: Some(IceTransportPolicy::Relay),
        }
    }

    pub fn is_relay_only(&self) -> bool {
        self.ice_transport_policy == Some(IceTransportPolicy::Relay)
    }
}
