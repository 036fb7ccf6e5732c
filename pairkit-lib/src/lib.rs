//! Pairkit library.
//!
//! Building blocks for pairing a key-holding device with a dApp by QR code:
//! identity tokens, signature scheme dispatch, and the small HTTP clients the
//! handshakes lean on. Everything that touches a real chain (signing, building
//! transactions, executing them) is injected by the caller through the traits
//! in [`ledger`] and [`crypto`].
//!
//! # Example
//!
//! ```
//! use pairkit_lib::{token::IdentityToken, FlowType, Network};
//!
//! let token = IdentityToken::new(Network::Testnet, "abc123", FlowType::Login, None).unwrap();
//! assert_eq!(token.display(), "sui::testnet::abc123::login");
//! assert_eq!(token.dial_address(), "sui..testnet..abc123..login");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod config;
pub mod crypto;
pub mod errors;
pub mod gateway;
#[cfg(feature = "http")]
pub mod ice;
pub mod ledger;
pub mod token;

/// Test utilities for pairing tests.
///
/// This module is only available with the `test-utils` feature or in test builds.
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use config::{IceConfig, IceServer, IceTransportPolicy, PairingConfig};
pub use crypto::{SignatureScheme, SignatureVerifier, TaggedPublicKey};
pub use errors::{PairkitError, PairkitErrorCode};
pub use gateway::{SponsoredTransaction, SponsorshipGateway};
pub use ledger::{LedgerClient, Signer, TransactionBlock, TransactionEffects};
pub use token::{validate_scan, IdentityToken};

/// Convenience alias for results returned by this crate.
pub type Result<T> = std::result::Result<T, PairkitError>;

/// Environment a pairing session runs against.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Network {
    Mainnet,
    #[default]
    Testnet,
    Devnet,
    Localnet,
}

impl Network {
    pub const ALL: [Network; 4] = [
        Network::Mainnet,
        Network::Testnet,
        Network::Devnet,
        Network::Localnet,
    ];

    /// Identifier used in tokens and gateway requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mainnet => "mainnet",
            Self::Testnet => "testnet",
            Self::Devnet => "devnet",
            Self::Localnet => "localnet",
        }
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Network {
    type Err = PairkitError;

    fn from_str(s: &str) -> Result<Self> {
        Network::ALL
            .into_iter()
            .find(|n| n.as_str() == s)
            .ok_or_else(|| PairkitError::Scan(format!("unknown network: {}", s)))
    }
}

/// Which handshake a token bootstraps.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    Login,
    Sign,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Sign => "sign",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlowType {
    type Err = PairkitError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "login" => Ok(Self::Login),
            "sign" => Ok(Self::Sign),
            other => Err(PairkitError::Scan(format!("unknown flow type: {}", other))),
        }
    }
}
