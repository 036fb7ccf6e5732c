//! Ephemeral identity tokens.
//!
//! A token is what the Host shows in its QR code and what the Initiator
//! scans. It has two renderings of the same fields:
//!
//! - **display**: `sui::<network>::<token>::<flow>[::<relay-ref>]`, shown in
//!   the QR code and signed during the login handshake
//! - **dial**: the same string with every `:` replaced by `.`, used as the
//!   channel address since peer addresses cannot carry `:`
//!
//! No field may contain `:` or `.`, which keeps the substitution lossless.
//!
//! # Examples
//!
//! ```
//! use pairkit_lib::token::{decode, IdentityToken};
//! use pairkit_lib::{FlowType, Network};
//!
//! let token = IdentityToken::new(
//!     Network::Testnet,
//!     "abc123",
//!     FlowType::Sign,
//!     Some("https://relay.example.com".into()),
//! )
//! .unwrap();
//!
//! let parsed = decode(&token.display()).unwrap();
//! assert_eq!(parsed, token);
//! assert_eq!(IdentityToken::from_dial(&token.dial_address()).unwrap(), token);
//! ```

use crate::{FlowType, Network, PairkitError, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use std::fmt;
use std::str::FromStr;

/// Protocol family literal in field 0.
pub const CHAIN: &str = "sui";

/// Field separator of the display rendering.
pub const DISPLAY_SEPARATOR: &str = "::";

const DISPLAY_CHAR: char = ':';
const DIAL_CHAR: char = '.';

/// A decoded pairing token.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct IdentityToken {
    network: Network,
    token: String,
    flow: FlowType,
    relay_config_url: Option<String>,
}

impl IdentityToken {
    /// Build a token from its parts.
    ///
    /// Fails if `token` is empty or contains a separator character.
    pub fn new(
        network: Network,
        token: impl Into<String>,
        flow: FlowType,
        relay_config_url: Option<String>,
    ) -> Result<Self> {
        let token = token.into();
        validate_field("token", &token)?;
        Ok(Self {
            network,
            token,
            flow,
            relay_config_url,
        })
    }

    /// Mint a fresh token for a new QR display.
    pub fn generate(network: Network, flow: FlowType, relay_config_url: Option<String>) -> Self {
        Self {
            network,
            token: uuid::Uuid::new_v4().simple().to_string(),
            flow,
            relay_config_url,
        }
    }

    pub fn network(&self) -> Network {
        self.network
    }

    /// The per-session random value.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn flow(&self) -> FlowType {
        self.flow
    }

    /// URL relay/ICE configuration should be fetched from, if any.
    pub fn relay_config_url(&self) -> Option<&str> {
        self.relay_config_url.as_deref()
    }

    /// The display rendering (QR payload, login challenge).
    pub fn display(&self) -> String {
        let mut fields = vec![
            CHAIN.to_string(),
            self.network.as_str().to_string(),
            self.token.clone(),
            self.flow.as_str().to_string(),
        ];
        if let Some(url) = &self.relay_config_url {
            fields.push(URL_SAFE_NO_PAD.encode(url.as_bytes()));
        }
        fields.join(DISPLAY_SEPARATOR)
    }

    /// The dial rendering (channel address).
    pub fn dial_address(&self) -> String {
        self.display().replace(DISPLAY_CHAR, &DIAL_CHAR.to_string())
    }

    /// Parse a dial address back into a token.
    pub fn from_dial(address: &str) -> Result<Self> {
        decode(&address.replace(DIAL_CHAR, &DISPLAY_CHAR.to_string()))
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl FromStr for IdentityToken {
    type Err = PairkitError;

    fn from_str(s: &str) -> Result<Self> {
        decode(s)
    }
}

/// Build the display rendering of a token.
pub fn encode(
    network: Network,
    token: &str,
    flow: FlowType,
    relay_config_url: Option<&str>,
) -> Result<String> {
    IdentityToken::new(network, token, flow, relay_config_url.map(str::to_string))
        .map(|t| t.display())
}

/// Parse the display rendering of a token.
///
/// An undecodable relay reference is treated as absent: the session then
/// uses the default relay configuration.
pub fn decode(raw: &str) -> Result<IdentityToken> {
    let fields: Vec<&str> = raw.trim().split(DISPLAY_SEPARATOR).collect();

    if fields.len() < 4 {
        return Err(PairkitError::Scan(format!(
            "expected at least 4 fields, found {}",
            fields.len()
        )));
    }
    if fields[0] != CHAIN {
        return Err(PairkitError::Scan(format!("unsupported chain: {}", fields[0])));
    }

    let network = fields[1].parse::<Network>()?;
    validate_field("token", fields[2])?;
    let flow = fields[3].parse::<FlowType>()?;
    let relay_config_url = fields.get(4).and_then(|field| decode_relay_ref(field));

    Ok(IdentityToken {
        network,
        token: fields[2].to_string(),
        flow,
        relay_config_url,
    })
}

/// Decode a token and check it against what the scanning party expects.
///
/// Runs before any network activity; every failure is a [`PairkitError::Scan`].
pub fn validate_scan(
    raw: &str,
    expected_network: Network,
    expected_flow: Option<FlowType>,
) -> Result<IdentityToken> {
    let token = decode(raw)?;

    if token.network != expected_network {
        return Err(PairkitError::Scan(format!(
            "code is for {}, this wallet is on {}",
            token.network, expected_network
        )));
    }
    if let Some(flow) = expected_flow {
        if token.flow != flow {
            return Err(PairkitError::Scan(format!(
                "code requests {}, expected {}",
                token.flow, flow
            )));
        }
    }

    Ok(token)
}

fn decode_relay_ref(field: &str) -> Option<String> {
    let bytes = match URL_SAFE_NO_PAD.decode(field) {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!("ignoring undecodable relay reference: {}", e);
            return None;
        }
    };
    String::from_utf8(bytes).ok()
}

fn validate_field(name: &str, value: &str) -> Result<()> {
    if value.is_empty() {
        return Err(PairkitError::Scan(format!("{} is empty", name)));
    }
    if value.contains(DISPLAY_CHAR) || value.contains(DIAL_CHAR) {
        return Err(PairkitError::Scan(format!(
            "{} may not contain '{}' or '{}'",
            name, DISPLAY_CHAR, DIAL_CHAR
        )));
    }
    Ok(())
}
