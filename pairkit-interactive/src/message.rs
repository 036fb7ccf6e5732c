//! Handshake messages and their payloads.
//!
//! Every frame on a link is a JSON object `{"type": <tag>, "value": <string>}`.
//! Structured payloads are themselves JSON, carried as the `value` string.

use pairkit_lib::{PairkitError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

pub const STEP_0: &str = "STEP_0";
pub const STEP_1: &str = "STEP_1";
pub const STEP_2: &str = "STEP_2";

/// Login acceptance sent by the Host as the `STEP_1` value.
pub const LOGIN_OK: &str = "OK";

/// A single frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    pub kind: String,
    pub value: String,
}

impl Message {
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    /// Build a message whose value is `payload` serialized as JSON.
    pub fn with_payload<T: Serialize>(kind: &str, payload: &T) -> Result<Self> {
        Ok(Self::new(kind, serde_json::to_string(payload)?))
    }

    /// Parse a frame. Anything but an object with string `type` and `value`
    /// is a protocol violation.
    pub fn parse(frame: &str) -> Result<Self> {
        serde_json::from_str(frame)
            .map_err(|e| PairkitError::Protocol(format!("malformed message: {}", e)))
    }

    pub fn to_frame(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode the JSON payload carried in `value`.
    pub fn payload<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(&self.value).map_err(|e| {
            PairkitError::Protocol(format!("malformed {} payload: {}", self.kind, e))
        })
    }

    pub fn is(&self, kind: &str) -> bool {
        self.kind == kind
    }
}

/// Login proof sent by the Initiator as `STEP_0`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginProof {
    pub address: String,
    /// Base64 of scheme tag followed by key bytes.
    pub public_key: String,
    pub signature: String,
}

/// Transaction bytes offered for signing in `STEP_1`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnsignedTransaction {
    /// Base64 transaction bytes.
    pub bytes: String,
    /// Present when a sponsor already fixed the digest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// Signed transaction returned in `STEP_2`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransaction {
    pub bytes: String,
    pub signature: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,
}

/// One transaction or a batch of them.
///
/// The batch shape is tried first: a single transaction never carries `txs`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Payload<T> {
    Batch { txs: Vec<T> },
    Single(T),
}

impl<T> Payload<T> {
    pub fn from_items(items: Vec<T>, batch: bool) -> Result<Self> {
        if batch {
            return Ok(Self::Batch { txs: items });
        }
        let mut items = items.into_iter();
        match (items.next(), items.next()) {
            (Some(item), None) => Ok(Self::Single(item)),
            _ => Err(PairkitError::Internal(
                "a single-transaction payload needs exactly one item".into(),
            )),
        }
    }

    pub fn is_batch(&self) -> bool {
        matches!(self, Self::Batch { .. })
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Batch { txs } => txs.len(),
            Self::Single(_) => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn into_items(self) -> Vec<T> {
        match self {
            Self::Batch { txs } => txs,
            Self::Single(item) => vec![item],
        }
    }
}
