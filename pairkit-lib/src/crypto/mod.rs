//! Signature scheme tags, tagged keys and serialized signatures.
//!
//! Every public key and signature exchanged in a handshake starts with a
//! single scheme tag byte. The tag alone decides which routine consumes the
//! remaining bytes; see [`verify::SignatureVerifier`].

use crate::{PairkitError, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::{Deserialize, Serialize};
use std::fmt;

pub mod digest;
pub mod verify;

pub use digest::{blake2b256, personal_message_digest, transaction_digest, transaction_intent_digest};
pub use verify::{SchemeVerifier, SignatureVerifier, ZkLoginVerifier};

/// Signature schemes a tagged key may select.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum SignatureScheme {
    Ed25519 = 0x00,
    Secp256k1 = 0x01,
    Secp256r1 = 0x02,
    MultiSig = 0x03,
    ZkLogin = 0x05,
    Passkey = 0x06,
}

impl SignatureScheme {
    /// Resolve a tag byte. Unknown tags are a verification failure.
    pub fn from_flag(flag: u8) -> Result<Self> {
        match flag {
            0x00 => Ok(Self::Ed25519),
            0x01 => Ok(Self::Secp256k1),
            0x02 => Ok(Self::Secp256r1),
            0x03 => Ok(Self::MultiSig),
            0x05 => Ok(Self::ZkLogin),
            0x06 => Ok(Self::Passkey),
            other => Err(PairkitError::Verification(format!(
                "unsupported signature scheme tag: 0x{:02x}",
                other
            ))),
        }
    }

    pub fn flag(self) -> u8 {
        self as u8
    }

    /// Fixed public key length, for schemes that have one.
    pub fn public_key_len(self) -> Option<usize> {
        match self {
            Self::Ed25519 => Some(32),
            Self::Secp256k1 | Self::Secp256r1 | Self::Passkey => Some(33),
            Self::MultiSig | Self::ZkLogin => None,
        }
    }

    /// Whether an address is the hash of this scheme's tagged key.
    ///
    /// MultiSig and zkLogin addresses are bound by their verifiers instead.
    pub fn derives_address(self) -> bool {
        !matches!(self, Self::MultiSig | Self::ZkLogin)
    }

    /// Fixed raw signature length, for schemes that have one.
    fn raw_signature_len(self) -> Option<usize> {
        match self {
            Self::Ed25519 | Self::Secp256k1 | Self::Secp256r1 => Some(64),
            Self::MultiSig | Self::ZkLogin | Self::Passkey => None,
        }
    }
}

impl fmt::Display for SignatureScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ed25519 => "ed25519",
            Self::Secp256k1 => "secp256k1",
            Self::Secp256r1 => "secp256r1",
            Self::MultiSig => "multisig",
            Self::ZkLogin => "zklogin",
            Self::Passkey => "passkey",
        };
        f.write_str(name)
    }
}

/// A public key prefixed with its scheme tag.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaggedPublicKey {
    scheme: SignatureScheme,
    key: Vec<u8>,
}

impl TaggedPublicKey {
    pub fn new(scheme: SignatureScheme, key: impl Into<Vec<u8>>) -> Result<Self> {
        let key = key.into();
        if let Some(len) = scheme.public_key_len() {
            if key.len() != len {
                return Err(PairkitError::Verification(format!(
                    "{} public key must be {} bytes, got {}",
                    scheme,
                    len,
                    key.len()
                )));
            }
        }
        if key.is_empty() {
            return Err(PairkitError::Verification("empty public key".into()));
        }
        Ok(Self { scheme, key })
    }

    /// Parse `tag || key`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let (flag, key) = bytes
            .split_first()
            .ok_or_else(|| PairkitError::Verification("empty public key".into()))?;
        Self::new(SignatureScheme::from_flag(*flag)?, key.to_vec())
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| PairkitError::Verification(format!("public key is not base64: {}", e)))?;
        Self::from_bytes(&bytes)
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Key bytes with the tag stripped.
    pub fn key(&self) -> &[u8] {
        &self.key
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.key.len() + 1);
        bytes.push(self.scheme.flag());
        bytes.extend_from_slice(&self.key);
        bytes
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(self.to_bytes())
    }

    /// Account address controlled by this key: `0x` + hex(blake2b-256(tag || key)).
    pub fn address(&self) -> String {
        format!("0x{}", hex::encode(blake2b256(&self.to_bytes())))
    }
}

/// A signature as produced by a wallet: `tag || body`, base64 on the wire.
///
/// For single-key schemes the body is `raw signature || public key`; for the
/// others it is an opaque blob only the matching backend understands.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SerializedSignature {
    scheme: SignatureScheme,
    body: Vec<u8>,
}

impl SerializedSignature {
    pub fn new(scheme: SignatureScheme, body: Vec<u8>) -> Self {
        Self { scheme, body }
    }

    /// Assemble a single-key signature.
    pub fn single(scheme: SignatureScheme, signature: &[u8], public_key: &[u8]) -> Self {
        let mut body = Vec::with_capacity(signature.len() + public_key.len());
        body.extend_from_slice(signature);
        body.extend_from_slice(public_key);
        Self { scheme, body }
    }

    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|e| PairkitError::Verification(format!("signature is not base64: {}", e)))?;
        let (flag, body) = bytes
            .split_first()
            .ok_or_else(|| PairkitError::Verification("empty signature".into()))?;
        Ok(Self {
            scheme: SignatureScheme::from_flag(*flag)?,
            body: body.to_vec(),
        })
    }

    pub fn to_base64(&self) -> String {
        let mut bytes = Vec::with_capacity(self.body.len() + 1);
        bytes.push(self.scheme.flag());
        bytes.extend_from_slice(&self.body);
        BASE64.encode(bytes)
    }

    pub fn scheme(&self) -> SignatureScheme {
        self.scheme
    }

    /// Everything after the tag.
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Split a single-key body into `(raw signature, public key)`.
    pub fn split_single(&self) -> Result<(&[u8], &[u8])> {
        let sig_len = self.scheme.raw_signature_len().ok_or_else(|| {
            PairkitError::Verification(format!("{} signatures are not single-key", self.scheme))
        })?;
        let pk_len = self.scheme.public_key_len().unwrap_or(0);
        if self.body.len() != sig_len + pk_len {
            return Err(PairkitError::Verification(format!(
                "{} signature must be {} bytes, got {}",
                self.scheme,
                sig_len + pk_len,
                self.body.len()
            )));
        }
        Ok(self.body.split_at(sig_len))
    }
}
