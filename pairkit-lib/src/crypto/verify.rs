//! Personal-message verification by scheme tag.
//!
//! Ed25519 is verified locally. The remaining schemes are handed to
//! injected backends: [`SchemeVerifier`] for the key-based ones the chain
//! SDK covers, [`ZkLoginVerifier`] for zkLogin, which needs a network call.
//! A missing backend rejects, it never falls through to another scheme.
//!
//! The claimed address is compared with the key-derived address only for
//! schemes whose address is derived from the key. For MultiSig and zkLogin
//! the backend receives the address and is responsible for binding it.

use super::{personal_message_digest, SerializedSignature, SignatureScheme, TaggedPublicKey};
use crate::{PairkitError, Result};
use async_trait::async_trait;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use std::sync::Arc;

/// Verifies signatures for key-based schemes other than Ed25519.
#[async_trait]
pub trait SchemeVerifier: Send + Sync {
    /// Check `signature` over the personal-message `digest` for `public_key`,
    /// made on behalf of `address`.
    async fn verify(
        &self,
        scheme: SignatureScheme,
        digest: &[u8; 32],
        public_key: &TaggedPublicKey,
        signature: &SerializedSignature,
        address: &str,
    ) -> Result<bool>;
}

/// Network-backed zkLogin signature verification.
#[async_trait]
pub trait ZkLoginVerifier: Send + Sync {
    async fn verify_personal_message(
        &self,
        message: &[u8],
        signature: &SerializedSignature,
        address: &str,
    ) -> Result<bool>;
}

/// Dispatches verification on the public key's scheme tag.
#[derive(Clone, Default)]
pub struct SignatureVerifier {
    backend: Option<Arc<dyn SchemeVerifier>>,
    zklogin: Option<Arc<dyn ZkLoginVerifier>>,
}

impl SignatureVerifier {
    /// A verifier that accepts Ed25519 only.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_backend(mut self, backend: Arc<dyn SchemeVerifier>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn with_zklogin(mut self, verifier: Arc<dyn ZkLoginVerifier>) -> Self {
        self.zklogin = Some(verifier);
        self
    }

    /// Verify a login proof: `signature` over `message` by `public_key`, and
    /// `address` derived from `public_key`.
    ///
    /// `public_key` and `signature` are the base64 strings carried in the
    /// handshake.
    pub async fn verify_login(
        &self,
        message: &[u8],
        address: &str,
        public_key: &str,
        signature: &str,
    ) -> Result<()> {
        let public_key = TaggedPublicKey::from_base64(public_key)?;
        let signature = SerializedSignature::from_base64(signature)?;

        if public_key.scheme().derives_address() && public_key.address() != address {
            return Err(PairkitError::Verification(format!(
                "public key does not control address {}",
                address
            )));
        }

        self.verify_personal_message(message, &public_key, &signature, address)
            .await
    }

    /// Boolean form of [`verify_login`](Self::verify_login); every error is a rejection.
    pub async fn is_valid_login(
        &self,
        message: &[u8],
        address: &str,
        public_key: &str,
        signature: &str,
    ) -> bool {
        self.verify_login(message, address, public_key, signature)
            .await
            .is_ok()
    }

    pub async fn verify_personal_message(
        &self,
        message: &[u8],
        public_key: &TaggedPublicKey,
        signature: &SerializedSignature,
        address: &str,
    ) -> Result<()> {
        if signature.scheme() != public_key.scheme() {
            return Err(PairkitError::Verification(format!(
                "signature scheme {} does not match public key scheme {}",
                signature.scheme(),
                public_key.scheme()
            )));
        }

        let valid = match public_key.scheme() {
            SignatureScheme::Ed25519 => verify_ed25519(message, public_key, signature)?,
            scheme @ (SignatureScheme::Secp256k1
            | SignatureScheme::Secp256r1
            | SignatureScheme::MultiSig
            | SignatureScheme::Passkey) => {
                let backend = self.backend.as_ref().ok_or_else(|| {
                    PairkitError::Verification(format!("no verifier available for {}", scheme))
                })?;
                backend
                    .verify(
                        scheme,
                        &personal_message_digest(message),
                        public_key,
                        signature,
                        address,
                    )
                    .await?
            }
            SignatureScheme::ZkLogin => {
                let verifier = self.zklogin.as_ref().ok_or_else(|| {
                    PairkitError::Verification("no zklogin verifier configured".into())
                })?;
                verifier
                    .verify_personal_message(message, signature, address)
                    .await?
            }
        };

        if valid {
            Ok(())
        } else {
            Err(PairkitError::Verification("signature is not valid".into()))
        }
    }
}

fn verify_ed25519(
    message: &[u8],
    public_key: &TaggedPublicKey,
    signature: &SerializedSignature,
) -> Result<bool> {
    let (raw_signature, embedded_key) = signature.split_single()?;
    if embedded_key != public_key.key() {
        return Err(PairkitError::Verification(
            "signature was made by a different key".into(),
        ));
    }

    let key_bytes: [u8; 32] = public_key
        .key()
        .try_into()
        .map_err(|_| PairkitError::Verification("ed25519 key must be 32 bytes".into()))?;
    let verifying_key = VerifyingKey::from_bytes(&key_bytes)
        .map_err(|e| PairkitError::Verification(format!("invalid ed25519 key: {}", e)))?;
    let signature = Signature::from_slice(raw_signature)
        .map_err(|e| PairkitError::Verification(format!("invalid ed25519 signature: {}", e)))?;

    Ok(verifying_key
        .verify(&personal_message_digest(message), &signature)
        .is_ok())
}
