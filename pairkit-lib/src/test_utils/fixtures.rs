//! Key material and token fixtures.

use crate::crypto::{
    personal_message_digest, transaction_intent_digest, SerializedSignature, SignatureScheme,
};
use crate::{FlowType, IdentityToken, Network, Result, Signer, TaggedPublicKey};
use async_trait::async_trait;
use ed25519_dalek::{Signer as _, SigningKey};

/// An Ed25519 wallet key for tests.
#[derive(Clone)]
pub struct TestSigner {
    key: SigningKey,
}

impl TestSigner {
    pub fn from_seed(seed: [u8; 32]) -> Self {
        Self {
            key: SigningKey::from_bytes(&seed),
        }
    }

    pub fn random() -> Self {
        Self::from_seed(rand::random())
    }

    fn serialize(&self, digest: &[u8; 32]) -> String {
        let signature = self.key.sign(digest);
        SerializedSignature::single(
            SignatureScheme::Ed25519,
            &signature.to_bytes(),
            self.key.verifying_key().as_bytes(),
        )
        .to_base64()
    }
}

#[async_trait]
impl Signer for TestSigner {
    fn address(&self) -> String {
        self.public_key().address()
    }

    fn public_key(&self) -> TaggedPublicKey {
        TaggedPublicKey::new(
            SignatureScheme::Ed25519,
            self.key.verifying_key().as_bytes().to_vec(),
        )
        .expect("ed25519 keys are 32 bytes")
    }

    async fn sign_personal_message(&self, message: &[u8]) -> Result<String> {
        Ok(self.serialize(&personal_message_digest(message)))
    }

    async fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<String> {
        Ok(self.serialize(&transaction_intent_digest(tx_bytes)))
    }
}

/// A fixed testnet token for `flow`.
pub fn test_token(flow: FlowType) -> IdentityToken {
    IdentityToken::new(Network::Testnet, "0123456789abcdef", flow, None)
        .expect("fixture token is well formed")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seeded_signer_is_deterministic() {
        let a = TestSigner::from_seed([1u8; 32]);
        let b = TestSigner::from_seed([1u8; 32]);
        assert_eq!(a.address(), b.address());
        assert_ne!(a.address(), TestSigner::random().address());
    }

    #[tokio::test]
    async fn test_signature_embeds_public_key() {
        let signer = TestSigner::from_seed([2u8; 32]);
        let encoded = signer.sign_transaction(b"tx").await.unwrap();
        let signature = SerializedSignature::from_base64(&encoded).unwrap();
        let (_, key) = signature.split_single().unwrap();
        assert_eq!(key, signer.public_key().key());
    }
}
