//! Collaborator traits for key material, transaction building and the ledger.
//!
//! The pairing protocol never looks inside a transaction. It moves built
//! bytes between the two parties and relies on these traits for everything
//! chain specific.

use crate::{Result, TaggedPublicKey};
use async_trait::async_trait;

/// Effects reported by the ledger once a transaction is final.
pub type TransactionEffects = serde_json::Value;

/// Key material held by the Initiator.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Account address the key controls.
    fn address(&self) -> String;

    /// Public key prefixed with its scheme tag.
    fn public_key(&self) -> TaggedPublicKey;

    /// Sign arbitrary bytes as a personal message. Returns a base64
    /// serialized signature.
    async fn sign_personal_message(&self, message: &[u8]) -> Result<String>;

    /// Sign built transaction bytes. Returns a base64 serialized signature.
    async fn sign_transaction(&self, tx_bytes: &[u8]) -> Result<String>;
}

/// An unbuilt transaction on the Host side.
#[async_trait]
pub trait TransactionBlock: Send + Sync {
    fn sender(&self) -> Option<String>;

    fn set_sender(&mut self, address: &str);

    /// Serialize the transaction. With `only_transaction_kind` the result
    /// omits sender, gas and expiration so a sponsor can wrap it.
    async fn build(&mut self, only_transaction_kind: bool) -> Result<Vec<u8>>;

    /// Assign `address` as sender unless one was already chosen.
    fn set_sender_if_unset(&mut self, address: &str) {
        if self.sender().is_none() {
            self.set_sender(address);
        }
    }
}

/// Ledger RPC access.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Submit signed transaction bytes. Returns the transaction digest.
    async fn execute_transaction(&self, tx_bytes: &[u8], signature: &str) -> Result<String>;

    /// Wait until `digest` is final and return its effects.
    async fn wait_for_transaction(&self, digest: &str) -> Result<TransactionEffects>;
}
