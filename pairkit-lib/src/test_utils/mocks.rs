//! Recording mocks for the transaction builder, ledger and gateway.

use std::sync::{Arc, Mutex};

use crate::crypto::transaction_digest;
use crate::{
    LedgerClient, Network, PairkitError, Result, SponsoredTransaction, SponsorshipGateway,
    TransactionBlock, TransactionEffects,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_json::json;

/// Transaction block whose bytes are derived from a payload and the sender.
///
/// Kind-only builds yield `kind:<payload>`; full builds yield
/// `tx:<sender>:<payload>`. Clones share the build log.
#[derive(Clone)]
pub struct MockTransaction {
    payload: Vec<u8>,
    sender: Option<String>,
    builds: Arc<Mutex<Vec<bool>>>,
}

impl MockTransaction {
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            payload: payload.into(),
            sender: None,
            builds: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_sender(mut self, sender: &str) -> Self {
        self.sender = Some(sender.to_string());
        self
    }

    /// `only_transaction_kind` flag of every build so far.
    pub fn builds(&self) -> Vec<bool> {
        self.builds.lock().unwrap().clone()
    }

    pub fn expected_kind_bytes(&self) -> Vec<u8> {
        [b"kind:".as_slice(), &self.payload].concat()
    }

    pub fn expected_full_bytes(&self, sender: &str) -> Vec<u8> {
        [b"tx:".as_slice(), sender.as_bytes(), b":", &self.payload].concat()
    }
}

#[async_trait]
impl TransactionBlock for MockTransaction {
    fn sender(&self) -> Option<String> {
        self.sender.clone()
    }

    fn set_sender(&mut self, address: &str) {
        self.sender = Some(address.to_string());
    }

    async fn build(&mut self, only_transaction_kind: bool) -> Result<Vec<u8>> {
        self.builds.lock().unwrap().push(only_transaction_kind);
        if only_transaction_kind {
            return Ok(self.expected_kind_bytes());
        }
        let sender = self
            .sender
            .as_deref()
            .ok_or_else(|| PairkitError::Internal("transaction has no sender".into()))?;
        Ok(self.expected_full_bytes(sender))
    }
}

/// Ledger that accepts every submission and reports success effects.
#[derive(Default)]
pub struct MockLedger {
    executed: Mutex<Vec<(Vec<u8>, String)>>,
    waited: Mutex<Vec<String>>,
    fail_execute: bool,
}

impl MockLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// A ledger that rejects every submission.
    pub fn failing() -> Self {
        Self {
            fail_execute: true,
            ..Self::default()
        }
    }

    /// `(bytes, signature)` of every submission.
    pub fn executed(&self) -> Vec<(Vec<u8>, String)> {
        self.executed.lock().unwrap().clone()
    }

    /// Digests waited on, in call order.
    pub fn waited(&self) -> Vec<String> {
        self.waited.lock().unwrap().clone()
    }
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn execute_transaction(&self, tx_bytes: &[u8], signature: &str) -> Result<String> {
        if self.fail_execute {
            return Err(PairkitError::Ledger("execution rejected".into()));
        }
        self.executed
            .lock()
            .unwrap()
            .push((tx_bytes.to_vec(), signature.to_string()));
        Ok(transaction_digest(tx_bytes))
    }

    async fn wait_for_transaction(&self, digest: &str) -> Result<TransactionEffects> {
        self.waited.lock().unwrap().push(digest.to_string());
        Ok(json!({ "digest": digest, "status": "success" }))
    }
}

/// Gateway that sponsors everything it is asked to.
///
/// Sponsored bytes are `sponsored:<address>:<kind bytes>`.
#[derive(Default)]
pub struct MockGateway {
    created: Mutex<Vec<(String, Network, Vec<u8>)>>,
    executed: Mutex<Vec<(String, String)>>,
    fail_create: bool,
    fail_execute: bool,
}

impl MockGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_create() -> Self {
        Self {
            fail_create: true,
            ..Self::default()
        }
    }

    pub fn failing_execute() -> Self {
        Self {
            fail_execute: true,
            ..Self::default()
        }
    }

    pub fn sponsored_bytes(address: &str, kind_bytes: &[u8]) -> Vec<u8> {
        [b"sponsored:".as_slice(), address.as_bytes(), b":", kind_bytes].concat()
    }

    /// `(address, network, kind bytes)` of every `create` call.
    pub fn created(&self) -> Vec<(String, Network, Vec<u8>)> {
        self.created.lock().unwrap().clone()
    }

    /// `(digest, signature)` of every `execute` call.
    pub fn executed(&self) -> Vec<(String, String)> {
        self.executed.lock().unwrap().clone()
    }
}

#[async_trait]
impl SponsorshipGateway for MockGateway {
    async fn create(
        &self,
        address: &str,
        network: Network,
        kind_bytes: &[u8],
    ) -> Result<SponsoredTransaction> {
        if self.fail_create {
            return Err(PairkitError::Gateway("create returned 500: sponsor offline".into()));
        }
        self.created
            .lock()
            .unwrap()
            .push((address.to_string(), network, kind_bytes.to_vec()));

        let bytes = Self::sponsored_bytes(address, kind_bytes);
        Ok(SponsoredTransaction {
            digest: transaction_digest(&bytes),
            bytes: BASE64.encode(bytes),
        })
    }

    async fn execute(&self, digest: &str, signature: &str) -> Result<()> {
        if self.fail_execute {
            return Err(PairkitError::Gateway("execute returned 400: bad signature".into()));
        }
        self.executed
            .lock()
            .unwrap()
            .push((digest.to_string(), signature.to_string()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_full_build_needs_sender() {
        let mut tx = MockTransaction::new(b"pay".to_vec());
        assert!(tx.build(false).await.is_err());
        assert_eq!(tx.build(true).await.unwrap(), b"kind:pay".to_vec());

        tx.set_sender_if_unset("0xaa");
        tx.set_sender_if_unset("0xbb");
        assert_eq!(tx.build(false).await.unwrap(), b"tx:0xaa:pay".to_vec());
        assert_eq!(tx.builds(), vec![false, true, false]);
    }

    #[tokio::test]
    async fn test_ledger_digest_matches_local_digest() {
        let ledger = MockLedger::new();
        let digest = ledger.execute_transaction(b"bytes", "sig").await.unwrap();
        assert_eq!(digest, transaction_digest(b"bytes"));
        assert_eq!(ledger.executed().len(), 1);
    }
}
