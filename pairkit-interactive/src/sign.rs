//! Sign/execute handshake.
//!
//! ```text
//! Initiator                          Host
//!    | STEP_0 <address>                  |
//!    |---------------------------------->|  set sender, build (and sponsor)
//!    |           STEP_1 {bytes[, digest]}|
//!    |<----------------------------------|
//!    | STEP_2 {bytes, signature[, digest]}
//!    |---------------------------------->|  execute
//!    close                               close
//! ```
//!
//! Both sides wait for finalization on their own, so whichever one needs the
//! confirmed result gets it. A batch session carries `{"txs": [...]}` at
//! `STEP_1` and `STEP_2` with one entry per transaction; results keep the
//! transaction order.

use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use futures::future::try_join_all;
use pairkit_lib::crypto::transaction_digest;
use pairkit_lib::{
    LedgerClient, Network, PairkitError, Result, Signer, SponsorshipGateway, TransactionBlock,
    TransactionEffects,
};
use serde::{Deserialize, Serialize};

use crate::message::{Message, Payload, SignedTransaction, UnsignedTransaction, STEP_0, STEP_1, STEP_2};
use crate::transport::Link;

/// A signed and finalized transaction.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignOutcome {
    /// Base64 transaction bytes.
    pub bytes: String,
    pub signature: String,
    pub digest: String,
    pub effects: TransactionEffects,
}

fn decode_bytes(encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|e| PairkitError::Protocol(format!("transaction bytes are not base64: {}", e)))
}

/// Run the Initiator side.
///
/// The link is closed right after `STEP_2` goes out; finalization is awaited
/// afterwards through `ledger`.
pub async fn initiate_sign(
    link: &mut Link,
    signer: &dyn Signer,
    ledger: &dyn LedgerClient,
) -> Result<Vec<SignOutcome>> {
    let signed = initiator_steps(link, signer).await;
    link.close().await;
    let signed = signed?;

    let effects = try_join_all(
        signed
            .iter()
            .map(|(tx, digest)| async move {
                tracing::debug!(digest = %digest, "awaiting finalization");
                ledger.wait_for_transaction(digest).await.map(|e| (tx, digest, e))
            }),
    )
    .await?;

    Ok(effects
        .into_iter()
        .map(|(tx, digest, effects)| SignOutcome {
            bytes: tx.bytes.clone(),
            signature: tx.signature.clone(),
            digest: digest.clone(),
            effects,
        })
        .collect())
}

async fn initiator_steps(
    link: &mut Link,
    signer: &dyn Signer,
) -> Result<Vec<(SignedTransaction, String)>> {
    // 1. Announce the signing account
    link.send(&Message::new(STEP_0, signer.address())).await?;

    // 2. Receive what to sign
    let message = link.expect_message().await?;
    if !message.is(STEP_1) {
        return Err(PairkitError::unknown_message_type(&message.kind));
    }
    let offered: Payload<UnsignedTransaction> = message.payload()?;
    let batch = offered.is_batch();

    // 3. Sign each transaction in order
    let mut signed = Vec::with_capacity(offered.len());
    for tx in offered.into_items() {
        let bytes = decode_bytes(&tx.bytes)?;
        let signature = signer.sign_transaction(&bytes).await?;
        let digest = tx
            .digest
            .clone()
            .unwrap_or_else(|| transaction_digest(&bytes));
        signed.push((
            SignedTransaction {
                bytes: tx.bytes,
                signature,
                digest: tx.digest,
            },
            digest,
        ));
    }

    // 4. Hand the signatures back
    let (txs, digests): (Vec<_>, Vec<_>) = signed.into_iter().unzip();
    let reply = Payload::from_items(txs, batch)?;
    link.send(&Message::with_payload(STEP_2, &reply)?).await?;

    Ok(reply.into_items().into_iter().zip(digests).collect())
}

/// Host side configuration for a sign session.
#[derive(Clone)]
pub struct SignResponder {
    network: Network,
    ledger: Arc<dyn LedgerClient>,
    gateway: Option<Arc<dyn SponsorshipGateway>>,
}

struct Offered {
    bytes: String,
    digest: Option<String>,
}

impl SignResponder {
    pub fn new(network: Network, ledger: Arc<dyn LedgerClient>) -> Self {
        Self {
            network,
            ledger,
            gateway: None,
        }
    }

    /// Route building and execution through a sponsor.
    pub fn sponsored(mut self, gateway: Arc<dyn SponsorshipGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn is_sponsored(&self) -> bool {
        self.gateway.is_some()
    }

    /// Run the Host side for `txs`. The link is closed when this returns.
    ///
    /// With `batch` unset `txs` must hold exactly one transaction.
    pub async fn respond(
        &self,
        link: &mut Link,
        txs: &mut [Box<dyn TransactionBlock>],
        batch: bool,
    ) -> Result<Vec<SignOutcome>> {
        let signed = self.responder_steps(link, txs, batch).await;
        link.close().await;
        let (offered, signed) = signed?;

        try_join_all(
            offered
                .iter()
                .zip(signed)
                .map(|(offer, tx)| self.execute(offer, tx)),
        )
        .await
    }

    async fn responder_steps(
        &self,
        link: &mut Link,
        txs: &mut [Box<dyn TransactionBlock>],
        batch: bool,
    ) -> Result<(Vec<Offered>, Vec<SignedTransaction>)> {
        // STEP_0: who signs
        let message = link.expect_message().await?;
        if !message.is(STEP_0) {
            return Err(PairkitError::unknown_message_type(&message.kind));
        }
        let address = message.value;

        // STEP_1: what to sign
        let offered = self.prepare(txs, &address).await?;
        let items = offered
            .iter()
            .map(|offer| UnsignedTransaction {
                bytes: offer.bytes.clone(),
                digest: offer.digest.clone(),
            })
            .collect();
        link.send(&Message::with_payload(STEP_1, &Payload::from_items(items, batch)?)?)
            .await?;

        // STEP_2: signatures
        let message = link.expect_message().await?;
        if !message.is(STEP_2) {
            return Err(PairkitError::unknown_message_type(&message.kind));
        }
        let signed: Payload<SignedTransaction> = message.payload()?;
        if signed.len() != offered.len() {
            return Err(PairkitError::Protocol(format!(
                "expected {} signed transactions, got {}",
                offered.len(),
                signed.len()
            )));
        }

        let signed = signed.into_items();
        for (index, (offer, tx)) in offered.iter().zip(&signed).enumerate() {
            check_signed(index, offer, tx)?;
        }

        Ok((offered, signed))
    }

    async fn prepare(
        &self,
        txs: &mut [Box<dyn TransactionBlock>],
        address: &str,
    ) -> Result<Vec<Offered>> {
        let mut built = Vec::with_capacity(txs.len());
        for tx in txs.iter_mut() {
            tx.set_sender_if_unset(address);
            let sender = tx.sender().unwrap_or_else(|| address.to_string());
            let bytes = tx.build(self.gateway.is_some()).await?;
            built.push((sender, bytes));
        }

        let Some(gateway) = &self.gateway else {
            return Ok(built
                .into_iter()
                .map(|(_, bytes)| Offered {
                    bytes: BASE64.encode(bytes),
                    digest: None,
                })
                .collect());
        };

        let sponsored = try_join_all(
            built
                .iter()
                .map(|(sender, kind)| gateway.create(sender, self.network, kind)),
        )
        .await?;

        Ok(sponsored
            .into_iter()
            .map(|tx| Offered {
                bytes: tx.bytes,
                digest: Some(tx.digest),
            })
            .collect())
    }

    async fn execute(&self, offer: &Offered, tx: SignedTransaction) -> Result<SignOutcome> {
        let digest = match &self.gateway {
            Some(gateway) => {
                let digest = offer.digest.clone().ok_or_else(|| {
                    PairkitError::Internal("sponsored transaction without digest".into())
                })?;
                gateway.execute(&digest, &tx.signature).await?;
                digest
            }
            None => {
                let bytes = decode_bytes(&offer.bytes)?;
                self.ledger.execute_transaction(&bytes, &tx.signature).await?
            }
        };

        tracing::info!(digest = %digest, "transaction submitted");
        let effects = self.ledger.wait_for_transaction(&digest).await?;

        Ok(SignOutcome {
            bytes: offer.bytes.clone(),
            signature: tx.signature,
            digest,
            effects,
        })
    }
}

/// A signed entry must carry exactly the bytes, and any digest, offered at
/// the same position.
fn check_signed(index: usize, offer: &Offered, tx: &SignedTransaction) -> Result<()> {
    if tx.bytes != offer.bytes {
        return Err(PairkitError::Protocol(format!(
            "signed transaction {} does not match the offered bytes",
            index
        )));
    }
    if let Some(digest) = &tx.digest {
        if offer.digest.as_ref() != Some(digest) {
            return Err(PairkitError::Protocol(format!(
                "signed transaction {} carries digest {} that was not offered",
                index, digest
            )));
        }
    }
    Ok(())
}
