//! Login handshake.
//!
//! ```text
//! Initiator                          Host
//!    | STEP_0 {address, publicKey, signature}
//!    |---------------------------------->|  verify signature over own token
//!    |            STEP_1 "OK" | <reason> |
//!    |<----------------------------------|
//! ```
//!
//! The signed message is the display rendering of the Host's token, so a
//! proof is only valid for the session it was made for.

use pairkit_lib::{IdentityToken, Network, PairkitError, Result, SignatureVerifier, Signer};
use serde::{Deserialize, Serialize};

use crate::message::{LoginProof, Message, LOGIN_OK, STEP_0, STEP_1};
use crate::transport::Link;

/// A verified login.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginOutcome {
    pub address: String,
    pub network: Network,
}

/// Run the Initiator side. The link is closed when this returns.
pub async fn initiate_login(
    link: &mut Link,
    token: &IdentityToken,
    signer: &dyn Signer,
) -> Result<LoginOutcome> {
    let result = initiator_steps(link, token, signer).await;
    link.close().await;
    result
}

async fn initiator_steps(
    link: &mut Link,
    token: &IdentityToken,
    signer: &dyn Signer,
) -> Result<LoginOutcome> {
    // 1. Prove key ownership for this session
    let challenge = token.display();
    let signature = signer.sign_personal_message(challenge.as_bytes()).await?;
    let proof = LoginProof {
        address: signer.address(),
        public_key: signer.public_key().to_base64(),
        signature,
    };
    link.send(&Message::with_payload(STEP_0, &proof)?).await?;

    // 2. Wait for the verdict
    let reply = link.expect_message().await?;
    if !reply.is(STEP_1) {
        return Err(PairkitError::unknown_message_type(&reply.kind));
    }
    if reply.value != LOGIN_OK {
        return Err(PairkitError::Verification(reply.value));
    }

    tracing::info!(address = %proof.address, "login accepted");
    Ok(LoginOutcome {
        address: proof.address,
        network: token.network(),
    })
}

/// Run the Host side. The link is closed when this returns.
pub async fn respond_login(
    link: &mut Link,
    token: &IdentityToken,
    verifier: &SignatureVerifier,
) -> Result<LoginOutcome> {
    let result = responder_steps(link, token, verifier).await;
    link.close().await;
    result
}

async fn responder_steps(
    link: &mut Link,
    token: &IdentityToken,
    verifier: &SignatureVerifier,
) -> Result<LoginOutcome> {
    let message = link.expect_message().await?;
    if !message.is(STEP_0) {
        return Err(PairkitError::unknown_message_type(&message.kind));
    }

    match check_proof(&message, token, verifier).await {
        Ok(address) => {
            link.send(&Message::new(STEP_1, LOGIN_OK)).await?;
            tracing::info!(address = %address, "login verified");
            Ok(LoginOutcome {
                address,
                network: token.network(),
            })
        }
        Err(e) => {
            tracing::warn!("rejecting login: {}", e);
            if let Err(send_error) = link.send(&Message::new(STEP_1, rejection_reason(&e))).await {
                tracing::debug!("could not deliver rejection: {}", send_error);
            }
            Err(e)
        }
    }
}

async fn check_proof(
    message: &Message,
    token: &IdentityToken,
    verifier: &SignatureVerifier,
) -> Result<String> {
    let proof: LoginProof = message.payload()?;
    verifier
        .verify_login(
            token.display().as_bytes(),
            &proof.address,
            &proof.public_key,
            &proof.signature,
        )
        .await?;
    Ok(proof.address)
}

fn rejection_reason(error: &PairkitError) -> String {
    match error {
        PairkitError::Verification(reason) => reason.clone(),
        other => other.to_string(),
    }
}
