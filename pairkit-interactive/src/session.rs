//! Caller-facing pairing sessions.
//!
//! [`PairingInitiator`] is the key-holding side: it scans a token, connects
//! and runs the handshake the token asks for. [`PairingHost`] is the dApp
//! side: it mints a token for the QR code, waits for the Initiator and runs
//! the matching handshake.
//!
//! Every session resolves exactly once. Dropping the future, or the
//! [`PairingHandle`] of a spawned session, cancels it and destroys its
//! transport.

use std::future::Future;
use std::sync::Arc;

use pairkit_lib::ice::RelayConfigClient;
use pairkit_lib::{
    validate_scan, FlowType, IceConfig, IdentityToken, LedgerClient, PairingConfig, PairkitError,
    Result, SignatureVerifier, Signer, SponsorshipGateway, TransactionBlock,
};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::login::{self, LoginOutcome};
use crate::negotiator::{EstablishedLink, Negotiator, PendingLink};
use crate::sign::{self, SignOutcome, SignResponder};
use crate::transport::Transport;

/// A spawned session.
///
/// Dropping the handle cancels the session.
pub struct PairingHandle<T> {
    task: JoinHandle<()>,
    result: oneshot::Receiver<Result<T>>,
}

impl<T: Send + 'static> PairingHandle<T> {
    fn spawn<F>(session: F) -> Self
    where
        F: Future<Output = Result<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            let _ = tx.send(session.await);
        });
        Self { task, result: rx }
    }

    /// Stop the session and tear down its transport.
    pub fn cancel(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the outcome. A cancelled session yields [`PairkitError::Cancelled`].
    pub async fn wait(mut self) -> Result<T> {
        (&mut self.result)
            .await
            .unwrap_or_else(|_| Err(PairkitError::Cancelled))
    }
}

impl<T> Drop for PairingHandle<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn resolve_ice(config: &PairingConfig, reference: Option<&str>) -> IceConfig {
    if reference.is_none() {
        return IceConfig::default();
    }
    match RelayConfigClient::new(config.relay_config_timeout()) {
        Ok(client) => client.fetch_or_default(reference).await,
        Err(e) => {
            tracing::warn!("falling back to default relay config: {}", e);
            IceConfig::default()
        }
    }
}

/// The side holding key material.
#[derive(Clone)]
pub struct PairingInitiator {
    config: PairingConfig,
    negotiator: Negotiator,
    signer: Arc<dyn Signer>,
    ledger: Option<Arc<dyn LedgerClient>>,
}

impl PairingInitiator {
    pub fn new(config: PairingConfig, transport: Arc<dyn Transport>, signer: Arc<dyn Signer>) -> Self {
        let negotiator = Negotiator::new(transport, config.open_timeout());
        Self {
            config,
            negotiator,
            signer,
            ledger: None,
        }
    }

    /// Ledger used to await finalization of signed transactions.
    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerClient>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Prove ownership of the signer's address to the Host behind `raw_token`.
    #[tracing::instrument(skip(self))]
    pub async fn run_login(&self, raw_token: &str) -> Result<LoginOutcome> {
        let token = validate_scan(raw_token, self.config.network, Some(FlowType::Login))?;
        let mut established = self.connect(&token).await?;
        let outcome = login::initiate_login(&mut established.link, &token, self.signer.as_ref()).await;
        established.finish().await;
        outcome
    }

    /// Sign what the Host behind `raw_token` offers and await finalization.
    #[tracing::instrument(skip(self))]
    pub async fn run_sign(&self, raw_token: &str) -> Result<Vec<SignOutcome>> {
        let token = validate_scan(raw_token, self.config.network, Some(FlowType::Sign))?;
        let ledger = self
            .ledger
            .clone()
            .ok_or_else(|| PairkitError::Config("signing needs a ledger client".into()))?;

        let mut established = self.connect(&token).await?;
        let outcome =
            sign::initiate_sign(&mut established.link, self.signer.as_ref(), ledger.as_ref()).await;
        established.finish().await;
        outcome
    }

    pub fn spawn_login(&self, raw_token: impl Into<String>) -> PairingHandle<LoginOutcome> {
        let initiator = self.clone();
        let raw_token = raw_token.into();
        PairingHandle::spawn(async move { initiator.run_login(&raw_token).await })
    }

    pub fn spawn_sign(&self, raw_token: impl Into<String>) -> PairingHandle<Vec<SignOutcome>> {
        let initiator = self.clone();
        let raw_token = raw_token.into();
        PairingHandle::spawn(async move { initiator.run_sign(&raw_token).await })
    }

    async fn connect(&self, token: &IdentityToken) -> Result<EstablishedLink> {
        let ice = resolve_ice(&self.config, token.relay_config_url()).await;
        self.negotiator.dial(&token.dial_address(), &ice).await
    }
}

/// The side displaying the QR code.
#[derive(Clone)]
pub struct PairingHost {
    config: PairingConfig,
    negotiator: Negotiator,
    verifier: SignatureVerifier,
    ledger: Option<Arc<dyn LedgerClient>>,
    gateway: Option<Arc<dyn SponsorshipGateway>>,
}

impl PairingHost {
    pub fn new(config: PairingConfig, transport: Arc<dyn Transport>) -> Self {
        let negotiator = Negotiator::new(transport, config.open_timeout());
        Self {
            config,
            negotiator,
            verifier: SignatureVerifier::new(),
            ledger: None,
            gateway: None,
        }
    }

    /// Like [`new`](Self::new), with an HTTP sponsorship gateway when the
    /// configuration names one.
    pub fn from_config(config: PairingConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let gateway = match &config.sponsorship_url {
            Some(url) => Some(Arc::new(pairkit_lib::gateway::HttpSponsorshipGateway::new(
                url.clone(),
                config.gateway_timeout_secs,
            )?) as Arc<dyn SponsorshipGateway>),
            None => None,
        };

        let mut host = Self::new(config, transport);
        host.gateway = gateway;
        Ok(host)
    }

    pub fn with_verifier(mut self, verifier: SignatureVerifier) -> Self {
        self.verifier = verifier;
        self
    }

    pub fn with_ledger(mut self, ledger: Arc<dyn LedgerClient>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    /// Sponsor every sign session of this host.
    pub fn with_gateway(mut self, gateway: Arc<dyn SponsorshipGateway>) -> Self {
        self.gateway = Some(gateway);
        self
    }

    fn mint(&self, flow: FlowType) -> IdentityToken {
        IdentityToken::generate(self.config.network, flow, self.config.relay_config_url.clone())
    }

    async fn bind(&self, token: &IdentityToken) -> Result<PendingLink> {
        let ice = resolve_ice(&self.config, token.relay_config_url()).await;
        self.negotiator.listen(&token.dial_address(), &ice).await
    }

    pub fn login_session(&self) -> LoginSession {
        LoginSession {
            token: self.mint(FlowType::Login),
            host: self.clone(),
        }
    }

    /// A session signing a single transaction.
    pub fn sign_session(&self, tx: Box<dyn TransactionBlock>) -> Result<SignSession> {
        self.new_sign_session(vec![tx], false)
    }

    /// A session signing several transactions in one exchange.
    pub fn sign_batch_session(&self, txs: Vec<Box<dyn TransactionBlock>>) -> Result<SignSession> {
        if txs.is_empty() {
            return Err(PairkitError::Config("a batch needs at least one transaction".into()));
        }
        self.new_sign_session(txs, true)
    }

    fn new_sign_session(&self, txs: Vec<Box<dyn TransactionBlock>>, batch: bool) -> Result<SignSession> {
        let ledger = self
            .ledger
            .clone()
            .ok_or_else(|| PairkitError::Config("signing needs a ledger client".into()))?;

        let mut responder = SignResponder::new(self.config.network, ledger);
        if let Some(gateway) = &self.gateway {
            responder = responder.sponsored(gateway.clone());
        }

        Ok(SignSession {
            token: self.mint(FlowType::Sign),
            host: self.clone(),
            responder,
            txs,
            batch,
        })
    }
}

/// A Host login waiting to be scanned.
pub struct LoginSession {
    token: IdentityToken,
    host: PairingHost,
}

impl LoginSession {
    pub fn token(&self) -> &IdentityToken {
        &self.token
    }

    /// The string to render as QR code.
    pub fn qr_payload(&self) -> String {
        self.token.display()
    }

    pub async fn run(self) -> Result<LoginOutcome> {
        let pending = self.host.bind(&self.token).await?;
        self.complete(pending).await
    }

    /// Bind the listener, then finish the session in the background.
    pub async fn spawn(self) -> Result<PairingHandle<LoginOutcome>> {
        let pending = self.host.bind(&self.token).await?;
        Ok(PairingHandle::spawn(self.complete(pending)))
    }

    async fn complete(self, pending: PendingLink) -> Result<LoginOutcome> {
        let mut established = pending.accept().await?;
        let outcome =
            login::respond_login(&mut established.link, &self.token, &self.host.verifier).await;
        established.finish().await;
        outcome
    }
}

/// A Host sign session waiting to be scanned.
pub struct SignSession {
    token: IdentityToken,
    host: PairingHost,
    responder: SignResponder,
    txs: Vec<Box<dyn TransactionBlock>>,
    batch: bool,
}

impl SignSession {
    pub fn token(&self) -> &IdentityToken {
        &self.token
    }

    pub fn qr_payload(&self) -> String {
        self.token.display()
    }

    /// Sponsor this session through `gateway`.
    pub fn sponsored_by(mut self, gateway: Arc<dyn SponsorshipGateway>) -> Self {
        self.responder = self.responder.sponsored(gateway);
        self
    }

    pub fn is_sponsored(&self) -> bool {
        self.responder.is_sponsored()
    }

    pub async fn run(self) -> Result<Vec<SignOutcome>> {
        let pending = self.host.bind(&self.token).await?;
        self.complete(pending).await
    }

    pub async fn spawn(self) -> Result<PairingHandle<Vec<SignOutcome>>> {
        let pending = self.host.bind(&self.token).await?;
        Ok(PairingHandle::spawn(self.complete(pending)))
    }

    async fn complete(mut self, pending: PendingLink) -> Result<Vec<SignOutcome>> {
        let mut established = pending.accept().await?;
        let outcome = self
            .responder
            .respond(&mut established.link, &mut self.txs, self.batch)
            .await;
        established.finish().await;
        outcome
    }
}
