//! Link establishment with direct-to-relay fallback.
//!
//! The Initiator dials the Host's address in default mode first. If nothing
//! opens within the open timeout, or the direct attempt reports an error, it
//! retires that transport and dials once more relay-only. The first link
//! the live attempt opens wins. Links the retired direct attempt still
//! delivers, and any arriving after the winner, are closed unused.
//!
//! The Host listens on its address and hands the first inbound link to the
//! handshake. Later inbound links are closed as they arrive.

use std::sync::Arc;
use std::time::Duration;

use pairkit_lib::{IceConfig, PairkitError, Result};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::time::Instant;

use crate::transport::{
    Link, LinkChannel, Transport, TransportEvent, TransportGuard, TransportMode,
};

/// Which attempt produced a link.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    Direct,
    Relay,
}

impl Phase {
    fn mode(self) -> TransportMode {
        match self {
            Phase::Direct => TransportMode::Default,
            Phase::Relay => TransportMode::RelayOnly,
        }
    }
}

/// An open link together with the transport that carries it.
///
/// Dropping it destroys the transport.
pub struct EstablishedLink {
    pub link: Link,
    phase: Option<Phase>,
    guard: TransportGuard,
}

impl EstablishedLink {
    /// The dialing phase that won; `None` on the listening side.
    pub fn phase(&self) -> Option<Phase> {
        self.phase
    }

    /// Close the link and destroy its transport.
    pub async fn finish(mut self) {
        self.link.close().await;
        self.guard.destroy();
    }
}

/// A bound listener waiting for its first peer.
pub struct PendingLink {
    guard: TransportGuard,
    events: UnboundedReceiver<TransportEvent>,
}

impl PendingLink {
    /// Wait for the first inbound link.
    ///
    /// Links arriving afterwards are closed immediately.
    pub async fn accept(mut self) -> Result<EstablishedLink> {
        match self.events.recv().await {
            Some(TransportEvent::Open(channel)) => {
                tracing::info!("peer connected");
                tokio::spawn(close_late_links(self.events));
                Ok(EstablishedLink {
                    link: Link::new(channel),
                    phase: None,
                    guard: self.guard,
                })
            }
            Some(TransportEvent::Error(reason)) => {
                tracing::warn!("listener failed: {}", reason);
                Err(PairkitError::Connectivity(reason))
            }
            Some(TransportEvent::Closed) | None => Err(PairkitError::Connectivity(
                "transport closed before a peer connected".into(),
            )),
        }
    }
}

struct Attempt {
    guard: TransportGuard,
    events: Option<UnboundedReceiver<TransportEvent>>,
}

enum Step {
    Opened(Box<dyn LinkChannel>),
    Failed(String),
    Ended,
}

/// Establishes links over a [`Transport`].
#[derive(Clone)]
pub struct Negotiator {
    transport: Arc<dyn Transport>,
    open_timeout: Duration,
}

impl Negotiator {
    pub fn new(transport: Arc<dyn Transport>, open_timeout: Duration) -> Self {
        Self {
            transport,
            open_timeout,
        }
    }

    pub fn open_timeout(&self) -> Duration {
        self.open_timeout
    }

    /// Bind a listener under `address`.
    #[tracing::instrument(skip(self, ice))]
    pub async fn listen(&self, address: &str, ice: &IceConfig) -> Result<PendingLink> {
        let session = self
            .transport
            .listen(address, ice)
            .await
            .map_err(|e| PairkitError::Connectivity(e.to_string()))?;

        Ok(PendingLink {
            guard: TransportGuard::new(session.handle),
            events: session.events,
        })
    }

    /// Dial `address`, falling back to a relay-only attempt at most once.
    ///
    /// Only one attempt is live at a time. Starting the fallback retires the
    /// direct attempt, so a direct link opening after that is closed unused.
    #[tracing::instrument(skip(self, ice))]
    pub async fn dial(&self, address: &str, ice: &IceConfig) -> Result<EstablishedLink> {
        let mut phase = Phase::Direct;
        let mut attempt = None;
        let mut failure = None;

        match self.start(address, ice, Phase::Direct).await {
            Ok(started) => attempt = Some(started),
            Err(e) => failure = Some(e.to_string()),
        }

        let deadline = tokio::time::sleep(self.open_timeout);
        tokio::pin!(deadline);

        loop {
            if let Some(reason) = failure.take() {
                if phase == Phase::Relay {
                    return Err(give_up(reason, attempt));
                }

                tracing::info!("direct attempt failed, falling back to relay: {}", reason);
                phase = Phase::Relay;
                retire(attempt.take());
                match self.start(address, &ice.relay_only(), Phase::Relay).await {
                    Ok(started) => attempt = Some(started),
                    Err(e) => return Err(give_up(e.to_string(), None)),
                }
                deadline.as_mut().reset(Instant::now() + self.open_timeout);
                continue;
            }

            let step = tokio::select! {
                event = next_event(&mut attempt) => classify(phase, event),
                _ = &mut deadline => Step::Failed(format!(
                    "no link opened within {}ms",
                    self.open_timeout.as_millis()
                )),
            };

            match step {
                Step::Opened(channel) => {
                    let Some(mut winner) = attempt.take() else {
                        return Err(PairkitError::Internal("winning attempt vanished".into()));
                    };
                    if let Some(events) = winner.events.take() {
                        tokio::spawn(close_late_links(events));
                    }

                    tracing::info!(phase = ?phase, "link established");
                    return Ok(EstablishedLink {
                        link: Link::new(channel),
                        phase: Some(phase),
                        guard: winner.guard,
                    });
                }
                Step::Failed(reason) => failure = Some(reason),
                Step::Ended => {
                    if let Some(attempt) = &mut attempt {
                        attempt.events = None;
                    }
                    failure = Some("transport closed before a link opened".into());
                }
            }
        }
    }

    async fn start(&self, address: &str, ice: &IceConfig, phase: Phase) -> Result<Attempt> {
        tracing::debug!(phase = ?phase, "dialing");
        let session = self.transport.dial(address, ice, phase.mode()).await?;
        Ok(Attempt {
            guard: TransportGuard::new(session.handle),
            events: Some(session.events),
        })
    }
}

fn classify(phase: Phase, event: Option<TransportEvent>) -> Step {
    match event {
        Some(TransportEvent::Open(channel)) => Step::Opened(channel),
        Some(TransportEvent::Error(reason)) => {
            tracing::debug!(phase = ?phase, "attempt failed: {}", reason);
            Step::Failed(reason)
        }
        Some(TransportEvent::Closed) => Step::Failed("transport closed".into()),
        None => Step::Ended,
    }
}

async fn next_event(attempt: &mut Option<Attempt>) -> Option<TransportEvent> {
    match attempt.as_mut().and_then(|a| a.events.as_mut()) {
        Some(events) => events.recv().await,
        None => std::future::pending().await,
    }
}

/// Destroy an attempt's transport and close whatever it still delivers.
fn retire(attempt: Option<Attempt>) {
    if let Some(mut attempt) = attempt {
        attempt.guard.destroy();
        if let Some(events) = attempt.events.take() {
            tokio::spawn(close_late_links(events));
        }
    }
}

fn give_up(reason: String, attempt: Option<Attempt>) -> PairkitError {
    tracing::warn!("could not establish a link: {}", reason);
    retire(attempt);
    PairkitError::Connectivity(reason)
}

async fn close_late_links(mut events: UnboundedReceiver<TransportEvent>) {
    while let Some(event) = events.recv().await {
        if let TransportEvent::Open(mut channel) = event {
            tracing::debug!("closing late link");
            channel.close().await;
        }
    }
}
