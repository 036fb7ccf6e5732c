//! The transport seam.
//!
//! A [`Transport`] creates listening or dialing sessions keyed by a dial
//! address. Each session reports what happens to it on a single-consumer
//! event stream: a channel opening, an error, or the session closing. The
//! party that creates a session owns it and destroys it through its
//! [`TransportHandle`]; [`TransportGuard`] does that on drop.

use std::sync::Arc;

use async_trait::async_trait;
use pairkit_lib::{IceConfig, PairkitError, Result};
use tokio::sync::mpsc;

use crate::message::Message;

pub mod memory;
pub mod stream;

pub use memory::{Fault, MemoryTransport};
pub use stream::StreamChannel;

/// Candidate selection for a dialing session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportMode {
    /// Direct candidates first, relay allowed.
    Default,
    /// Relayed candidates only.
    RelayOnly,
}

/// An open bidirectional channel carrying text frames.
#[async_trait]
pub trait LinkChannel: Send {
    async fn send(&mut self, frame: String) -> Result<()>;

    /// Next frame, or `None` once the peer has closed.
    async fn recv(&mut self) -> Result<Option<String>>;

    /// Close the channel. Closing twice is a no-op.
    async fn close(&mut self);
}

/// Something that happened to a transport session.
pub enum TransportEvent {
    Open(Box<dyn LinkChannel>),
    Error(String),
    Closed,
}

impl std::fmt::Debug for TransportEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open(_) => f.write_str("Open"),
            Self::Error(reason) => f.debug_tuple("Error").field(reason).finish(),
            Self::Closed => f.write_str("Closed"),
        }
    }
}

/// Owner's handle on a transport session.
pub trait TransportHandle: Send + Sync {
    /// Tear the session down. Destroying twice is a no-op.
    fn destroy(&self);

    fn is_destroyed(&self) -> bool;
}

/// A live transport session.
pub struct TransportSession {
    pub handle: Arc<dyn TransportHandle>,
    pub events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// Factory for transport sessions.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Accept inbound channels under `address`.
    async fn listen(&self, address: &str, ice: &IceConfig) -> Result<TransportSession>;

    /// Open a channel to whoever listens under `address`.
    async fn dial(
        &self,
        address: &str,
        ice: &IceConfig,
        mode: TransportMode,
    ) -> Result<TransportSession>;
}

/// Destroys a transport session when dropped.
pub struct TransportGuard {
    handle: Arc<dyn TransportHandle>,
}

impl TransportGuard {
    pub fn new(handle: Arc<dyn TransportHandle>) -> Self {
        Self { handle }
    }

    pub fn destroy(&self) {
        self.handle.destroy();
    }
}

impl Drop for TransportGuard {
    fn drop(&mut self) {
        self.handle.destroy();
    }
}

/// A channel speaking handshake [`Message`]s.
pub struct Link {
    channel: Box<dyn LinkChannel>,
    closed: bool,
}

impl Link {
    pub fn new(channel: Box<dyn LinkChannel>) -> Self {
        Self {
            channel,
            closed: false,
        }
    }

    pub async fn send(&mut self, message: &Message) -> Result<()> {
        if self.closed {
            return Err(PairkitError::Transport("link is closed".into()));
        }
        tracing::debug!(kind = %message.kind, "sending message");
        self.channel.send(message.to_frame()?).await
    }

    /// Next message, or `None` once the peer has closed.
    pub async fn recv(&mut self) -> Result<Option<Message>> {
        if self.closed {
            return Ok(None);
        }
        match self.channel.recv().await? {
            Some(frame) => {
                let message = Message::parse(&frame)?;
                tracing::debug!(kind = %message.kind, "received message");
                Ok(Some(message))
            }
            None => Ok(None),
        }
    }

    /// Next message; a closed link is [`PairkitError::ClosedByPeer`].
    pub async fn expect_message(&mut self) -> Result<Message> {
        self.recv().await?.ok_or(PairkitError::ClosedByPeer)
    }

    pub async fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.channel.close().await;
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl From<Box<dyn LinkChannel>> for Link {
    fn from(channel: Box<dyn LinkChannel>) -> Self {
        Self::new(channel)
    }
}
