//! Pairkit Interactive Layer
//!
//! This crate runs the two-party part of remote pairing: it negotiates a
//! link between the key-holding Initiator and the dApp Host, then drives the
//! login or sign/execute handshake over it.
//!
//! # Overview
//!
//! - [`transport`]: the transport seam, link channels and the in-memory transport
//! - [`negotiator`]: direct dial with a single relay-only fallback
//! - [`login`] / [`sign`]: the handshake state machines
//! - [`session`]: [`PairingInitiator`] and [`PairingHost`], the caller API
//!
//! ```rust,ignore
//! let transport = Arc::new(MemoryTransport::new());
//! let host = PairingHost::new(PairingConfig::default(), transport.clone());
//! let session = host.login_session();
//! let qr = session.qr_payload();
//! let pending = session.spawn().await?;
//!
//! let initiator = PairingInitiator::new(PairingConfig::default(), transport, signer);
//! let login = initiator.run_login(&qr).await?;
//! assert_eq!(pending.wait().await?, login);
//! ```

pub mod login;
pub mod message;
pub mod negotiator;
pub mod session;
pub mod sign;
pub mod transport;

pub use login::LoginOutcome;
pub use message::{Message, STEP_0, STEP_1, STEP_2};
pub use negotiator::{EstablishedLink, Negotiator, PendingLink, Phase};
pub use session::{LoginSession, PairingHandle, PairingHost, PairingInitiator, SignSession};
pub use sign::{SignOutcome, SignResponder};
pub use transport::{
    Fault, Link, LinkChannel, MemoryTransport, StreamChannel, Transport, TransportEvent,
    TransportGuard, TransportHandle, TransportMode, TransportSession,
};

pub use pairkit_lib::{PairkitError, Result};
