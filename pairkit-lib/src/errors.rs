//! Error types for Pairkit operations.
//!
//! Every failure a pairing session can surface maps onto one variant here,
//! grouped the way callers need to react to them: scan-time problems can be
//! retried by scanning again, everything at or after link negotiation ends
//! the session.

/// Error codes for FFI and UI integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum PairkitErrorCode {
    /// Malformed or mismatched identity token
    Scan = 1000,
    /// Transport layer error
    Transport = 2000,
    /// Neither direct nor relayed connectivity could be established
    Connectivity = 2001,
    /// Remote peer closed the link mid-handshake
    ClosedByPeer = 2002,
    /// Unexpected message type or shape
    Protocol = 3000,
    /// Signature or address verification failed
    Verification = 4000,
    /// Key material refused or failed to sign
    Signing = 4001,
    /// Sponsorship gateway rejected a call
    Gateway = 5000,
    /// Ledger rejected or failed to finalize a transaction
    Ledger = 5001,
    /// Serialization error
    Serialization = 6000,
    /// Invalid configuration
    Config = 7000,
    /// Session cancelled by the caller
    Cancelled = 8000,
    /// Internal/unexpected error
    Internal = 9999,
}

/// Comprehensive error type for pairing operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PairkitError {
    /// The scanned token is malformed or does not match this party.
    #[error("invalid pairing code: {0}")]
    Scan(String),

    /// Transport or channel level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Both the direct and the relayed attempt failed.
    #[error("could not connect to peer: {0}")]
    Connectivity(String),

    /// The link closed before the handshake finished.
    #[error("connection closed by the remote peer")]
    ClosedByPeer,

    /// The peer sent something the handshake does not expect.
    #[error("{0}")]
    Protocol(String),

    /// Signature, public key or address did not verify.
    #[error("verification failed: {0}")]
    Verification(String),

    /// Signing with the held key material failed.
    #[error("signing failed: {0}")]
    Signing(String),

    /// Sponsorship gateway failure.
    #[error("sponsorship gateway error: {0}")]
    Gateway(String),

    /// Ledger execution or finalization failure.
    #[error("ledger error: {0}")]
    Ledger(String),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid configuration value.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// The caller dropped or cancelled the session.
    #[error("pairing cancelled")]
    Cancelled,

    /// Internal/unexpected error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl PairkitError {
    /// Get the error code for FFI/UI integration.
    pub fn code(&self) -> PairkitErrorCode {
        match self {
            Self::Scan(_) => PairkitErrorCode::Scan,
            Self::Transport(_) => PairkitErrorCode::Transport,
            Self::Connectivity(_) => PairkitErrorCode::Connectivity,
            Self::ClosedByPeer => PairkitErrorCode::ClosedByPeer,
            Self::Protocol(_) => PairkitErrorCode::Protocol,
            Self::Verification(_) => PairkitErrorCode::Verification,
            Self::Signing(_) => PairkitErrorCode::Signing,
            Self::Gateway(_) => PairkitErrorCode::Gateway,
            Self::Ledger(_) => PairkitErrorCode::Ledger,
            Self::Serialization(_) => PairkitErrorCode::Serialization,
            Self::Config(_) => PairkitErrorCode::Config,
            Self::Cancelled => PairkitErrorCode::Cancelled,
            Self::Internal(_) => PairkitErrorCode::Internal,
        }
    }

    /// Get the error message as an owned String (useful for FFI).
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Returns true if the user can fix this by scanning again.
    ///
    /// Everything past the scan ends the session: the caller has to show a
    /// new code.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Scan(_))
    }

    /// Protocol violation for a message tag the current state does not accept.
    pub fn unknown_message_type(tag: impl AsRef<str>) -> Self {
        Self::Protocol(format!("unknown message type: {}", tag.as_ref()))
    }
}

impl From<serde_json::Error> for PairkitError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<base64::DecodeError> for PairkitError {
    fn from(err: base64::DecodeError) -> Self {
        Self::Serialization(format!("invalid base64: {}", err))
    }
}
