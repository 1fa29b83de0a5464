//! Shared error type across opamp crates.

use std::time::Duration;

use thiserror::Error;

/// Stable error classification (used in logs and by embedders).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection refused, timeout, DNS failure.
    Transport,
    /// Server asked us to come back later (429/503).
    Backpressure,
    /// Any other non-200 status.
    Protocol,
    /// Local serialization failure.
    Encoding,
    /// Malformed response body.
    Decoding,
    /// Cooperative cancellation.
    Cancelled,
    /// Invalid settings or config file.
    Config,
    /// Lifecycle misuse (start twice, setter after start, ...).
    State,
    /// Internal error.
    Internal,
}

impl ErrorKind {
    /// String representation used in structured logs.
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::Transport => "TRANSPORT",
            ErrorKind::Backpressure => "BACKPRESSURE",
            ErrorKind::Protocol => "PROTOCOL",
            ErrorKind::Encoding => "ENCODING",
            ErrorKind::Decoding => "DECODING",
            ErrorKind::Cancelled => "CANCELLED",
            ErrorKind::Config => "CONFIG",
            ErrorKind::State => "STATE",
            ErrorKind::Internal => "INTERNAL",
        }
    }

    /// Whether the round-trip retry loop keeps going after this kind.
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorKind::Transport | ErrorKind::Backpressure)
    }
}

/// Shared result type.
pub type Result<T> = std::result::Result<T, OpampError>;

/// Unified error type used by core and agent.
#[derive(Debug, Error)]
pub enum OpampError {
    #[error("transport: {0}")]
    Transport(String),
    #[error("server response code={status}")]
    Backpressure {
        status: u16,
        retry_after: Option<Duration>,
    },
    #[error("invalid response from server: {status}")]
    Protocol { status: u16 },
    #[error("encode failed: {0}")]
    Encoding(String),
    #[error("decode failed: {0}")]
    Decoding(String),
    #[error("client is stopped")]
    Cancelled,
    #[error("config: {0}")]
    Config(String),
    #[error("client already started")]
    AlreadyStarted,
    #[error("client not started")]
    NotStarted,
    #[error("internal: {0}")]
    Internal(String),
}

impl OpampError {
    /// Map to a stable classification.
    pub fn kind(&self) -> ErrorKind {
        match self {
            OpampError::Transport(_) => ErrorKind::Transport,
            OpampError::Backpressure { .. } => ErrorKind::Backpressure,
            OpampError::Protocol { .. } => ErrorKind::Protocol,
            OpampError::Encoding(_) => ErrorKind::Encoding,
            OpampError::Decoding(_) => ErrorKind::Decoding,
            OpampError::Cancelled => ErrorKind::Cancelled,
            OpampError::Config(_) => ErrorKind::Config,
            OpampError::AlreadyStarted | OpampError::NotStarted => ErrorKind::State,
            OpampError::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}
