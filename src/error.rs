//! Error types for chatwire.

use thiserror::Error;

use crate::session::SessionState;

/// Main error type for all chatwire operations.
#[derive(Debug, Error)]
pub enum ChatwireError {
    /// I/O error during socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error while loading configuration.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Protocol error (malformed frame, invalid payload).
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A peer declared a payload larger than the configured cap.
    #[error("Payload size {declared} exceeds maximum {max}")]
    PayloadTooLarge { declared: u32, max: u32 },

    /// An outgoing message is too large to be framed.
    #[error("Message of {len} bytes exceeds maximum {max}")]
    MessageTooLarge { len: usize, max: u32 },

    /// Operation is not valid in the session's current state.
    #[error("Cannot {operation} while session is {state}")]
    InvalidState {
        operation: &'static str,
        state: SessionState,
    },

    /// Connection closed unexpectedly.
    #[error("Connection closed")]
    ConnectionClosed,

    /// Writer queue is full.
    #[error("Writer queue is full")]
    WriterBusy,
}

impl ChatwireError {
    /// Whether this error means the peer violated the wire protocol.
    pub fn is_protocol(&self) -> bool {
        matches!(
            self,
            ChatwireError::Protocol(_) | ChatwireError::PayloadTooLarge { .. }
        )
    }
}

/// Result type alias using ChatwireError.
pub type Result<T> = std::result::Result<T, ChatwireError>;
