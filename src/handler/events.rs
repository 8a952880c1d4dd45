//! Channel-based event delivery.
//!
//! [`EventForwarder`] implements [`MessageHandler`] by turning every
//! callback into a [`SessionEvent`] on an unbounded mpsc channel, so the
//! presentation layer can consume a session from its own task.

use std::io;
use std::net::SocketAddr;
use std::time::SystemTime;

use tokio::sync::mpsc;

use super::MessageHandler;
use crate::session::SessionState;

/// Events surfaced to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// The channel is open and the session accepts traffic.
    Opened {
        /// Remote address, when the transport knows it.
        peer: Option<SocketAddr>,
    },
    /// A message to display.
    Message {
        /// Sender label (remote or local).
        sender: String,
        /// Message text.
        text: String,
        /// When the message was handed to the presentation layer.
        at: SystemTime,
    },
    /// The poll variant saw an unchanged value and wants the next one.
    RequestNext,
    /// Orderly shutdown from either side.
    Closed,
    /// The peer sent a malformed frame. The session is errored.
    ProtocolError {
        /// What was wrong with the frame.
        reason: String,
    },
    /// Reading from or writing to the channel failed. The session is errored.
    ChannelError {
        /// Kind of the underlying I/O error.
        kind: io::ErrorKind,
        /// The I/O error's message.
        reason: String,
    },
}

impl SessionEvent {
    /// Whether this event ends the session.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionEvent::Closed
                | SessionEvent::ProtocolError { .. }
                | SessionEvent::ChannelError { .. }
        )
    }
}

/// Forwards session callbacks as [`SessionEvent`]s.
#[derive(Debug, Clone)]
pub struct EventForwarder {
    tx: mpsc::UnboundedSender<SessionEvent>,
    peer: Option<SocketAddr>,
}

impl EventForwarder {
    /// Create a forwarder and the receiver its events arrive on.
    pub fn channel(peer: Option<SocketAddr>) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, peer }, rx)
    }

    /// Record the remote address once the channel knows it.
    pub fn set_peer(&mut self, peer: Option<SocketAddr>) {
        self.peer = peer;
    }

    /// Emit an event directly.
    ///
    /// A dropped receiver is not an error; the session keeps running.
    pub fn emit(&self, event: SessionEvent) {
        if self.tx.send(event).is_err() {
            tracing::debug!("Event receiver dropped");
        }
    }

    /// Report a malformed frame.
    pub fn protocol_error(&self, reason: impl Into<String>) {
        self.emit(SessionEvent::ProtocolError {
            reason: reason.into(),
        });
    }

    /// Report a failed read or write, keeping the error kind.
    pub fn channel_error(&self, error: &io::Error) {
        self.emit(SessionEvent::ChannelError {
            kind: error.kind(),
            reason: error.to_string(),
        });
    }
}

impl MessageHandler for EventForwarder {
    fn on_message(&mut self, sender: &str, text: &str) {
        self.emit(SessionEvent::Message {
            sender: sender.to_owned(),
            text: text.to_owned(),
            at: SystemTime::now(),
        });
    }

    fn request_next(&mut self) {
        self.emit(SessionEvent::RequestNext);
    }

    fn on_state_change(&mut self, _from: SessionState, to: SessionState) {
        match to {
            SessionState::Open => self.emit(SessionEvent::Opened { peer: self.peer }),
            SessionState::Closed => self.emit(SessionEvent::Closed),
            // The runtime reports the cause with `protocol_error` or `channel_error`
            SessionState::Idle | SessionState::Connecting | SessionState::Errored => {}
        }
    }
}
