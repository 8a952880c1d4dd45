//! Stream session - one duplex channel turned into a stream of messages.
//!
//! A [`Session`] owns the receive buffer for one connection, drives the
//! frame decoder on every incoming chunk and hands complete messages to a
//! [`MessageHandler`]. Outgoing text is framed and written to a
//! [`FrameSink`] as one contiguous frame.
//!
//! The session does no I/O of its own and is not thread-safe; callers feed
//! it events one at a time.
//!
//! ```text
//! Idle ──► Connecting ──► Open ──┬──► Closed
//!   └──────────────────────┘     └──► Errored
//! ```
//!
//! # Example
//!
//! ```
//! use std::sync::{Arc, Mutex};
//!
//! use bytes::Bytes;
//! use chatwire::handler::MessageHandler;
//! use chatwire::protocol::encode;
//! use chatwire::session::{FrameSink, Session, SessionConfig};
//!
//! #[derive(Default)]
//! struct Lines(Vec<String>);
//!
//! impl MessageHandler for Lines {
//!     fn on_message(&mut self, sender: &str, text: &str) {
//!         self.0.push(format!("{sender}: {text}"));
//!     }
//! }
//!
//! let sent: Arc<Mutex<Vec<Bytes>>> = Arc::default();
//! let mut session = Session::new(SessionConfig::default(), sent.clone(), Lines::default());
//! session.on_open().unwrap();
//!
//! session.on_bytes_received(&encode("hello").unwrap()).unwrap();
//! session.send("hi there").unwrap();
//!
//! assert_eq!(session.handler().0, vec!["Server: hello", "You: hi there"]);
//! assert_eq!(sent.lock().unwrap().len(), 1);
//! ```

mod config;
mod message;

pub use config::{SessionConfig, Variant, DEFAULT_LOCAL_LABEL, DEFAULT_REMOTE_LABEL};
pub use message::OutgoingMessage;

use std::fmt;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::error::{ChatwireError, Result};
use crate::handler::MessageHandler;
use crate::protocol::{encode_with_limit, FrameBuffer};

/// Destination for encoded frames.
///
/// Each call carries exactly one whole frame. Implementations must never
/// interleave the bytes of two frames.
pub trait FrameSink {
    /// Write (or enqueue) one frame.
    fn write_frame(&self, frame: Bytes) -> Result<()>;
}

/// Collects frames in memory. Handy for tests and offline encoding.
impl FrameSink for Arc<Mutex<Vec<Bytes>>> {
    fn write_frame(&self, frame: Bytes) -> Result<()> {
        self.lock()
            .map_err(|_| ChatwireError::ConnectionClosed)?
            .push(frame);
        Ok(())
    }
}

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// Created, no channel activity yet.
    Idle,
    /// Channel is being opened.
    Connecting,
    /// Channel is open; bytes flow both ways.
    Open,
    /// Orderly shutdown from either side. Terminal.
    Closed,
    /// Channel error or protocol violation. Terminal.
    Errored,
}

impl SessionState {
    /// Whether no further transitions are possible.
    #[inline]
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionState::Closed | SessionState::Errored)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Idle => "idle",
            SessionState::Connecting => "connecting",
            SessionState::Open => "open",
            SessionState::Closed => "closed",
            SessionState::Errored => "errored",
        };
        f.write_str(name)
    }
}

/// One connection's framing state.
pub struct Session<S, H> {
    config: SessionConfig,
    sink: S,
    handler: H,
    buffer: FrameBuffer,
    state: SessionState,
    /// Last value shown by the poll variant.
    last_displayed: Option<String>,
}

impl<S: FrameSink, H: MessageHandler> Session<S, H> {
    /// Create an idle session.
    pub fn new(config: SessionConfig, sink: S, handler: H) -> Self {
        let buffer = FrameBuffer::with_max_payload(config.max_payload_size);
        Self {
            config,
            sink,
            handler,
            buffer,
            state: SessionState::Idle,
            last_displayed: None,
        }
    }

    /// Current lifecycle state.
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Whether `send` and `on_bytes_received` are currently allowed.
    #[inline]
    pub fn is_open(&self) -> bool {
        self.state == SessionState::Open
    }

    /// Session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The handler messages are delivered to.
    pub fn handler(&self) -> &H {
        &self.handler
    }

    /// Mutable access to the handler.
    pub fn handler_mut(&mut self) -> &mut H {
        &mut self.handler
    }

    /// The sink frames are written to.
    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Bytes received but not yet resolved into messages.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    /// Value the poll variant will suppress next, if any.
    pub fn last_displayed(&self) -> Option<&str> {
        self.last_displayed.as_deref()
    }

    /// Idle -> Connecting.
    pub fn begin_connect(&mut self) -> Result<()> {
        self.require(SessionState::Idle, "connect")?;
        self.transition(SessionState::Connecting);
        Ok(())
    }

    /// Idle | Connecting -> Open.
    pub fn on_open(&mut self) -> Result<()> {
        match self.state {
            SessionState::Idle | SessionState::Connecting => {
                self.transition(SessionState::Open);
                Ok(())
            }
            state => Err(ChatwireError::InvalidState {
                operation: "open",
                state,
            }),
        }
    }

    /// Orderly shutdown from either side.
    ///
    /// Ignored once the session is already closed or errored.
    pub fn on_closed(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        if !self.buffer.is_empty() {
            tracing::debug!(
                "Closing with {} undecoded bytes buffered",
                self.buffer.len()
            );
        }
        self.transition(SessionState::Closed);
    }

    /// The channel failed.
    ///
    /// Ignored once the session is already closed or errored.
    pub fn on_channel_error(&mut self, error: &std::io::Error) {
        if self.state.is_terminal() {
            return;
        }
        tracing::warn!("Channel error: {}", error);
        self.transition(SessionState::Errored);
    }

    /// Feed newly arrived bytes and deliver every complete message.
    ///
    /// Returns the number of messages decoded from the buffer. Messages
    /// preceding a malformed frame are still delivered, in order.
    ///
    /// # Errors
    ///
    /// - [`ChatwireError::InvalidState`] unless the session is open.
    /// - A protocol error on a malformed frame. The session is then
    ///   [`SessionState::Errored`].
    pub fn on_bytes_received(&mut self, chunk: &[u8]) -> Result<usize> {
        self.require(SessionState::Open, "receive bytes")?;
        self.buffer.extend(chunk);

        let mut decoded = 0;
        loop {
            match self.buffer.next_message() {
                Ok(Some(message)) => {
                    decoded += 1;
                    self.deliver(message);
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::error!("Protocol error: {}", e);
                    self.transition(SessionState::Errored);
                    return Err(e);
                }
            }
        }

        if decoded > 0 {
            tracing::debug!(
                "Decoded {} message(s), {} bytes still buffered",
                decoded,
                self.buffer.len()
            );
        }
        Ok(decoded)
    }

    /// Send text under the configured local label.
    ///
    /// Returns `Ok(false)` without writing anything if `text` is empty.
    pub fn send(&mut self, text: &str) -> Result<bool> {
        let message = OutgoingMessage::new(self.config.local_label.as_str(), text);
        self.submit(message)
    }

    /// Frame and write an outgoing message.
    ///
    /// Returns `Ok(false)` without writing anything if the message is empty.
    ///
    /// # Errors
    ///
    /// - [`ChatwireError::InvalidState`] unless the session is open.
    /// - [`ChatwireError::MessageTooLarge`] if the text exceeds the cap.
    /// - Any error from the sink.
    pub fn submit(&mut self, message: OutgoingMessage) -> Result<bool> {
        self.require(SessionState::Open, "send")?;
        if message.is_empty() {
            return Ok(false);
        }

        let frame = encode_with_limit(message.text(), self.config.max_payload_size)?;
        tracing::debug!("Sending frame of {} bytes", frame.len());
        self.sink.write_frame(frame)?;

        if self.config.local_echo {
            self.handler.on_message(message.sender(), message.text());
        }
        Ok(true)
    }

    fn deliver(&mut self, message: String) {
        match self.config.variant {
            Variant::Broadcast => {
                self.handler.on_message(&self.config.remote_label, &message);
            }
            Variant::DedupPoll => {
                if self.last_displayed.as_deref() == Some(message.as_str()) {
                    tracing::debug!("Unchanged value, requesting next");
                    self.handler.request_next();
                } else {
                    self.handler.on_message(&self.config.remote_label, &message);
                    self.last_displayed = Some(message);
                }
            }
        }
    }

    fn require(&self, expected: SessionState, operation: &'static str) -> Result<()> {
        if self.state != expected {
            return Err(ChatwireError::InvalidState {
                operation,
                state: self.state,
            });
        }
        Ok(())
    }

    fn transition(&mut self, to: SessionState) {
        let from = self.state;
        self.state = to;
        if to.is_terminal() {
            self.buffer.clear();
        }
        tracing::debug!("Session {} -> {}", from, to);
        self.handler.on_state_change(from, to);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{encode, encode_prefix, PREFIX_SIZE};
    use proptest::prelude::*;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Call {
        Message(String, String),
        RequestNext,
        State(SessionState, SessionState),
    }

    #[derive(Default)]
    struct Recorder(Vec<Call>);

    impl Recorder {
        fn messages(&self) -> Vec<&str> {
            self.0
                .iter()
                .filter_map(|c| match c {
                    Call::Message(_, text) => Some(text.as_str()),
                    _ => None,
                })
                .collect()
        }
    }

    impl MessageHandler for Recorder {
        fn on_message(&mut self, sender: &str, text: &str) {
            self.0.push(Call::Message(sender.to_owned(), text.to_owned()));
        }

        fn request_next(&mut self) {
            self.0.push(Call::RequestNext);
        }

        fn on_state_change(&mut self, from: SessionState, to: SessionState) {
            self.0.push(Call::State(from, to));
        }
    }

    type Sent = Arc<Mutex<Vec<Bytes>>>;

    fn open_session(config: SessionConfig) -> (Session<Sent, Recorder>, Sent) {
        let sent = Sent::default();
        let mut session = Session::new(config, sent.clone(), Recorder::default());
        session.on_open().unwrap();
        session.handler_mut().0.clear();
        (session, sent)
    }

    fn poll_config() -> SessionConfig {
        SessionConfig {
            variant: Variant::DedupPoll,
            ..SessionConfig::default()
        }
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut session = Session::new(SessionConfig::default(), Sent::default(), Recorder::default());
        assert_eq!(session.state(), SessionState::Idle);

        session.begin_connect().unwrap();
        session.on_open().unwrap();
        session.on_closed();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(
            session.handler().0,
            vec![
                Call::State(SessionState::Idle, SessionState::Connecting),
                Call::State(SessionState::Connecting, SessionState::Open),
                Call::State(SessionState::Open, SessionState::Closed),
            ]
        );
    }

    #[test]
    fn test_terminal_states_are_final() {
        let (mut session, _) = open_session(SessionConfig::default());
        session.on_closed();
        session.on_channel_error(&std::io::Error::other("late"));
        session.on_closed();

        assert_eq!(session.state(), SessionState::Closed);
        assert_eq!(session.handler().0.len(), 1);
        assert!(session.on_open().is_err());
    }

    #[test]
    fn test_channel_error_transitions_to_errored() {
        let (mut session, _) = open_session(SessionConfig::default());
        session.on_channel_error(&std::io::Error::from(std::io::ErrorKind::ConnectionReset));
        assert_eq!(session.state(), SessionState::Errored);
    }

    #[test]
    fn test_begin_connect_only_from_idle() {
        let (mut session, _) = open_session(SessionConfig::default());
        let result = session.begin_connect();
        assert!(matches!(
            result,
            Err(ChatwireError::InvalidState {
                operation: "connect",
                state: SessionState::Open
            })
        ));
    }

    #[test]
    fn test_receive_requires_open() {
        let mut session = Session::new(SessionConfig::default(), Sent::default(), Recorder::default());
        let result = session.on_bytes_received(&encode("early").unwrap());
        assert!(matches!(result, Err(ChatwireError::InvalidState { .. })));
        assert_eq!(session.buffered_len(), 0);
    }

    #[test]
    fn test_send_requires_open() {
        let sent = Sent::default();
        let mut session = Session::new(SessionConfig::default(), sent.clone(), Recorder::default());
        session.begin_connect().unwrap();

        let result = session.send("too soon");
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Cannot send while session is connecting"));
        assert!(sent.lock().unwrap().is_empty());
    }

    #[test]
    fn test_hello_delivered_after_final_byte() {
        let (mut session, _) = open_session(SessionConfig::default());
        let frame = encode("hello").unwrap();

        assert_eq!(session.on_bytes_received(&frame[..PREFIX_SIZE]).unwrap(), 0);
        for i in PREFIX_SIZE..frame.len() - 1 {
            assert_eq!(session.on_bytes_received(&frame[i..i + 1]).unwrap(), 0);
            assert!(session.handler().0.is_empty());
        }
        assert_eq!(session.on_bytes_received(&frame[frame.len() - 1..]).unwrap(), 1);

        assert_eq!(
            session.handler().0,
            vec![Call::Message("Server".into(), "hello".into())]
        );
        assert_eq!(session.buffered_len(), 0);
    }

    #[test]
    fn test_two_frames_in_one_chunk() {
        let (mut session, _) = open_session(SessionConfig::default());
        let mut chunk = encode("a").unwrap().to_vec();
        chunk.extend_from_slice(&encode("bb").unwrap());

        assert_eq!(session.on_bytes_received(&chunk).unwrap(), 2);
        assert_eq!(session.handler().messages(), vec!["a", "bb"]);
        assert_eq!(session.buffered_len(), 0);
    }

    #[test]
    fn test_oversized_frame_is_fatal() {
        let mut config = SessionConfig::default();
        config.max_payload_size = 16;
        let (mut session, _) = open_session(config);

        let mut chunk = encode("ok").unwrap().to_vec();
        chunk.extend_from_slice(&encode_prefix(17));

        let result = session.on_bytes_received(&chunk);
        assert!(result.unwrap_err().is_protocol());
        assert_eq!(session.state(), SessionState::Errored);
        // The frame before the bad one was still delivered
        assert_eq!(session.handler().messages(), vec!["ok"]);

        let again = session.on_bytes_received(&encode("after").unwrap());
        assert!(matches!(again, Err(ChatwireError::InvalidState { .. })));
    }

    #[test]
    fn test_invalid_utf8_is_fatal() {
        let (mut session, _) = open_session(SessionConfig::default());
        let mut chunk = encode_prefix(1).to_vec();
        chunk.push(0xFF);

        assert!(session.on_bytes_received(&chunk).is_err());
        assert_eq!(session.state(), SessionState::Errored);
    }

    #[test]
    fn test_send_writes_one_frame_and_echoes() {
        let (mut session, sent) = open_session(SessionConfig::default());

        assert!(session.send("salut").unwrap());

        let frames = sent.lock().unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0], encode("salut").unwrap());
        assert_eq!(
            session.handler().0,
            vec![Call::Message("You".into(), "salut".into())]
        );
    }

    #[test]
    fn test_send_empty_is_noop() {
        let (mut session, sent) = open_session(SessionConfig::default());

        assert!(!session.send("").unwrap());
        assert!(sent.lock().unwrap().is_empty());
        assert!(session.handler().0.is_empty());
    }

    #[test]
    fn test_send_without_local_echo() {
        let mut config = SessionConfig::default();
        config.local_echo = false;
        let (mut session, sent) = open_session(config);

        session.send("quiet").unwrap();
        assert_eq!(sent.lock().unwrap().len(), 1);
        assert!(session.handler().0.is_empty());
    }

    #[test]
    fn test_send_too_large() {
        let mut config = SessionConfig::default();
        config.max_payload_size = 3;
        let (mut session, sent) = open_session(config);

        let result = session.send("four");
        assert!(matches!(result, Err(ChatwireError::MessageTooLarge { .. })));
        assert!(sent.lock().unwrap().is_empty());
        // Local failures do not end the session
        assert!(session.is_open());
    }

    #[test]
    fn test_submit_uses_message_sender() {
        let (mut session, _) = open_session(SessionConfig::default());
        session
            .submit(OutgoingMessage::new("<LOGS>", "note"))
            .unwrap();
        assert_eq!(
            session.handler().0,
            vec![Call::Message("<LOGS>".into(), "note".into())]
        );
    }

    #[test]
    fn test_broadcast_displays_duplicates() {
        let (mut session, _) = open_session(SessionConfig::default());
        session.on_bytes_received(&encode("same").unwrap()).unwrap();
        session.on_bytes_received(&encode("same").unwrap()).unwrap();

        assert_eq!(session.handler().messages(), vec!["same", "same"]);
        assert!(session.last_displayed().is_none());
    }

    #[test]
    fn test_dedup_poll_suppresses_unchanged_value() {
        let (mut session, _) = open_session(poll_config());

        session.on_bytes_received(&encode("fortune 1").unwrap()).unwrap();
        session.on_bytes_received(&encode("fortune 1").unwrap()).unwrap();
        session.on_bytes_received(&encode("fortune 2").unwrap()).unwrap();

        assert_eq!(
            session.handler().0,
            vec![
                Call::Message("Server".into(), "fortune 1".into()),
                Call::RequestNext,
                Call::Message("Server".into(), "fortune 2".into()),
            ]
        );
        assert_eq!(session.last_displayed(), Some("fortune 2"));
    }

    #[test]
    fn test_dedup_poll_ignores_local_echo() {
        let (mut session, _) = open_session(poll_config());

        session.send("ping").unwrap();
        session.on_bytes_received(&encode("ping").unwrap()).unwrap();

        assert_eq!(
            session.handler().0,
            vec![
                Call::Message("You".into(), "ping".into()),
                Call::Message("Server".into(), "ping".into()),
            ]
        );
    }

    #[test]
    fn test_dedup_poll_within_one_chunk() {
        let (mut session, _) = open_session(poll_config());
        let mut chunk = Vec::new();
        for text in ["x", "x", "x", "y"] {
            chunk.extend_from_slice(&encode(text).unwrap());
        }

        assert_eq!(session.on_bytes_received(&chunk).unwrap(), 4);
        assert_eq!(
            session.handler().0,
            vec![
                Call::Message("Server".into(), "x".into()),
                Call::RequestNext,
                Call::RequestNext,
                Call::Message("Server".into(), "y".into()),
            ]
        );
    }

    #[test]
    fn test_close_drops_buffered_bytes() {
        let (mut session, _) = open_session(SessionConfig::default());
        session.on_bytes_received(&encode("partial").unwrap()[..6]).unwrap();
        assert_eq!(session.buffered_len(), 6);

        session.on_closed();
        assert_eq!(session.buffered_len(), 0);
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Open.to_string(), "open");
        assert_eq!(SessionState::Errored.to_string(), "errored");
    }

    proptest! {
        #[test]
        fn prop_messages_arrive_in_order_across_any_split(
            texts in prop::collection::vec("\\PC{1,32}", 1..6),
            cuts in prop::collection::vec(any::<prop::sample::Index>(), 0..12),
        ) {
            let mut stream = Vec::new();
            for text in &texts {
                stream.extend_from_slice(&encode(text).unwrap());
            }
            let mut points: Vec<usize> = cuts.iter().map(|i| i.index(stream.len())).collect();
            points.push(0);
            points.push(stream.len());
            points.sort_unstable();
            points.dedup();

            let (mut session, _) = open_session(SessionConfig::default());
            let mut decoded = 0;
            for window in points.windows(2) {
                decoded += session.on_bytes_received(&stream[window[0]..window[1]]).unwrap();
            }

            prop_assert_eq!(decoded, texts.len());
            prop_assert_eq!(session.handler().messages(), texts.iter().map(String::as_str).collect::<Vec<_>>());
            prop_assert_eq!(session.buffered_len(), 0);
            prop_assert_eq!(session.state(), SessionState::Open);
        }
    }
}
