//! Client builder and runtime loop.
//!
//! The [`ClientBuilder`] provides a fluent API for configuring a session.
//! The [`Client`] manages the lifecycle:
//! 1. Open (or adopt) the byte-stream channel
//! 2. Spawn the writer task on the write half
//! 3. Read chunks and feed them to the [`Session`], and watch the writer
//!    for a failed write
//! 4. Surface everything as [`SessionEvent`]s
//!
//! # Example
//!
//! ```ignore
//! use chatwire::{Client, SessionEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let (client, mut events) = Client::builder()
//!         .remote_label("Serveur")
//!         .connect("localhost", 4242)
//!         .await?;
//!
//!     client.send("bonjour")?;
//!
//!     while let Some(event) = events.recv().await {
//!         match event {
//!             SessionEvent::Message { sender, text, .. } => println!("{sender} : {text}"),
//!             SessionEvent::ChannelError { kind, reason } => {
//!                 eprintln!("connection lost ({kind:?}): {reason}");
//!                 break;
//!             }
//!             event if event.is_terminal() => break,
//!             _ => {}
//!         }
//!     }
//!     client.close().await;
//!     Ok(())
//! }
//! ```

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::error::{ChatwireError, Result};
use crate::handler::{EventForwarder, SessionEvent};
use crate::session::{OutgoingMessage, Session, SessionConfig, SessionState, Variant};
use crate::transport::{self, ChannelEvent};
use crate::writer::{writer_channel, PendingWriter, WriteFailure, WriterConfig, WriterHandle};

/// Default read buffer size (64 KiB).
pub const DEFAULT_READ_BUFFER_SIZE: usize = 64 * 1024;

type SharedSession = Arc<Mutex<Session<WriterHandle, EventForwarder>>>;

/// Receiver for a client's [`SessionEvent`]s.
pub type EventReceiver = mpsc::UnboundedReceiver<SessionEvent>;

/// Builder for configuring and creating a [`Client`].
#[derive(Debug, Clone, Default)]
pub struct ClientBuilder {
    config: SessionConfig,
    writer_config: WriterConfig,
    read_buffer_size: Option<usize>,
}

impl ClientBuilder {
    /// Create a new client builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole session configuration.
    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the delivery policy.
    ///
    /// Default: [`Variant::Broadcast`]
    pub fn variant(mut self, variant: Variant) -> Self {
        self.config.variant = variant;
        self
    }

    /// Set the payload cap for both directions.
    ///
    /// Default: 1 MiB
    pub fn max_payload_size(mut self, max: u32) -> Self {
        self.config.max_payload_size = max;
        self
    }

    /// Set the sender label for received messages.
    pub fn remote_label(mut self, label: impl Into<String>) -> Self {
        self.config.remote_label = label.into();
        self
    }

    /// Set the sender label for locally echoed messages.
    pub fn local_label(mut self, label: impl Into<String>) -> Self {
        self.config.local_label = label.into();
        self
    }

    /// Display sent messages locally.
    ///
    /// Default: true
    pub fn local_echo(mut self, enabled: bool) -> Self {
        self.config.local_echo = enabled;
        self
    }

    /// Set the writer queue capacity.
    ///
    /// Default: 1024
    pub fn channel_capacity(mut self, capacity: usize) -> Self {
        self.writer_config.channel_capacity = capacity;
        self
    }

    /// Set the size of the buffer each read fills.
    ///
    /// Default: 64 KiB
    pub fn read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = Some(size);
        self
    }

    /// Open a TCP connection and start a session on it.
    ///
    /// Connection failures are returned unchanged; reconnecting is up to
    /// the caller.
    pub async fn connect(self, host: &str, port: u16) -> Result<(Client, EventReceiver)> {
        let (mut session, pending_writer, events) = self.prepare();
        session.begin_connect()?;

        let stream = match transport::open(host, port).await {
            Ok(stream) => stream,
            Err(e) => {
                if let ChatwireError::Io(io) = &e {
                    session.on_channel_error(io);
                }
                return Err(e);
            }
        };
        let peer = stream.peer_addr().ok();

        let client = Client::start(session, stream, peer, pending_writer, self.buffer_size())?;
        Ok((client, events))
    }

    /// Start a session on an already-open stream.
    pub fn attach<S>(self, stream: S, peer: Option<SocketAddr>) -> Result<(Client, EventReceiver)>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (session, pending_writer, events) = self.prepare();
        let client = Client::start(session, stream, peer, pending_writer, self.buffer_size())?;
        Ok((client, events))
    }

    fn prepare(
        &self,
    ) -> (
        Session<WriterHandle, EventForwarder>,
        PendingWriter,
        EventReceiver,
    ) {
        let (writer, pending_writer) = writer_channel(&self.writer_config);
        let (forwarder, events) = EventForwarder::channel(None);
        let session = Session::new(self.config.clone(), writer, forwarder);
        (session, pending_writer, events)
    }

    fn buffer_size(&self) -> usize {
        self.read_buffer_size
            .unwrap_or(DEFAULT_READ_BUFFER_SIZE)
            .max(1)
    }
}

/// A running session over a live channel.
///
/// Use `send()` to submit messages and the [`EventReceiver`] returned at
/// construction to observe the session.
pub struct Client {
    session: SharedSession,
    writer: WriterHandle,
    peer: Option<SocketAddr>,
    read_task: JoinHandle<()>,
    writer_task: JoinHandle<Result<()>>,
}

impl Client {
    /// Create a new client builder.
    pub fn builder() -> ClientBuilder {
        ClientBuilder::new()
    }

    fn start<S>(
        mut session: Session<WriterHandle, EventForwarder>,
        stream: S,
        peer: Option<SocketAddr>,
        pending_writer: PendingWriter,
        read_buffer_size: usize,
    ) -> Result<Self>
    where
        S: AsyncRead + AsyncWrite + Send + 'static,
    {
        let (reader, write_half) = tokio::io::split(stream);
        let (writer_task, write_failure) = pending_writer.spawn_reporting(write_half);
        let writer = session.sink().clone();

        session.handler_mut().set_peer(peer);
        session.on_open()?;
        if let Some(peer) = peer {
            tracing::info!("Session open with {}", peer);
        }

        let session = Arc::new(Mutex::new(session));
        let read_task = tokio::spawn(read_loop(
            reader,
            session.clone(),
            writer.clone(),
            write_failure,
            read_buffer_size,
        ));

        Ok(Client {
            session,
            writer,
            peer,
            read_task,
            writer_task,
        })
    }

    /// Send text under the configured local label.
    ///
    /// Returns `Ok(false)` if `text` is empty (nothing is sent).
    pub fn send(&self, text: &str) -> Result<bool> {
        self.lock()?.send(text)
    }

    /// Send a prepared message.
    pub fn submit(&self, message: OutgoingMessage) -> Result<bool> {
        self.lock()?.submit(message)
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        self.lock()
            .map(|session| session.state())
            .unwrap_or(SessionState::Errored)
    }

    /// Remote address, if known.
    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    /// Frames queued but not yet written.
    pub fn pending_frames(&self) -> usize {
        self.writer.pending_count()
    }

    /// Orderly local shutdown.
    ///
    /// Stops reading, flushes queued frames and shuts down the write half.
    /// If the writer queue is full the queued frames are dropped instead
    /// of waiting for a peer that may never read them.
    pub async fn close(self) {
        if let Ok(mut session) = self.session.lock() {
            session.on_closed();
        }
        self.read_task.abort();

        if !self.writer.try_close() {
            tracing::warn!(
                "Writer queue full, dropping {} queued frame(s)",
                self.writer.pending_count()
            );
            self.writer_task.abort();
            return;
        }
        match self.writer_task.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!("Writer ended with error: {}", e),
            Err(e) => tracing::error!("Writer task failed: {}", e),
        }
    }

    /// Wait until the session ends (remote close, channel or protocol error).
    pub async fn wait_for_shutdown(self) -> Result<()> {
        if let Err(e) = self.read_task.await {
            tracing::error!("Read task failed: {}", e);
        }
        if !self.writer.try_close() {
            self.writer_task.abort();
        }
        match self.writer_task.await {
            Ok(result) => result,
            Err(_) => Err(ChatwireError::ConnectionClosed),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, Session<WriterHandle, EventForwarder>>> {
        self.session
            .lock()
            .map_err(|_| ChatwireError::ConnectionClosed)
    }
}

/// What the read loop does after handling one channel event.
#[derive(Debug, PartialEq, Eq)]
enum ReadOutcome {
    Continue,
    Stop,
}

/// Main read loop - reads chunks and feeds the session.
///
/// A failed write ends the session the same way a failed read does.
async fn read_loop<R>(
    mut reader: R,
    session: SharedSession,
    writer: WriterHandle,
    mut write_failure: WriteFailure,
    buffer_size: usize,
) where
    R: AsyncRead + Unpin,
{
    let mut buf = vec![0u8; buffer_size];
    let mut watch_writer = true;

    loop {
        let event = tokio::select! {
            event = transport::next_event(&mut reader, &mut buf) => event,
            failure = &mut write_failure, if watch_writer => {
                watch_writer = false;
                match failure {
                    Ok(e) => ChannelEvent::Error(e),
                    // Writer stopped cleanly
                    Err(_) => continue,
                }
            }
        };

        let outcome = match session.lock() {
            Ok(mut session) => handle_event(&mut session, &buf, event),
            Err(_) => {
                tracing::error!("Session lock poisoned, stopping reader");
                ReadOutcome::Stop
            }
        };

        if outcome == ReadOutcome::Stop {
            break;
        }
    }

    if !writer.try_close() {
        tracing::warn!("Writer queue full at shutdown");
    }
}

fn handle_event(
    session: &mut Session<WriterHandle, EventForwarder>,
    buf: &[u8],
    event: ChannelEvent,
) -> ReadOutcome {
    // Closed locally while the read was in flight
    if session.state().is_terminal() {
        return ReadOutcome::Stop;
    }

    match event {
        ChannelEvent::Data(n) => match session.on_bytes_received(&buf[..n]) {
            Ok(_) => ReadOutcome::Continue,
            Err(e) => {
                session.handler().protocol_error(e.to_string());
                ReadOutcome::Stop
            }
        },
        ChannelEvent::Closed => {
            tracing::info!("Remote closed the connection");
            session.on_closed();
            ReadOutcome::Stop
        }
        ChannelEvent::Error(e) => {
            session.on_channel_error(&e);
            session.handler().channel_error(&e);
            ReadOutcome::Stop
        }
    }
}
