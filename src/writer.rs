//! Dedicated writer task - the single writer for a channel.
//!
//! Frames from any number of senders go through one mpsc channel to one
//! task that owns the write half. Each frame is written whole and in
//! queue order, so two `send` calls can never interleave their bytes.
//!
//! ```text
//! Session::send ─┐
//! Client::send  ─┼─► mpsc queue ─► Writer Task ─► Socket
//! other tasks   ─┘
//! ```
//!
//! Frames already queued when the task wakes up are written together with
//! one vectored write where possible. [`WriterHandle::close`] queues a
//! shutdown behind everything sent before it.
//!
//! A failed write stops the task. The error is reported once on the
//! [`WriteFailure`] receiver so the owner of the session can react to it,
//! and frames still queued at that point are discarded.

use std::io::{self, IoSlice};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{ChatwireError, Result};
use crate::session::FrameSink;

/// Default channel capacity.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// Maximum frames to batch in a single write operation.
const MAX_BATCH_SIZE: usize = 64;

/// What travels on the writer queue.
#[derive(Debug)]
enum Command {
    Frame(Bytes),
    Shutdown,
}

/// Configuration for the writer task.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// Number of frames that may be queued before `try_send` fails.
    pub channel_capacity: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_CHANNEL_CAPACITY,
        }
    }
}

/// Handle for queueing frames on the writer task.
///
/// This is cheaply cloneable. Dropping every handle shuts the task down
/// after it has flushed what was queued.
#[derive(Debug, Clone)]
pub struct WriterHandle {
    tx: mpsc::Sender<Command>,
    /// Frames queued but not yet written.
    pending: Arc<AtomicUsize>,
}

impl WriterHandle {
    /// Queue a frame, waiting for room if the queue is full.
    pub async fn send(&self, frame: Bytes) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.send(Command::Frame(frame)).await.map_err(|_| {
            self.pending.fetch_sub(1, Ordering::Release);
            ChatwireError::ConnectionClosed
        })
    }

    /// Queue a frame without waiting.
    ///
    /// Returns `Err(WriterBusy)` immediately if the queue is full.
    pub fn try_send(&self, frame: Bytes) -> Result<()> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        self.tx.try_send(Command::Frame(frame)).map_err(|e| {
            self.pending.fetch_sub(1, Ordering::Release);
            match e {
                mpsc::error::TrySendError::Full(_) => ChatwireError::WriterBusy,
                mpsc::error::TrySendError::Closed(_) => ChatwireError::ConnectionClosed,
            }
        })
    }

    /// Flush everything queued so far, then shut down the write half.
    ///
    /// Frames queued after this call are dropped. Closing a writer that
    /// has already stopped is not an error.
    ///
    /// Waits for room when the queue is full. If the peer has stopped
    /// reading, that wait never ends; use [`WriterHandle::try_close`] or
    /// drop every handle instead.
    pub async fn close(&self) {
        if self.tx.send(Command::Shutdown).await.is_err() {
            tracing::debug!("Writer already stopped");
        }
    }

    /// Queue a shutdown without waiting.
    ///
    /// Returns `false` if the queue is full. The task still shuts down
    /// once every handle is dropped.
    pub fn try_close(&self) -> bool {
        match self.tx.try_send(Command::Shutdown) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => false,
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!("Writer already stopped");
                true
            }
        }
    }

    /// Get current pending frame count.
    #[inline]
    pub fn pending_count(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether the writer task has stopped.
    #[inline]
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

impl FrameSink for WriterHandle {
    fn write_frame(&self, frame: Bytes) -> Result<()> {
        self.try_send(frame)
    }
}

/// Resolves with the I/O error that stopped the writer task.
///
/// The sender is dropped without a value when the task ends cleanly.
pub type WriteFailure = oneshot::Receiver<io::Error>;

/// Writer queue whose task has not been spawned yet.
///
/// Lets a session hold its [`WriterHandle`] before the channel exists.
#[derive(Debug)]
pub struct PendingWriter {
    rx: mpsc::Receiver<Command>,
    pending: Arc<AtomicUsize>,
}

impl PendingWriter {
    /// Spawn the task that drains this queue into `writer`.
    ///
    /// The task ends with `Ok(())` after a [`WriterHandle::close`] or once
    /// every handle is dropped, shutting down the write half on the way out.
    pub fn spawn<W>(self, writer: W) -> JoinHandle<Result<()>>
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        tokio::spawn(writer_loop(self.rx, writer, self.pending, None))
    }

    /// Like [`PendingWriter::spawn`], also returning a receiver for the
    /// error of a failed write.
    pub fn spawn_reporting<W>(self, writer: W) -> (JoinHandle<Result<()>>, WriteFailure)
    where
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (failure_tx, failure_rx) = oneshot::channel();
        let task = tokio::spawn(writer_loop(self.rx, writer, self.pending, Some(failure_tx)));
        (task, failure_rx)
    }
}

/// Create a writer queue without spawning its task.
pub fn writer_channel(config: &WriterConfig) -> (WriterHandle, PendingWriter) {
    let (tx, rx) = mpsc::channel(config.channel_capacity.max(1));
    let pending = Arc::new(AtomicUsize::new(0));

    let handle = WriterHandle {
        tx,
        pending: pending.clone(),
    };
    (handle, PendingWriter { rx, pending })
}

/// Spawn the writer task and return a handle for queueing frames.
pub fn spawn_writer_task<W>(writer: W, config: WriterConfig) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (handle, pending) = writer_channel(&config);
    (handle, pending.spawn(writer))
}

/// Spawn the writer task with default configuration.
pub fn spawn_writer_task_default<W>(writer: W) -> (WriterHandle, JoinHandle<Result<()>>)
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    spawn_writer_task(writer, WriterConfig::default())
}

async fn writer_loop<W>(
    mut rx: mpsc::Receiver<Command>,
    mut writer: W,
    pending: Arc<AtomicUsize>,
    failure: Option<oneshot::Sender<io::Error>>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut shutdown = false;
    while !shutdown {
        let Some(first) = rx.recv().await else {
            break;
        };

        let mut batch = Vec::with_capacity(MAX_BATCH_SIZE);
        let mut next = Some(first);
        while let Some(command) = next.take() {
            match command {
                Command::Frame(frame) => batch.push(frame),
                Command::Shutdown => {
                    shutdown = true;
                    break;
                }
            }
            if batch.len() < MAX_BATCH_SIZE {
                next = rx.try_recv().ok();
            }
        }

        let batch_size = batch.len();
        let written = write_batch(&mut writer, &batch).await;
        pending.fetch_sub(batch_size, Ordering::Release);

        if let Err(e) = written {
            tracing::error!("Writer failed: {}", e);
            discard_queued(&mut rx, &pending);
            if let Some(failure) = failure {
                // Receiver gone means nobody is watching; the JoinHandle still has it
                let _ = failure.send(io::Error::new(e.kind(), e.to_string()));
            }
            return Err(ChatwireError::Io(e));
        }
    }

    tracing::debug!("Writer shutting down");
    discard_queued(&mut rx, &pending);
    writer.shutdown().await?;
    Ok(())
}

/// Refuse further frames and drop the ones still queued.
fn discard_queued(rx: &mut mpsc::Receiver<Command>, pending: &AtomicUsize) {
    rx.close();
    let mut dropped = 0;
    while let Ok(command) = rx.try_recv() {
        if let Command::Frame(_) = command {
            dropped += 1;
        }
    }
    if dropped > 0 {
        pending.fetch_sub(dropped, Ordering::Release);
        tracing::debug!("Dropped {} queued frame(s)", dropped);
    }
}

/// Write whole frames using scatter/gather I/O.
async fn write_batch<W>(writer: &mut W, batch: &[Bytes]) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
{
    let total_size: usize = batch.iter().map(Bytes::len).sum();
    let mut total_written = 0;

    while total_written < total_size {
        let slices = build_remaining_slices(batch, total_written);
        let written = writer.write_vectored(&slices).await?;
        if written == 0 {
            return Err(io::Error::new(
                io::ErrorKind::WriteZero,
                "write_vectored returned 0",
            ));
        }
        total_written += written;
    }

    writer.flush().await
}

/// Build IoSlice array for remaining data after partial write.
fn build_remaining_slices(batch: &[Bytes], skip_bytes: usize) -> Vec<IoSlice<'_>> {
    let mut slices = Vec::with_capacity(batch.len());
    let mut offset = 0;

    for frame in batch {
        let end = offset + frame.len();
        if skip_bytes < end && !frame.is_empty() {
            let start = skip_bytes.saturating_sub(offset);
            slices.push(IoSlice::new(&frame[start..]));
        }
        offset = end;
    }

    slices
}
