//! Receive buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` so committed frames are dropped from the front
//! without shifting the remainder. Decoding is two-phase:
//! - [`FrameBuffer::peek`] inspects the front of the buffer and returns a
//!   [`PendingDecode`] when a whole frame is present,
//! - [`FrameBuffer::commit`] removes exactly that frame's bytes.
//!
//! Dropping a `PendingDecode` without committing leaves the buffer as it
//! was, so a partial frame is never consumed.
//!
//! # Example
//!
//! ```
//! use chatwire::protocol::{encode, FrameBuffer};
//!
//! let mut buffer = FrameBuffer::new();
//! let frame = encode("hello").unwrap();
//!
//! assert!(buffer.push(&frame[..6]).unwrap().is_empty());
//! assert_eq!(buffer.push(&frame[6..]).unwrap(), vec!["hello".to_string()]);
//! assert!(buffer.is_empty());
//! ```

use bytes::{Buf, BytesMut};

use super::frame::{try_decode, Decode};
use super::wire_format::DEFAULT_MAX_PAYLOAD_SIZE;
use crate::error::Result;

/// Default initial buffer capacity (64 KiB).
pub const DEFAULT_BUFFER_CAPACITY: usize = 64 * 1024;

/// A decode attempt that found a whole frame but has not consumed it yet.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a pending decode does nothing unless committed"]
pub struct PendingDecode {
    message: String,
    consumed: usize,
}

impl PendingDecode {
    /// The decoded text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Number of bytes committing will remove.
    pub fn consumed(&self) -> usize {
        self.consumed
    }
}

/// Buffer for accumulating incoming bytes and extracting complete messages.
#[derive(Debug)]
pub struct FrameBuffer {
    /// Bytes received but not yet resolved into frames.
    buffer: BytesMut,
    /// Maximum allowed payload size.
    max_payload_size: u32,
}

impl FrameBuffer {
    /// Create a new frame buffer with default settings.
    ///
    /// Default capacity: 64 KiB, max payload: 1 MiB.
    pub fn new() -> Self {
        Self::with_capacity_and_max_payload(DEFAULT_BUFFER_CAPACITY, DEFAULT_MAX_PAYLOAD_SIZE)
    }

    /// Create a new frame buffer with custom max payload size.
    pub fn with_max_payload(max_payload_size: u32) -> Self {
        Self::with_capacity_and_max_payload(DEFAULT_BUFFER_CAPACITY, max_payload_size)
    }

    /// Create a new frame buffer with custom capacity and max payload.
    pub fn with_capacity_and_max_payload(capacity: usize, max_payload_size: u32) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            max_payload_size,
        }
    }

    /// Append data to the buffer without extracting messages.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Look for a whole frame at the front of the buffer.
    ///
    /// Never mutates the buffer. Returns `Ok(None)` if more bytes are needed.
    ///
    /// # Errors
    ///
    /// Returns a protocol error if the front of the buffer can never become
    /// a valid frame (oversized length, invalid UTF-8).
    pub fn peek(&self) -> Result<Option<PendingDecode>> {
        match try_decode(&self.buffer, self.max_payload_size)? {
            Decode::Incomplete => Ok(None),
            Decode::Decoded { message, consumed } => Ok(Some(PendingDecode { message, consumed })),
        }
    }

    /// Consume the bytes of a decode attempt and return its message.
    pub fn commit(&mut self, pending: PendingDecode) -> String {
        debug_assert!(pending.consumed <= self.buffer.len());
        self.buffer.advance(pending.consumed);
        pending.message
    }

    /// Extract the next complete message, if any.
    pub fn next_message(&mut self) -> Result<Option<String>> {
        Ok(self.peek()?.map(|pending| self.commit(pending)))
    }

    /// Push data into the buffer and extract all complete messages.
    ///
    /// Partial data stays buffered for the next push.
    ///
    /// # Errors
    ///
    /// Returns a protocol error on a malformed frame. Messages decoded
    /// before the malformed frame in the same push are discarded with it.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<String>> {
        self.extend(data);

        let mut messages = Vec::new();
        while let Some(message) = self.next_message()? {
            messages.push(message);
        }

        Ok(messages)
    }

    /// Get the number of buffered bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Configured payload cap.
    pub fn max_payload_size(&self) -> u32 {
        self.max_payload_size
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    #[cfg(test)]
    fn as_slice(&self) -> &[u8] {
        &self.buffer
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
