//! Frame encoding and transactional decoding.
//!
//! [`encode`] turns text into one contiguous frame. [`try_decode`] peeks at
//! the front of a byte slice and reports either [`Decode::Incomplete`] or a
//! whole message together with the number of bytes it occupied. It never
//! consumes anything itself, so callers decide when to commit.
//!
//! # Example
//!
//! ```
//! use chatwire::protocol::{encode, try_decode, Decode, DEFAULT_MAX_PAYLOAD_SIZE};
//!
//! let frame = encode("hello").unwrap();
//! assert_eq!(&frame[..], b"\x00\x00\x00\x05hello");
//!
//! let decoded = try_decode(&frame, DEFAULT_MAX_PAYLOAD_SIZE).unwrap();
//! assert_eq!(
//!     decoded,
//!     Decode::Decoded { message: "hello".to_string(), consumed: 9 }
//! );
//!
//! let partial = try_decode(&frame[..6], DEFAULT_MAX_PAYLOAD_SIZE).unwrap();
//! assert_eq!(partial, Decode::Incomplete);
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use super::wire_format::{
    decode_prefix, encode_prefix, validate_length, DEFAULT_MAX_PAYLOAD_SIZE, PREFIX_SIZE,
};
use crate::error::{ChatwireError, Result};

/// Outcome of a single decode attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decode {
    /// Not enough bytes yet. Nothing may be consumed.
    Incomplete,
    /// A whole frame was present.
    Decoded {
        /// The decoded text.
        message: String,
        /// Exact number of bytes the frame occupied (prefix + payload).
        consumed: usize,
    },
}

/// Encode a message using the default payload cap.
pub fn encode(message: &str) -> Result<Bytes> {
    encode_with_limit(message, DEFAULT_MAX_PAYLOAD_SIZE)
}

/// Encode a message, failing if its UTF-8 length exceeds `max_payload_size`.
pub fn encode_with_limit(message: &str, max_payload_size: u32) -> Result<Bytes> {
    let payload = message.as_bytes();
    let len = u32::try_from(payload.len())
        .ok()
        .filter(|len| validate_length(*len, max_payload_size).is_ok())
        .ok_or(ChatwireError::MessageTooLarge {
            len: payload.len(),
            max: max_payload_size,
        })?;

    Ok(build_frame(len, payload))
}

/// Frame a payload whose length is already known to fit.
fn build_frame(len: u32, payload: &[u8]) -> Bytes {
    let mut buf = BytesMut::with_capacity(PREFIX_SIZE + payload.len());
    buf.put_slice(&encode_prefix(len));
    buf.put_slice(payload);
    buf.freeze()
}

/// Total frame length for a declared payload length.
#[inline]
pub fn frame_len(payload_length: u32) -> usize {
    PREFIX_SIZE + payload_length as usize
}

/// Try to decode one frame from the front of `buf`.
///
/// Pure: calling it any number of times on the same slice gives the same
/// answer. An oversized declared length is reported as soon as the prefix
/// is visible, without waiting for the payload.
///
/// # Errors
///
/// - [`ChatwireError::PayloadTooLarge`] if the prefix exceeds the cap.
/// - [`ChatwireError::Protocol`] if the payload is not valid UTF-8.
pub fn try_decode(buf: &[u8], max_payload_size: u32) -> Result<Decode> {
    let Some(payload_length) = decode_prefix(buf) else {
        return Ok(Decode::Incomplete);
    };
    validate_length(payload_length, max_payload_size)?;

    let consumed = frame_len(payload_length);
    let Some(payload) = buf.get(PREFIX_SIZE..consumed) else {
        return Ok(Decode::Incomplete);
    };

    let message = std::str::from_utf8(payload)
        .map_err(|e| ChatwireError::Protocol(format!("Payload is not valid UTF-8: {}", e)))?
        .to_owned();

    Ok(Decode::Decoded { message, consumed })
}
