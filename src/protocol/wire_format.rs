//! Wire format encoding and decoding.
//!
//! Every message travels as one frame:
//! ```text
//! ┌──────────────┬─────────────────────┐
//! │ Length (N)   │ Payload             │
//! │ 4 bytes      │ N bytes             │
//! │ uint32 BE    │ UTF-8 text          │
//! └──────────────┴─────────────────────┘
//! ```
//!
//! There is no type tag, checksum or version byte. Anything that needs
//! forward compatibility has to be carried inside the payload.

use crate::error::{ChatwireError, Result};

/// Length prefix size in bytes (fixed, exactly 4).
pub const PREFIX_SIZE: usize = 4;

/// Default maximum payload size (1 MiB).
pub const DEFAULT_MAX_PAYLOAD_SIZE: u32 = 1_048_576;

/// Absolute maximum payload size (~2 GB, max i32).
///
/// `0xFFFF_FFFF` is never a valid length; some peers use it as a
/// "null string" marker.
pub const ABSOLUTE_MAX_PAYLOAD_SIZE: u32 = 2_147_483_647;

/// Encode a payload length as a big-endian prefix.
///
/// # Example
///
/// ```
/// use chatwire::protocol::encode_prefix;
///
/// assert_eq!(encode_prefix(5), [0, 0, 0, 5]);
/// ```
#[inline]
pub fn encode_prefix(payload_length: u32) -> [u8; PREFIX_SIZE] {
    payload_length.to_be_bytes()
}

/// Decode the length prefix at the front of `buf`.
///
/// Returns `None` if fewer than [`PREFIX_SIZE`] bytes are present.
#[inline]
pub fn decode_prefix(buf: &[u8]) -> Option<u32> {
    let prefix: [u8; PREFIX_SIZE] = buf.get(..PREFIX_SIZE)?.try_into().ok()?;
    Some(u32::from_be_bytes(prefix))
}

/// Check a declared payload length against the configured cap.
pub fn validate_length(payload_length: u32, max_payload_size: u32) -> Result<()> {
    let max = max_payload_size.min(ABSOLUTE_MAX_PAYLOAD_SIZE);
    if payload_length > max {
        return Err(ChatwireError::PayloadTooLarge {
            declared: payload_length,
            max,
        });
    }
    Ok(())
}
