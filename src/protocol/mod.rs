//! Protocol module - wire format, framing, and the receive buffer.
//!
//! This module implements the message framing protocol:
//! - 4-byte big-endian length prefix followed by UTF-8 text
//! - Side-effect-free decoding of one frame at a time
//! - Frame buffer for accumulating partial reads

mod frame;
mod frame_buffer;
mod wire_format;

pub use frame::{encode, encode_with_limit, frame_len, try_decode, Decode};
pub use frame_buffer::{FrameBuffer, PendingDecode, DEFAULT_BUFFER_CAPACITY};
pub use wire_format::{
    decode_prefix, encode_prefix, validate_length, ABSOLUTE_MAX_PAYLOAD_SIZE,
    DEFAULT_MAX_PAYLOAD_SIZE, PREFIX_SIZE,
};
