//! Transport module - the byte-stream channel a session runs over.
//!
//! Provides:
//! - [`open`] - connect a TCP stream
//! - [`next_event`] - turn one read into a [`ChannelEvent`]

mod tcp;

pub use tcp::{next_event, open, ChannelEvent};
