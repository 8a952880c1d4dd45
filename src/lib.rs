//! # chatwire
//!
//! Length-prefixed text messaging over a byte stream.
//!
//! Each message is framed as a 4-byte big-endian length followed by that
//! many bytes of UTF-8. The receiver accumulates whatever chunks the
//! stream delivers and only consumes bytes once a whole frame is present,
//! so a partial frame is never misread.
//!
//! ## Architecture
//!
//! - **Protocol** ([`protocol`]): wire format, encoding, transactional decoding
//! - **Session** ([`session`]): per-connection buffer, lifecycle, delivery policy
//! - **Runtime** ([`Client`]): tokio read loop + single writer task over TCP
//!
//! ## Example
//!
//! ```ignore
//! use chatwire::{Client, SessionEvent, Variant};
//!
//! #[tokio::main]
//! async fn main() {
//!     let (client, mut events) = Client::builder()
//!         .variant(Variant::DedupPoll)
//!         .connect("localhost", 4242)
//!         .await
//!         .unwrap();
//!
//!     client.send("next").unwrap();
//!     while let Some(event) = events.recv().await {
//!         if event == SessionEvent::RequestNext {
//!             client.send("next").unwrap();
//!         }
//!     }
//! }
//! ```

pub mod error;
pub mod handler;
pub mod protocol;
pub mod session;
pub mod transport;
pub mod writer;

mod client;

pub use client::{Client, ClientBuilder, EventReceiver, DEFAULT_READ_BUFFER_SIZE};
pub use error::ChatwireError;
pub use handler::{MessageHandler, SessionEvent};
pub use session::{OutgoingMessage, Session, SessionConfig, SessionState, Variant};
