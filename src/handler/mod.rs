//! Handler module - where decoded messages go.
//!
//! Provides:
//! - [`MessageHandler`] - callbacks a [`Session`](crate::session::Session) invokes
//! - [`EventForwarder`] - a handler that turns callbacks into [`SessionEvent`]s
//!
//! # Example
//!
//! ```
//! use chatwire::handler::MessageHandler;
//!
//! #[derive(Default)]
//! struct Transcript(Vec<String>);
//!
//! impl MessageHandler for Transcript {
//!     fn on_message(&mut self, sender: &str, text: &str) {
//!         self.0.push(format!("{sender} : {text}"));
//!     }
//! }
//! ```

mod events;

pub use events::{EventForwarder, SessionEvent};

use crate::session::SessionState;

/// Receiver of session callbacks.
///
/// Called synchronously from inside the session, one at a time.
pub trait MessageHandler: Send {
    /// A message to display, labelled with its sender.
    fn on_message(&mut self, sender: &str, text: &str);

    /// The deduplicating poll variant suppressed an unchanged value.
    ///
    /// Called instead of [`on_message`](Self::on_message). The caller is
    /// expected to issue its next request.
    fn request_next(&mut self) {}

    /// The session moved between lifecycle states.
    fn on_state_change(&mut self, _from: SessionState, _to: SessionState) {}
}

impl<H: MessageHandler + ?Sized> MessageHandler for Box<H> {
    fn on_message(&mut self, sender: &str, text: &str) {
        (**self).on_message(sender, text);
    }

    fn request_next(&mut self) {
        (**self).request_next();
    }

    fn on_state_change(&mut self, from: SessionState, to: SessionState) {
        (**self).on_state_change(from, to);
    }
}
