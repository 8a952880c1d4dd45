//! Outgoing message value.

use std::time::SystemTime;

/// A message submitted for sending.
///
/// Sender and timestamp are presentation metadata; only the text goes on
/// the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    text: String,
    sender: String,
    created_at: SystemTime,
}

impl OutgoingMessage {
    /// Create a message stamped with the current time.
    pub fn new(sender: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            sender: sender.into(),
            created_at: SystemTime::now(),
        }
    }

    /// Message text.
    #[inline]
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Sender label.
    #[inline]
    pub fn sender(&self) -> &str {
        &self.sender
    }

    /// Creation time.
    #[inline]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Whether there is anything to send.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outgoing_message_fields() {
        let before = SystemTime::now();
        let message = OutgoingMessage::new("You", "bonjour");

        assert_eq!(message.text(), "bonjour");
        assert_eq!(message.sender(), "You");
        assert!(message.created_at() >= before);
        assert!(!message.is_empty());
    }

    #[test]
    fn test_outgoing_message_empty() {
        assert!(OutgoingMessage::new("You", "").is_empty());
    }
}
