//! Session configuration.
//!
//! Loadable from JSON; every field is optional and falls back to the
//! defaults below.
//!
//! ```json
//! {
//!   "variant": "dedup_poll",
//!   "max_payload_size": 65536,
//!   "remote_label": "Server",
//!   "local_label": "You",
//!   "local_echo": true
//! }
//! ```

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::protocol::DEFAULT_MAX_PAYLOAD_SIZE;

/// Default label for messages decoded from the peer.
pub const DEFAULT_REMOTE_LABEL: &str = "Server";

/// Default label for locally echoed messages.
pub const DEFAULT_LOCAL_LABEL: &str = "You";

/// How decoded messages are delivered to the handler.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    /// Every decoded message is displayed.
    #[default]
    Broadcast,
    /// A message equal to the last displayed one triggers
    /// `request_next` instead of being displayed.
    DedupPoll,
}

/// Per-session settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Delivery policy.
    pub variant: Variant,
    /// Payload cap enforced on both encode and decode.
    pub max_payload_size: u32,
    /// Sender label for decoded messages.
    pub remote_label: String,
    /// Sender label for locally echoed messages.
    pub local_label: String,
    /// Display sent messages under `local_label`.
    pub local_echo: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            variant: Variant::Broadcast,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
            remote_label: DEFAULT_REMOTE_LABEL.to_owned(),
            local_label: DEFAULT_LOCAL_LABEL.to_owned(),
            local_echo: true,
        }
    }
}

impl SessionConfig {
    /// Parse a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_default() {
        let config = SessionConfig::default();
        assert_eq!(config.variant, Variant::Broadcast);
        assert_eq!(config.max_payload_size, DEFAULT_MAX_PAYLOAD_SIZE);
        assert_eq!(config.remote_label, "Server");
        assert_eq!(config.local_label, "You");
        assert!(config.local_echo);
    }

    #[test]
    fn test_config_from_empty_json() {
        let config = SessionConfig::from_json("{}").unwrap();
        assert_eq!(config, SessionConfig::default());
    }

    #[test]
    fn test_config_from_partial_json() {
        let config =
            SessionConfig::from_json(r#"{"variant": "dedup_poll", "local_echo": false}"#).unwrap();
        assert_eq!(config.variant, Variant::DedupPoll);
        assert!(!config.local_echo);
        assert_eq!(config.remote_label, DEFAULT_REMOTE_LABEL);
    }

    #[test]
    fn test_config_invalid_json() {
        let result = SessionConfig::from_json(r#"{"variant": "gossip"}"#);
        assert!(result.unwrap_err().to_string().starts_with("JSON error"));
    }
}
