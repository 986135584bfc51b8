//! Effect targets.
//!
//! A channel names a group of actuators (a zone, a strip, "all LEDs"). It is
//! taken from the `channel` header; commands without one target
//! [`DEFAULT_CHANNEL`].

use std::fmt;

use flux_command::{headers, Command};
use serde::Serialize;

/// Channel used when a command carries no `channel` header.
pub const DEFAULT_CHANNEL: &str = "all";

/// A logical effect target. Names are case-sensitive and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Channel(String);

impl Channel {
    /// Create a channel. Returns `None` for blank names.
    pub fn new(name: impl Into<String>) -> Option<Self> {
        let name = name.into();
        let trimmed = name.trim();
        if trimmed.is_empty() {
            return None;
        }
        if trimmed.len() == name.len() {
            Some(Self(name))
        } else {
            Some(Self(trimmed.to_string()))
        }
    }

    /// Channel addressed by `command`, or `None` if its header is blank.
    pub fn for_command(command: &Command) -> Option<Self> {
        match command.header(headers::CHANNEL) {
            None => Some(Self::default()),
            Some(name) => Self::new(name),
        }
    }

    /// The channel name.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for the default channel.
    pub fn is_default(&self) -> bool {
        self.0 == DEFAULT_CHANNEL
    }
}

impl Default for Channel {
    fn default() -> Self {
        Self(DEFAULT_CHANNEL.to_string())
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Channel {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
