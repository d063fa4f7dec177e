//! Wire payload exchanged over a room broadcast.

use serde::{Deserialize, Serialize};

/// A message as it travels between the broadcaster and subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WirePayload {
    /// Sender display name. Empty for system notices.
    pub user: String,
    /// Message body.
    pub message: String,
    /// Set only on server-authored notices.
    #[serde(default, skip_serializing_if = "is_false")]
    pub system: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl WirePayload {
    /// Create a user message.
    #[must_use]
    pub fn user(sender: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            user: sender.into(),
            message: body.into(),
            system: false,
        }
    }

    /// Create a system notice.
    #[must_use]
    pub fn system(body: impl Into<String>) -> Self {
        Self {
            user: String::new(),
            message: body.into(),
            system: true,
        }
    }

    /// Notice announcing that `name` entered the room.
    ///
    /// System bodies are rendered as markup, so the name is escaped here.
    #[must_use]
    pub fn joined(name: &str) -> Self {
        Self::system(format!("{} has joined", html_escape::encode_text(name)))
    }

    /// Notice announcing that `name` left the room.
    #[must_use]
    pub fn left(name: &str) -> Self {
        Self::system(format!("{} has left", html_escape::encode_text(name)))
    }
}
