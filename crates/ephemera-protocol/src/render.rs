//! HTML rendering of room messages.

use chrono::{Local, NaiveTime};
use std::fmt;

use crate::wire::WirePayload;

/// Timestamp format attached to rendered messages.
pub const TIME_FORMAT: &str = "%H:%M:%S";

/// Default DOM id that turbo-stream fragments are appended to.
pub const DEFAULT_STREAM_TARGET: &str = "messages";

/// A rendered HTML fragment for a single message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment(String);

impl Fragment {
    /// Get the markup.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Wrap the fragment in a turbo-stream `append` action.
    #[must_use]
    pub fn into_turbo_stream(self, target: &str) -> String {
        format!(
            r#"<turbo-stream action="append" target="{}"><template>{}</template></turbo-stream>"#,
            html_escape::encode_double_quoted_attribute(target),
            self.0
        )
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Render a message stamped with the current local time.
#[must_use]
pub fn render(sender: &str, body: &str, is_system: bool) -> Fragment {
    render_at(sender, body, is_system, Local::now().time())
}

/// Render a decoded payload stamped with the current local time.
#[must_use]
pub fn render_payload(payload: &WirePayload) -> Fragment {
    render(&payload.user, &payload.message, payload.system)
}

/// Render a message stamped with `time`.
///
/// System bodies are server-authored and emitted verbatim. User bodies and
/// sender names are always escaped.
#[must_use]
pub fn render_at(sender: &str, body: &str, is_system: bool, time: NaiveTime) -> Fragment {
    let body = if is_system {
        body.into()
    } else {
        html_escape::encode_text(body)
    };
    let class = if is_system {
        "message message--system"
    } else {
        "message"
    };

    Fragment(format!(
        r#"<div class="{class}"><time class="message__time">{time}</time> <span class="message__user">{user}</span> <span class="message__body">{body}</span></div>"#,
        time = time.format(TIME_FORMAT),
        user = html_escape::encode_text(sender),
    ))
}
