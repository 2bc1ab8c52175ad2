//! Real-time events pushed to connected clients.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::{ChannelId, TeamId, UserId};

/// Event asking a client to render an interactive dialog.
pub const EVENT_OPEN_DIALOG: &str = "open_dialog";
/// Event delivering a post visible only to its recipient.
pub const EVENT_EPHEMERAL_MESSAGE: &str = "ephemeral_message";
/// Event carrying the new state of an edited post.
pub const EVENT_POST_EDITED: &str = "post_edited";

/// Who an event is delivered to.
///
/// A non-empty `user_id` addresses exactly that user; channel and team scopes
/// are carried for transports that fan out more widely.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Broadcast {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub team_id: TeamId,
}

/// A named event with a JSON payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebSocketEvent {
    pub event: String,
    pub data: serde_json::Map<String, Value>,
    pub broadcast: Broadcast,
}

impl WebSocketEvent {
    /// Create an event addressed to a single user.
    #[must_use]
    pub fn for_user(event: &str, user_id: UserId) -> Self {
        Self {
            event: event.to_owned(),
            data: serde_json::Map::new(),
            broadcast: Broadcast {
                user_id,
                ..Broadcast::default()
            },
        }
    }

    /// Attach a payload field.
    pub fn add(&mut self, key: &str, value: impl Into<Value>) {
        self.data.insert(key.to_owned(), value.into());
    }

    /// Returns `true` if the event should reach `user_id`.
    #[must_use]
    pub fn is_addressed_to(&self, user_id: &UserId) -> bool {
        &self.broadcast.user_id == user_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_for_user() {
        let mut event = WebSocketEvent::for_user(EVENT_OPEN_DIALOG, UserId::new("u1"));
        event.add("dialog", "{}");

        assert!(event.is_addressed_to(&UserId::new("u1")));
        assert!(!event.is_addressed_to(&UserId::new("u2")));
        assert_eq!(event.data.get("dialog"), Some(&Value::from("{}")));
    }
}
