//! In-process real-time event fan-out.
//!
//! [`EventHub`] broadcasts every event to all subscribers; each subscriber
//! stream keeps only the events addressed to its user. Connection handling
//! lives in the SSE route.

use std::sync::Arc;

use async_stream::stream;
use futures::Stream;
use postaction_core::{
    EVENT_EPHEMERAL_MESSAGE, POST_TYPE_EPHEMERAL, Post, PostId, UserId, WebSocketEvent,
};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default number of events buffered per subscriber.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Errors delivering an event.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Nobody is connected to receive the event.
    #[error("no connected listeners for event {0}")]
    NoListeners(String),

    #[error("failed to encode event payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Publishes events to connected clients.
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: WebSocketEvent) -> Result<(), PublishError>;
}

/// Delivers a post to a single user without persisting it.
pub trait EphemeralSender: Send + Sync {
    /// Send `post` to `user_id`, returning the post as delivered.
    fn send_ephemeral(&self, user_id: &UserId, post: Post) -> Result<Post, PublishError>;
}

/// Broadcast hub shared by publishers and SSE subscribers.
#[derive(Debug, Clone)]
pub struct EventHub {
    sender: broadcast::Sender<Arc<WebSocketEvent>>,
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventHub {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Stream the events addressed to `user_id` from now on.
    ///
    /// Events missed because the subscriber fell behind are skipped.
    pub fn subscribe(&self, user_id: UserId) -> impl Stream<Item = WebSocketEvent> + use<> {
        let mut receiver = self.sender.subscribe();
        stream! {
            loop {
                match receiver.recv().await {
                    Ok(event) if event.is_addressed_to(&user_id) => {
                        yield WebSocketEvent::clone(&event);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(user_id = %user_id, skipped, "event subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }
}

impl EventPublisher for EventHub {
    fn publish(&self, event: WebSocketEvent) -> Result<(), PublishError> {
        let name = event.event.clone();
        let receivers = self
            .sender
            .send(Arc::new(event))
            .map_err(|_| PublishError::NoListeners(name.clone()))?;
        debug!(event = %name, receivers, "event published");
        Ok(())
    }
}

impl EphemeralSender for EventHub {
    fn send_ephemeral(&self, user_id: &UserId, mut post: Post) -> Result<Post, PublishError> {
        post.id = PostId::generate();
        post.post_type = POST_TYPE_EPHEMERAL.to_string();
        if post.create_at == 0 {
            post.create_at = chrono::Utc::now().timestamp_millis();
        }

        let mut event = WebSocketEvent::for_user(EVENT_EPHEMERAL_MESSAGE, user_id.clone());
        event.add("post", serde_json::to_string(&post)?);
        event.broadcast.channel_id = post.channel_id.clone();
        self.publish(event)?;

        Ok(post)
    }
}
