//! In-memory post and channel store.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use postaction_core::{
    Channel, ChannelId, EVENT_POST_EDITED, Post, PostId, UserId, WebSocketEvent,
};
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use super::{ChannelStore, PermissionChecker, PostStore, StoreError};
use crate::events::EventPublisher;

/// Fixture data for [`MemoryStore::from_seed`].
///
/// ```yaml
/// channels:
///   - id: town-square
///     team_id: team1
///     name: town-square
///     members: [user1]
/// posts:
///   - channel_id: town-square
///     user_id: bot
///     message: Deploy to production?
///     props:
///       attachments:
///         - actions:
///             - name: Approve
///               integration:
///                 url: http://localhost:8065/plugins/deploy/approve
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Seed {
    pub channels: Vec<SeedChannel>,
    pub posts: Vec<Post>,
}

/// A channel plus the users allowed to read it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedChannel {
    #[serde(flatten)]
    pub channel: Channel,
    #[serde(default)]
    pub members: Vec<UserId>,
}

#[derive(Debug, Default)]
struct Tables {
    posts: HashMap<PostId, Post>,
    channels: HashMap<ChannelId, Channel>,
    members: HashMap<ChannelId, HashSet<UserId>>,
}

/// Posts, channels and channel membership held behind one lock.
///
/// When built [`with_events`](Self::with_events), every update is announced
/// to the channel's members as a `post_edited` event.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
    events: Option<Arc<dyn EventPublisher>>,
}

impl fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryStore")
            .field("tables", &self.tables)
            .field("events", &self.events.is_some())
            .finish()
    }
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Announce post edits through `events`.
    #[must_use]
    pub fn with_events(mut self, events: Arc<dyn EventPublisher>) -> Self {
        self.events = Some(events);
        self
    }

    fn publish_edited(&self, post: &Post, members: Vec<UserId>) {
        let Some(events) = &self.events else {
            return;
        };
        let payload = match serde_json::to_string(post) {
            Ok(payload) => payload,
            Err(e) => {
                debug!(error = %e, "failed to encode edited post");
                return;
            }
        };

        for user_id in members {
            let mut event = WebSocketEvent::for_user(EVENT_POST_EDITED, user_id);
            event.add("post", payload.clone());
            event.broadcast.channel_id = post.channel_id.clone();
            if let Err(e) = events.publish(event) {
                debug!(error = %e, "post_edited not delivered");
            }
        }
    }

    /// Build a store from parsed fixture data.
    pub async fn from_seed(seed: Seed) -> Self {
        let store = Self::new();
        for SeedChannel { channel, members } in seed.channels {
            let channel_id = channel.id.clone();
            store.add_channel(channel).await;
            for user_id in members {
                store.add_member(&channel_id, user_id).await;
            }
        }
        for post in seed.posts {
            store.create_post(post).await;
        }
        store
    }

    /// Load a YAML fixture file.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Seed` if the file cannot be read or parsed.
    #[instrument]
    pub async fn from_seed_file(path: &Path) -> Result<Self, StoreError> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| StoreError::Seed(format!("{}: {e}", path.display())))?;
        let seed: Seed =
            serde_yaml::from_str(&raw).map_err(|e| StoreError::Seed(e.to_string()))?;

        info!(
            channels = seed.channels.len(),
            posts = seed.posts.len(),
            "Loaded seed data"
        );
        Ok(Self::from_seed(seed).await)
    }

    pub async fn add_channel(&self, channel: Channel) {
        let mut tables = self.tables.write().await;
        tables.channels.insert(channel.id.clone(), channel);
    }

    pub async fn add_member(&self, channel_id: &ChannelId, user_id: UserId) {
        let mut tables = self.tables.write().await;
        tables
            .members
            .entry(channel_id.clone())
            .or_default()
            .insert(user_id);
    }

    /// Insert a new post.
    ///
    /// Fills in a missing id and timestamps and assigns ids to actions that
    /// lack one.
    pub async fn create_post(&self, mut post: Post) -> Post {
        if post.id.is_empty() {
            post.id = PostId::generate();
        }
        let now = chrono::Utc::now().timestamp_millis();
        if post.create_at == 0 {
            post.create_at = now;
        }
        post.update_at = post.create_at;
        post.generate_action_ids();

        let mut tables = self.tables.write().await;
        tables.posts.insert(post.id.clone(), post.clone());
        debug!(post_id = %post.id, "post created");
        post
    }

    /// All stored posts, oldest first.
    pub async fn posts(&self) -> Vec<Post> {
        let tables = self.tables.read().await;
        let mut posts: Vec<Post> = tables.posts.values().cloned().collect();
        posts.sort_by_key(|post| post.create_at);
        posts
    }
}

#[async_trait]
impl PostStore for MemoryStore {
    async fn get_single(&self, id: &PostId) -> Result<Post, StoreError> {
        self.tables
            .read()
            .await
            .posts
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("post", id.as_str()))
    }

    #[instrument(skip(self, post), fields(post_id = %post.id))]
    async fn update(&self, post: Post, force: bool) -> Result<Post, StoreError> {
        let mut tables = self.tables.write().await;
        let stored = tables
            .posts
            .get_mut(&post.id)
            .ok_or_else(|| StoreError::not_found("post", post.id.as_str()))?;

        if !force && stored.post_type.starts_with("system_") {
            return Err(StoreError::Rejected(format!(
                "post {} is a system message",
                post.id
            )));
        }

        let now = chrono::Utc::now().timestamp_millis();
        if stored.message != post.message {
            stored.message = post.message;
            stored.edit_at = now;
        }
        stored.props = post.props;
        stored.update_at = now;

        let updated = stored.clone();
        let members: Vec<UserId> = tables
            .members
            .get(&updated.channel_id)
            .map(|members| members.iter().cloned().collect())
            .unwrap_or_default();
        drop(tables);

        debug!("post updated");
        self.publish_edited(&updated, members);
        Ok(updated)
    }
}

#[async_trait]
impl ChannelStore for MemoryStore {
    async fn get_for_post(&self, post_id: &PostId) -> Result<Channel, StoreError> {
        let tables = self.tables.read().await;
        let post = tables
            .posts
            .get(post_id)
            .ok_or_else(|| StoreError::not_found("post", post_id.as_str()))?;
        tables
            .channels
            .get(&post.channel_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found("channel", post.channel_id.as_str()))
    }
}

#[async_trait]
impl PermissionChecker for MemoryStore {
    async fn can_read_channel_by_post(&self, user_id: &UserId, post_id: &PostId) -> bool {
        let tables = self.tables.read().await;
        tables
            .posts
            .get(post_id)
            .and_then(|post| tables.members.get(&post.channel_id))
            .is_some_and(|members| members.contains(user_id))
    }
}
