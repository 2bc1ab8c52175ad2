//! Collaborator interfaces for post, channel and permission lookups.
//!
//! The dispatcher only depends on these traits. [`MemoryStore`] implements
//! all three for standalone deployments and tests.

mod memory;

use async_trait::async_trait;
use postaction_core::{Channel, Post, PostId, UserId};
use thiserror::Error;

pub use memory::{MemoryStore, Seed, SeedChannel};

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Requested entity was not found.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: String },

    /// The store refused the write.
    #[error("update rejected: {0}")]
    Rejected(String),

    /// Fixture data could not be loaded.
    #[error("invalid seed data: {0}")]
    Seed(String),
}

impl StoreError {
    /// Shorthand for [`StoreError::NotFound`].
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }
}

/// Read and update posts.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Load one post by id.
    async fn get_single(&self, id: &PostId) -> Result<Post, StoreError>;

    /// Persist `post` over the stored post with the same id.
    ///
    /// A non-forced update refuses to modify system posts.
    async fn update(&self, post: Post, force: bool) -> Result<Post, StoreError>;
}

/// Resolve the channel a post lives in.
#[async_trait]
pub trait ChannelStore: Send + Sync {
    async fn get_for_post(&self, post_id: &PostId) -> Result<Channel, StoreError>;
}

/// Authorization checks for the acting user.
#[async_trait]
pub trait PermissionChecker: Send + Sync {
    /// Returns `true` if `user_id` may read the channel containing `post_id`.
    async fn can_read_channel_by_post(&self, user_id: &UserId, post_id: &PostId) -> bool;
}
