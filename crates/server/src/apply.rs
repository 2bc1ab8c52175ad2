//! Folds an integration's reply back into the conversation.
//!
//! An integration may replace the message and props of the post that carried
//! the action and may show a short text to the user who fired it. Identity
//! overrides are never taken from the integration: they are copied from the
//! original post or dropped.

use std::sync::{Arc, LazyLock};

use postaction_core::{
    PROP_FROM_WEBHOOK, PROP_OVERRIDE_ICON_URL, PROP_OVERRIDE_USERNAME, Post,
    PostActionIntegrationResponse, Props, UserId,
};
use regex::Regex;
use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::error::DispatchError;
use crate::events::EphemeralSender;
use crate::store::PostStore;

/// Props an integration may not set on its own behalf.
const RETAINED_PROPS: [&str; 2] = [PROP_OVERRIDE_USERNAME, PROP_OVERRIDE_ICON_URL];

static SLACK_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<([^\n<|>]+)\|([^\n>]+)>").expect("Invalid regex"));

/// Rewrite Slack `<url|text>` links as Markdown `[text](url)`.
#[must_use]
pub fn parse_slack_links_to_markdown(text: &str) -> String {
    SLACK_LINK_RE.replace_all(text, "[$2]($1)").into_owned()
}

/// Apply the identity-override allowlist to `proposed`.
///
/// Each retained key takes the original post's value when it has one and is
/// removed otherwise. Every other proposed prop passes through untouched.
#[must_use]
pub fn retain_override_props(original: &Props, mut proposed: Props) -> Props {
    for key in RETAINED_PROPS {
        match original.get(key) {
            Some(value) => {
                proposed.insert(key.to_string(), value.clone());
            }
            None => {
                proposed.remove(key);
            }
        }
    }
    proposed
}

fn stamped(original: &Props, mut proposed: Props) -> Props {
    proposed.insert(PROP_FROM_WEBHOOK.to_string(), Value::from("true"));
    retain_override_props(original, proposed)
}

/// Persists post updates and delivers ephemeral replies.
#[derive(Clone)]
pub struct ResponseApplicator {
    posts: Arc<dyn PostStore>,
    ephemeral: Arc<dyn EphemeralSender>,
}

impl std::fmt::Debug for ResponseApplicator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseApplicator").finish_non_exhaustive()
    }
}

impl ResponseApplicator {
    #[must_use]
    pub fn new(posts: Arc<dyn PostStore>, ephemeral: Arc<dyn EphemeralSender>) -> Self {
        Self { posts, ephemeral }
    }

    /// Apply `response` to `original` on behalf of `user_id`.
    ///
    /// The update is written first; if it fails the ephemeral reply is not
    /// sent. Ephemeral delivery failures are logged only.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::Store` if the post update is rejected.
    #[instrument(skip_all, fields(post_id = %original.id, user_id = %user_id))]
    pub async fn apply(
        &self,
        original: &Post,
        response: PostActionIntegrationResponse,
        user_id: &UserId,
    ) -> Result<(), DispatchError> {
        if let Some(update) = response.update {
            let post = Self::build_update(original, update);
            self.posts.update(post, false).await?;
            debug!("post updated by integration");
        }

        if !response.ephemeral_text.is_empty() {
            let post = Self::build_ephemeral(original, &response.ephemeral_text);
            if let Err(e) = self.ephemeral.send_ephemeral(user_id, post) {
                warn!(error = %e, "failed to deliver ephemeral reply");
            }
        }

        Ok(())
    }

    /// The post to persist for an integration-supplied `update`.
    ///
    /// Only the message and props come from the integration.
    #[must_use]
    pub fn build_update(original: &Post, update: Post) -> Post {
        Post {
            message: update.message,
            props: stamped(&original.props, update.props),
            ..original.clone()
        }
    }

    /// The ephemeral reply carrying `text`.
    #[must_use]
    pub fn build_ephemeral(original: &Post, text: &str) -> Post {
        Post {
            channel_id: original.channel_id.clone(),
            root_id: original.thread_root(),
            user_id: original.user_id.clone(),
            message: parse_slack_links_to_markdown(text),
            props: stamped(&original.props, Props::new()),
            ..Post::default()
        }
    }
}
