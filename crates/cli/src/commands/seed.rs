//! Seed file validation.
//!
//! Loads a YAML fixture the same way the server does at startup and lists
//! every interactive action it defines, flagging actions that cannot fire.

use std::path::Path;

use postaction_core::Post;
use postaction_server::store::MemoryStore;
use tracing::{info, warn};

/// One action found in a seed file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionSummary {
    pub post_id: String,
    pub action_id: String,
    pub name: String,
    pub url: Option<String>,
}

/// List the actions of `posts` in order.
#[must_use]
pub fn summarize(posts: &[Post]) -> Vec<ActionSummary> {
    posts
        .iter()
        .flat_map(|post| {
            post.actions().into_iter().map(|action| ActionSummary {
                post_id: post.id.to_string(),
                action_id: action.id,
                name: action.name,
                url: action.integration.map(|integration| integration.url),
            })
        })
        .collect()
}

/// Load the seed file at `path` and report its actions.
///
/// # Errors
///
/// Returns an error if the file cannot be read or is not a valid seed file.
pub async fn check(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !path.exists() {
        return Err(format!("File not found: {}", path.display()).into());
    }

    let store = MemoryStore::from_seed_file(path).await?;
    let posts = store.posts().await;
    let actions = summarize(&posts);

    info!(posts = posts.len(), actions = actions.len(), "Seed file is valid");

    for action in &actions {
        match &action.url {
            Some(url) => info!(
                post_id = %action.post_id,
                action_id = %action.action_id,
                name = %action.name,
                url = %url,
                "Action"
            ),
            None => warn!(
                post_id = %action.post_id,
                action_id = %action.action_id,
                name = %action.name,
                "Action has no integration and will return not found"
            ),
        }
    }

    Ok(())
}
