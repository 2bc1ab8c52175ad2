//! Wire payloads exchanged with clients and with external integrations.

use serde::{Deserialize, Serialize};

use super::id::{ChannelId, PostId, TeamId, UserId};
use super::post::{ActionType, Post, Props};

/// Context key carrying the option chosen in a select menu.
pub const CONTEXT_SELECTED_OPTION: &str = "selected_option";

/// Body of a client's request to fire an action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DoPostActionRequest {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub selected_option: String,
}

/// Response returned to the client after an action fired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostActionApiResponse {
    pub status: String,
    #[serde(default)]
    pub trigger_id: String,
}

impl PostActionApiResponse {
    /// Successful response carrying the client-facing trigger id.
    #[must_use]
    pub fn ok(trigger_id: impl Into<String>) -> Self {
        Self {
            status: "OK".to_owned(),
            trigger_id: trigger_id.into(),
        }
    }
}

/// Request body sent to the integration when an action fires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostActionIntegrationRequest {
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub team_id: TeamId,
    pub post_id: PostId,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub data_source: String,
    pub context: Props,
    /// Signed trigger id; echoing it back opens a dialog for the user.
    pub trigger_id: String,
}

/// What an integration may send back after an action fired.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostActionIntegrationResponse {
    /// Replacement fields for the post that carried the action.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<Post>,
    /// Text shown only to the user who fired the action.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub ephemeral_text: String,
}
