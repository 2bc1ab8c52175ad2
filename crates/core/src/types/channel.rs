//! Channels that posts belong to.

use serde::{Deserialize, Serialize};

use super::id::{ChannelId, TeamId};

/// A conversation channel.
///
/// Only the fields the dispatcher reads are modelled; the channel store owns
/// everything else.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Channel {
    pub id: ChannelId,
    /// Owning team. Empty for direct and group messages.
    pub team_id: TeamId,
    pub name: String,
    pub display_name: String,
    #[serde(rename = "type")]
    pub channel_type: String,
}
