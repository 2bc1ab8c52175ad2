//! Posts and the interactive attachments embedded in them.
//!
//! Interactive actions are not stored as first-class rows. They live inside
//! the post's `props.attachments[*].actions[*]` tree, in the shape that
//! Slack-compatible integrations already produce.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::id::{ChannelId, PostId, UserId, new_id};

/// Free-form post properties.
pub type Props = serde_json::Map<String, Value>;

/// Prop stamped on every post produced or mutated by an integration.
pub const PROP_FROM_WEBHOOK: &str = "from_webhook";
/// Prop overriding the author's display name.
pub const PROP_OVERRIDE_USERNAME: &str = "override_username";
/// Prop overriding the author's icon.
pub const PROP_OVERRIDE_ICON_URL: &str = "override_icon_url";
/// Prop holding the interactive attachments.
pub const PROP_ATTACHMENTS: &str = "attachments";

/// Post type of messages only visible to a single user.
pub const POST_TYPE_EPHEMERAL: &str = "system_ephemeral";

/// A message in a channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Post {
    pub id: PostId,
    pub create_at: i64,
    pub update_at: i64,
    pub edit_at: i64,
    pub user_id: UserId,
    pub channel_id: ChannelId,
    pub root_id: PostId,
    pub message: String,
    #[serde(rename = "type")]
    pub post_type: String,
    pub props: Props,
}

impl Post {
    /// Set a property, replacing any previous value.
    pub fn add_prop(&mut self, key: &str, value: impl Into<Value>) {
        self.props.insert(key.to_owned(), value.into());
    }

    /// Returns `true` if the post is a reply in a thread.
    #[must_use]
    pub fn is_reply(&self) -> bool {
        !self.root_id.is_empty()
    }

    /// The thread root a reply to this post belongs to.
    ///
    /// Replies keep their thread; top-level posts start one.
    #[must_use]
    pub fn thread_root(&self) -> PostId {
        if self.is_reply() {
            self.root_id.clone()
        } else {
            self.id.clone()
        }
    }

    /// Parse the interactive attachments out of the post's props.
    ///
    /// Each attachment is parsed on its own; malformed ones are skipped.
    #[must_use]
    pub fn attachments(&self) -> Vec<SlackAttachment> {
        self.attachment_values()
            .filter_map(|value| serde_json::from_value(value.clone()).ok())
            .collect()
    }

    /// Every well-formed action across all attachments, in order.
    ///
    /// Actions are parsed one by one, so a malformed sibling does not hide
    /// the others.
    #[must_use]
    pub fn actions(&self) -> Vec<PostAction> {
        self.attachment_values()
            .filter_map(|attachment| attachment.get("actions").and_then(Value::as_array))
            .flatten()
            .filter_map(|action| serde_json::from_value(action.clone()).ok())
            .collect()
    }

    /// Find an action by id across all attachments.
    #[must_use]
    pub fn get_action(&self, action_id: &str) -> Option<PostAction> {
        self.actions()
            .into_iter()
            .find(|action| action.id == action_id)
    }

    /// Assign ids to every action that does not have one yet.
    ///
    /// Ids are written into the stored props in place; existing ids and every
    /// other attachment field are left as they are.
    pub fn generate_action_ids(&mut self) {
        let Some(Value::Array(attachments)) = self.props.get_mut(PROP_ATTACHMENTS) else {
            return;
        };

        let actions = attachments
            .iter_mut()
            .filter_map(|attachment| attachment.get_mut("actions"))
            .filter_map(Value::as_array_mut)
            .flatten()
            .filter_map(Value::as_object_mut);

        for action in actions {
            let missing = action
                .get("id")
                .and_then(Value::as_str)
                .is_none_or(str::is_empty);
            if missing {
                action.insert("id".to_owned(), Value::from(new_id()));
            }
        }
    }

    fn attachment_values(&self) -> impl Iterator<Item = &Value> {
        self.props
            .get(PROP_ATTACHMENTS)
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
    }
}

/// A Slack-style message attachment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlackAttachment {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub fallback: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub color: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub pretext: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title_link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<PostAction>,
    /// Fields such as `fields`, `image_url` or `footer`, kept verbatim.
    #[serde(flatten)]
    pub extra: Props,
}

/// Kind of interactive element.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    /// Select menu; the chosen option is forwarded to the integration.
    Select,
    /// Clickable button. Unknown types are treated as buttons.
    #[default]
    #[serde(other)]
    Button,
}

/// An interactive element attached to a post.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostAction {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    /// Dynamic option source for select menus (e.g. `users`, `channels`).
    #[serde(skip_serializing_if = "String::is_empty")]
    pub data_source: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<PostActionOption>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub integration: Option<PostActionIntegration>,
}

/// A static option in a select menu.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostActionOption {
    pub text: String,
    pub value: String,
}

/// Endpoint invoked when an action fires.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PostActionIntegration {
    pub url: String,
    /// Opaque data chosen by the action's author; echoed back verbatim.
    pub context: Props,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn interactive_post() -> Post {
        serde_json::from_value(json!({
            "id": "p1",
            "channel_id": "c1",
            "user_id": "u1",
            "message": "Interactive post",
            "props": {
                "attachments": [
                    {
                        "text": "hello",
                        "actions": [
                            {
                                "id": "button1",
                                "name": "action",
                                "type": "button",
                                "integration": {"url": "http://example.com", "context": {"s": "foo", "n": 3}}
                            },
                            {
                                "name": "menu",
                                "type": "select",
                                "data_source": "users",
                                "integration": {"url": "http://example.com/menu"}
                            }
                        ]
                    }
                ]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_get_action_by_id() {
        let post = interactive_post();
        let action = post.get_action("button1").unwrap();
        assert_eq!(action.name, "action");
        assert_eq!(action.action_type, ActionType::Button);
        let integration = action.integration.unwrap();
        assert_eq!(integration.url, "http://example.com");
        assert_eq!(integration.context.get("n"), Some(&json!(3)));
    }

    #[test]
    fn test_get_action_missing() {
        assert!(interactive_post().get_action("nope").is_none());
        assert!(Post::default().get_action("button1").is_none());
    }

    #[test]
    fn test_generate_action_ids_fills_only_missing() {
        let mut post = interactive_post();
        post.generate_action_ids();

        let attachments = post.attachments();
        let actions = &attachments.first().unwrap().actions;
        assert_eq!(actions.first().unwrap().id, "button1");
        let generated = &actions.get(1).unwrap().id;
        assert_eq!(generated.len(), 26);
        assert_eq!(
            post.get_action(generated).unwrap().action_type,
            ActionType::Select
        );
    }

    #[test]
    fn test_unknown_action_type_is_button() {
        let action: PostAction =
            serde_json::from_value(json!({"id": "a", "type": "some_type"})).unwrap();
        assert_eq!(action.action_type, ActionType::Button);

        let select: PostAction = serde_json::from_value(json!({"type": "select"})).unwrap();
        assert_eq!(select.action_type, ActionType::Select);
        assert_eq!(serde_json::to_value(ActionType::Button).unwrap(), json!("button"));
    }

    #[test]
    fn test_generate_action_ids_keeps_other_attachment_fields() {
        let mut post: Post = serde_json::from_value(json!({
            "props": {
                "attachments": [{
                    "text": "hi",
                    "image_url": "http://example.com/chart.png",
                    "footer": "ci",
                    "fields": [{"title": "Build", "value": "42", "short": true}],
                    "actions": [{"name": "Approve", "integration": {"url": "http://x"}}]
                }]
            }
        }))
        .unwrap();

        post.generate_action_ids();

        let attachment = &post.props["attachments"][0];
        assert_eq!(attachment["image_url"], json!("http://example.com/chart.png"));
        assert_eq!(attachment["footer"], json!("ci"));
        assert_eq!(attachment["fields"][0]["value"], json!("42"));
        assert_eq!(attachment["actions"][0]["id"].as_str().unwrap().len(), 26);

        let parsed = post.attachments();
        assert_eq!(parsed[0].extra.get("footer"), Some(&json!("ci")));
    }

    #[test]
    fn test_malformed_sibling_does_not_hide_actions() {
        let post: Post = serde_json::from_value(json!({
            "props": {
                "attachments": [{
                    "actions": [
                        {"id": "menu1", "type": "select", "options": [{"text": "no value"}]},
                        {"id": "broken", "options": "not a list"},
                        {"id": "ok1", "name": "Fine"}
                    ]
                }]
            }
        }))
        .unwrap();

        assert_eq!(post.get_action("ok1").unwrap().name, "Fine");
        let menu = post.get_action("menu1").unwrap();
        assert_eq!(menu.options[0].text, "no value");
        assert!(menu.options[0].value.is_empty());
        assert!(post.get_action("broken").is_none());
    }

    #[test]
    fn test_thread_root() {
        let mut post = interactive_post();
        assert!(!post.is_reply());
        assert_eq!(post.thread_root().as_str(), "p1");

        post.root_id = PostId::new("root");
        assert!(post.is_reply());
        assert_eq!(post.thread_root().as_str(), "root");
    }

    #[test]
    fn test_post_deserializes_with_missing_fields() {
        let post: Post = serde_json::from_value(json!({"message": "updated"})).unwrap();
        assert_eq!(post.message, "updated");
        assert!(post.id.is_empty());
        assert!(post.props.is_empty());

        let encoded = serde_json::to_value(&post).unwrap();
        assert!(encoded.get("hashtags").is_none());
        assert!(encoded.get("pending_post_id").is_none());
    }
}
