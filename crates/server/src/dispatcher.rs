//! Entry point for firing a post action.
//!
//! 1. Load the post and its channel concurrently
//! 2. Resolve the action embedded in the post
//! 3. Mint a trigger id for the acting user
//! 4. Classify the integration URL and call it
//! 5. Apply the reply and hand the client form of the trigger id back
//!
//! The first failing step ends the flow; earlier steps are not rolled back.

use std::sync::Arc;

use postaction_core::{
    ActionType, CONTEXT_SELECTED_OPTION, Channel, Post, PostAction, PostActionIntegrationRequest,
    PostId, UserId,
};
use serde_json::Value;
use tracing::{info, instrument};

use crate::apply::ResponseApplicator;
use crate::egress::EgressPolicy;
use crate::error::DispatchError;
use crate::events::EphemeralSender;
use crate::outbound::HttpService;
use crate::store::{ChannelStore, PostStore};
use crate::trigger::TriggerCodec;
use crate::webhook::WebhookInvoker;

/// Stores and delivery channels the dispatcher depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub posts: Arc<dyn PostStore>,
    pub channels: Arc<dyn ChannelStore>,
    pub ephemeral: Arc<dyn EphemeralSender>,
}

/// Runs the post action flow.
#[derive(Clone)]
pub struct ActionDispatcher {
    posts: Arc<dyn PostStore>,
    channels: Arc<dyn ChannelStore>,
    codec: TriggerCodec,
    egress: EgressPolicy,
    webhook: WebhookInvoker,
    applicator: ResponseApplicator,
}

impl std::fmt::Debug for ActionDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActionDispatcher")
            .field("codec", &self.codec)
            .field("egress", &self.egress)
            .finish_non_exhaustive()
    }
}

impl ActionDispatcher {
    #[must_use]
    pub fn new(
        collaborators: Collaborators,
        codec: TriggerCodec,
        egress: EgressPolicy,
        http: HttpService,
    ) -> Self {
        let Collaborators {
            posts,
            channels,
            ephemeral,
        } = collaborators;

        Self {
            applicator: ResponseApplicator::new(Arc::clone(&posts), ephemeral),
            posts,
            channels,
            codec,
            egress,
            webhook: WebhookInvoker::new(http),
        }
    }

    /// Fire `action_id` on `post_id` for `user_id`.
    ///
    /// Returns the client form of the trigger id sent to the integration.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the post has no such action or the action has no
    ///   integration
    /// - `Store` if the post or channel cannot be loaded or the update fails
    /// - integration errors from the outbound call
    #[instrument(skip(self, selected_option), fields(post_id = %post_id, user_id = %user_id))]
    pub async fn do_post_action(
        &self,
        post_id: &PostId,
        action_id: &str,
        user_id: &UserId,
        selected_option: &str,
    ) -> Result<String, DispatchError> {
        let (post, channel) = tokio::try_join!(
            self.posts.get_single(post_id),
            self.channels.get_for_post(post_id),
        )?;

        let (action, url) = post
            .get_action(action_id)
            .and_then(|action| {
                let url = action.integration.as_ref()?.url.clone();
                Some((action, url))
            })
            .ok_or_else(|| DispatchError::NotFound {
                post_id: post_id.clone(),
                action_id: action_id.to_string(),
            })?;

        let token = self.codec.mint(user_id)?;
        let request = build_request(
            &post,
            &channel,
            &action,
            user_id,
            token.to_request_form(),
            selected_option,
        );

        let egress = self.egress.classify(&url);
        let response = self.webhook.invoke(&url, &request, egress).await?;
        self.applicator.apply(&post, response, user_id).await?;

        info!(egress = ?egress, "post action completed");
        Ok(token.to_client_form())
    }
}

/// Assemble the body sent to the action's integration.
///
/// Select menus forward their data source and the chosen option; buttons send
/// neither.
#[must_use]
pub fn build_request(
    post: &Post,
    channel: &Channel,
    action: &PostAction,
    user_id: &UserId,
    trigger_id: String,
    selected_option: &str,
) -> PostActionIntegrationRequest {
    let mut context = action
        .integration
        .as_ref()
        .map(|integration| integration.context.clone())
        .unwrap_or_default();

    let data_source = match action.action_type {
        ActionType::Select => {
            context.insert(
                CONTEXT_SELECTED_OPTION.to_string(),
                Value::from(selected_option),
            );
            action.data_source.clone()
        }
        ActionType::Button => String::new(),
    };

    PostActionIntegrationRequest {
        user_id: user_id.clone(),
        channel_id: post.channel_id.clone(),
        team_id: channel.team_id.clone(),
        post_id: post.id.clone(),
        action_type: action.action_type,
        data_source,
        context,
        trigger_id,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use axum::{Json, Router, extract::State, routing::post};
    use postaction_core::ChannelId;
    use serde_json::json;

    use super::*;
    use crate::events::EventHub;
    use crate::outbound::AllowList;
    use crate::store::MemoryStore;
    use crate::trigger::{DEFAULT_TRIGGER_TTL, StaticSigningKey};

    type Seen = Arc<Mutex<Vec<PostActionIntegrationRequest>>>;

    async fn spawn_integration(reply: Value) -> (String, Seen) {
        let seen: Seen = Arc::default();
        let handler = move |State(seen): State<Seen>,
                            Json(request): Json<PostActionIntegrationRequest>| {
            let reply = reply.clone();
            async move {
                seen.lock().unwrap().push(request);
                Json(reply)
            }
        };
        let app = Router::new()
            .route("/", post(handler.clone()))
            .route("/plugins/{*rest}", post(handler))
            .with_state(Arc::clone(&seen));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (format!("http://{addr}"), seen)
    }

    async fn setup(url: &str, allow: &str) -> (MemoryStore, ActionDispatcher, Post) {
        let store = MemoryStore::new();
        store
            .add_channel(Channel {
                id: ChannelId::new("c1"),
                team_id: "t1".into(),
                ..Channel::default()
            })
            .await;

        let post: Post = serde_json::from_value(json!({
            "channel_id": "c1",
            "user_id": "author",
            "message": "Interactive post",
            "props": {
                "attachments": [{
                    "text": "hello",
                    "actions": [
                        {
                            "id": "button1",
                            "name": "Approve",
                            "type": "button",
                            "data_source": "ignored",
                            "integration": {"url": url, "context": {"s": "foo", "n": 3}}
                        },
                        {
                            "id": "menu1",
                            "name": "Pick",
                            "type": "select",
                            "data_source": "users",
                            "integration": {"url": url}
                        },
                        {"id": "nohook", "name": "Dead"}
                    ]
                }]
            }
        }))
        .unwrap();
        let post = store.create_post(post).await;

        let store_arc = Arc::new(store.clone());
        let dispatcher = ActionDispatcher::new(
            Collaborators {
                posts: store_arc.clone(),
                channels: store_arc,
                ephemeral: Arc::new(EventHub::default()),
            },
            TriggerCodec::new(Arc::new(StaticSigningKey::generate()), DEFAULT_TRIGGER_TTL),
            EgressPolicy::new("http://localhost:8065", ""),
            HttpService::new(Duration::from_secs(5), AllowList::parse(allow)).unwrap(),
        );

        (store, dispatcher, post)
    }

    #[tokio::test]
    async fn test_button_updates_post() {
        let (base, seen) = spawn_integration(json!({"update": {"message": "updated"}})).await;
        let (store, dispatcher, post) = setup(&base, "localhost 127.0.0.1").await;

        let trigger_id = dispatcher
            .do_post_action(&post.id, "button1", &UserId::new("clicker"), "")
            .await
            .unwrap();
        assert_eq!(trigger_id.len(), 26);

        assert_eq!(store.get_single(&post.id).await.unwrap().message, "updated");

        let seen = seen.lock().unwrap();
        let request = seen.first().unwrap();
        assert_eq!(request.action_type, ActionType::Button);
        assert!(request.data_source.is_empty());
        assert_eq!(request.team_id.as_str(), "t1");
        assert_eq!(request.user_id.as_str(), "clicker");
        assert_eq!(request.context.get("n"), Some(&json!(3)));
        assert!(request.context.get(CONTEXT_SELECTED_OPTION).is_none());
        assert!(!request.trigger_id.is_empty());
        assert_ne!(request.trigger_id, trigger_id);
    }

    #[tokio::test]
    async fn test_select_forwards_option_and_data_source() {
        let (base, seen) = spawn_integration(json!({})).await;
        let (_store, dispatcher, post) = setup(&base, "127.0.0.1").await;

        dispatcher
            .do_post_action(&post.id, "menu1", &UserId::new("clicker"), "x")
            .await
            .unwrap();

        let seen = seen.lock().unwrap();
        let request = seen.first().unwrap();
        assert_eq!(request.action_type, ActionType::Select);
        assert_eq!(request.data_source, "users");
        assert_eq!(request.context.get(CONTEXT_SELECTED_OPTION), Some(&json!("x")));
    }

    #[tokio::test]
    async fn test_unknown_action_is_not_found() {
        let (base, seen) = spawn_integration(json!({})).await;
        let (_store, dispatcher, post) = setup(&base, "127.0.0.1").await;

        for action_id in ["missing", "nohook"] {
            let err = dispatcher
                .do_post_action(&post.id, action_id, &UserId::new("clicker"), "")
                .await
                .unwrap_err();
            assert!(matches!(err, DispatchError::NotFound { .. }));
        }
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_unknown_post_is_store_not_found() {
        let (base, _) = spawn_integration(json!({})).await;
        let (_store, dispatcher, _post) = setup(&base, "").await;

        let err = dispatcher
            .do_post_action(&PostId::new("missing"), "button1", &UserId::new("u"), "")
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::Store(_)));
    }

    #[tokio::test]
    async fn test_loopback_integration_needs_allowlist() {
        let (base, seen) = spawn_integration(json!({})).await;
        let (_store, dispatcher, post) = setup(&base, "").await;

        let err = dispatcher
            .do_post_action(&post.id, "button1", &UserId::new("clicker"), "")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("address forbidden"));
        assert!(seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_plugin_path_is_trusted_without_allowlist() {
        let (base, seen) = spawn_integration(json!({})).await;
        let (_store, dispatcher, post) =
            setup(&format!("{base}/plugins/myplugin/myaction"), "").await;

        dispatcher
            .do_post_action(&post.id, "button1", &UserId::new("clicker"), "")
            .await
            .unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
