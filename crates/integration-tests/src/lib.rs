//! Integration test harness for postaction.
//!
//! Each [`TestContext`] runs the full HTTP app on an ephemeral port, backed by
//! a fresh in-memory store and a stub integration that records every request
//! it receives.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p postaction-integration-tests
//! ```
//!
//! # Fixtures
//!
//! The seeded post lives in a channel whose only member is [`MEMBER`]. It
//! carries three actions:
//!
//! - `approve` - button calling the stub with a fixed context
//! - `choose` - select menu with the `users` data source
//! - `dead` - button without an integration

#![allow(clippy::unwrap_used, clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{Json, Router, extract::State, routing::post};
use postaction_core::{Channel, ChannelId, Post, PostActionIntegrationRequest, UserId};
use postaction_server::config::ServerConfig;
use postaction_server::state::AppState;
use postaction_server::store::MemoryStore;
use serde_json::{Value, json};

/// User allowed to read the seeded channel.
pub const MEMBER: &str = "member1";

/// User with no access to the seeded channel.
pub const OUTSIDER: &str = "outsider";

/// Header carrying the authenticated user.
pub use postaction_server::middleware::USER_ID_HEADER;

#[derive(Clone, Default)]
struct StubState {
    seen: Arc<Mutex<Vec<PostActionIntegrationRequest>>>,
    reply: Arc<Mutex<Value>>,
}

/// A stub integration endpoint.
pub struct Integration {
    pub base_url: String,
    state: StubState,
}

impl Integration {
    /// Start the stub on `127.0.0.1` with an empty reply.
    pub async fn spawn() -> Self {
        async fn hook(
            State(state): State<StubState>,
            Json(request): Json<PostActionIntegrationRequest>,
        ) -> Json<Value> {
            state.seen.lock().unwrap().push(request);
            Json(state.reply.lock().unwrap().clone())
        }

        let state = StubState {
            reply: Arc::new(Mutex::new(json!({}))),
            ..StubState::default()
        };
        let app = Router::new()
            .route("/hook", post(hook))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: format!("http://{addr}"),
            state,
        }
    }

    /// Reply with `body` to every following call.
    pub fn set_reply(&self, body: Value) {
        *self.state.reply.lock().unwrap() = body;
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<PostActionIntegrationRequest> {
        self.state.seen.lock().unwrap().clone()
    }
}

/// A running app plus handles to its internals.
pub struct TestContext {
    pub client: reqwest::Client,
    pub base_url: String,
    pub state: AppState,
    pub store: MemoryStore,
    pub integration: Integration,
    pub post: Post,
}

impl TestContext {
    /// App that may call the loopback stub.
    pub async fn new() -> Self {
        Self::with_allowlist("127.0.0.1").await
    }

    /// App whose untrusted-internal allowlist is `allowlist`.
    pub async fn with_allowlist(allowlist: &str) -> Self {
        let integration = Integration::spawn().await;

        let vars: HashMap<&str, String> = HashMap::from([
            ("POSTACTION_SITE_URL", "http://localhost:8065".to_string()),
            (
                "POSTACTION_ALLOWED_UNTRUSTED_INTERNAL_CONNECTIONS",
                allowlist.to_string(),
            ),
            ("POSTACTION_TRIGGER_TTL_MS", "60000".to_string()),
            ("POSTACTION_OUTGOING_TIMEOUT_SECS", "5".to_string()),
        ]);
        let config = ServerConfig::from_lookup(|key| vars.get(key).cloned()).unwrap();

        let (state, store) = AppState::standalone(&config).await.unwrap();
        let post = seed(&store, &integration.base_url).await;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let app = postaction_server::app(state.clone());
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            client: reqwest::Client::new(),
            base_url: format!("http://{addr}"),
            state,
            store,
            integration,
            post,
        }
    }

    /// URL of `path` on the running app.
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// Fire `action_id` on the seeded post as `user_id`.
    pub async fn fire(&self, action_id: &str, user_id: &str, body: Value) -> reqwest::Response {
        self.client
            .post(self.url(&format!(
                "/api/v4/posts/{}/actions/{action_id}",
                self.post.id
            )))
            .header(USER_ID_HEADER, user_id)
            .json(&body)
            .send()
            .await
            .unwrap()
    }

    /// POST `body` to the dialog endpoint.
    pub async fn open_dialog(&self, body: Value) -> reqwest::Response {
        self.client
            .post(self.url("/api/v4/actions/dialogs/open"))
            .json(&body)
            .send()
            .await
            .unwrap()
    }
}

async fn seed(store: &MemoryStore, integration: &str) -> Post {
    let channel_id = ChannelId::new("town-square");
    store
        .add_channel(Channel {
            id: channel_id.clone(),
            team_id: "team1".into(),
            ..Channel::default()
        })
        .await;
    store
        .add_member(&channel_id, UserId::new(MEMBER))
        .await;

    let hook = format!("{integration}/hook");
    let post: Post = serde_json::from_value(json!({
        "channel_id": channel_id.as_str(),
        "user_id": "bot",
        "message": "Deploy to production?",
        "props": {
            "override_username": "deploybot",
            "attachments": [{
                "text": "Pick one",
                "actions": [
                    {
                        "id": "approve",
                        "name": "Approve",
                        "type": "button",
                        "integration": {"url": hook, "context": {"env": "prod"}}
                    },
                    {
                        "id": "choose",
                        "name": "Reviewer",
                        "type": "select",
                        "data_source": "users",
                        "integration": {"url": hook}
                    },
                    {"id": "dead", "name": "Nothing"}
                ]
            }]
        }
    }))
    .unwrap();

    store.create_post(post).await
}
