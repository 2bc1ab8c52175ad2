//! Application state shared across handlers.

use std::sync::Arc;

use crate::config::{ConfigError, ServerConfig};
use crate::dialog::DialogPublisher;
use crate::dispatcher::{ActionDispatcher, Collaborators};
use crate::egress::EgressPolicy;
use crate::events::EventHub;
use crate::outbound::{AllowList, HttpService};
use crate::store::{MemoryStore, PermissionChecker, StoreError};
use crate::trigger::{SigningKeyProvider, TriggerCodec};

/// Errors building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("outbound HTTP setup failed: {0}")]
    Http(#[from] crate::outbound::OutboundError),
}

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    dispatcher: ActionDispatcher,
    dialogs: DialogPublisher,
    permissions: Arc<dyn PermissionChecker>,
    events: EventHub,
}

impl AppState {
    /// Wire the services together around explicit collaborators.
    #[must_use]
    pub fn new(
        config: &ServerConfig,
        keys: Arc<dyn SigningKeyProvider>,
        collaborators: Collaborators,
        permissions: Arc<dyn PermissionChecker>,
        events: EventHub,
        http: HttpService,
    ) -> Self {
        let codec = TriggerCodec::new(keys, config.trigger_ttl);
        let egress = EgressPolicy::new(config.site_url.as_str(), &config.subpath());

        Self {
            inner: Arc::new(AppStateInner {
                dispatcher: ActionDispatcher::new(collaborators, codec.clone(), egress, http),
                dialogs: DialogPublisher::new(codec, Arc::new(events.clone())),
                permissions,
                events,
            }),
        }
    }

    /// Build the standalone state: in-memory store, in-process event hub.
    ///
    /// Returns the store so callers can seed or inspect it.
    ///
    /// # Errors
    ///
    /// Returns `StateError` if the signing key, seed file or HTTP clients
    /// cannot be set up.
    pub async fn standalone(config: &ServerConfig) -> Result<(Self, MemoryStore), StateError> {
        let keys = Arc::new(config.load_signing_key()?);
        let events = EventHub::default();
        let store = match &config.seed_file {
            Some(path) => MemoryStore::from_seed_file(path).await?,
            None => MemoryStore::new(),
        }
        .with_events(Arc::new(events.clone()));
        let http = HttpService::new(
            config.outgoing_timeout,
            AllowList::parse(&config.allowed_untrusted_internal_connections),
        )?;

        let shared = Arc::new(store.clone());
        let state = Self::new(
            config,
            keys,
            Collaborators {
                posts: shared.clone(),
                channels: shared.clone(),
                ephemeral: Arc::new(events.clone()),
            },
            shared,
            events,
            http,
        );
        Ok((state, store))
    }

    #[must_use]
    pub fn dispatcher(&self) -> &ActionDispatcher {
        &self.inner.dispatcher
    }

    #[must_use]
    pub fn dialogs(&self) -> &DialogPublisher {
        &self.inner.dialogs
    }

    #[must_use]
    pub fn permissions(&self) -> &dyn PermissionChecker {
        self.inner.permissions.as_ref()
    }

    #[must_use]
    pub fn events(&self) -> &EventHub {
        &self.inner.events
    }
}
