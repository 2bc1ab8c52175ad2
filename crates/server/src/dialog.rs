//! Relays integration dialog requests to the user's client.

use std::sync::Arc;

use moka::future::Cache;
use postaction_core::{EVENT_OPEN_DIALOG, OpenDialogRequest, WebSocketEvent};
use tracing::{info, instrument, warn};

use crate::error::DispatchError;
use crate::events::EventPublisher;
use crate::trigger::TriggerCodec;

/// Upper bound on trigger ids remembered at once.
const MAX_CONSUMED_TRIGGERS: u64 = 100_000;

/// Verifies dialog requests and publishes `open_dialog` events.
#[derive(Clone)]
pub struct DialogPublisher {
    codec: TriggerCodec,
    events: Arc<dyn EventPublisher>,
    /// Client ids already used to open a dialog, kept for one freshness window.
    consumed: Cache<String, ()>,
}

impl std::fmt::Debug for DialogPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DialogPublisher")
            .field("codec", &self.codec)
            .field("consumed", &self.consumed.entry_count())
            .finish_non_exhaustive()
    }
}

impl DialogPublisher {
    #[must_use]
    pub fn new(codec: TriggerCodec, events: Arc<dyn EventPublisher>) -> Self {
        let consumed = Cache::builder()
            .max_capacity(MAX_CONSUMED_TRIGGERS)
            .time_to_live(codec.ttl())
            .build();

        Self {
            codec,
            events,
            consumed,
        }
    }

    /// Verify `request.trigger_id` and ask the acting user's client to render
    /// the dialog.
    ///
    /// The event is addressed to the user the trigger id was minted for.
    /// Delivery failures are logged and not reported.
    ///
    /// # Errors
    ///
    /// Returns `TokenInvalid` if the trigger id is malformed, forged or was
    /// already used, and `TokenExpired` if it is past its window.
    #[instrument(skip_all, fields(url = %request.url))]
    pub async fn open_dialog(&self, mut request: OpenDialogRequest) -> Result<(), DispatchError> {
        let token = self.codec.decode_and_verify(&request.trigger_id)?;
        let client_id = token.to_client_form();

        let first_use = self
            .consumed
            .entry(client_id.clone())
            .or_insert(())
            .await
            .is_fresh();
        if !first_use {
            warn!(user_id = %token.user_id(), "trigger id reused");
            return Err(DispatchError::TokenInvalid(
                "trigger id has already been used".to_string(),
            ));
        }

        request.trigger_id = client_id;
        let payload = serde_json::to_string(&request)?;

        let mut event = WebSocketEvent::for_user(EVENT_OPEN_DIALOG, token.user_id().clone());
        event.add("dialog", payload);

        match self.events.publish(event) {
            Ok(()) => info!(user_id = %token.user_id(), "dialog opened"),
            Err(e) => warn!(
                user_id = %token.user_id(),
                error = %e,
                "failed to publish dialog event"
            ),
        }

        Ok(())
    }
}
