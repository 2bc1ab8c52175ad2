//! Server-sent event stream of real-time events.

use std::convert::Infallible;

use axum::{
    Router,
    extract::State,
    response::{
        Sse,
        sse::{Event, KeepAlive},
    },
    routing::get,
};
use futures::{Stream, StreamExt};
use tracing::info;

use crate::middleware::RequireSession;
use crate::state::AppState;

/// Create the event stream router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/v4/events", get(stream_events))
}

/// Stream the session user's events.
///
/// GET /api/v4/events
///
/// Each SSE message is named after the event and carries the full event as
/// JSON.
async fn stream_events(
    State(state): State<AppState>,
    RequireSession(user_id): RequireSession,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!(user_id = %user_id, "event stream connected");

    let sse_stream = state.events().subscribe(user_id).map(|event| {
        let json = serde_json::to_string(&event).unwrap_or_else(|_| {
            r#"{"event":"error","data":{},"broadcast":{}}"#.to_string()
        });
        Ok(Event::default().event(event.event).data(json))
    });

    Sse::new(sse_stream).keep_alive(KeepAlive::default())
}
