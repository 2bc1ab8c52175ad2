//! HTTP route handlers.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                                     - Health check
//!
//! # Actions (session required)
//! POST /api/v4/posts/:post_id/actions/:action_id   - Fire a post action
//!
//! # Dialogs (authorized by trigger id)
//! POST /api/v4/actions/dialogs/open                - Open a dialog for a user
//!
//! # Events (session required)
//! GET  /api/v4/events                              - SSE stream of the user's events
//! ```

pub mod actions;
pub mod dialogs;
pub mod events;

use axum::{Router, routing::get};

use crate::state::AppState;

/// Create all routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .merge(actions::router())
        .merge(dialogs::router())
        .merge(events::router())
}

/// Liveness health check endpoint.
async fn health() -> &'static str {
    "ok"
}
