//! Interactive action dispatcher.
//!
//! Posts may carry buttons and select menus whose activation calls an
//! external integration. This crate mints signed trigger ids for those calls,
//! routes them through an SSRF-aware HTTP client, folds the integration's
//! reply back into the conversation and relays dialog requests to the
//! client that fired the action.
//!
//! The binary runs standalone on an in-memory store; embedders supply their
//! own [`store`] and [`events`] collaborators through [`state::AppState::new`].

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod apply;
pub mod config;
pub mod dialog;
pub mod dispatcher;
pub mod egress;
pub mod error;
pub mod events;
pub mod middleware;
pub mod outbound;
pub mod routes;
pub mod state;
pub mod store;
pub mod trigger;
pub mod webhook;

use axum::Router;
use tower_http::trace::{DefaultOnResponse, OnResponse, TraceLayer};
use tracing::Span;

use state::AppState;

/// Build the application router with tracing and request-id layers.
///
/// Sentry layers are added by the binary, outside this router.
pub fn app(state: AppState) -> Router {
    routes::routes()
        .layer(axum::middleware::from_fn(
            middleware::request_id_middleware,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|request: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http_request",
                        method = %request.method(),
                        uri = %request.uri(),
                        request_id = tracing::field::Empty,
                        user_id = tracing::field::Empty,
                        status = tracing::field::Empty,
                        latency_ms = tracing::field::Empty,
                    )
                })
                .on_response(
                    |response: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &Span| {
                        span.record("status", response.status().as_u16());
                        span.record(
                            "latency_ms",
                            u64::try_from(latency.as_millis()).unwrap_or(u64::MAX),
                        );
                        DefaultOnResponse::default().on_response(response, latency, span);
                    },
                ),
        )
        .with_state(state)
}
