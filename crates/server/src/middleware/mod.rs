//! HTTP middleware and extractors.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. `TraceLayer` (request span with status and latency)
//! 3. Request ID (record and echo `x-request-id`)
//!
//! Session resolution happens per handler through [`RequireSession`].

pub mod auth;
pub mod request_id;

pub use auth::{RequireSession, USER_ID_HEADER};
pub use request_id::{REQUEST_ID_HEADER, request_id_middleware};
