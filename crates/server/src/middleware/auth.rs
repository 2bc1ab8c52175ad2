//! Session extractor.
//!
//! Authentication is terminated by the gateway in front of this service,
//! which forwards the authenticated user's id in the `x-user-id` header.

use axum::{extract::FromRequestParts, http::request::Parts};
use postaction_core::UserId;

use crate::error::{AppError, set_sentry_user};

/// Header carrying the authenticated user's id.
pub const USER_ID_HEADER: &str = "x-user-id";

/// Extractor that requires an authenticated session.
///
/// # Example
///
/// ```rust,ignore
/// async fn protected_handler(
///     RequireSession(user_id): RequireSession,
/// ) -> impl IntoResponse {
///     format!("Hello, {user_id}!")
/// }
/// ```
#[derive(Debug, Clone)]
pub struct RequireSession(pub UserId);

impl<S> FromRequestParts<S> for RequireSession
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user_id = parts
            .headers
            .get(USER_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(UserId::new)
            .ok_or_else(|| AppError::Unauthorized("no session".to_string()))?;

        set_sentry_user(&user_id);
        tracing::Span::current().record("user_id", user_id.as_str());

        Ok(Self(user_id))
    }
}
