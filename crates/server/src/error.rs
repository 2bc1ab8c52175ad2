//! Error types for action dispatch and their HTTP mapping.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use postaction_core::{PostId, UserId};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;
use crate::trigger::TriggerError;

/// Everything that can end an action or dialog flow.
///
/// Every variant is terminal; nothing is retried. Integration errors carry
/// the URL and upstream status but never the integration's response body.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("action {action_id} not found on post {post_id}")]
    NotFound { post_id: PostId, action_id: String },

    #[error("user {user_id} may not act on post {post_id}")]
    PermissionDenied { user_id: UserId, post_id: PostId },

    #[error("invalid trigger id: {0}")]
    TokenInvalid(String),

    #[error("trigger id has expired")]
    TokenExpired,

    /// The trigger id could not be minted.
    #[error("signing failed: {0}")]
    Signing(String),

    #[error("integration at {url} is unreachable: {reason}")]
    IntegrationUnreachable { url: String, reason: String },

    #[error("integration at {url} responded with status {status}")]
    IntegrationError { url: String, status: u16 },

    #[error("integration at {url} sent a malformed response: {reason}")]
    IntegrationMalformedResponse { url: String, reason: String },

    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<TriggerError> for DispatchError {
    fn from(err: TriggerError) -> Self {
        match err {
            TriggerError::Expired => Self::TokenExpired,
            TriggerError::Invalid(reason) => Self::TokenInvalid(reason),
            TriggerError::InvalidUserId(_) | TriggerError::Key(_) => Self::Signing(err.to_string()),
        }
    }
}

impl DispatchError {
    /// HTTP status this error maps to.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound { .. } | Self::Store(StoreError::NotFound { .. }) => {
                StatusCode::NOT_FOUND
            }
            Self::PermissionDenied { .. } => StatusCode::FORBIDDEN,
            Self::TokenInvalid(_)
            | Self::TokenExpired
            | Self::IntegrationUnreachable { .. }
            | Self::IntegrationError { .. }
            | Self::IntegrationMalformedResponse { .. } => StatusCode::BAD_REQUEST,
            Self::Signing(_) | Self::Store(_) | Self::Serialization(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message shown to the acting user.
    ///
    /// Only a permission failure is distinguished; URLs, addresses and
    /// integration replies stay in the logs.
    #[must_use]
    pub const fn client_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied { .. } => "You do not have permission to perform this action",
            _ => "Unable to complete the action",
        }
    }
}

/// HTTP-facing error returned by handlers.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// No authenticated session.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

impl AppError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Dispatch(err) => err.status_code(),
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Log server errors with Sentry
        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        } else {
            tracing::warn!(error = %self, status = status.as_u16(), "Request rejected");
        }

        // Don't expose internal error details to clients
        let message = match &self {
            _ if status.is_server_error() => "Internal server error".to_string(),
            Self::Dispatch(err) => err.client_message().to_string(),
            Self::Unauthorized(_) | Self::BadRequest(_) => self.to_string(),
        };

        (
            status,
            Json(json!({
                "message": message,
                "status_code": status.as_u16(),
            })),
        )
            .into_response()
    }
}

/// Set the Sentry user context for the acting user.
pub fn set_sentry_user(user_id: &UserId) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            ..Default::default()
        }));
    });
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn get_body(err: AppError) -> serde_json::Value {
        let bytes = axum::body::to_bytes(err.into_response().into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_integration_details_stay_out_of_response() {
        let err = DispatchError::IntegrationMalformedResponse {
            url: "http://10.0.0.5/hook".to_string(),
            reason: "invalid type: string \"SECRET_value\"".to_string(),
        };
        let body = get_body(err.into()).await;
        assert_eq!(body["message"], "Unable to complete the action");
        assert_eq!(body["status_code"], 400);
        let raw = body.to_string();
        assert!(!raw.contains("SECRET_value"));
        assert!(!raw.contains("10.0.0.5"));

        let unreachable = DispatchError::IntegrationUnreachable {
            url: "http://internal.local/hook".to_string(),
            reason: "address forbidden: internal.local resolves to 10.1.1.1".to_string(),
        };
        let raw = get_body(unreachable.into()).await.to_string();
        assert!(!raw.contains("internal.local"));
        assert!(!raw.contains("10.1.1.1"));
    }

    #[tokio::test]
    async fn test_permission_denied_has_own_message() {
        let denied = DispatchError::PermissionDenied {
            user_id: UserId::new("u"),
            post_id: PostId::new("p"),
        };
        let body = get_body(denied.into()).await;
        assert_eq!(
            body["message"],
            "You do not have permission to perform this action"
        );

        let body = get_body(DispatchError::TokenExpired.into()).await;
        assert_eq!(body["message"], "Unable to complete the action");
    }

    #[test]
    fn test_dispatch_error_display() {
        let err = DispatchError::IntegrationError {
            url: "http://example.com".to_string(),
            status: 500,
        };
        assert_eq!(
            err.to_string(),
            "integration at http://example.com responded with status 500"
        );
    }

    #[test]
    fn test_trigger_error_conversion() {
        assert!(matches!(
            DispatchError::from(TriggerError::Expired),
            DispatchError::TokenExpired
        ));
        assert!(matches!(
            DispatchError::from(TriggerError::Invalid("bad".to_string())),
            DispatchError::TokenInvalid(_)
        ));
    }

    #[test]
    fn test_app_error_status_codes() {
        let not_found = DispatchError::NotFound {
            post_id: PostId::new("p"),
            action_id: "a".to_string(),
        };
        assert_eq!(get_status(not_found.into()), StatusCode::NOT_FOUND);

        let denied = DispatchError::PermissionDenied {
            user_id: UserId::new("u"),
            post_id: PostId::new("p"),
        };
        assert_eq!(get_status(denied.into()), StatusCode::FORBIDDEN);

        assert_eq!(
            get_status(DispatchError::TokenExpired.into()),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(
                DispatchError::IntegrationUnreachable {
                    url: "http://x".to_string(),
                    reason: "refused".to_string(),
                }
                .into()
            ),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(DispatchError::Store(StoreError::not_found("post", "p")).into()),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(DispatchError::Store(StoreError::Rejected("x".to_string())).into()),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            get_status(AppError::Unauthorized("no session".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::BadRequest("bad".to_string())),
            StatusCode::BAD_REQUEST
        );
    }
}
