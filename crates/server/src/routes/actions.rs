//! Post action route.

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    routing::post,
};
use postaction_core::{DoPostActionRequest, PostActionApiResponse, PostId};
use tracing::instrument;

use crate::error::{AppError, DispatchError};
use crate::middleware::RequireSession;
use crate::state::AppState;

/// Create the post action router.
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/api/v4/posts/{post_id}/actions/{action_id}",
        post(do_post_action),
    )
}

/// Fire an interactive action embedded in a post.
///
/// POST /api/v4/posts/:post_id/actions/:action_id
///
/// The body may carry `selected_option`; an empty or unparseable body is
/// treated as no selection.
#[instrument(skip(state, body), fields(user_id = %user_id))]
async fn do_post_action(
    State(state): State<AppState>,
    RequireSession(user_id): RequireSession,
    Path((post_id, action_id)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<PostActionApiResponse>, AppError> {
    let post_id = PostId::new(post_id);
    if !post_id.is_valid() {
        return Err(AppError::BadRequest(format!("invalid post_id {post_id}")));
    }
    if action_id.is_empty() || !action_id.bytes().all(|b| b.is_ascii_alphanumeric()) {
        return Err(DispatchError::NotFound { post_id, action_id }.into());
    }

    if !state
        .permissions()
        .can_read_channel_by_post(&user_id, &post_id)
        .await
    {
        return Err(DispatchError::PermissionDenied { user_id, post_id }.into());
    }

    let request: DoPostActionRequest = serde_json::from_slice(&body).unwrap_or_default();

    let trigger_id = state
        .dispatcher()
        .do_post_action(&post_id, &action_id, &user_id, &request.selected_option)
        .await?;

    Ok(Json(PostActionApiResponse::ok(trigger_id)))
}
