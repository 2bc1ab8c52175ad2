//! Dialog open route.

use axum::{Json, Router, body::Bytes, extract::State, routing::post};
use postaction_core::OpenDialogRequest;
use serde_json::{Value, json};
use tracing::instrument;

use crate::error::AppError;
use crate::state::AppState;

/// Create the dialog router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/v4/actions/dialogs/open", post(open_dialog))
}

/// Ask the client that fired an action to open a dialog.
///
/// POST /api/v4/actions/dialogs/open
///
/// Called by integrations, which prove the user's intent with the trigger id
/// they received instead of a session.
#[instrument(skip_all)]
async fn open_dialog(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let request: OpenDialogRequest = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("invalid dialog: {e}")))?;

    if request.url.is_empty() {
        return Err(AppError::BadRequest("missing url".to_string()));
    }
    if request.trigger_id.is_empty() {
        return Err(AppError::BadRequest("missing trigger_id".to_string()));
    }

    state.dialogs().open_dialog(request).await?;

    Ok(Json(json!({"status": "OK"})))
}
