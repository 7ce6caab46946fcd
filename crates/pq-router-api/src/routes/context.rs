//! Follow-up context management.

use axum::extract::{Path, State};
use axum::http::StatusCode;

use crate::state::AppState;

/// DELETE /api/v1/context/{user_id}: forget the user's last resolved turn.
pub async fn clear_context(State(state): State<AppState>, Path(user_id): Path<String>) -> StatusCode {
    state.pipeline.context().invalidate(&user_id);
    tracing::debug!(user_id = %user_id, "follow-up context cleared");
    StatusCode::NO_CONTENT
}
