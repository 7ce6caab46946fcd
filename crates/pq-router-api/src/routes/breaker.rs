//! Circuit breaker inspection and reset.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/v1/breaker: breaker snapshot, or null without a model.
pub async fn get_breaker(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "model": state.pipeline.model().map(|m| m.backend_name().to_string()),
        "breaker": state.breaker.as_ref().map(|b| b.snapshot()),
    }))
}

/// POST /api/v1/breaker/reset: close the breaker and forget failures.
pub async fn reset_breaker(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let breaker = state
        .breaker
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("no model backend configured".into()))?;
    breaker.reset();
    tracing::info!("circuit breaker reset via API");
    Ok(Json(json!({ "breaker": breaker.snapshot() })))
}
