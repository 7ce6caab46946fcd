//! Health check endpoint.

use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::state::AppState;

/// GET /health: liveness check with model backend and breaker state.
pub async fn health(State(state): State<AppState>) -> Json<Value> {
    let model = state
        .pipeline
        .model()
        .map(|m| m.backend_name().to_string())
        .unwrap_or_else(|| "disabled".to_string());
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "model": model,
        "breaker": state.breaker.as_ref().map(|b| b.state()),
    }))
}
