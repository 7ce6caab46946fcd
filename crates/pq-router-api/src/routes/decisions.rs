//! Decision log endpoints.

use axum::Json;
use axum::extract::{Path, State};
use uuid::Uuid;

use crate::db;
use crate::db::decisions::DecisionRow;
use crate::error::{ApiError, ApiResult};
use crate::state::{AppState, DecisionRecord};

/// Maximum decisions returned by the list endpoint.
const LIST_LIMIT: usize = 50;

fn from_row(row: DecisionRow) -> ApiResult<DecisionRecord> {
    let decision = row
        .decision()
        .map_err(|e| ApiError::Internal(format!("corrupt decision payload: {e}")))?;
    Ok(DecisionRecord {
        question: row.question,
        user_id: row.user_id,
        decision,
    })
}

/// GET /api/v1/decisions: recent decisions, newest first.
pub async fn list_decisions(State(state): State<AppState>) -> ApiResult<Json<Vec<DecisionRecord>>> {
    if let Some(pool) = &state.pool {
        let rows = db::decisions::list_recent(pool, LIST_LIMIT as i64).await?;
        let records = rows.into_iter().map(from_row).collect::<ApiResult<Vec<_>>>()?;
        return Ok(Json(records));
    }

    let log = state.decisions.read().await;
    Ok(Json(log.iter().rev().take(LIST_LIMIT).cloned().collect()))
}

/// GET /api/v1/decisions/{id}: one recorded decision.
pub async fn get_decision(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<DecisionRecord>> {
    let not_found = || ApiError::NotFound(format!("decision '{id}' not found"));

    if let Some(pool) = &state.pool {
        let row = db::decisions::get_by_id(pool, id).await?.ok_or_else(not_found)?;
        return Ok(Json(from_row(row)?));
    }

    let log = state.decisions.read().await;
    log.iter()
        .find(|r| r.decision.id == id)
        .cloned()
        .map(Json)
        .ok_or_else(not_found)
}
