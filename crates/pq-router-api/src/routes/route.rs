//! Question routing endpoint.

use axum::Json;
use axum::extract::State;
use pq_protocol::{ConversationTurn, RouterDecision};
use serde::Deserialize;

use crate::db;
use crate::error::ApiResult;
use crate::pipeline::RouteRequest;
use crate::state::{AppState, DecisionRecord};

/// Turns loaded from chat history when the caller sends none.
const HISTORY_TURNS: i64 = 5;

/// Request body for routing a question.
#[derive(Debug, Deserialize)]
pub struct RouteBody {
    pub question: String,
    /// Enables follow-up context across calls.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Recent turns, oldest first.
    #[serde(default)]
    pub history: Option<Vec<ConversationTurn>>,
}

/// POST /api/v1/route: route a question and record the decision.
pub async fn route_question(
    State(state): State<AppState>,
    Json(body): Json<RouteBody>,
) -> ApiResult<Json<RouterDecision>> {
    let mut history = body.history.unwrap_or_default();
    if history.is_empty()
        && let (Some(pool), Some(user)) = (&state.pool, &body.user_id)
    {
        match db::history::recent_turns(pool, user, HISTORY_TURNS).await {
            Ok(turns) => history = turns,
            Err(e) => tracing::warn!(error = %e, user_id = %user, "chat history unavailable"),
        }
    }

    let mut request = RouteRequest::new(body.question.as_str()).with_history(history);
    if let Some(user) = &body.user_id {
        request = request.for_user(user.as_str());
    }

    let decision = state.pipeline.route(&request).await?;
    record(&state, &body.question, body.user_id, &decision).await;
    Ok(Json(decision))
}

async fn record(state: &AppState, question: &str, user_id: Option<String>, decision: &RouterDecision) {
    let Some(pool) = &state.pool else {
        state
            .remember(DecisionRecord {
                question: question.to_string(),
                user_id,
                decision: decision.clone(),
            })
            .await;
        return;
    };

    let row = match db::decisions::DecisionRow::new(decision, question, user_id.as_deref()) {
        Ok(row) => row,
        Err(e) => {
            tracing::error!(error = %e, id = %decision.id, "failed to serialize decision");
            return;
        }
    };
    if let Err(e) = db::decisions::insert(pool, &row).await {
        tracing::error!(error = %e, id = %decision.id, "failed to record decision");
    }
}
