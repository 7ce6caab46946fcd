//! Decision log queries.

use chrono::{DateTime, Utc};
use pq_protocol::RouterDecision;
use sqlx::PgPool;
use uuid::Uuid;

/// Decision row returned from the database.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DecisionRow {
    pub id: Uuid,
    pub user_id: Option<String>,
    pub question: String,
    pub task: String,
    pub route_source: String,
    pub confidence: f64,
    /// Full serialized `RouterDecision`.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl DecisionRow {
    pub fn new(
        decision: &RouterDecision,
        question: &str,
        user_id: Option<&str>,
    ) -> Result<Self, serde_json::Error> {
        let route_source = serde_json::to_value(decision.route_source)?
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(Self {
            id: decision.id,
            user_id: user_id.map(String::from),
            question: question.to_string(),
            task: decision.task.as_str().to_string(),
            route_source,
            confidence: decision.confidence,
            payload: serde_json::to_value(decision)?,
            created_at: decision.created_at,
        })
    }

    pub fn decision(&self) -> Result<RouterDecision, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

pub async fn insert(pool: &PgPool, row: &DecisionRow) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO route_decisions (id, user_id, question, task, route_source, confidence, payload, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(row.id)
    .bind(&row.user_id)
    .bind(&row.question)
    .bind(&row.task)
    .bind(&row.route_source)
    .bind(row.confidence)
    .bind(&row.payload)
    .bind(row.created_at)
    .execute(pool)
    .await?;
    Ok(())
}

/// Get a decision by ID.
pub async fn get_by_id(pool: &PgPool, id: Uuid) -> Result<Option<DecisionRow>, sqlx::Error> {
    sqlx::query_as::<_, DecisionRow>("SELECT * FROM route_decisions WHERE id = $1")
        .bind(id)
        .fetch_optional(pool)
        .await
}

/// List recent decisions (most recent first).
pub async fn list_recent(pool: &PgPool, limit: i64) -> Result<Vec<DecisionRow>, sqlx::Error> {
    sqlx::query_as::<_, DecisionRow>(
        "SELECT * FROM route_decisions ORDER BY created_at DESC LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}
