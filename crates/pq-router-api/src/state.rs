//! Shared application state for the Axum server.
//!
//! Supports two modes:
//! - **Database mode**: decisions go to `route_decisions`, and history is
//!   read from `chat_history` when the caller sends none.
//! - **In-memory mode**: a bounded decision log in `RwLock<VecDeque>`
//!   (tests and development).

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use pq_protocol::RouterDecision;
use serde::Serialize;
use sqlx::PgPool;
use tokio::sync::RwLock;

use crate::pipeline::RoutingPipeline;
use crate::resilience::CircuitBreaker;

/// In-memory decision log capacity.
pub const DECISION_LOG_CAPACITY: usize = 1_000;

/// Shared application state, wrapped in `Arc` for Axum handler sharing.
#[derive(Clone)]
pub struct AppState {
    /// PostgreSQL connection pool (None in test/in-memory mode).
    pub pool: Option<PgPool>,
    pub pipeline: Arc<RoutingPipeline>,
    /// In-memory decision log (used when pool is None), oldest first.
    pub decisions: Arc<RwLock<VecDeque<DecisionRecord>>>,
    /// Breaker shared with the pipeline's model, if any.
    pub breaker: Option<Arc<CircuitBreaker>>,
}

/// A decision with the question that produced it.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionRecord {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(flatten)]
    pub decision: RouterDecision,
}

impl DecisionRecord {
    pub fn created_at(&self) -> DateTime<Utc> {
        self.decision.created_at
    }
}

impl AppState {
    /// In-memory state around a deterministic pipeline (for tests).
    pub fn new() -> Self {
        Self::with_pipeline(RoutingPipeline::default())
    }

    pub fn with_pipeline(pipeline: RoutingPipeline) -> Self {
        let breaker = pipeline.model().map(|m| m.breaker().clone());
        Self {
            pool: None,
            pipeline: Arc::new(pipeline),
            decisions: Arc::new(RwLock::new(VecDeque::new())),
            breaker,
        }
    }

    /// Attach a PostgreSQL pool.
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Append to the in-memory log, evicting the oldest entries past capacity.
    pub async fn remember(&self, record: DecisionRecord) {
        let mut log = self.decisions.write().await;
        log.push_back(record);
        while log.len() > DECISION_LOG_CAPACITY {
            log.pop_front();
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
