use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::intent::{Classification, Intent};
use crate::params::Parameters;

/// Execution strategy chosen for a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Task {
    /// Generate query text for the query-execution collaborator.
    StructuredQuery,
    /// Hand the question to the document-retrieval collaborator.
    Retrieval,
    /// Produce an equipment optimization / forecasting recommendation.
    OptimizationAdvice,
}

impl Task {
    pub const ALL: [Task; 3] = [Task::StructuredQuery, Task::Retrieval, Task::OptimizationAdvice];

    pub fn as_str(self) -> &'static str {
        match self {
            Task::StructuredQuery => "structured_query",
            Task::Retrieval => "retrieval",
            Task::OptimizationAdvice => "optimization_advice",
        }
    }

    /// Parse the closed task vocabulary. Accepts `-` or `_` separators,
    /// case-insensitive; anything else is rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_ascii_lowercase().replace('-', "_");
        Task::ALL.into_iter().find(|t| t.as_str() == normalized)
    }
}

impl std::fmt::Display for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which path produced the final task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSource {
    Deterministic,
    ModelAssisted,
}

/// Terminal output of the routing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterDecision {
    /// Decision ID (UUIDv7 for time-sortability).
    pub id: Uuid,
    pub task: Task,
    /// Routing confidence in [0, 1].
    pub confidence: f64,
    /// Human-readable explanation, including any fallback taken.
    pub reason: String,
    pub intent: Intent,
    pub intent_confidence: f64,
    #[serde(default)]
    pub matched_keywords: Vec<String>,
    #[serde(default)]
    pub parameters: Parameters,
    /// Query text when `task = structured_query`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_query: Option<String>,
    /// Retrieval targets when `task = retrieval`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
    pub route_source: RouteSource,
    /// Name of the deterministic rule that matched, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matched_rule: Option<String>,
    /// Whether the question was resolved as a follow-up of the prior turn.
    #[serde(default)]
    pub follow_up: bool,
    pub created_at: DateTime<Utc>,
}

impl RouterDecision {
    /// Start a deterministic decision from a classification.
    pub fn new(
        task: Task,
        confidence: f64,
        reason: impl Into<String>,
        classification: &Classification,
    ) -> Self {
        Self {
            id: Uuid::now_v7(),
            task,
            confidence: confidence.clamp(0.0, 1.0),
            reason: reason.into(),
            intent: classification.intent,
            intent_confidence: classification.confidence,
            matched_keywords: classification.matched_keywords.clone(),
            parameters: classification.parameters.clone(),
            generated_query: None,
            namespaces: None,
            route_source: RouteSource::Deterministic,
            matched_rule: None,
            follow_up: false,
            created_at: Utc::now(),
        }
    }

    /// Append a clause to `reason`.
    pub fn note(&mut self, clause: impl AsRef<str>) {
        let clause = clause.as_ref();
        if clause.is_empty() {
            return;
        }
        if self.reason.is_empty() {
            self.reason = clause.to_string();
        } else {
            self.reason = format!("{}; {}", self.reason, clause);
        }
    }
}
