//! External-model request/response contract.
//!
//! Every model answer is parsed and validated here before anything else
//! trusts it. A response that fails validation is a [`ContractError`], which
//! callers treat exactly like a transport failure.

use serde::{Deserialize, Serialize};

use crate::decision::Task;
use crate::params::Parameters;

/// Request sent to the external model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelRequest {
    /// Instruction plus the user's question.
    pub prompt: String,
    /// Table/column dictionary the model must stay within.
    pub schema: String,
}

impl ModelRequest {
    pub fn new(prompt: impl Into<String>, schema: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            schema: schema.into(),
        }
    }
}

/// Structural problems with a model response.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ContractError {
    #[error("response is not valid JSON: {0}")]
    Json(String),

    #[error("response is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown task `{0}`")]
    UnknownTask(String),

    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),

    #[error("response field `{0}` is empty")]
    EmptyField(&'static str),

    #[error("invalid parameters: {0}")]
    Parameters(String),
}

/// Validated routing answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRoute {
    pub task: Task,
    pub confidence: f64,
    pub reason: String,
    pub namespaces: Option<Vec<String>>,
}

/// Validated follow-up merge answer.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelMerge {
    pub parameters: Parameters,
    pub confidence: f64,
}

/// Validated stage-one answer of two-stage generation.
#[derive(Debug, Clone, PartialEq)]
pub struct SchemaSelection {
    pub tables: Vec<String>,
    pub columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawRoute {
    task: Option<String>,
    confidence: Option<f64>,
    reason: Option<String>,
    #[serde(default)]
    namespaces: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawMerge {
    parameters: Option<serde_json::Value>,
    confidence: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSelection {
    #[serde(default)]
    tables: Vec<String>,
    #[serde(default)]
    columns: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct RawQuery {
    #[serde(alias = "sql")]
    query: Option<String>,
}

/// Extract JSON from model output that may be wrapped in markdown code blocks.
pub fn extract_json(text: &str) -> &str {
    let trimmed = text.trim();

    // Try ```json ... ``` first
    if let Some(start) = trimmed.find("```json") {
        let after_fence = &trimmed[start + 7..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    // Try ``` ... ```
    if let Some(start) = trimmed.find("```") {
        let after_fence = &trimmed[start + 3..];
        if let Some(end) = after_fence.find("```") {
            return after_fence[..end].trim();
        }
    }

    // Assume raw JSON
    trimmed
}

fn check_confidence(value: Option<f64>) -> Result<f64, ContractError> {
    let confidence = value.ok_or(ContractError::MissingField("confidence"))?;
    if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
        return Err(ContractError::ConfidenceOutOfRange(confidence));
    }
    Ok(confidence)
}

/// Parse and validate a routing response.
///
/// Requires a known `task`, a numeric `confidence` in [0, 1] and a
/// non-empty `reason`; the response is rejected wholesale otherwise.
pub fn parse_route_response(text: &str) -> Result<ModelRoute, ContractError> {
    let raw: RawRoute = serde_json::from_str(extract_json(text))
        .map_err(|e| ContractError::Json(e.to_string()))?;

    let task_name = raw.task.ok_or(ContractError::MissingField("task"))?;
    let task = Task::parse(&task_name).ok_or(ContractError::UnknownTask(task_name))?;
    let confidence = check_confidence(raw.confidence)?;
    let reason = raw.reason.ok_or(ContractError::MissingField("reason"))?;
    if reason.trim().is_empty() {
        return Err(ContractError::EmptyField("reason"));
    }

    let namespaces = raw.namespaces.filter(|ns| !ns.is_empty());

    Ok(ModelRoute {
        task,
        confidence,
        reason: reason.trim().to_string(),
        namespaces,
    })
}

/// Parse and validate a follow-up merge response.
pub fn parse_merge_response(text: &str) -> Result<ModelMerge, ContractError> {
    let raw: RawMerge = serde_json::from_str(extract_json(text))
        .map_err(|e| ContractError::Json(e.to_string()))?;
    let confidence = check_confidence(raw.confidence)?;
    let value = raw.parameters.ok_or(ContractError::MissingField("parameters"))?;
    let parameters: Parameters =
        serde_json::from_value(value).map_err(|e| ContractError::Parameters(e.to_string()))?;
    Ok(ModelMerge {
        parameters,
        confidence,
    })
}

/// Parse the schema-resolution stage of two-stage generation.
pub fn parse_schema_selection(text: &str) -> Result<SchemaSelection, ContractError> {
    let raw: RawSelection = serde_json::from_str(extract_json(text))
        .map_err(|e| ContractError::Json(e.to_string()))?;
    if raw.tables.is_empty() {
        return Err(ContractError::EmptyField("tables"));
    }
    Ok(SchemaSelection {
        tables: raw.tables,
        columns: raw.columns,
    })
}

/// Parse generated query text.
///
/// Accepts `{"query": "..."}` (or `sql`) and, for older prompt styles, bare
/// query text optionally wrapped in a code fence.
pub fn parse_generated_query(text: &str) -> Result<String, ContractError> {
    let body = extract_json(text);
    let query = if body.starts_with('{') {
        let raw: RawQuery =
            serde_json::from_str(body).map_err(|e| ContractError::Json(e.to_string()))?;
        raw.query.ok_or(ContractError::MissingField("query"))?
    } else {
        body.trim_start_matches("sql").to_string()
    };
    let query = query.trim();
    if query.is_empty() {
        return Err(ContractError::EmptyField("query"));
    }
    Ok(query.to_string())
}
