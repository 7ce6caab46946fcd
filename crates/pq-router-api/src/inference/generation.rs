//! Model-generated queries for questions no builder handles.
//!
//! Two stages: the model first picks the tables it needs, then writes the
//! query against that narrowed schema. If either stage fails, a single-stage
//! legacy prompt over the full schema is tried once. The result is raw text;
//! the caller must still run it through the safety validator.

use pq_protocol::{Parameters, parse_generated_query, parse_schema_selection};
use pq_query::SchemaDictionary;
use serde::Serialize;
use tracing::{info, warn};

use super::ModelError;
use super::prompts;
use crate::resilience::ResilientModel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GenerationStrategy {
    TwoStage,
    SingleStage,
}

impl GenerationStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            GenerationStrategy::TwoStage => "two-stage",
            GenerationStrategy::SingleStage => "single-stage",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedQuery {
    pub query: String,
    pub strategy: GenerationStrategy,
}

pub async fn generate_query(
    model: &ResilientModel,
    schema: &SchemaDictionary,
    question: &str,
    params: &Parameters,
) -> Result<GeneratedQuery, ModelError> {
    match two_stage(model, schema, question, params).await {
        Ok(query) => {
            info!("query generated in two stages");
            Ok(GeneratedQuery {
                query,
                strategy: GenerationStrategy::TwoStage,
            })
        }
        // Nothing will get through either.
        Err(e @ (ModelError::CircuitOpen | ModelError::Cancelled)) => Err(e),
        Err(e) => {
            warn!(error = %e, "two-stage generation failed, using single-stage prompt");
            let request = prompts::legacy_query_request(question, schema);
            let query = model.call_parsed(&request, parse_generated_query).await?;
            Ok(GeneratedQuery {
                query,
                strategy: GenerationStrategy::SingleStage,
            })
        }
    }
}

async fn two_stage(
    model: &ResilientModel,
    schema: &SchemaDictionary,
    question: &str,
    params: &Parameters,
) -> Result<String, ModelError> {
    let selection = model
        .call_parsed(
            &prompts::schema_request(question, params, schema),
            parse_schema_selection,
        )
        .await?;

    let narrowed = schema.restricted_to(&selection.tables);
    if narrowed.is_empty() {
        return Err(ModelError::InvalidResponse(
            pq_protocol::ContractError::EmptyField("tables"),
        ));
    }

    model
        .call_parsed(
            &prompts::query_request(question, params, &narrowed),
            parse_generated_query,
        )
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::resilience::tests::{ScriptedModel, resilient};

    #[tokio::test(start_paused = true)]
    async fn two_stage_happy_path() {
        let client = Arc::new(ScriptedModel::scripted(
            vec![
                Ok(r#"{"tables": ["trip_summary"], "columns": ["excavator"]}"#.into()),
                Ok(r#"{"query": "SELECT excavator, SUM(trip_count) FROM trip_summary GROUP BY excavator"}"#.into()),
            ],
            Err(ModelError::Timeout),
        ));
        let model = resilient(client.clone(), 5);
        let generated = generate_query(
            &model,
            &SchemaDictionary::builtin(),
            "trips per excavator",
            &Parameters::default(),
        )
        .await
        .unwrap();
        assert_eq!(generated.strategy, GenerationStrategy::TwoStage);
        assert!(generated.query.starts_with("SELECT excavator"));
        assert_eq!(client.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_tables_fall_back_to_single_stage() {
        let client = Arc::new(ScriptedModel::scripted(
            vec![
                Ok(r#"{"tables": ["payroll"]}"#.into()),
                Ok("```sql\nSELECT date FROM production_summary\n```".into()),
            ],
            Err(ModelError::Timeout),
        ));
        let model = resilient(client.clone(), 5);
        let generated = generate_query(
            &model,
            &SchemaDictionary::builtin(),
            "dates",
            &Parameters::default(),
        )
        .await
        .unwrap();
        assert_eq!(generated.strategy, GenerationStrategy::SingleStage);
        assert_eq!(generated.query, "SELECT date FROM production_summary");
    }

    #[tokio::test(start_paused = true)]
    async fn open_breaker_skips_the_legacy_stage() {
        let client = Arc::new(ScriptedModel::always(Ok("garbage".into())));
        let model = resilient(client.clone(), 1);
        // First sequence fails structurally and opens the breaker.
        let err = generate_query(
            &model,
            &SchemaDictionary::builtin(),
            "anything",
            &Parameters::default(),
        )
        .await
        .unwrap_err();
        assert_eq!(err, ModelError::CircuitOpen);
        assert_eq!(client.calls(), 1);
    }
}
