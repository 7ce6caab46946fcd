//! Prompt text for every model-assisted step.
//!
//! Each step produces a [`ModelRequest`] whose `prompt` carries the
//! instruction plus the user's question and whose `schema` carries the
//! table dictionary the answer must stay within.

use pq_protocol::{ModelRequest, Parameters};
use pq_query::SchemaDictionary;

/// Shared system instruction for all backends.
pub const SYSTEM_PROMPT: &str = "You assist a mining operations reporting service. \
Answer with ONLY a JSON object, no markdown and no explanation.";

const ROUTING_PROMPT: &str = r#"Decide how the question below should be answered.

Tasks:
- structured_query: the answer comes from the production tables (totals, trends, charts, rankings, comparisons, listings).
- retrieval: the answer comes from manuals and procedures (how to, best practice, guidelines, safety rules).
- optimization_advice: the user wants an equipment recommendation or a production forecast.

Respond with:
{"task": "<structured_query|retrieval|optimization_advice>", "confidence": <0.0-1.0>, "reason": "<one sentence>"}"#;

const MERGE_PROMPT: &str = r#"The question below follows up on a previous question. Combine the constraints of both.
Fields stated in the new question override the previous ones; fields it does not mention keep their previous value. "except" or "exclude" removes values from the previous set.

Parameter fields: date (YYYY-MM-DD), date_range {"start","end"}, month (1-12), year, shifts (["A","B","C"]), equipment (["T12","EX3"]), limit.

Respond with:
{"parameters": {<merged fields>}, "confidence": <0.0-1.0>}"#;

const SCHEMA_PROMPT: &str = r#"Pick the tables and columns needed to answer the question below. Use only names from the schema.

Respond with:
{"tables": ["<table>"], "columns": ["<column>"]}"#;

const QUERY_PROMPT: &str = r#"Write one read-only PostgreSQL SELECT statement answering the question below.
Use only the tables and columns in the schema. No comments, no semicolons, no data changes.

Respond with:
{"query": "<SELECT ...>"}"#;

const LEGACY_QUERY_PROMPT: &str = r#"Translate the question below into a single PostgreSQL SELECT statement over the schema.

Respond with:
{"query": "<SELECT ...>"}"#;

fn with_question(instruction: &str, question: &str) -> String {
    format!("{instruction}\n\nQuestion: {}", question.trim())
}

/// Ask which task should handle `question`.
pub fn routing_request(question: &str, schema: &SchemaDictionary) -> ModelRequest {
    ModelRequest::new(with_question(ROUTING_PROMPT, question), schema.describe())
}

/// Ask to merge a follow-up's parameters over the previous turn's.
pub fn merge_request(
    question: &str,
    previous_question: &str,
    previous: &Parameters,
    current: &Parameters,
) -> ModelRequest {
    let previous_json = serde_json::to_string(previous).unwrap_or_else(|_| "{}".into());
    let current_json = serde_json::to_string(current).unwrap_or_else(|_| "{}".into());
    let prompt = format!(
        "{}\n\nPrevious question: {}\nPrevious parameters: {previous_json}\n\
         New question: {}\nNew parameters: {current_json}",
        MERGE_PROMPT,
        previous_question.trim(),
        question.trim(),
    );
    ModelRequest::new(prompt, String::new())
}

/// Stage one of two-stage generation.
pub fn schema_request(
    question: &str,
    params: &Parameters,
    schema: &SchemaDictionary,
) -> ModelRequest {
    ModelRequest::new(
        with_parameters(with_question(SCHEMA_PROMPT, question), params),
        schema.describe(),
    )
}

/// Stage two: query text against the narrowed schema.
pub fn query_request(
    question: &str,
    params: &Parameters,
    schema: &SchemaDictionary,
) -> ModelRequest {
    ModelRequest::new(
        with_parameters(with_question(QUERY_PROMPT, question), params),
        schema.describe(),
    )
}

/// Single-stage generator used when two-stage generation fails.
pub fn legacy_query_request(question: &str, schema: &SchemaDictionary) -> ModelRequest {
    ModelRequest::new(with_question(LEGACY_QUERY_PROMPT, question), schema.describe())
}

fn with_parameters(prompt: String, params: &Parameters) -> String {
    if params.is_empty() {
        return prompt;
    }
    match serde_json::to_string(params) {
        Ok(json) => format!("{prompt}\nExtracted parameters: {json}"),
        Err(_) => prompt,
    }
}

/// User message sent to chat-style backends.
pub fn render(request: &ModelRequest) -> String {
    if request.schema.is_empty() {
        request.prompt.clone()
    } else {
        format!("{}\n\nSchema:\n{}", request.prompt, request.schema)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routing_request_carries_question_and_schema() {
        let request = routing_request("  total tons in march ", &SchemaDictionary::builtin());
        assert!(request.prompt.ends_with("Question: total tons in march"));
        assert!(request.schema.contains("production_summary("));
        let text = render(&request);
        assert!(text.contains("Schema:\nproduction_summary("));
    }

    #[test]
    fn merge_request_has_no_schema() {
        let previous = Parameters::default().with_month(1).unwrap();
        let current = Parameters::default().with_year(2024);
        let request = merge_request("and for 2024?", "production for january", &previous, &current);
        assert!(request.schema.is_empty());
        assert!(request.prompt.contains(r#"Previous parameters: {"month":1}"#));
        assert!(request.prompt.contains(r#"New parameters: {"year":2024}"#));
        assert_eq!(render(&request), request.prompt);
    }

    #[test]
    fn generation_requests_mention_parameters_when_present() {
        let schema = SchemaDictionary::builtin();
        let bare = query_request("q", &Parameters::default(), &schema);
        assert!(!bare.prompt.contains("Extracted parameters"));
        let params = Parameters::default().with_month(3).unwrap();
        let request = schema_request("q", &params, &schema);
        assert!(request.prompt.contains(r#"Extracted parameters: {"month":3}"#));
    }
}
