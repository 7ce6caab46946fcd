//! E2E tests for model-assisted routing against a mocked chat backend.

mod helpers;

use axum::http::StatusCode;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use helpers::{TestHarness, chat_response};

async fn requests_seen(server: &MockServer) -> usize {
    server.received_requests().await.map(|r| r.len()).unwrap_or(0)
}

/// Low-confidence questions are routed by the model when it answers well.
#[tokio::test]
async fn e2e_model_routes_low_confidence_question() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            r#"{"task": "retrieval", "confidence": 0.82, "reason": "asks for an explanation"}"#,
        )))
        .mount(&server)
        .await;

    let h = TestHarness::with_chat_backend(&server, 5);
    let (status, json) = h.ask("why is that?").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["route_source"], "model_assisted");
    assert_eq!(json["task"], "retrieval");
    assert!(json["reason"].as_str().unwrap().starts_with("model: asks for an explanation"));
    assert!(json["namespaces"].is_array());
}

/// Confident rule decisions never reach the model.
#[tokio::test]
async fn e2e_confident_rules_skip_the_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let h = TestHarness::with_chat_backend(&server, 5);
    let (_, json) = h.ask("forecast next week production").await;

    assert_eq!(json["task"], "optimization_advice");
    assert_eq!(json["route_source"], "deterministic");
    assert_eq!(requests_seen(&server).await, 0);
}

/// A malformed answer is a structural failure: one call, no retry,
/// deterministic decision kept.
#[tokio::test]
async fn e2e_malformed_model_answer_falls_back() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response("I am not JSON")))
        .mount(&server)
        .await;

    let h = TestHarness::with_chat_backend(&server, 5);
    let (status, json) = h.ask("why is that?").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["route_source"], "deterministic");
    let reason = json["reason"].as_str().unwrap();
    assert!(reason.contains("deterministic fallback"), "{reason}");
    assert_eq!(requests_seen(&server).await, 1);
}

/// Repeated backend failures open the breaker; further questions are
/// answered without a network attempt until it is reset.
#[tokio::test]
async fn e2e_breaker_opens_and_resets() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(503).set_body_string("overloaded"))
        .mount(&server)
        .await;

    let h = TestHarness::with_chat_backend(&server, 2);
    for _ in 0..2 {
        let (status, json) = h.ask("why is that?").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["route_source"], "deterministic");
    }
    // Each sequence retried a 503 up to the attempt limit.
    let attempts = requests_seen(&server).await;
    assert_eq!(attempts, 6);

    let (_, breaker) = h.get("/api/v1/breaker").await;
    assert_eq!(breaker["breaker"]["state"], "open");
    assert_eq!(breaker["breaker"]["times_opened"], 1);

    let (status, json) = h.ask("why is that?").await;
    assert_eq!(status, StatusCode::OK);
    let reason = json["reason"].as_str().unwrap();
    assert!(reason.contains("circuit breaker open"), "{reason}");
    assert_eq!(requests_seen(&server).await, attempts, "no attempt while open");

    let (_, health) = h.get("/health").await;
    assert_eq!(health["breaker"], "open");

    let (status, reset) = h.post_empty("/api/v1/breaker/reset").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reset["breaker"]["state"], "closed");

    h.ask("why is that?").await;
    assert!(requests_seen(&server).await > attempts);
}

/// Questions no builder handles get a two-stage generated query.
#[tokio::test]
async fn e2e_two_stage_generated_query() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("Pick the tables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            r#"{"tables": ["production_summary"], "columns": ["date", "production_tons"]}"#,
        )))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("Write one read-only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            r#"{"query": "SELECT date, production_tons FROM production_summary ORDER BY date DESC"}"#,
        )))
        .mount(&server)
        .await;

    let h = TestHarness::with_chat_backend(&server, 5);
    let (status, json) = h.ask("give me the production records").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["task"], "structured_query");
    let query = json["generated_query"].as_str().unwrap();
    assert!(query.starts_with("SELECT date, production_tons FROM production_summary"), "{query}");
    assert!(query.contains("LIMIT"), "{query}");
    assert!(json["reason"].as_str().unwrap().contains("two-stage"));
}

/// Unknown tables from stage one send generation to the single-stage prompt.
#[tokio::test]
async fn e2e_single_stage_fallback() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("Pick the tables"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(chat_response(r#"{"tables": ["payroll"]}"#)),
        )
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("Translate the question below"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            r#"{"query": "SELECT date FROM production_summary"}"#,
        )))
        .mount(&server)
        .await;

    let h = TestHarness::with_chat_backend(&server, 5);
    let (status, json) = h.ask("give me the production records").await;

    assert_eq!(status, StatusCode::OK);
    assert!(json["generated_query"].as_str().unwrap().starts_with("SELECT date FROM production_summary"));
    assert!(json["reason"].as_str().unwrap().contains("single-stage"));
}

/// A generated write statement is refused with 422, never returned.
#[tokio::test]
async fn e2e_unsafe_generated_query_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("Pick the tables"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            r#"{"tables": ["production_summary"]}"#,
        )))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_string_contains("Write one read-only"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_response(
            r#"{"query": "DELETE FROM production_summary"}"#,
        )))
        .mount(&server)
        .await;

    let h = TestHarness::with_chat_backend(&server, 5);
    let (status, json) = h.ask("give me the production records").await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(json["status"], 422);
    assert!(json.get("generated_query").is_none());

    let (_, list) = h.get("/api/v1/decisions").await;
    assert!(list.as_array().unwrap().is_empty());
}
