//! Shared test harness for E2E integration tests.
//!
//! Drives the real Axum router in-process, with the chat backend either
//! absent or served by a wiremock server.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;
use wiremock::MockServer;

use pq_router_api::config::ModelConfig;
use pq_router_api::inference::chat::ChatModelClient;
use pq_router_api::pipeline::RoutingPipeline;
use pq_router_api::resilience::breaker::BreakerConfig;
use pq_router_api::resilience::{CircuitBreaker, ResilientModel, RetryPolicy};
use pq_router_api::routes::{build_router, cors_layer};
use pq_router_api::state::AppState;

/// Router plus the state behind it.
pub struct TestHarness {
    /// In-memory application state (no DB).
    pub state: AppState,
    /// Axum router for HTTP requests via `tower::oneshot`.
    pub router: Router,
}

impl TestHarness {
    /// Deterministic routing only, no model backend.
    pub fn deterministic() -> Self {
        Self::from_pipeline(RoutingPipeline::default())
    }

    /// Routing with a chat backend at `server`.
    pub fn with_chat_backend(server: &MockServer, failure_threshold: u32) -> Self {
        Self::from_pipeline(RoutingPipeline::default().with_model(chat_model(server, failure_threshold)))
    }

    pub fn from_pipeline(pipeline: RoutingPipeline) -> Self {
        let state = AppState::with_pipeline(pipeline);
        let router = build_router(state.clone(), cors_layer(&[]));
        Self { state, router }
    }

    /// POST /api/v1/route.
    pub async fn route(&self, body: serde_json::Value) -> (StatusCode, serde_json::Value) {
        self.send(
            Request::post("/api/v1/route")
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
    }

    /// Route a bare question.
    pub async fn ask(&self, question: &str) -> (StatusCode, serde_json::Value) {
        self.route(serde_json::json!({ "question": question })).await
    }

    /// Route a question on behalf of `user_id`.
    pub async fn ask_as(&self, user_id: &str, question: &str) -> (StatusCode, serde_json::Value) {
        self.route(serde_json::json!({ "question": question, "user_id": user_id }))
            .await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_empty(&self, uri: &str) -> (StatusCode, serde_json::Value) {
        self.send(Request::post(uri).body(Body::empty()).unwrap()).await
    }

    /// DELETE, returning only the status (204 has no body).
    pub async fn delete(&self, uri: &str) -> StatusCode {
        self.router
            .clone()
            .oneshot(Request::delete(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
            .status()
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, serde_json::Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        (status, json)
    }
}

/// Chat client wrapped in a breaker and a fast retry policy.
pub fn chat_model(server: &MockServer, failure_threshold: u32) -> ResilientModel {
    let client = ChatModelClient::new(&ModelConfig {
        endpoint: server.uri(),
        request_timeout_secs: 2,
        ..ModelConfig::default()
    })
    .unwrap();

    ResilientModel::new(
        Arc::new(client),
        Arc::new(CircuitBreaker::new(BreakerConfig {
            failure_threshold,
            window: Duration::from_secs(60),
            cooldown: Duration::from_secs(30),
        })),
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(50),
            overall_timeout: Duration::from_secs(10),
        },
    )
}

/// Chat API response carrying `content` as the assistant message.
pub fn chat_response(content: &str) -> serde_json::Value {
    serde_json::json!({
        "model": "llama3.1:8b",
        "message": { "role": "assistant", "content": content },
        "done": true
    })
}
