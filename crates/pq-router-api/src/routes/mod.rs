//! API route definitions and router builder.

pub mod breaker;
pub mod context;
pub mod decisions;
pub mod health;
pub mod route;

use axum::Router;
use axum::http::HeaderValue;
use axum::routing::{delete, get, post};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// CORS policy: any origin when `origins` is empty or contains `*`,
/// otherwise only the listed ones. Unparseable origins are skipped.
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse::<HeaderValue>() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "ignoring invalid CORS origin");
                None
            }
        })
        .collect();
    layer.allow_origin(AllowOrigin::list(allowed))
}

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let api = Router::new()
        .route("/route", post(route::route_question))
        .route("/decisions", get(decisions::list_decisions))
        .route("/decisions/{id}", get(decisions::get_decision))
        .route("/breaker", get(breaker::get_breaker))
        .route("/breaker/reset", post(breaker::reset_breaker))
        .route("/context/{user_id}", delete(context::clear_context));

    Router::new()
        .route("/health", get(health::health))
        .nest("/api/v1", api)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
