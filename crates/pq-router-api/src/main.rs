//! Question router REST server.

use std::sync::Arc;

use pq_query::SchemaDictionary;
use pq_router_api::config::ApiConfig;
use pq_router_api::pipeline::RoutingPipeline;
use pq_router_api::resilience::breaker::BreakerConfig;
use pq_router_api::resilience::{CircuitBreaker, ResilientModel, RetryPolicy};
use pq_router_api::state::AppState;
use pq_router_api::{db, inference, routes};
use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "pq-router-api starting");

    let config = ApiConfig::load()?;

    // Connect to PostgreSQL if a database URL is configured, otherwise keep
    // decisions in memory.
    let pool = match &config.database_url {
        Some(url) => {
            tracing::info!("connecting to PostgreSQL");
            Some(db::connect(url).await?)
        }
        None => {
            tracing::warn!("no database configured, using in-memory decision log");
            None
        }
    };

    let schema = load_schema(pool.as_ref(), &config.tables).await;

    let model = inference::build_client(&config.model).await?.map(|client| {
        tracing::info!(backend = client.backend_name(), "model backend enabled");
        ResilientModel::new(
            client,
            Arc::new(CircuitBreaker::new(BreakerConfig::from(&config.resilience))),
            RetryPolicy::from(&config.resilience),
        )
    });
    if model.is_none() {
        tracing::warn!("model backend disabled, routing is deterministic only");
    }

    let pipeline = RoutingPipeline::from_config(&config, schema, model);
    let mut state = AppState::with_pipeline(pipeline);
    if let Some(pool) = pool {
        state = state.with_pool(pool);
    }

    let app = routes::build_router(state, routes::cors_layer(&config.cors_origins));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, "listening");

    axum::serve(listener, app).await?;

    Ok(())
}

/// Live schema from `information_schema`, or the built-in dictionary when
/// there is no database or the lookup comes back empty.
async fn load_schema(pool: Option<&PgPool>, tables: &[String]) -> SchemaDictionary {
    let Some(pool) = pool else {
        return SchemaDictionary::builtin();
    };
    match db::schema::load_dictionary(pool, tables).await {
        Ok(schema) if !schema.is_empty() => {
            tracing::info!(tables = schema.tables().len(), "schema loaded from database");
            schema
        }
        Ok(_) => {
            tracing::warn!("configured tables not found, using built-in schema");
            SchemaDictionary::builtin()
        }
        Err(e) => {
            tracing::warn!(error = %e, "schema lookup failed, using built-in schema");
            SchemaDictionary::builtin()
        }
    }
}
