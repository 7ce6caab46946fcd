//! Decision making: the deterministic rule router and the external model
//! used when local confidence is too low.
//!
//! Model backends:
//! - **chat**: Ollama-style `/api/chat` JSON endpoint over HTTP.
//! - **bedrock**: AWS Bedrock Converse API.
//!
//! Every backend goes through [`crate::resilience::ResilientModel`], which
//! adds retries, the circuit breaker and response validation.

pub mod bedrock;
pub mod chat;
pub mod generation;
pub mod prompts;
pub mod rules;

use std::sync::Arc;

use async_trait::async_trait;
use pq_protocol::{ContractError, ModelRequest};

use crate::config::{ModelConfig, ModelProvider};

pub use bedrock::BedrockModelClient;
pub use chat::ChatModelClient;
pub use rules::RuleRouter;

/// Ways a model call can fail.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("model transport error: {0}")]
    Transport(String),

    #[error("model returned HTTP {status}")]
    Status { status: u16, body: String },

    #[error("model call timed out")]
    Timeout,

    #[error("invalid model response: {0}")]
    InvalidResponse(#[from] ContractError),

    #[error("circuit breaker open, model not called")]
    CircuitOpen,

    #[error("no model backend configured")]
    Unavailable,

    #[error("model call cancelled")]
    Cancelled,
}

impl ModelError {
    /// Worth another attempt: timeouts, connection failures, 5xx and 429.
    pub fn is_transient(&self) -> bool {
        match self {
            ModelError::Transport(_) | ModelError::Timeout => true,
            ModelError::Status { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

/// External language model that answers one JSON request with raw text.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Send `request` and return the model's raw answer text.
    async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError>;

    /// Backend name (for logging/audit).
    fn backend_name(&self) -> &str;
}

/// Build the configured backend, or `None` when the model is disabled.
pub async fn build_client(config: &ModelConfig) -> anyhow::Result<Option<Arc<dyn ModelClient>>> {
    let client: Arc<dyn ModelClient> = match config.provider {
        ModelProvider::Disabled => return Ok(None),
        ModelProvider::Chat => Arc::new(ChatModelClient::new(config)?),
        ModelProvider::Bedrock => {
            let aws = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
            let client = aws_sdk_bedrockruntime::Client::new(&aws);
            Arc::new(BedrockModelClient::new(
                client,
                config.bedrock_model_id.clone(),
                config.request_timeout(),
            ))
        }
    };
    tracing::info!(backend = client.backend_name(), "model backend configured");
    Ok(Some(client))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(ModelError::Timeout.is_transient());
        assert!(ModelError::Transport("connection refused".into()).is_transient());
        assert!(
            ModelError::Status {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            ModelError::Status {
                status: 429,
                body: String::new()
            }
            .is_transient()
        );
        assert!(
            !ModelError::Status {
                status: 400,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!ModelError::InvalidResponse(ContractError::MissingField("task")).is_transient());
        assert!(!ModelError::CircuitOpen.is_transient());
    }

    #[tokio::test]
    async fn disabled_provider_builds_nothing() {
        let client = build_client(&ModelConfig::default()).await.unwrap();
        assert!(client.is_none());
    }
}
