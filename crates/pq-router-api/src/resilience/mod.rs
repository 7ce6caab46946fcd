//! Resilient access to the external model.
//!
//! One call sequence: ask the breaker for a permit, run the retry policy
//! around the backend, then validate the answer. A sequence that ends in
//! any error, structural ones included, is reported to the breaker as a
//! failure. Structural errors are not retried.

pub mod breaker;
pub mod retry;

use std::sync::Arc;

use pq_protocol::{ContractError, ModelRequest};
use tracing::{info, warn};

use crate::inference::{ModelClient, ModelError};

pub use breaker::{BreakerSnapshot, BreakerState, CircuitBreaker};
pub use retry::RetryPolicy;

#[derive(Clone)]
pub struct ResilientModel {
    client: Arc<dyn ModelClient>,
    breaker: Arc<CircuitBreaker>,
    retry: RetryPolicy,
}

impl ResilientModel {
    pub fn new(client: Arc<dyn ModelClient>, breaker: Arc<CircuitBreaker>, retry: RetryPolicy) -> Self {
        Self {
            client,
            breaker,
            retry,
        }
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    pub fn backend_name(&self) -> &str {
        self.client.backend_name()
    }

    /// Raw text of one guarded call sequence.
    pub async fn complete(&self, request: &ModelRequest) -> Result<String, ModelError> {
        self.call_parsed(request, |text| Ok(text.to_string())).await
    }

    /// Guarded call whose answer must pass `parse`.
    pub async fn call_parsed<T>(
        &self,
        request: &ModelRequest,
        parse: impl FnOnce(&str) -> Result<T, ContractError>,
    ) -> Result<T, ModelError> {
        let Ok(permit) = self.breaker.try_acquire() else {
            info!(
                backend = self.backend_name(),
                "circuit breaker open, skipping model call"
            );
            return Err(ModelError::CircuitOpen);
        };

        let client = &self.client;
        let outcome = self
            .retry
            .run(move |_| client.complete(request))
            .await
            .and_then(|text| parse(&text).map_err(ModelError::from));

        match &outcome {
            Ok(_) => permit.success(),
            Err(e) => {
                warn!(backend = self.backend_name(), error = %e, "model call sequence failed");
                permit.failure();
            }
        }
        outcome
    }
}
