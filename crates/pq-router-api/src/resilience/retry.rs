//! Exponential backoff with a fixed attempt ceiling and an overall budget.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::ResilienceConfig;
use crate::inference::ModelError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Budget for the whole sequence, waits included.
    pub overall_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for RetryPolicy {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            overall_timeout: Duration::from_secs(config.overall_timeout_secs),
        }
    }
}

impl RetryPolicy {
    /// Wait before retry number `retry` (0-based): `base * 2^retry`, capped.
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently or runs out of
    /// attempts. Only transient errors are retried.
    pub async fn run<T, F, Fut>(&self, mut op: F) -> Result<T, ModelError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ModelError>>,
    {
        let sequence = async {
            let mut attempt = 0;
            loop {
                attempt += 1;
                match op(attempt).await {
                    Ok(value) => return Ok(value),
                    Err(e) if e.is_transient() && attempt < self.max_attempts => {
                        let delay = self.delay_for(attempt - 1);
                        debug!(
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %e,
                            "model call failed, retrying"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    Err(e) => return Err(e),
                }
            }
        };

        match tokio::time::timeout(self.overall_timeout, sequence).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    timeout_secs = self.overall_timeout.as_secs(),
                    "model call sequence exceeded its overall timeout"
                );
                Err(ModelError::Timeout)
            }
        }
    }
}
