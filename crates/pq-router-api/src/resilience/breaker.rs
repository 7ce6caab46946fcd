//! Circuit breaker around the external model.
//!
//! Closed: calls flow, failed call sequences are remembered for a rolling
//! window. Enough failures inside the window open the breaker, and calls are
//! then refused without any I/O until the cool-down elapses. The first call
//! after that is a single half-open trial whose outcome closes or re-opens
//! the breaker.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::config::ResilienceConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BreakerConfig {
    pub failure_threshold: u32,
    pub window: Duration,
    pub cooldown: Duration,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self::from(&ResilienceConfig::default())
    }
}

impl From<&ResilienceConfig> for BreakerConfig {
    fn from(config: &ResilienceConfig) -> Self {
        Self {
            failure_threshold: config.failure_threshold.max(1),
            window: Duration::from_secs(config.window_secs),
            cooldown: Duration::from_secs(config.cooldown_secs),
        }
    }
}

/// Point-in-time view for health and admin endpoints.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BreakerSnapshot {
    pub state: BreakerState,
    /// Failures currently inside the rolling window.
    pub recent_failures: usize,
    pub failure_threshold: u32,
    /// Seconds until a trial call is admitted, while open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_in_secs: Option<u64>,
    /// Times the breaker has opened since start or the last reset.
    pub times_opened: u64,
}

#[derive(Debug)]
enum Phase {
    Closed,
    Open { until: Instant },
    HalfOpen { trial_in_flight: bool },
}

#[derive(Debug)]
struct Inner {
    phase: Phase,
    failures: VecDeque<Instant>,
    times_opened: u64,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    config: BreakerConfig,
    inner: Mutex<Inner>,
}

/// Returned when the breaker refuses a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerOpen;

impl CircuitBreaker {
    pub fn new(config: BreakerConfig) -> Self {
        Self {
            config,
            inner: Mutex::new(Inner {
                phase: Phase::Closed,
                failures: VecDeque::new(),
                times_opened: 0,
            }),
        }
    }

    pub fn config(&self) -> &BreakerConfig {
        &self.config
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ask to make a call. The permit must be settled with
    /// [`Permit::success`] or [`Permit::failure`]; dropping it unsettled
    /// releases a half-open trial slot without judging the backend.
    pub fn try_acquire(&self) -> Result<Permit<'_>, BreakerOpen> {
        let mut inner = self.lock();
        let now = Instant::now();
        let trial = match inner.phase {
            Phase::Closed => false,
            Phase::Open { until } if now >= until => {
                info!("circuit breaker half-open, admitting trial call");
                inner.phase = Phase::HalfOpen {
                    trial_in_flight: true,
                };
                true
            }
            Phase::Open { .. } => return Err(BreakerOpen),
            Phase::HalfOpen {
                trial_in_flight: true,
            } => return Err(BreakerOpen),
            Phase::HalfOpen {
                trial_in_flight: false,
            } => {
                inner.phase = Phase::HalfOpen {
                    trial_in_flight: true,
                };
                true
            }
        };
        Ok(Permit {
            breaker: self,
            trial,
            settled: false,
        })
    }

    pub fn state(&self) -> BreakerState {
        let inner = self.lock();
        match inner.phase {
            Phase::Closed => BreakerState::Closed,
            // Cool-down over: the next call will be the trial.
            Phase::Open { until } if Instant::now() >= until => BreakerState::HalfOpen,
            Phase::Open { .. } => BreakerState::Open,
            Phase::HalfOpen { .. } => BreakerState::HalfOpen,
        }
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let state = self.state();
        let mut inner = self.lock();
        let now = Instant::now();
        self.prune(&mut inner, now);
        let retry_in_secs = match inner.phase {
            Phase::Open { until } if until > now => Some((until - now).as_secs()),
            _ => None,
        };
        BreakerSnapshot {
            state,
            recent_failures: inner.failures.len(),
            failure_threshold: self.config.failure_threshold,
            retry_in_secs,
            times_opened: inner.times_opened,
        }
    }

    /// Close the breaker and forget all failures.
    pub fn reset(&self) {
        let mut inner = self.lock();
        inner.phase = Phase::Closed;
        inner.failures.clear();
        inner.times_opened = 0;
        info!("circuit breaker reset");
    }

    fn prune(&self, inner: &mut Inner, now: Instant) {
        while let Some(oldest) = inner.failures.front() {
            if now.duration_since(*oldest) > self.config.window {
                inner.failures.pop_front();
            } else {
                break;
            }
        }
    }

    fn open(&self, inner: &mut Inner, now: Instant) {
        inner.phase = Phase::Open {
            until: now + self.config.cooldown,
        };
        inner.failures.clear();
        inner.times_opened += 1;
        warn!(
            cooldown_secs = self.config.cooldown.as_secs(),
            "circuit breaker opened"
        );
    }

    fn on_success(&self, trial: bool) {
        let mut inner = self.lock();
        inner.failures.clear();
        if trial {
            inner.phase = Phase::Closed;
            info!("circuit breaker closed after successful trial");
        }
    }

    fn on_failure(&self, trial: bool) {
        let mut inner = self.lock();
        let now = Instant::now();
        if trial {
            self.open(&mut inner, now);
            return;
        }
        if !matches!(inner.phase, Phase::Closed) {
            return;
        }
        inner.failures.push_back(now);
        self.prune(&mut inner, now);
        if inner.failures.len() >= self.config.failure_threshold as usize {
            self.open(&mut inner, now);
        }
    }

    fn on_abandon(&self, trial: bool) {
        if !trial {
            return;
        }
        let mut inner = self.lock();
        if let Phase::HalfOpen { .. } = inner.phase {
            inner.phase = Phase::HalfOpen {
                trial_in_flight: false,
            };
        }
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(BreakerConfig::default())
    }
}

/// Admission to one call sequence.
#[derive(Debug)]
pub struct Permit<'a> {
    breaker: &'a CircuitBreaker,
    trial: bool,
    settled: bool,
}

impl Permit<'_> {
    pub fn is_trial(&self) -> bool {
        self.trial
    }

    pub fn success(mut self) {
        self.settled = true;
        self.breaker.on_success(self.trial);
    }

    pub fn failure(mut self) {
        self.settled = true;
        self.breaker.on_failure(self.trial);
    }
}

impl Drop for Permit<'_> {
    fn drop(&mut self) {
        if !self.settled {
            self.breaker.on_abandon(self.trial);
        }
    }
}
