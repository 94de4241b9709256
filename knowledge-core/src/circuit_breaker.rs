//! # Circuit Breaker
//!
//! Protects the extraction handler from hammering a failing oracle.
//! Keyed per spec.md §5 by `text_extraction_{source}`, so one noisy
//! source doesn't trip the breaker for every other source.
//!
//! ## States
//!
//! - **Closed**: normal operation, all calls pass through.
//! - **Open**: too many consecutive failures, calls fail fast.
//! - **Half-Open**: probing whether the collaborator has recovered.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::constants;
use crate::{Error, Result};

/// Circuit breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Normal operation — requests pass through.
    Closed,
    /// Too many failures — reject requests immediately.
    Open,
    /// Testing recovery — allow a limited number of requests.
    HalfOpen,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit.
    pub failure_threshold: u32,
    /// Duration to wait before probing again after opening.
    pub timeout: Duration,
    /// Base delay for the exponential backoff helper.
    pub base_delay: Duration,
    /// Ceiling for the exponential backoff helper.
    pub max_delay: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: constants::CIRCUIT_FAILURE_THRESHOLD,
            timeout: constants::CIRCUIT_TIMEOUT,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1600),
        }
    }
}

/// Circuit breaker statistics.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircuitBreakerStats {
    /// Total calls attempted.
    pub total_calls: u64,
    /// Calls that succeeded.
    pub successful_calls: u64,
    /// Calls that failed.
    pub failed_calls: u64,
    /// Calls rejected because the circuit was open.
    pub rejected_calls: u64,
    /// Current consecutive-failure streak.
    pub consecutive_failures: u32,
}

struct State {
    state: CircuitState,
    stats: CircuitBreakerStats,
    last_failure_time: Option<Instant>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            state: CircuitState::Closed,
            stats: CircuitBreakerStats::default(),
            last_failure_time: None,
        }
    }
}

/// A single circuit breaker, keyed externally by the registry below.
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    state: RwLock<State>,
}

impl CircuitBreaker {
    /// Build a breaker with the given configuration.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            config,
            state: RwLock::new(State::default()),
        }
    }

    /// Execute `operation`, failing fast with
    /// [`Error::CircuitBreakerOpen`] if the circuit is open.
    ///
    /// # Errors
    ///
    /// Propagates `operation`'s error, or returns
    /// [`Error::CircuitBreakerOpen`] if the circuit is open.
    pub async fn call<F, Fut, T>(&self, key: &str, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        if !self.should_allow_request().await {
            let mut state = self.state.write().await;
            state.stats.rejected_calls += 1;
            debug!(key, "circuit breaker rejecting request; circuit is open");
            return Err(Error::CircuitBreakerOpen(key.to_string()));
        }

        {
            let mut state = self.state.write().await;
            state.stats.total_calls += 1;
        }

        let result = operation().await;
        self.on_result(key, &result).await;
        result
    }

    async fn should_allow_request(&self) -> bool {
        let now = Instant::now();
        let mut state = self.state.write().await;

        match state.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                if let Some(last_failure) = state.last_failure_time {
                    if now.duration_since(last_failure) >= self.config.timeout {
                        info!("circuit breaker transitioning to half-open");
                        state.state = CircuitState::HalfOpen;
                        true
                    } else {
                        false
                    }
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => true,
        }
    }

    async fn on_result<T>(&self, key: &str, result: &Result<T>) {
        let mut state = self.state.write().await;
        match result {
            Ok(_) => {
                state.stats.successful_calls += 1;
                match state.state {
                    CircuitState::HalfOpen => {
                        info!(key, "circuit breaker closing after successful recovery test");
                        state.state = CircuitState::Closed;
                        state.stats.consecutive_failures = 0;
                        state.last_failure_time = None;
                    }
                    CircuitState::Closed => state.stats.consecutive_failures = 0,
                    CircuitState::Open => {}
                }
            }
            Err(e) => {
                if !e.is_recoverable() {
                    debug!(key, "non-recoverable error, not affecting circuit: {}", e);
                    return;
                }
                state.stats.failed_calls += 1;
                state.stats.consecutive_failures += 1;
                state.last_failure_time = Some(Instant::now());

                match state.state {
                    CircuitState::Closed => {
                        if state.stats.consecutive_failures >= self.config.failure_threshold {
                            warn!(
                                key,
                                failures = state.stats.consecutive_failures,
                                "circuit breaker opening"
                            );
                            state.state = CircuitState::Open;
                        }
                    }
                    CircuitState::HalfOpen => {
                        warn!(key, "circuit breaker reopening after failed recovery test");
                        state.state = CircuitState::Open;
                    }
                    CircuitState::Open => {}
                }
            }
        }
    }

    /// Current state of the circuit.
    pub async fn state(&self) -> CircuitState {
        self.state.read().await.state
    }

    /// Current statistics.
    pub async fn stats(&self) -> CircuitBreakerStats {
        self.state.read().await.stats
    }

    /// Exponential backoff for attempt `attempt` (0-based), capped at
    /// `max_delay`.
    #[must_use]
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.min(16));
        let delay_ms = (self.config.base_delay.as_millis() as u64).saturating_mul(factor);
        Duration::from_millis(delay_ms).min(self.config.max_delay)
    }
}

/// Keyed collection of circuit breakers, one per `text_extraction_{source}`
/// key (spec.md §5). New keys get a breaker with the default config on
/// first use.
#[derive(Default)]
pub struct CircuitBreakerRegistry {
    breakers: Mutex<HashMap<String, Arc<CircuitBreaker>>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreakerRegistry {
    /// Build a registry where every new key gets `config`.
    #[must_use]
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            breakers: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Fetch (creating if needed) the breaker for `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Arc<CircuitBreaker> {
        let mut breakers = self.breakers.lock();
        breakers
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(CircuitBreaker::new(self.config)))
            .clone()
    }

    /// The conventional key for extraction calls against `source`.
    #[must_use]
    pub fn extraction_key(source: &str) -> String {
        format!("text_extraction_{source}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn opens_after_threshold_consecutive_failures() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 3,
            ..Default::default()
        });

        for _ in 0..3 {
            let _ = cb
                .call("k", || async { Err::<(), _>(Error::AiExtraction("boom".into())) })
                .await;
        }

        assert_eq!(cb.state().await, CircuitState::Open);

        let err = cb.call("k", || async { Ok::<_, Error>(()) }).await;
        assert!(matches!(err, Err(Error::CircuitBreakerOpen(_))));
    }

    #[tokio::test]
    async fn non_recoverable_errors_do_not_trip_the_breaker() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig {
            failure_threshold: 1,
            ..Default::default()
        });

        let _ = cb
            .call("k", || async { Err::<(), _>(Error::InvalidInput("bad".into())) })
            .await;

        assert_eq!(cb.state().await, CircuitState::Closed);
    }

    #[test]
    fn backoff_doubles_and_caps() {
        let cb = CircuitBreaker::new(CircuitBreakerConfig::default());
        assert_eq!(cb.calculate_backoff(0), Duration::from_millis(100));
        assert_eq!(cb.calculate_backoff(1), Duration::from_millis(200));
        assert_eq!(cb.calculate_backoff(4), Duration::from_millis(1600));
        assert_eq!(cb.calculate_backoff(10), Duration::from_millis(1600));
    }

    #[test]
    fn registry_reuses_breaker_per_key() {
        let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig::default());
        let a = registry.get("text_extraction_doc-1");
        let b = registry.get("text_extraction_doc-1");
        assert!(Arc::ptr_eq(&a, &b));
    }
}
