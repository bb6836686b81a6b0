//! Circuit breaker around the primary scorer.
//!
//! When primary calls fail repeatedly, the circuit opens and subsequent
//! candidates go straight to the heuristic scorer until the recovery
//! timeout passes.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;

/// Circuit breaker configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,

    /// Time before attempting recovery, e.g. "30s"
    #[serde(with = "crate::config::duration_human")]
    pub recovery_timeout: Duration,

    /// Successes in half-open state needed to close the circuit
    pub success_threshold: u32,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 3,
            recovery_timeout: Duration::from_secs(30),
            success_threshold: 2,
        }
    }
}

/// State of the circuit.
#[derive(Debug, Clone, PartialEq)]
pub enum CircuitState {
    /// Normal operation
    Closed { failures: u32 },

    /// Circuit is open, all calls bypass the primary scorer
    Open { opened_at: Instant },

    /// Testing if the circuit can close
    HalfOpen { successes: u32 },
}

/// Circuit breaker for one downstream dependency.
pub struct CircuitBreaker {
    state: RwLock<CircuitState>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        Self {
            state: RwLock::new(CircuitState::Closed { failures: 0 }),
            config,
        }
    }

    /// Returns true if calls should bypass the primary scorer.
    pub fn is_open(&self) -> bool {
        let mut state = self.state.write();
        match *state {
            CircuitState::Open { opened_at } => {
                if opened_at.elapsed() >= self.config.recovery_timeout {
                    *state = CircuitState::HalfOpen { successes: 0 };
                    tracing::info!("Circuit transitioning to half-open for recovery test");
                    false
                } else {
                    true
                }
            }
            // Half-open allows test calls
            _ => false,
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write();
        match *state {
            CircuitState::HalfOpen { successes } => {
                if successes + 1 >= self.config.success_threshold {
                    *state = CircuitState::Closed { failures: 0 };
                    tracing::info!("Circuit closed after successful recovery");
                } else {
                    *state = CircuitState::HalfOpen {
                        successes: successes + 1,
                    };
                }
            }
            CircuitState::Closed { .. } => {
                *state = CircuitState::Closed { failures: 0 };
            }
            CircuitState::Open { .. } => {}
        }
    }

    pub fn record_failure(&self) {
        let mut state = self.state.write();
        match *state {
            CircuitState::Closed { failures } => {
                if failures + 1 >= self.config.failure_threshold {
                    *state = CircuitState::Open {
                        opened_at: Instant::now(),
                    };
                    tracing::warn!(
                        failures = failures + 1,
                        "Circuit opened after repeated failures"
                    );
                } else {
                    *state = CircuitState::Closed {
                        failures: failures + 1,
                    };
                }
            }
            CircuitState::HalfOpen { .. } => {
                *state = CircuitState::Open {
                    opened_at: Instant::now(),
                };
                tracing::warn!("Circuit reopened after failed recovery attempt");
            }
            CircuitState::Open { .. } => {}
        }
    }

    pub fn state(&self) -> CircuitState {
        self.state.read().clone()
    }

    /// Force the circuit closed.
    pub fn reset(&self) {
        *self.state.write() = CircuitState::Closed { failures: 0 };
    }
}

impl Default for CircuitBreaker {
    fn default() -> Self {
        Self::new(CircuitBreakerConfig::default())
    }
}
