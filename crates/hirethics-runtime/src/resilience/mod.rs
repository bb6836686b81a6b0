//! Resilience patterns for hirethics-runtime.
//!
//! This module provides:
//! - Circuit breaker around the primary scorer
//! - Retry with backoff for transient provider errors
//! - Cooperative cancellation for batch runs

mod cancel;
mod circuit_breaker;
mod retry;

pub use cancel::CancellationFlag;
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
pub use retry::RetryPolicy;
