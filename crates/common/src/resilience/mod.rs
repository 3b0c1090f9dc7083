//! Resilience patterns for fault tolerance
//!
//! - **Circuit Breaker**: stops calling a dependency whose recent failure
//!   rate is too high, then probes it back to health
//! - **Registry**: one named breaker per protected dependency
//! - **Retry**: configurable retry with exponential, linear, fixed and
//!   Fibonacci backoff plus multiplicative jitter
//!
//! Everything here is generic over the caller's error type and carries no
//! knowledge of the messaging domain. Domain services in `innkeeper-core`
//! compose these primitives.
//!
//! ```rust
//! # #[cfg(feature = "runtime")]
//! # {
//! use innkeeper_common::resilience::{CircuitBreakerConfig, CircuitBreakerRegistry};
//!
//! let registry = CircuitBreakerRegistry::new(CircuitBreakerConfig::default()).unwrap();
//! let breaker = registry.get_or_create("database", None).unwrap();
//! assert!(breaker.is_available());
//! # }
//! ```

pub mod circuit_breaker;
pub mod registry;
pub mod retry;

// Re-export circuit breaker types
pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerConfigBuilder, CircuitBreakerMetrics,
    CircuitBreakerSnapshot, CircuitState, Clock, ConfigError, ConfigResult, MockClock,
    ResilienceError, ResilienceResult, SharedClock, SystemClock,
};
pub use registry::{CircuitBreakerRegistry, RegistrySummary};
// Re-export retry types
pub use retry::{
    BackoffStrategy, ErrorClass, Jitter, RetryDecision, RetryError, RetryExecutor, RetryPolicy,
    RetryPolicyBuilder, RetryResult,
};
