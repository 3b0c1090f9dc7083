//! Circuit breaker for protecting calls to a single downstream dependency
//!
//! The breaker keeps a bounded sliding window of recent outcomes and opens
//! when the failure rate inside the window reaches
//! `failure_threshold / window_size` (once `minimum_requests` samples exist).
//! While open, calls are rejected until `next_attempt_time`; the first call
//! after that moves the breaker to half-open, where `success_threshold`
//! consecutive successes close it again and any failure reopens it.
//!
//! All state lives behind one `parking_lot::Mutex` per breaker, so the
//! transition decision and the outcome that caused it are applied atomically.

use std::collections::VecDeque;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use super::retry::ErrorClass;

//==============================================================================
// Time Abstraction for Testability
//==============================================================================

/// Trait for time operations to enable deterministic testing
///
/// Breakers and cooldown-based components use real system time in production
/// and controlled mock time in tests.
pub trait Clock: Send + Sync + 'static {
    /// Get current instant (monotonic time)
    fn now(&self) -> Instant;

    /// Get current system time (wall clock)
    fn system_time(&self) -> SystemTime;

    /// Get milliseconds since UNIX epoch
    fn millis_since_epoch(&self) -> u64 {
        self.system_time().duration_since(UNIX_EPOCH).unwrap_or_default().as_millis() as u64
    }
}

/// Shared, type-erased clock handle
pub type SharedClock = Arc<dyn Clock>;

/// Real system clock implementation for production use
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn system_time(&self) -> SystemTime {
        SystemTime::now()
    }
}

impl<T: Clock> Clock for Arc<T> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn system_time(&self) -> SystemTime {
        (**self).system_time()
    }
}

/// Mock clock for deterministic testing
///
/// Clones share the same elapsed counter, so a test can hand one clone to a
/// component and advance time through another.
#[derive(Debug, Clone)]
pub struct MockClock {
    start: Instant,
    elapsed: Arc<Mutex<Duration>>,
}

impl MockClock {
    /// Create a new mock clock starting at the current instant
    pub fn new() -> Self {
        Self { start: Instant::now(), elapsed: Arc::new(Mutex::new(Duration::ZERO)) }
    }

    /// Advance the mock clock by a duration
    pub fn advance(&self, duration: Duration) {
        *self.elapsed.lock() += duration;
    }

    /// Advance the mock clock by milliseconds
    pub fn advance_millis(&self, millis: u64) {
        self.advance(Duration::from_millis(millis));
    }

    /// Set the mock clock to a specific elapsed time
    pub fn set_elapsed(&self, duration: Duration) {
        *self.elapsed.lock() = duration;
    }

    /// Get the current elapsed time
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.lock()
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        self.start + self.elapsed()
    }

    fn system_time(&self) -> SystemTime {
        UNIX_EPOCH + self.elapsed()
    }
}

//==============================================================================
// Error Types
//==============================================================================

/// Simple configuration error for validation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Errors that can occur in resilience operations
///
/// Generic over the underlying operation error type `E` so the original
/// failure is preserved as the error source.
#[derive(Debug, Error)]
pub enum ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Circuit breaker is open, rejecting calls
    #[error("Circuit breaker '{name}' is open, rejecting calls")]
    CircuitOpen { name: String },

    /// Operation timed out
    #[error("Operation timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The underlying operation failed
    #[error("Operation failed: {source}")]
    OperationFailed {
        #[source]
        source: E,
    },

    /// Configuration error
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}

impl<E> ResilienceError<E>
where
    E: std::error::Error + Send + Sync + 'static,
{
    /// Whether the breaker rejected the call without running it
    pub fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen { .. })
    }

    /// Whether the call exceeded the breaker's call timeout
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Unwrap the underlying operation error, if that is what failed
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::OperationFailed { source } => Some(source),
            _ => None,
        }
    }
}

impl<E> ErrorClass for ResilienceError<E>
where
    E: std::error::Error + ErrorClass + Send + Sync + 'static,
{
    fn error_class(&self) -> &str {
        match self {
            Self::CircuitOpen { .. } => "circuit_open",
            Self::Timeout { .. } => "timeout",
            Self::OperationFailed { source } => source.error_class(),
            Self::InvalidConfiguration { .. } => "configuration",
        }
    }
}

impl From<ConfigError> for crate::error::CommonError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Invalid { message } => Self::config(message),
        }
    }
}

/// Result type for resilience operations
pub type ResilienceResult<T, E> = Result<T, ResilienceError<E>>;

/// Configuration result type using simple config errors
pub type ConfigResult<T> = Result<T, ConfigError>;

//==============================================================================
// Configuration
//==============================================================================

/// Circuit breaker states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CircuitState {
    /// Circuit is closed, allowing requests
    Closed,
    /// Circuit is open, rejecting requests
    Open,
    /// Circuit is half-open, allowing requests to test recovery
    HalfOpen,
}

impl fmt::Display for CircuitState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CircuitState::Closed => write!(f, "CLOSED"),
            CircuitState::Open => write!(f, "OPEN"),
            CircuitState::HalfOpen => write!(f, "HALF_OPEN"),
        }
    }
}

/// Configuration for circuit breaker behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitBreakerConfig {
    /// Failures per `window_size` samples that open the circuit
    pub failure_threshold: u32,
    /// Time to wait before an open circuit admits a probe call
    pub recovery_timeout: Duration,
    /// Consecutive half-open successes needed to close the circuit
    pub success_threshold: u32,
    /// Upper bound on a single protected call
    pub call_timeout: Duration,
    /// Maximum number of samples kept in the sliding window
    pub window_size: usize,
    /// Samples required before the failure rate is considered
    pub minimum_requests: usize,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout: Duration::from_secs(60),
            success_threshold: 3,
            call_timeout: Duration::from_secs(30),
            window_size: 10,
            minimum_requests: 5,
        }
    }
}

impl CircuitBreakerConfig {
    /// Create a configuration builder
    pub fn builder() -> CircuitBreakerConfigBuilder {
        CircuitBreakerConfigBuilder::new()
    }

    /// Failure rate at or above which a closed circuit opens
    pub fn failure_rate_threshold(&self) -> f64 {
        f64::from(self.failure_threshold) / self.window_size as f64
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.failure_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "failure_threshold must be greater than 0".to_string(),
            });
        }

        if self.success_threshold == 0 {
            return Err(ConfigError::Invalid {
                message: "success_threshold must be greater than 0".to_string(),
            });
        }

        if self.window_size == 0 {
            return Err(ConfigError::Invalid {
                message: "window_size must be greater than 0".to_string(),
            });
        }

        if self.failure_threshold as usize > self.window_size {
            return Err(ConfigError::Invalid {
                message: format!(
                    "failure_threshold ({}) cannot exceed window_size ({})",
                    self.failure_threshold, self.window_size
                ),
            });
        }

        if self.minimum_requests == 0 || self.minimum_requests > self.window_size {
            return Err(ConfigError::Invalid {
                message: format!(
                    "minimum_requests must be between 1 and window_size ({})",
                    self.window_size
                ),
            });
        }

        if self.call_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                message: "call_timeout must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for CircuitBreakerConfig
#[derive(Debug, Default)]
pub struct CircuitBreakerConfigBuilder {
    config: CircuitBreakerConfig,
}

impl CircuitBreakerConfigBuilder {
    pub fn new() -> Self {
        Self { config: CircuitBreakerConfig::default() }
    }

    pub fn failure_threshold(mut self, threshold: u32) -> Self {
        self.config.failure_threshold = threshold;
        self
    }

    pub fn recovery_timeout(mut self, timeout: Duration) -> Self {
        self.config.recovery_timeout = timeout;
        self
    }

    pub fn success_threshold(mut self, threshold: u32) -> Self {
        self.config.success_threshold = threshold;
        self
    }

    pub fn call_timeout(mut self, timeout: Duration) -> Self {
        self.config.call_timeout = timeout;
        self
    }

    pub fn window_size(mut self, size: usize) -> Self {
        self.config.window_size = size;
        self
    }

    pub fn minimum_requests(mut self, minimum: usize) -> Self {
        self.config.minimum_requests = minimum;
        self
    }

    pub fn build(self) -> ConfigResult<CircuitBreakerConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

//==============================================================================
// Metrics
//==============================================================================

/// Cumulative circuit breaker counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CircuitBreakerMetrics {
    pub total_calls: u64,
    pub success_count: u64,
    pub failure_count: u64,
    pub timeout_count: u64,
    pub rejected_count: u64,
    pub open_count: u64,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
}

/// Point-in-time view of one breaker, used by the registry and admin surface
#[derive(Debug, Clone, Serialize)]
pub struct CircuitBreakerSnapshot {
    pub name: String,
    pub state: CircuitState,
    pub window_len: usize,
    pub window_failures: usize,
    pub window_failure_rate: f64,
    /// Age of the oldest sample still in the window
    pub window_age_ms: Option<u64>,
    /// Window holds at least `minimum_requests` samples
    pub has_sufficient_samples: bool,
    pub half_open_successes: u32,
    /// Remaining time until an open circuit admits a probe
    pub retry_in_ms: Option<u64>,
    pub metrics: CircuitBreakerMetrics,
}

//==============================================================================
// Circuit Breaker
//==============================================================================

#[derive(Debug, Clone, Copy)]
struct Sample {
    at: Instant,
    success: bool,
}

#[derive(Debug)]
struct BreakerState {
    state: CircuitState,
    window: VecDeque<Sample>,
    half_open_successes: u32,
    next_attempt_time: Option<Instant>,
    metrics: CircuitBreakerMetrics,
}

impl BreakerState {
    fn new(window_size: usize) -> Self {
        Self {
            state: CircuitState::Closed,
            window: VecDeque::with_capacity(window_size),
            half_open_successes: 0,
            next_attempt_time: None,
            metrics: CircuitBreakerMetrics::default(),
        }
    }

    fn window_failures(&self) -> usize {
        self.window.iter().filter(|sample| !sample.success).count()
    }
}

enum Outcome {
    Success,
    Failure,
    Timeout,
}

/// Circuit breaker protecting one named dependency
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct CircuitBreaker {
    name: String,
    config: CircuitBreakerConfig,
    inner: Mutex<BreakerState>,
    clock: SharedClock,
}

impl fmt::Debug for CircuitBreaker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("state", &inner.state)
            .field("window_len", &inner.window.len())
            .finish_non_exhaustive()
    }
}

impl CircuitBreaker {
    /// Create a new circuit breaker using the system clock
    pub fn new(name: impl Into<String>, config: CircuitBreakerConfig) -> ConfigResult<Self> {
        Self::with_clock(name, config, Arc::new(SystemClock))
    }

    /// Create a new circuit breaker with a custom clock (useful for testing)
    pub fn with_clock(
        name: impl Into<String>,
        config: CircuitBreakerConfig,
        clock: SharedClock,
    ) -> ConfigResult<Self> {
        config.validate()?;
        let inner = Mutex::new(BreakerState::new(config.window_size));
        Ok(Self { name: name.into(), config, inner, clock })
    }

    /// Name of the protected dependency
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Configuration this breaker was built with
    pub fn config(&self) -> &CircuitBreakerConfig {
        &self.config
    }

    /// Current state, without attempting an OPEN to HALF_OPEN transition
    pub fn state(&self) -> CircuitState {
        self.inner.lock().state
    }

    /// Fast check whether the circuit is not open
    pub fn is_available(&self) -> bool {
        self.state() != CircuitState::Open
    }

    /// Decide whether a call may proceed
    ///
    /// An open circuit whose `next_attempt_time` has passed moves to
    /// half-open and admits the caller. Rejections are counted.
    pub fn try_acquire(&self) -> bool {
        let now = self.clock.now();
        let mut inner = self.inner.lock();

        match inner.state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let ready = inner.next_attempt_time.map_or(true, |at| now >= at);
                if ready {
                    inner.state = CircuitState::HalfOpen;
                    inner.half_open_successes = 0;
                    info!(breaker = %self.name, "Circuit breaker half-open, admitting probe call");
                } else {
                    inner.metrics.rejected_count += 1;
                }
                ready
            }
        }
    }

    /// Execute an async operation under breaker protection
    ///
    /// The operation is bounded by `call_timeout`; on timeout the future is
    /// dropped and the attempt counts as a failure.
    #[instrument(skip(self, operation), fields(breaker = %self.name))]
    pub async fn call<F, Fut, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.try_acquire() {
            debug!("Circuit breaker rejecting call");
            return Err(ResilienceError::CircuitOpen { name: self.name.clone() });
        }

        match tokio::time::timeout(self.config.call_timeout, operation()).await {
            Ok(Ok(value)) => {
                self.record(Outcome::Success);
                Ok(value)
            }
            Ok(Err(error)) => {
                self.record(Outcome::Failure);
                debug!(error = %error, "Protected operation failed");
                Err(ResilienceError::OperationFailed { source: error })
            }
            Err(_) => {
                self.record(Outcome::Timeout);
                warn!(timeout = ?self.config.call_timeout, "Protected operation timed out");
                Err(ResilienceError::Timeout { timeout: self.config.call_timeout })
            }
        }
    }

    /// Execute a synchronous operation under breaker protection
    ///
    /// The closure cannot be interrupted; if it returns after `call_timeout`
    /// has elapsed the attempt is recorded as a timeout and its value is
    /// discarded.
    #[instrument(skip(self, operation), fields(breaker = %self.name))]
    pub fn call_blocking<F, T, E>(&self, operation: F) -> ResilienceResult<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error + Send + Sync + 'static,
    {
        if !self.try_acquire() {
            debug!("Circuit breaker rejecting call");
            return Err(ResilienceError::CircuitOpen { name: self.name.clone() });
        }

        let started = self.clock.now();
        let result = operation();
        let elapsed = self.clock.now().saturating_duration_since(started);

        if elapsed > self.config.call_timeout {
            self.record(Outcome::Timeout);
            warn!(elapsed = ?elapsed, "Blocking operation exceeded call timeout");
            return Err(ResilienceError::Timeout { timeout: self.config.call_timeout });
        }

        match result {
            Ok(value) => {
                self.record(Outcome::Success);
                Ok(value)
            }
            Err(error) => {
                self.record(Outcome::Failure);
                Err(ResilienceError::OperationFailed { source: error })
            }
        }
    }

    /// Record a successful outcome for a call made outside `call`
    pub fn record_success(&self) {
        self.record(Outcome::Success);
    }

    /// Record a failed outcome for a call made outside `call`
    pub fn record_failure(&self) {
        self.record(Outcome::Failure);
    }

    fn record(&self, outcome: Outcome) {
        let now = self.clock.now();
        let wall_now = DateTime::<Utc>::from(self.clock.system_time());
        let success = matches!(outcome, Outcome::Success);

        let mut inner = self.inner.lock();

        inner.window.push_back(Sample { at: now, success });
        while inner.window.len() > self.config.window_size {
            inner.window.pop_front();
        }

        inner.metrics.total_calls += 1;
        match outcome {
            Outcome::Success => {
                inner.metrics.success_count += 1;
                inner.metrics.last_success_at = Some(wall_now);
            }
            Outcome::Failure => {
                inner.metrics.failure_count += 1;
                inner.metrics.last_failure_at = Some(wall_now);
            }
            Outcome::Timeout => {
                inner.metrics.failure_count += 1;
                inner.metrics.timeout_count += 1;
                inner.metrics.last_failure_at = Some(wall_now);
            }
        }

        match (inner.state, success) {
            (CircuitState::Closed, false) => {
                let len = inner.window.len();
                let failures = inner.window_failures();
                // failures / len >= failure_threshold / window_size
                let tripped = len >= self.config.minimum_requests
                    && failures * self.config.window_size
                        >= self.config.failure_threshold as usize * len;
                if tripped {
                    self.open(&mut inner, now);
                    warn!(
                        breaker = %self.name,
                        failures,
                        window_len = len,
                        "Circuit breaker opened on failure rate"
                    );
                }
            }
            (CircuitState::HalfOpen, true) => {
                inner.half_open_successes += 1;
                if inner.half_open_successes >= self.config.success_threshold {
                    inner.state = CircuitState::Closed;
                    inner.half_open_successes = 0;
                    inner.next_attempt_time = None;
                    inner.window.clear();
                    info!(breaker = %self.name, "Circuit breaker closed after recovery");
                }
            }
            (CircuitState::HalfOpen, false) => {
                self.open(&mut inner, now);
                warn!(breaker = %self.name, "Circuit breaker reopened by half-open failure");
            }
            // Late outcomes while open and successes while closed only update
            // the window and counters.
            (CircuitState::Closed, true) | (CircuitState::Open, _) => {}
        }
    }

    fn open(&self, inner: &mut BreakerState, now: Instant) {
        inner.state = CircuitState::Open;
        inner.half_open_successes = 0;
        inner.next_attempt_time = Some(now + self.config.recovery_timeout);
        inner.metrics.open_count += 1;
    }

    /// Cumulative counters
    pub fn metrics(&self) -> CircuitBreakerMetrics {
        self.inner.lock().metrics.clone()
    }

    /// Point-in-time view including window statistics
    pub fn snapshot(&self) -> CircuitBreakerSnapshot {
        let now = self.clock.now();
        let inner = self.inner.lock();
        let window_len = inner.window.len();
        let window_failures = inner.window_failures();
        let window_failure_rate =
            if window_len == 0 { 0.0 } else { window_failures as f64 / window_len as f64 };
        let window_age_ms = inner
            .window
            .front()
            .map(|oldest| now.saturating_duration_since(oldest.at).as_millis() as u64);
        let retry_in_ms = match (inner.state, inner.next_attempt_time) {
            (CircuitState::Open, Some(at)) => {
                Some(at.saturating_duration_since(now).as_millis() as u64)
            }
            _ => None,
        };

        CircuitBreakerSnapshot {
            name: self.name.clone(),
            state: inner.state,
            window_len,
            window_failures,
            window_failure_rate,
            window_age_ms,
            has_sufficient_samples: window_len >= self.config.minimum_requests,
            half_open_successes: inner.half_open_successes,
            retry_in_ms,
            metrics: inner.metrics.clone(),
        }
    }

    /// Force the breaker closed with an empty window and zeroed metrics
    pub fn reset(&self) {
        *self.inner.lock() = BreakerState::new(self.config.window_size);
        info!(breaker = %self.name, "Circuit breaker manually reset to closed state");
    }
}
