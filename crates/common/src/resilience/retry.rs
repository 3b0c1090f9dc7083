//! Retry policy and executor with pluggable backoff strategies
//!
//! A [`RetryPolicy`] is stateless configuration: attempt budget, delay
//! bounds, backoff strategy, optional jitter, failure-class filters and
//! callbacks. A [`RetryExecutor`] applies it to one unit of work at a time,
//! keeping its attempt counter local to the call.
//!
//! Attempts are 0-based. Delays per strategy:
//!
//! | Strategy | Delay before retrying after attempt `n` |
//! |----------|------------------------------------------|
//! | `Exponential { base }` | `base_delay * base^n` |
//! | `Linear` | `base_delay * (n + 1)` |
//! | `Fixed` | `base_delay` |
//! | `Fibonacci` | `base_delay * fib(n)`, `fib(0) = fib(1) = 1` |
//!
//! Every delay is capped at `max_delay`; jitter then scales it by
//! `1 + uniform(-min, max)`.

use std::collections::HashSet;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use super::circuit_breaker::{ConfigError, ConfigResult};
use crate::error::CommonError;

//==============================================================================
// Failure Classes
//==============================================================================

/// Names the class of a failure for retryable / non-retryable filtering
///
/// Implemented by caller error types. Class names are free-form, lowercase
/// snake case by convention (`timeout`, `connection`, `validation`).
pub trait ErrorClass {
    /// Class name of this failure
    fn error_class(&self) -> &str;
}

impl ErrorClass for CommonError {
    fn error_class(&self) -> &str {
        self.error_type_name()
    }
}

impl ErrorClass for std::io::Error {
    fn error_class(&self) -> &str {
        use std::io::ErrorKind;

        match self.kind() {
            ErrorKind::TimedOut => "timeout",
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected => "connection",
            ErrorKind::InvalidInput | ErrorKind::InvalidData => "validation",
            _ => "io",
        }
    }
}

//==============================================================================
// Errors
//==============================================================================

/// Terminal outcome of a retried operation
#[derive(Debug, Error)]
pub enum RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// All attempts failed; carries the last failure
    #[error("All retry attempts exhausted after {attempts} tries: {source}")]
    Exhausted {
        attempts: u32,
        #[source]
        source: E,
    },

    /// The policy refused to retry this failure
    #[error("Operation failed with non-retryable error: {source}")]
    NonRetryable {
        attempts: u32,
        #[source]
        source: E,
    },
}

impl<E> RetryError<E>
where
    E: std::error::Error + 'static,
{
    /// Number of attempts made before giving up
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Exhausted { attempts, .. } | Self::NonRetryable { attempts, .. } => *attempts,
        }
    }

    /// The last underlying failure
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { source, .. } | Self::NonRetryable { source, .. } => source,
        }
    }
}

/// Result type for retry operations
pub type RetryResult<T, E> = Result<T, RetryError<E>>;

//==============================================================================
// Backoff & Jitter
//==============================================================================

/// Backoff strategy for calculating retry delays
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BackoffStrategy {
    /// `base_delay * base^attempt`
    Exponential { base: f64 },
    /// `base_delay * (attempt + 1)`
    Linear,
    /// `base_delay`
    Fixed,
    /// `base_delay * fib(attempt)`
    Fibonacci,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        Self::Exponential { base: 2.0 }
    }
}

impl BackoffStrategy {
    /// Factor applied to `base_delay` for the given 0-based attempt
    pub fn multiplier(&self, attempt: u32) -> f64 {
        match self {
            Self::Exponential { base } => base.powi(attempt.min(i32::MAX as u32) as i32),
            Self::Linear => f64::from(attempt) + 1.0,
            Self::Fixed => 1.0,
            Self::Fibonacci => fibonacci(attempt),
        }
    }
}

fn fibonacci(n: u32) -> f64 {
    let (mut prev, mut curr) = (1.0_f64, 1.0_f64);
    for _ in 1..n {
        let next = prev + curr;
        prev = curr;
        curr = next;
        if curr.is_infinite() {
            break;
        }
    }
    curr
}

/// Multiplicative jitter range
///
/// A delay `d` becomes `d * (1 + uniform(-min, max))`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Jitter {
    pub min: f64,
    pub max: f64,
}

impl Jitter {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Apply jitter to a delay
    pub fn apply(&self, delay: Duration) -> Duration {
        let factor = 1.0 + rand::thread_rng().gen_range(-self.min..=self.max);
        Duration::from_secs_f64((delay.as_secs_f64() * factor).max(0.0))
    }

    fn validate(&self) -> ConfigResult<()> {
        if !(0.0..=1.0).contains(&self.min) || !self.max.is_finite() || self.max < 0.0 {
            return Err(ConfigError::Invalid {
                message: format!(
                    "jitter range must satisfy 0 <= min <= 1 and max >= 0, got ({}, {})",
                    self.min, self.max
                ),
            });
        }
        Ok(())
    }
}

//==============================================================================
// Policy
//==============================================================================

type Predicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;
type RetryCallback<E> = Arc<dyn Fn(u32, &E, Duration) + Send + Sync>;
type FailureCallback<E> = Arc<dyn Fn(&E, u32) + Send + Sync>;

/// Decision for whether to retry an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the policy's backoff delay
    Retry,
    /// Don't retry the operation
    Stop,
}

/// Retry configuration
///
/// Cheap to clone; callbacks and the predicate are shared.
pub struct RetryPolicy<E> {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub strategy: BackoffStrategy,
    pub jitter: Option<Jitter>,
    /// `None` means every class is retryable
    retryable: Option<HashSet<String>>,
    non_retryable: HashSet<String>,
    predicate: Option<Predicate<E>>,
    on_retry: Option<RetryCallback<E>>,
    on_failure: Option<FailureCallback<E>>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_retries: self.max_retries,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            strategy: self.strategy,
            jitter: self.jitter,
            retryable: self.retryable.clone(),
            non_retryable: self.non_retryable.clone(),
            predicate: self.predicate.clone(),
            on_retry: self.on_retry.clone(),
            on_failure: self.on_failure.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_retries", &self.max_retries)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("strategy", &self.strategy)
            .field("jitter", &self.jitter)
            .field("retryable", &self.retryable)
            .field("non_retryable", &self.non_retryable)
            .field("has_predicate", &self.predicate.is_some())
            .finish_non_exhaustive()
    }
}

impl<E> Default for RetryPolicy<E> {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            strategy: BackoffStrategy::default(),
            jitter: None,
            retryable: None,
            non_retryable: HashSet::new(),
            predicate: None,
            on_retry: None,
            on_failure: None,
        }
    }
}

impl<E> RetryPolicy<E> {
    /// Create a policy builder
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new()
    }

    /// Total attempts including the first one
    pub fn total_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay before the retry that follows the given 0-based attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let raw = self.base_delay.as_secs_f64() * self.strategy.multiplier(attempt);
        let capped = Duration::from_secs_f64(raw.min(self.max_delay.as_secs_f64()).max(0.0));
        match &self.jitter {
            Some(jitter) => jitter.apply(capped),
            None => capped,
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.base_delay > self.max_delay {
            return Err(ConfigError::Invalid {
                message: format!(
                    "base_delay ({:?}) cannot exceed max_delay ({:?})",
                    self.base_delay, self.max_delay
                ),
            });
        }

        if let BackoffStrategy::Exponential { base } = self.strategy {
            if !base.is_finite() || base < 1.0 {
                return Err(ConfigError::Invalid {
                    message: format!("exponential base must be >= 1.0, got {base}"),
                });
            }
        }

        if let Some(jitter) = &self.jitter {
            jitter.validate()?;
        }

        if let Some(retryable) = &self.retryable {
            if let Some(class) = retryable.intersection(&self.non_retryable).next() {
                return Err(ConfigError::Invalid {
                    message: format!("class '{class}' is both retryable and non-retryable"),
                });
            }
        }

        Ok(())
    }
}

impl<E: ErrorClass> RetryPolicy<E> {
    /// Whether the failure should be retried
    ///
    /// A custom predicate decides alone when present. Otherwise
    /// non-retryable classes stop, and the retryable set (all classes when
    /// unset) decides.
    pub fn should_retry(&self, error: &E) -> bool {
        if let Some(predicate) = &self.predicate {
            return predicate(error);
        }

        let class = error.error_class();
        if self.non_retryable.contains(class) {
            return false;
        }

        self.retryable.as_ref().map_or(true, |set| set.contains(class))
    }

    /// Decide what to do after a failed 0-based attempt
    pub fn decide(&self, error: &E, attempt: u32) -> RetryDecision {
        if attempt < self.max_retries && self.should_retry(error) {
            RetryDecision::Retry
        } else {
            RetryDecision::Stop
        }
    }
}

/// Builder for RetryPolicy
pub struct RetryPolicyBuilder<E> {
    policy: RetryPolicy<E>,
}

impl<E> Default for RetryPolicyBuilder<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> RetryPolicyBuilder<E> {
    pub fn new() -> Self {
        Self { policy: RetryPolicy::default() }
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.policy.max_retries = retries;
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.policy.base_delay = delay;
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.policy.max_delay = delay;
        self
    }

    pub fn strategy(mut self, strategy: BackoffStrategy) -> Self {
        self.policy.strategy = strategy;
        self
    }

    pub fn exponential(self, base: f64) -> Self {
        self.strategy(BackoffStrategy::Exponential { base })
    }

    pub fn linear(self) -> Self {
        self.strategy(BackoffStrategy::Linear)
    }

    pub fn fixed(self) -> Self {
        self.strategy(BackoffStrategy::Fixed)
    }

    pub fn fibonacci(self) -> Self {
        self.strategy(BackoffStrategy::Fibonacci)
    }

    pub fn jitter(mut self, min: f64, max: f64) -> Self {
        self.policy.jitter = Some(Jitter::new(min, max));
        self
    }

    pub fn no_jitter(mut self) -> Self {
        self.policy.jitter = None;
        self
    }

    /// Restrict retries to the given failure classes
    pub fn retryable<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.retryable = Some(classes.into_iter().map(Into::into).collect());
        self
    }

    /// Never retry the given failure classes
    pub fn non_retryable<I, S>(mut self, classes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.policy.non_retryable.extend(classes.into_iter().map(Into::into));
        self
    }

    /// Custom retry predicate; overrides the class filters
    pub fn retry_if<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.policy.predicate = Some(Arc::new(predicate));
        self
    }

    /// Called with `(attempts_so_far, error, delay)` before each backoff sleep
    pub fn on_retry<F>(mut self, callback: F) -> Self
    where
        F: Fn(u32, &E, Duration) + Send + Sync + 'static,
    {
        self.policy.on_retry = Some(Arc::new(callback));
        self
    }

    /// Called with `(error, total_attempts)` when the executor gives up
    pub fn on_failure<F>(mut self, callback: F) -> Self
    where
        F: Fn(&E, u32) + Send + Sync + 'static,
    {
        self.policy.on_failure = Some(Arc::new(callback));
        self
    }

    pub fn build(self) -> ConfigResult<RetryPolicy<E>> {
        self.policy.validate()?;
        Ok(self.policy)
    }
}

//==============================================================================
// Executor
//==============================================================================

/// Applies a [`RetryPolicy`] to units of work
#[derive(Debug, Clone)]
pub struct RetryExecutor<E> {
    policy: RetryPolicy<E>,
}

impl<E> RetryExecutor<E>
where
    E: std::error::Error + ErrorClass + 'static,
{
    /// Create a new retry executor with the given policy
    pub fn new(policy: RetryPolicy<E>) -> Self {
        Self { policy }
    }

    /// Policy applied by this executor
    pub fn policy(&self) -> &RetryPolicy<E> {
        &self.policy
    }

    /// Execute an async operation, sleeping on the tokio timer between attempts
    #[instrument(skip(self, operation), fields(max_retries = self.policy.max_retries))]
    pub async fn execute<F, Fut, T>(&self, mut operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut attempt = 0;
        loop {
            match operation().await {
                Ok(value) => {
                    if attempt > 0 {
                        debug!(retries = attempt, "Operation succeeded after retries");
                    }
                    return Ok(value);
                }
                Err(error) => match self.next_delay(&error, attempt) {
                    Some(delay) => {
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                    }
                    None => return Err(self.give_up(error, attempt)),
                },
            }
        }
    }

    /// Execute a synchronous operation, blocking the thread between attempts
    #[instrument(skip(self, operation), fields(max_retries = self.policy.max_retries))]
    pub fn execute_blocking<F, T>(&self, mut operation: F) -> RetryResult<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        let mut attempt = 0;
        loop {
            match operation() {
                Ok(value) => return Ok(value),
                Err(error) => match self.next_delay(&error, attempt) {
                    Some(delay) => {
                        std::thread::sleep(delay);
                        attempt += 1;
                    }
                    None => return Err(self.give_up(error, attempt)),
                },
            }
        }
    }

    /// Delay before the next attempt, or `None` when the policy stops here
    fn next_delay(&self, error: &E, attempt: u32) -> Option<Duration> {
        if self.policy.decide(error, attempt) == RetryDecision::Stop {
            return None;
        }

        let delay = self.policy.delay_for(attempt);
        warn!(
            attempt = attempt + 1,
            delay_ms = delay.as_millis() as u64,
            error = %error,
            "Operation failed, retrying"
        );
        if let Some(on_retry) = &self.policy.on_retry {
            on_retry(attempt + 1, error, delay);
        }
        Some(delay)
    }

    fn give_up(&self, error: E, attempt: u32) -> RetryError<E> {
        let attempts = attempt + 1;
        if let Some(on_failure) = &self.policy.on_failure {
            on_failure(&error, attempts);
        }

        if attempt >= self.policy.max_retries {
            warn!(attempts, error = %error, "All retry attempts exhausted");
            RetryError::Exhausted { attempts, source: error }
        } else {
            debug!(attempts, class = error.error_class(), "Error is not retryable");
            RetryError::NonRetryable { attempts, source: error }
        }
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for retry strategies and the executor
    //!
    //! Covers delay formulas, capping, jitter bounds, class filtering,
    //! callbacks and attempt accounting.

    use std::io;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn policy(strategy: BackoffStrategy) -> RetryPolicy<io::Error> {
        RetryPolicy::builder()
            .base_delay(Duration::from_millis(100))
            .max_delay(Duration::from_secs(10))
            .strategy(strategy)
            .build()
            .expect("valid policy")
    }

    fn timeout_error() -> io::Error {
        io::Error::new(io::ErrorKind::TimedOut, "timed out")
    }

    fn validation_error() -> io::Error {
        io::Error::new(io::ErrorKind::InvalidInput, "bad input")
    }

    /// Validates the exponential delay formula.
    ///
    /// Assertions:
    /// - Confirms delays of 100ms, 200ms, 400ms for attempts 0..3.
    #[test]
    fn test_exponential_delays() {
        let policy = policy(BackoffStrategy::Exponential { base: 2.0 });

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(2), Duration::from_millis(400));
    }

    /// Validates linear delays are `base * (attempt + 1)`.
    #[test]
    fn test_linear_delays() {
        let policy = policy(BackoffStrategy::Linear);

        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(4), Duration::from_millis(500));
    }

    /// Validates fixed delays never change.
    #[test]
    fn test_fixed_delays() {
        let policy = policy(BackoffStrategy::Fixed);

        assert_eq!(policy.delay_for(0), policy.delay_for(7));
    }

    /// Validates the Fibonacci sequence starts 1, 1, 2, 3, 5.
    #[test]
    fn test_fibonacci_delays() {
        let policy = policy(BackoffStrategy::Fibonacci);

        let delays: Vec<_> = (0..5).map(|n| policy.delay_for(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 100, 200, 300, 500]);
    }

    /// Validates every strategy is capped at `max_delay`.
    #[test]
    fn test_delay_capped_at_max_delay() {
        let policy = policy(BackoffStrategy::Exponential { base: 10.0 });

        assert_eq!(policy.delay_for(10), Duration::from_secs(10));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(10));
    }

    /// Validates jittered delays stay within `[d * (1 - min), d * (1 + max)]`.
    #[test]
    fn test_jitter_bounds() {
        let jitter = Jitter::new(0.25, 0.5);
        let base = Duration::from_millis(1000);

        for _ in 0..200 {
            let delay = jitter.apply(base);
            assert!(delay >= Duration::from_millis(750), "delay too small: {delay:?}");
            assert!(delay <= Duration::from_millis(1500), "delay too large: {delay:?}");
        }
    }

    /// Validates builder rejects inconsistent configuration.
    #[test]
    fn test_builder_validation() {
        assert!(RetryPolicy::<io::Error>::builder()
            .base_delay(Duration::from_secs(5))
            .max_delay(Duration::from_secs(1))
            .build()
            .is_err());
        assert!(RetryPolicy::<io::Error>::builder().exponential(0.5).build().is_err());
        assert!(RetryPolicy::<io::Error>::builder().jitter(1.5, 0.1).build().is_err());
        assert!(RetryPolicy::<io::Error>::builder()
            .retryable(["timeout"])
            .non_retryable(["timeout"])
            .build()
            .is_err());
    }

    /// Validates `should_retry` precedence.
    ///
    /// Assertions:
    /// - Confirms non-retryable classes stop retries.
    /// - Confirms the retryable set excludes unlisted classes.
    /// - Confirms a custom predicate overrides both sets.
    #[test]
    fn test_should_retry_precedence() {
        let by_class: RetryPolicy<io::Error> =
            RetryPolicy::builder().non_retryable(["validation"]).build().expect("valid");
        assert!(by_class.should_retry(&timeout_error()));
        assert!(!by_class.should_retry(&validation_error()));

        let allow_list: RetryPolicy<io::Error> =
            RetryPolicy::builder().retryable(["connection"]).build().expect("valid");
        assert!(!allow_list.should_retry(&timeout_error()));

        let predicate: RetryPolicy<io::Error> = RetryPolicy::builder()
            .non_retryable(["validation"])
            .retry_if(|_| true)
            .build()
            .expect("valid");
        assert!(predicate.should_retry(&validation_error()));
    }

    /// Validates the blocking executor stops after `max_retries + 1`
    /// attempts and reports the last failure.
    #[test]
    fn test_execute_blocking_exhausts() {
        let failures = Arc::new(AtomicU32::new(0));
        let reported = Arc::clone(&failures);
        let policy = RetryPolicy::builder()
            .max_retries(2)
            .base_delay(Duration::from_millis(1))
            .max_delay(Duration::from_millis(1))
            .on_failure(move |_: &io::Error, attempts| reported.store(attempts, Ordering::SeqCst))
            .build()
            .expect("valid");
        let executor = RetryExecutor::new(policy);
        let calls = AtomicU32::new(0);

        let result: RetryResult<(), _> = executor.execute_blocking(|| {
            calls.fetch_add(1, Ordering::SeqCst);
            Err(timeout_error())
        });

        let err = result.unwrap_err();
        assert!(matches!(err, RetryError::Exhausted { attempts: 3, .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(failures.load(Ordering::SeqCst), 3);
        assert_eq!(err.into_inner().kind(), io::ErrorKind::TimedOut);
    }

    /// Validates non-retryable failures stop after the first attempt.
    #[test]
    fn test_execute_blocking_non_retryable() {
        let policy: RetryPolicy<io::Error> =
            RetryPolicy::builder().non_retryable(["validation"]).build().expect("valid");
        let executor = RetryExecutor::new(policy);

        let result: RetryResult<(), _> = executor.execute_blocking(|| Err(validation_error()));

        assert!(matches!(result, Err(RetryError::NonRetryable { attempts: 1, .. })));
    }

    /// Validates the async executor sleeps the computed delays and invokes
    /// `on_retry` before each sleep.
    ///
    /// Assertions:
    /// - Confirms the operation succeeds on the third attempt.
    /// - Confirms `on_retry` saw delays of 1s and 2s.
    /// - Confirms the paused clock advanced by exactly 3s.
    #[tokio::test(start_paused = true)]
    async fn test_execute_async_with_backoff() {
        let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
        let recorder = Arc::clone(&seen);
        let policy = RetryPolicy::builder()
            .max_retries(3)
            .base_delay(Duration::from_secs(1))
            .max_delay(Duration::from_secs(60))
            .exponential(2.0)
            .on_retry(move |attempt, _: &io::Error, delay| recorder.lock().push((attempt, delay)))
            .build()
            .expect("valid");
        let executor = RetryExecutor::new(policy);
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();

        let value = executor
            .execute(|| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(timeout_error())
                    } else {
                        Ok(n)
                    }
                }
            })
            .await
            .expect("third attempt succeeds");

        assert_eq!(value, 2);
        assert_eq!(
            *seen.lock(),
            vec![(1, Duration::from_secs(1)), (2, Duration::from_secs(2))]
        );
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3) && elapsed < Duration::from_secs(4));
    }
}
