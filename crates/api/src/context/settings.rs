//! Translation from configuration sections to resilience primitives

use std::time::Duration;

use innkeeper_common::resilience::{BackoffStrategy, CircuitBreakerConfig, RetryPolicy};
use innkeeper_domain::{
    BackoffKind, CircuitBreakerSettings, InnkeeperError, Result, RetrySettings,
};

/// Registry defaults for lazily created breakers
pub fn breaker_config(settings: &CircuitBreakerSettings) -> Result<CircuitBreakerConfig> {
    CircuitBreakerConfig::builder()
        .failure_threshold(settings.failure_threshold)
        .recovery_timeout(settings.recovery_timeout())
        .success_threshold(settings.success_threshold)
        .call_timeout(settings.call_timeout())
        .window_size(settings.window_size)
        .minimum_requests(settings.minimum_requests)
        .build()
        .map_err(|e| InnkeeperError::Config(format!("circuit_breaker: {e}")))
}

/// Retry policy described by the `retry` section
pub fn retry_policy<E>(settings: &RetrySettings) -> Result<RetryPolicy<E>> {
    let strategy = match settings.strategy {
        BackoffKind::Exponential => BackoffStrategy::Exponential { base: settings.exponential_base },
        BackoffKind::Linear => BackoffStrategy::Linear,
        BackoffKind::Fixed => BackoffStrategy::Fixed,
        BackoffKind::Fibonacci => BackoffStrategy::Fibonacci,
    };

    let builder = RetryPolicy::<E>::builder()
        .max_retries(settings.max_retries)
        .base_delay(Duration::from_millis(settings.base_delay_ms))
        .max_delay(Duration::from_millis(settings.max_delay_ms))
        .strategy(strategy);
    let builder = match settings.jitter {
        Some((min, max)) => builder.jitter(min, max),
        None => builder.no_jitter(),
    };

    builder.build().map_err(|e| InnkeeperError::Config(format!("retry: {e}")))
}
