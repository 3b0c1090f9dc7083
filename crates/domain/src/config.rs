//! Configuration structures
//!
//! Every field has a default so partial TOML/JSON files and environment
//! overrides compose. Durations are stored as integer seconds or
//! milliseconds (the unit is part of the field name) and exposed as
//! [`Duration`] through accessor methods.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_DEGRADATION_HISTORY, DEFAULT_DLQ_BATCH_SIZE, DEFAULT_DLQ_CONCURRENCY,
    DEFAULT_DLQ_MAX_RETRIES,
};
use crate::errors::{InnkeeperError, Result};
use crate::impl_domain_status_conversions;
use crate::types::DependencyPriority;

/// Root configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InnkeeperConfig {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub circuit_breaker: CircuitBreakerSettings,
    pub retry: RetrySettings,
    pub degradation: DegradationSettings,
    pub dlq: DlqSettings,
    pub monitor: MonitorSettings,
    pub dependencies: Vec<DependencyConfig>,
}

impl InnkeeperConfig {
    /// Check cross-field constraints that serde defaults cannot express
    pub fn validate(&self) -> Result<()> {
        let cb = &self.circuit_breaker;
        if cb.failure_threshold == 0 || cb.success_threshold == 0 || cb.window_size == 0 {
            return Err(InnkeeperError::Config(
                "circuit_breaker thresholds and window_size must be greater than 0".into(),
            ));
        }
        if self.retry.base_delay_ms > self.retry.max_delay_ms {
            return Err(InnkeeperError::Config(
                "retry.base_delay_ms cannot exceed retry.max_delay_ms".into(),
            ));
        }
        if !(0.0..=100.0).contains(&self.degradation.memory_threshold_percent) {
            return Err(InnkeeperError::Config(
                "degradation.memory_threshold_percent must be within 0..=100".into(),
            ));
        }
        if self.dlq.concurrency == 0 || self.dlq.batch_size == 0 {
            return Err(InnkeeperError::Config(
                "dlq.concurrency and dlq.batch_size must be greater than 0".into(),
            ));
        }
        if self.degradation.evaluation_interval_secs == 0
            || self.dlq.recovery_interval_secs == 0
            || self.monitor.interval_secs == 0
        {
            return Err(InnkeeperError::Config("scheduler intervals must be greater than 0".into()));
        }

        let mut names = std::collections::HashSet::new();
        for dependency in &self.dependencies {
            if !names.insert(dependency.name.as_str()) {
                return Err(InnkeeperError::Config(format!(
                    "duplicate dependency name '{}'",
                    dependency.name
                )));
            }
            if dependency.target.trim().is_empty() {
                return Err(InnkeeperError::Config(format!(
                    "dependency '{}' has an empty target",
                    dependency.name
                )));
            }
        }

        Ok(())
    }
}

/* -------------------------------------------------------------------------- */
/* Server & Logging */
/* -------------------------------------------------------------------------- */

/// Administrator HTTP server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_address: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1:8080".to_string() }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl_domain_status_conversions!(LogFormat {
    Pretty => "pretty",
    Json => "json",
});

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Pretty }
    }
}

/* -------------------------------------------------------------------------- */
/* Resilience */
/* -------------------------------------------------------------------------- */

/// Registry defaults for lazily created circuit breakers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CircuitBreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
    pub success_threshold: u32,
    pub call_timeout_ms: u64,
    pub window_size: usize,
    pub minimum_requests: usize,
}

impl Default for CircuitBreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            recovery_timeout_secs: 60,
            success_threshold: 3,
            call_timeout_ms: 30_000,
            window_size: 10,
            minimum_requests: 5,
        }
    }
}

impl CircuitBreakerSettings {
    pub fn recovery_timeout(&self) -> Duration {
        Duration::from_secs(self.recovery_timeout_secs)
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }
}

/// Backoff strategy name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffKind {
    #[default]
    Exponential,
    Linear,
    Fixed,
    Fibonacci,
}

impl_domain_status_conversions!(BackoffKind {
    Exponential => "exponential",
    Linear => "linear",
    Fixed => "fixed",
    Fibonacci => "fibonacci",
});

/// Default retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub strategy: BackoffKind,
    pub exponential_base: f64,
    /// Jitter range `(min, max)`; `None` disables jitter
    pub jitter: Option<(f64, f64)>,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            strategy: BackoffKind::Exponential,
            exponential_base: 2.0,
            jitter: Some((0.1, 0.1)),
        }
    }
}

impl RetrySettings {
    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }
}

/* -------------------------------------------------------------------------- */
/* Degradation, DLQ, Monitoring */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DegradationSettings {
    pub evaluation_interval_secs: u64,
    pub memory_threshold_percent: f64,
    pub history_size: usize,
    /// Breakers whose opening alone marks the system severely degraded
    pub critical_breakers: Vec<String>,
    pub rule_cooldown_secs: u64,
}

impl Default for DegradationSettings {
    fn default() -> Self {
        Self {
            evaluation_interval_secs: 30,
            memory_threshold_percent: 90.0,
            history_size: DEFAULT_DEGRADATION_HISTORY,
            critical_breakers: vec!["database".to_string()],
            rule_cooldown_secs: 15,
        }
    }
}

impl DegradationSettings {
    pub fn evaluation_interval(&self) -> Duration {
        Duration::from_secs(self.evaluation_interval_secs)
    }

    pub fn rule_cooldown(&self) -> Duration {
        Duration::from_secs(self.rule_cooldown_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DlqSettings {
    /// JSON file backing the store; in-memory when unset
    pub store_path: Option<String>,
    pub default_max_retries: u32,
    pub batch_size: usize,
    pub concurrency: usize,
    pub recovery_interval_secs: u64,
}

impl Default for DlqSettings {
    fn default() -> Self {
        Self {
            store_path: None,
            default_max_retries: DEFAULT_DLQ_MAX_RETRIES,
            batch_size: DEFAULT_DLQ_BATCH_SIZE,
            concurrency: DEFAULT_DLQ_CONCURRENCY,
            recovery_interval_secs: 60,
        }
    }
}

impl DlqSettings {
    pub fn recovery_interval(&self) -> Duration {
        Duration::from_secs(self.recovery_interval_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorSettings {
    pub interval_secs: u64,
    pub probe_timeout_ms: u64,
    /// Gate startup on dependencies marked `required_for_startup`
    pub startup_checks: bool,
    pub startup_attempts: u32,
    pub startup_interval_ms: u64,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            interval_secs: 30,
            probe_timeout_ms: 5_000,
            startup_checks: true,
            startup_attempts: 10,
            startup_interval_ms: 2_000,
        }
    }
}

impl MonitorSettings {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn startup_interval(&self) -> Duration {
        Duration::from_millis(self.startup_interval_ms)
    }
}

/// Built-in probe kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeKind {
    /// Open a TCP connection to `host:port`
    Tcp,
    /// `GET` a URL and expect a success status
    Http,
}

impl_domain_status_conversions!(ProbeKind {
    Tcp => "tcp",
    Http => "http",
});

/// One monitored dependency
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyConfig {
    pub name: String,
    pub kind: ProbeKind,
    /// `host:port` for TCP, a URL for HTTP
    pub target: String,
    #[serde(default = "default_priority")]
    pub priority: DependencyPriority,
    /// Overrides `monitor.probe_timeout_ms`
    #[serde(default)]
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub required_for_startup: bool,
}

fn default_priority() -> DependencyPriority {
    DependencyPriority::Important
}
