//! Dependency health checks
//!
//! The [`HealthCheckAggregator`] runs probes concurrently and folds their
//! results and circuit breaker states into one [`SystemHealth`] verdict.
//! The [`DependencyMonitor`] adds priorities, startup gating and change
//! notifications on top.

pub mod aggregator;
pub mod monitor;
pub mod ports;

use innkeeper_common::resilience::{ConfigError, ErrorClass};
use thiserror::Error;

pub use aggregator::{overall_status, HealthCheckAggregator, SystemHealth};
pub use monitor::{DependencyDefinition, DependencyMonitor, StatusChangeCallback};
pub use ports::HealthProbe;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HealthError {
    #[error("No health probe registered as '{name}'")]
    UnknownProbe { name: String },

    #[error("Health probe '{name}' is already registered")]
    DuplicateProbe { name: String },

    #[error("Startup dependencies not healthy: {}", failing.join(", "))]
    StartupFailed { failing: Vec<String> },

    #[error("Invalid health configuration: {message}")]
    InvalidConfiguration { message: String },
}

pub type HealthResult<T> = Result<T, HealthError>;

impl ErrorClass for HealthError {
    fn error_class(&self) -> &str {
        match self {
            Self::StartupFailed { .. } => "unavailable",
            Self::UnknownProbe { .. } | Self::DuplicateProbe { .. } => "validation",
            Self::InvalidConfiguration { .. } => "configuration",
        }
    }
}

impl From<ConfigError> for HealthError {
    fn from(err: ConfigError) -> Self {
        Self::InvalidConfiguration { message: err.to_string() }
    }
}
