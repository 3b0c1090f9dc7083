//! Scheduler error types

use std::time::Duration;

use innkeeper_domain::InnkeeperError;
use thiserror::Error;

use crate::errors::InfraError;

/// Scheduler-specific errors
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Scheduler is already running
    #[error("Scheduler '{name}' already running")]
    AlreadyRunning { name: String },

    /// Scheduler is not running
    #[error("Scheduler '{name}' not running")]
    NotRunning { name: String },

    /// Interval must be non-zero
    #[error("Scheduler '{name}' has a zero interval")]
    InvalidInterval { name: String },

    /// Operation timed out
    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Task join failed
    #[error("Task join failed: {0}")]
    TaskJoinFailed(String),
}

impl From<SchedulerError> for InfraError {
    fn from(err: SchedulerError) -> Self {
        let domain = match err {
            SchedulerError::AlreadyRunning { .. }
            | SchedulerError::NotRunning { .. }
            | SchedulerError::InvalidInterval { .. } => InnkeeperError::InvalidInput(err.to_string()),
            SchedulerError::Timeout { .. } | SchedulerError::TaskJoinFailed(_) => {
                InnkeeperError::Internal(err.to_string())
            }
        };
        InfraError(domain)
    }
}

impl From<SchedulerError> for InnkeeperError {
    fn from(err: SchedulerError) -> Self {
        InfraError::from(err).into()
    }
}

/// Convenience type alias for scheduler operations
pub type SchedulerResult<T> = Result<T, SchedulerError>;
