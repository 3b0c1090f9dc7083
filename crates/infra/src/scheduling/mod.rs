//! Scheduling infrastructure for background loops
//!
//! Every periodic task in the service is an [`IntervalScheduler`] running a
//! [`ScheduledJob`]:
//! - Degradation rule evaluation ([`DegradationJob`])
//! - Dependency health monitoring ([`MonitoringJob`], wrapped by
//!   [`MonitoringScheduler`])
//! - Dead-letter recovery ([`RecoveryJob`])
//!
//! All schedulers follow the same runtime rules:
//! - Explicit lifecycle management (start/stop)
//! - Join handles for spawned tasks
//! - Cancellation token support
//! - Timeout wrapping on every run and on join

pub mod error;
pub mod interval;
pub mod jobs;
pub mod monitoring;

pub use error::{SchedulerError, SchedulerResult};
pub use interval::{IntervalScheduler, IntervalSchedulerConfig, ScheduledJob, SchedulerStats};
pub use jobs::{DegradationJob, MonitoringJob, RecoveryJob};
pub use monitoring::MonitoringScheduler;
