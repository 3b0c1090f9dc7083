//! Periodic dependency monitoring

use std::sync::Arc;
use std::time::Duration;

use innkeeper_core::DependencyMonitor;
use tracing::{info, instrument};

use super::error::{SchedulerError, SchedulerResult};
use super::interval::{IntervalScheduler, IntervalSchedulerConfig};
use super::jobs::MonitoringJob;

/// Owns the background loop that keeps [`DependencyMonitor`] state fresh
#[derive(Debug)]
pub struct MonitoringScheduler {
    monitor: Arc<DependencyMonitor>,
    job_timeout: Duration,
    scheduler: Option<IntervalScheduler>,
}

impl MonitoringScheduler {
    pub fn new(monitor: Arc<DependencyMonitor>) -> Self {
        Self { monitor, job_timeout: IntervalSchedulerConfig::default().job_timeout, scheduler: None }
    }

    /// Upper bound on one full check cycle
    pub fn with_job_timeout(mut self, job_timeout: Duration) -> Self {
        self.job_timeout = job_timeout;
        self
    }

    /// Start checking every dependency each `interval`, beginning now
    ///
    /// # Errors
    ///
    /// Returns error if monitoring is already running or `interval` is zero
    #[instrument(skip(self))]
    pub fn start_monitoring(&mut self, interval: Duration) -> SchedulerResult<()> {
        if self.is_monitoring() {
            return Err(SchedulerError::AlreadyRunning { name: "dependency_monitor".to_string() });
        }

        let config = IntervalSchedulerConfig {
            interval,
            job_timeout: self.job_timeout,
            ..IntervalSchedulerConfig::default()
        };
        let mut scheduler = IntervalScheduler::with_config(
            Arc::new(MonitoringJob::new(Arc::clone(&self.monitor))),
            config,
        );
        scheduler.start()?;
        self.scheduler = Some(scheduler);
        info!(?interval, "Dependency monitoring started");
        Ok(())
    }

    /// Stop the loop; calling it when nothing runs is a no-op
    #[instrument(skip(self))]
    pub async fn stop_monitoring(&mut self) -> SchedulerResult<()> {
        let Some(mut scheduler) = self.scheduler.take() else {
            return Ok(());
        };
        match scheduler.stop().await {
            Ok(()) | Err(SchedulerError::NotRunning { .. }) => {
                info!("Dependency monitoring stopped");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }

    pub fn is_monitoring(&self) -> bool {
        self.scheduler.as_ref().is_some_and(IntervalScheduler::is_running)
    }
}
