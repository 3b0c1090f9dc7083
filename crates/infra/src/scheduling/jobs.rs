//! Jobs driving the core services on a timer

use std::sync::Arc;

use async_trait::async_trait;
use innkeeper_core::{DegradationEngine, DependencyMonitor, RecoveryProcessor};
use innkeeper_domain::HealthStatus;
use tracing::{debug, info, warn};

use super::interval::ScheduledJob;
use crate::errors::InfraError;

/// Evaluates the degradation rules once per tick
#[derive(Debug)]
pub struct DegradationJob {
    engine: Arc<DegradationEngine>,
}

impl DegradationJob {
    pub fn new(engine: Arc<DegradationEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl ScheduledJob for DegradationJob {
    fn name(&self) -> &str {
        "degradation"
    }

    async fn run(&self) -> Result<(), InfraError> {
        match self.engine.evaluate() {
            Some(level) => info!(%level, "Degradation level changed"),
            None => debug!(level = %self.engine.current_level(), "Degradation level unchanged"),
        }
        Ok(())
    }
}

/// Runs one dependency check cycle per tick
#[derive(Debug)]
pub struct MonitoringJob {
    monitor: Arc<DependencyMonitor>,
}

impl MonitoringJob {
    pub fn new(monitor: Arc<DependencyMonitor>) -> Self {
        Self { monitor }
    }
}

#[async_trait]
impl ScheduledJob for MonitoringJob {
    fn name(&self) -> &str {
        "dependency_monitor"
    }

    async fn run(&self) -> Result<(), InfraError> {
        let health = self.monitor.run_cycle().await;
        if health.overall_status == HealthStatus::Healthy {
            debug!(elapsed_ms = health.total_check_time_ms, "Dependencies healthy");
        } else {
            warn!(
                status = %health.overall_status,
                elapsed_ms = health.total_check_time_ms,
                "Dependencies not healthy"
            );
        }
        Ok(())
    }
}

/// Drains due dead-letter messages through the recovery strategies
#[derive(Debug)]
pub struct RecoveryJob {
    processor: Arc<RecoveryProcessor>,
    batch_size: usize,
}

impl RecoveryJob {
    pub fn new(processor: Arc<RecoveryProcessor>, batch_size: usize) -> Self {
        Self { processor, batch_size }
    }
}

#[async_trait]
impl ScheduledJob for RecoveryJob {
    fn name(&self) -> &str {
        "dlq_recovery"
    }

    async fn run(&self) -> Result<(), InfraError> {
        let report = self.processor.process_pending(self.batch_size).await?;
        if report.attempted > 0 || report.deferred > 0 {
            info!(
                attempted = report.attempted,
                recovered = report.recovered,
                failed = report.failed,
                deferred = report.deferred,
                discarded = report.discarded,
                manual = report.manual,
                "Dead-letter recovery cycle"
            );
        }
        Ok(())
    }
}
