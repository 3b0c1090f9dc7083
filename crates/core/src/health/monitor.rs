//! Prioritised dependency monitoring

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use innkeeper_common::resilience::{RetryExecutor, RetryPolicy};
use innkeeper_domain::{
    DependencyPriority, DependencyState, DependencySummary, HealthCheckResult, HealthStatus,
};
use parking_lot::RwLock;
use tracing::{info, instrument, warn};

use super::aggregator::{HealthCheckAggregator, SystemHealth};
use super::ports::HealthProbe;
use super::{HealthError, HealthResult};

/// Invoked with `(dependency, old, new)` when a dependency changes status
pub type StatusChangeCallback = Arc<dyn Fn(&str, HealthStatus, HealthStatus) + Send + Sync>;

/// A dependency the service relies on
#[derive(Clone)]
pub struct DependencyDefinition {
    pub name: String,
    pub probe: Arc<dyn HealthProbe>,
    pub priority: DependencyPriority,
    /// Falls back to the aggregator default when unset
    pub timeout: Option<Duration>,
    pub required_for_startup: bool,
}

impl fmt::Debug for DependencyDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyDefinition")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .field("timeout", &self.timeout)
            .field("required_for_startup", &self.required_for_startup)
            .finish_non_exhaustive()
    }
}

/// Tracks the last known status of every registered dependency
pub struct DependencyMonitor {
    aggregator: HealthCheckAggregator,
    states: RwLock<BTreeMap<String, DependencyState>>,
    callbacks: RwLock<Vec<StatusChangeCallback>>,
    last_health: RwLock<Option<SystemHealth>>,
}

impl fmt::Debug for DependencyMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DependencyMonitor")
            .field("aggregator", &self.aggregator)
            .field("dependencies", &self.states.read().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl DependencyMonitor {
    pub fn new(aggregator: HealthCheckAggregator) -> Self {
        Self {
            aggregator,
            states: RwLock::new(BTreeMap::new()),
            callbacks: RwLock::new(Vec::new()),
            last_health: RwLock::new(None),
        }
    }

    pub fn aggregator(&self) -> &HealthCheckAggregator {
        &self.aggregator
    }

    /// Register a dependency and its probe
    pub fn register(&self, definition: DependencyDefinition) -> HealthResult<()> {
        self.aggregator.register(
            definition.name.clone(),
            Arc::clone(&definition.probe),
            definition.timeout,
        )?;

        info!(
            dependency = %definition.name,
            priority = %definition.priority,
            required = definition.required_for_startup,
            "Registered dependency"
        );
        self.states.write().insert(
            definition.name.clone(),
            DependencyState {
                name: definition.name,
                priority: definition.priority,
                required_for_startup: definition.required_for_startup,
                status: HealthStatus::Unknown,
                last_checked: None,
                last_result: None,
            },
        );
        Ok(())
    }

    pub fn on_status_change(&self, callback: StatusChangeCallback) {
        self.callbacks.write().push(callback);
    }

    /// Check every dependency once and record the results
    #[instrument(skip(self))]
    pub async fn run_cycle(&self) -> SystemHealth {
        let health = self.aggregator.check_all().await;
        for (name, result) in &health.results {
            self.record(name, result.clone());
        }
        *self.last_health.write() = Some(health.clone());
        health
    }

    /// Most recent full check
    pub fn last_health(&self) -> Option<SystemHealth> {
        self.last_health.read().clone()
    }

    pub fn states(&self) -> Vec<DependencyState> {
        self.states.read().values().cloned().collect()
    }

    /// Last known state grouped by priority
    pub fn summary(&self) -> DependencySummary {
        let states = self.states.read();
        let mut summary = DependencySummary { total: states.len(), ..DependencySummary::default() };
        for state in states.values() {
            match state.status {
                HealthStatus::Healthy => summary.healthy += 1,
                HealthStatus::Unhealthy => summary.unhealthy += 1,
                HealthStatus::Degraded | HealthStatus::Unknown => {}
            }
            summary.by_priority.entry(state.priority).or_default().push(state.clone());
        }
        summary
    }

    /// Wait until every startup-required dependency reports healthy
    ///
    /// Makes up to `attempts` passes `interval` apart and fails with the
    /// names still unhealthy after the last one.
    #[instrument(skip(self))]
    pub async fn check_startup_dependencies(
        &self,
        attempts: u32,
        interval: Duration,
    ) -> HealthResult<()> {
        let required: Vec<String> = self
            .states
            .read()
            .values()
            .filter(|s| s.required_for_startup)
            .map(|s| s.name.clone())
            .collect();
        if required.is_empty() {
            return Ok(());
        }

        let policy = RetryPolicy::<HealthError>::builder()
            .max_retries(attempts.saturating_sub(1))
            .base_delay(interval)
            .max_delay(interval)
            .fixed()
            .no_jitter()
            .on_retry(|attempt, err: &HealthError, _delay| {
                warn!(attempt, error = %err, "Startup dependencies not ready");
            })
            .build()?;
        let executor = RetryExecutor::new(policy);
        let required = &required;

        executor
            .execute(move || async move {
                let mut failing = Vec::new();
                for name in required {
                    let result = self.aggregator.check_one(name).await?;
                    let healthy = result.status == HealthStatus::Healthy;
                    self.record(name, result);
                    if !healthy {
                        failing.push(name.clone());
                    }
                }
                if failing.is_empty() {
                    Ok(())
                } else {
                    Err(HealthError::StartupFailed { failing })
                }
            })
            .await
            .map_err(|err| err.into_inner())?;

        info!(dependencies = required.len(), "Startup dependencies healthy");
        Ok(())
    }

    fn record(&self, name: &str, result: HealthCheckResult) {
        let change = {
            let mut states = self.states.write();
            let Some(state) = states.get_mut(name) else {
                return;
            };
            let previous = state.status;
            state.status = result.status;
            state.last_checked = Some(Utc::now());
            state.last_result = Some(result);
            (previous != state.status).then_some((previous, state.status))
        };

        if let Some((old, new)) = change {
            if new == HealthStatus::Healthy {
                info!(dependency = name, from = %old, to = %new, "Dependency status changed");
            } else {
                warn!(dependency = name, from = %old, to = %new, "Dependency status changed");
            }
            let callbacks = self.callbacks.read().clone();
            for callback in callbacks {
                callback(name, old, new);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;

    /// Reports the status stored in the atomic (0 healthy, 1 degraded, 2 unhealthy)
    struct SwitchProbe(Arc<AtomicU8>);

    #[async_trait]
    impl HealthProbe for SwitchProbe {
        async fn check(&self) -> HealthCheckResult {
            match self.0.load(Ordering::SeqCst) {
                0 => HealthCheckResult::healthy("ok"),
                1 => HealthCheckResult::degraded("slow"),
                _ => HealthCheckResult::unhealthy("down", "connection refused"),
            }
        }
    }

    fn definition(
        name: &str,
        switch: &Arc<AtomicU8>,
        priority: DependencyPriority,
        required: bool,
    ) -> DependencyDefinition {
        DependencyDefinition {
            name: name.to_string(),
            probe: Arc::new(SwitchProbe(Arc::clone(switch))),
            priority,
            timeout: None,
            required_for_startup: required,
        }
    }

    /// Validates change callbacks fire only on transitions.
    ///
    /// Assertions:
    /// - Confirms the first observation (unknown to healthy) fires once.
    /// - Confirms an unchanged status fires nothing.
    /// - Confirms healthy to unhealthy fires with both statuses.
    #[tokio::test]
    async fn test_run_cycle_reports_transitions() {
        let monitor = DependencyMonitor::new(HealthCheckAggregator::default());
        let switch = Arc::new(AtomicU8::new(0));
        monitor
            .register(definition("database", &switch, DependencyPriority::Critical, true))
            .unwrap();

        let changes = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&changes);
        monitor.on_status_change(Arc::new(move |name: &str, old, new| {
            sink.lock().push((name.to_string(), old, new));
        }));

        monitor.run_cycle().await;
        monitor.run_cycle().await;
        switch.store(2, Ordering::SeqCst);
        let health = monitor.run_cycle().await;

        assert_eq!(health.overall_status, HealthStatus::Unhealthy);
        let changes = changes.lock();
        assert_eq!(changes.len(), 2);
        assert_eq!(changes[0], ("database".into(), HealthStatus::Unknown, HealthStatus::Healthy));
        assert_eq!(changes[1], ("database".into(), HealthStatus::Healthy, HealthStatus::Unhealthy));
        assert!(monitor.last_health().is_some());
    }

    #[tokio::test]
    async fn test_summary_groups_by_priority() {
        let monitor = DependencyMonitor::new(HealthCheckAggregator::default());
        let up = Arc::new(AtomicU8::new(0));
        let down = Arc::new(AtomicU8::new(2));
        monitor.register(definition("database", &up, DependencyPriority::Critical, true)).unwrap();
        monitor.register(definition("ai", &down, DependencyPriority::Optional, false)).unwrap();
        monitor.register(definition("cache", &up, DependencyPriority::Optional, false)).unwrap();
        monitor.run_cycle().await;

        let summary = monitor.summary();
        assert_eq!(summary.total, 3);
        assert_eq!(summary.healthy, 2);
        assert_eq!(summary.unhealthy, 1);
        assert_eq!(summary.by_priority[&DependencyPriority::Critical].len(), 1);
        assert_eq!(summary.by_priority[&DependencyPriority::Optional].len(), 2);
    }

    /// Validates startup gating waits for recovery and reports the failing
    /// dependencies when attempts run out.
    #[tokio::test(start_paused = true)]
    async fn test_startup_dependencies() {
        let monitor = Arc::new(DependencyMonitor::new(HealthCheckAggregator::default()));
        let db = Arc::new(AtomicU8::new(2));
        let ai = Arc::new(AtomicU8::new(2));
        monitor.register(definition("database", &db, DependencyPriority::Critical, true)).unwrap();
        monitor.register(definition("ai", &ai, DependencyPriority::Optional, false)).unwrap();

        let err = monitor
            .check_startup_dependencies(3, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert_eq!(err, HealthError::StartupFailed { failing: vec!["database".into()] });

        let checks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&checks);
        let db_switch = Arc::clone(&db);
        monitor.on_status_change(Arc::new(move |_name: &str, _old, _new| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));

        let waiter = {
            let monitor = Arc::clone(&monitor);
            tokio::spawn(async move {
                monitor.check_startup_dependencies(10, Duration::from_secs(1)).await
            })
        };
        tokio::time::sleep(Duration::from_millis(2500)).await;
        db_switch.store(0, Ordering::SeqCst);

        assert!(waiter.await.unwrap().is_ok());
        assert_eq!(checks.load(Ordering::SeqCst), 1);
    }
}
