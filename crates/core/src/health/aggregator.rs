//! Concurrent health checks folded into one verdict

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use futures::future::join_all;
use innkeeper_common::resilience::{CircuitBreakerRegistry, CircuitBreakerSnapshot, CircuitState};
use innkeeper_domain::{
    HealthCheckResult, HealthStatus, MAX_OPEN_BREAKERS_BEFORE_UNHEALTHY,
    MAX_UNKNOWN_BEFORE_DEGRADED,
};
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, instrument, warn};

use super::ports::HealthProbe;
use super::{HealthError, HealthResult};

const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of one full health check
#[derive(Debug, Clone, Serialize)]
pub struct SystemHealth {
    pub overall_status: HealthStatus,
    pub results: BTreeMap<String, HealthCheckResult>,
    pub circuit_breakers: Vec<CircuitBreakerSnapshot>,
    pub total_check_time_ms: u64,
    pub checked_at: DateTime<Utc>,
}

/// Fold probe results and the number of open breakers into one status
///
/// Unhealthy when any probe is unhealthy or more than two breakers are open.
/// Degraded when any probe is degraded, any breaker is open, or more than one
/// probe is unknown.
pub fn overall_status<'a>(
    results: impl IntoIterator<Item = &'a HealthCheckResult>,
    open_breakers: usize,
) -> HealthStatus {
    let (mut unhealthy, mut degraded, mut unknown) = (false, false, 0usize);
    for result in results {
        match result.status {
            HealthStatus::Unhealthy => unhealthy = true,
            HealthStatus::Degraded => degraded = true,
            HealthStatus::Unknown => unknown += 1,
            HealthStatus::Healthy => {}
        }
    }

    if unhealthy || open_breakers > MAX_OPEN_BREAKERS_BEFORE_UNHEALTHY {
        HealthStatus::Unhealthy
    } else if degraded || open_breakers > 0 || unknown > MAX_UNKNOWN_BEFORE_DEGRADED {
        HealthStatus::Degraded
    } else {
        HealthStatus::Healthy
    }
}

#[derive(Clone)]
struct RegisteredProbe {
    name: String,
    probe: Arc<dyn HealthProbe>,
    timeout: Duration,
}

/// Runs registered probes and combines them with circuit breaker state
pub struct HealthCheckAggregator {
    probes: RwLock<Vec<RegisteredProbe>>,
    registry: Option<Arc<CircuitBreakerRegistry>>,
    default_timeout: Duration,
}

impl std::fmt::Debug for HealthCheckAggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HealthCheckAggregator")
            .field("probes", &self.probe_names())
            .field("default_timeout", &self.default_timeout)
            .finish_non_exhaustive()
    }
}

impl Default for HealthCheckAggregator {
    fn default() -> Self {
        Self { probes: RwLock::new(Vec::new()), registry: None, default_timeout: DEFAULT_PROBE_TIMEOUT }
    }
}

impl HealthCheckAggregator {
    pub fn new(default_timeout: Duration) -> Self {
        Self { default_timeout, ..Self::default() }
    }

    /// Include breaker state from `registry` in the verdict
    pub fn with_registry(mut self, registry: Arc<CircuitBreakerRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register a probe; `timeout` overrides the default per-probe timeout
    pub fn register(
        &self,
        name: impl Into<String>,
        probe: Arc<dyn HealthProbe>,
        timeout: Option<Duration>,
    ) -> HealthResult<()> {
        let name = name.into();
        let mut probes = self.probes.write();
        if probes.iter().any(|p| p.name == name) {
            return Err(HealthError::DuplicateProbe { name });
        }
        probes.push(RegisteredProbe {
            name,
            probe,
            timeout: timeout.unwrap_or(self.default_timeout),
        });
        Ok(())
    }

    pub fn probe_names(&self) -> Vec<String> {
        self.probes.read().iter().map(|p| p.name.clone()).collect()
    }

    /// Run every probe concurrently and fold the results
    #[instrument(skip(self))]
    pub async fn check_all(&self) -> SystemHealth {
        let started = Instant::now();
        let probes = self.probes.read().clone();

        let results = join_all(probes.into_iter().map(|p| async move {
            let result = run_probe(&p).await;
            (p.name, result)
        }))
        .await;
        let results: BTreeMap<String, HealthCheckResult> = results.into_iter().collect();

        let circuit_breakers = self.registry.as_ref().map(|r| r.snapshots()).unwrap_or_default();
        let open = circuit_breakers.iter().filter(|s| s.state == CircuitState::Open).count();
        let overall = overall_status(results.values(), open);

        debug!(status = %overall, probes = results.len(), open_breakers = open, "Health check complete");

        SystemHealth {
            overall_status: overall,
            results,
            circuit_breakers,
            total_check_time_ms: started.elapsed().as_millis() as u64,
            checked_at: Utc::now(),
        }
    }

    /// Run a single probe by name
    pub async fn check_one(&self, name: &str) -> HealthResult<HealthCheckResult> {
        let probe = self
            .probes
            .read()
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| HealthError::UnknownProbe { name: name.to_string() })?;
        Ok(run_probe(&probe).await)
    }
}

/// Run one probe in its own task so a panic or hang cannot affect the others
async fn run_probe(registered: &RegisteredProbe) -> HealthCheckResult {
    let started = Instant::now();
    let probe = Arc::clone(&registered.probe);
    let timeout = registered.timeout;

    let handle = tokio::spawn(async move { tokio::time::timeout(timeout, probe.check()).await });
    let elapsed_ms = || started.elapsed().as_millis() as u64;

    match handle.await {
        Ok(Ok(result)) if result.response_time_ms == 0 => result.with_response_time(elapsed_ms()),
        Ok(Ok(result)) => result,
        Ok(Err(_)) => {
            warn!(probe = %registered.name, ?timeout, "Health probe timed out");
            HealthCheckResult::unhealthy("health check timed out", format!("no response within {timeout:?}"))
                .with_response_time(elapsed_ms())
        }
        Err(err) => {
            warn!(probe = %registered.name, error = %err, "Health probe task failed");
            HealthCheckResult::unhealthy("health check failed", err.to_string())
                .with_response_time(elapsed_ms())
        }
    }
}
