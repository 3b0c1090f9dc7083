//! Application context - dependency injection container

pub mod settings;

use std::sync::Arc;

use innkeeper_common::resilience::{CircuitBreakerRegistry, RetryPolicy};
use innkeeper_core::degradation::rules::default_rules;
use innkeeper_core::{
    DeadLetterQueue, DegradationEngine, DependencyMonitor, FallbackProvider,
    HealthCheckAggregator, KeyValueStore, RecoveryProcessor,
};
use innkeeper_domain::{InnkeeperConfig, InnkeeperError, Result};
use innkeeper_infra::probes::dependency_from_config;
use innkeeper_infra::scheduling::{DegradationJob, RecoveryJob};
use innkeeper_infra::{
    FileKeyValueStore, IntervalScheduler, MemoryKeyValueStore, MonitoringScheduler,
    SysinfoMemoryGauge,
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};

/// Background loops owned by the context
struct Schedulers {
    degradation: IntervalScheduler,
    recovery: IntervalScheduler,
    monitoring: MonitoringScheduler,
}

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: InnkeeperConfig,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub degradation: Arc<DegradationEngine>,
    pub fallback: Arc<FallbackProvider>,
    pub dlq: Arc<DeadLetterQueue>,
    pub recovery: Arc<RecoveryProcessor>,
    pub monitor: Arc<DependencyMonitor>,

    schedulers: Mutex<Schedulers>,
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("bind_address", &self.config.server.bind_address)
            .field("breakers", &self.breakers.names())
            .field("degradation", &self.degradation.current_level())
            .finish_non_exhaustive()
    }
}

impl AppContext {
    /// Build every service from `config`
    ///
    /// Background loops are constructed but not started; call
    /// [`AppContext::start_background`] once the process is ready.
    pub async fn new(config: InnkeeperConfig) -> Result<Self> {
        config.validate()?;

        let breakers = Arc::new(
            CircuitBreakerRegistry::new(settings::breaker_config(&config.circuit_breaker)?)
                .map_err(|e| InnkeeperError::Config(e.to_string()))?,
        );

        let degradation = Arc::new(DegradationEngine::new(config.degradation.history_size));
        let rules = default_rules(
            &breakers,
            Arc::new(SysinfoMemoryGauge::new()),
            config.degradation.critical_breakers.clone(),
            config.degradation.memory_threshold_percent,
            config.degradation.rule_cooldown(),
        )
        .map_err(|e| InnkeeperError::Config(e.to_string()))?;
        for rule in rules {
            degradation.register_rule(rule).map_err(|e| InnkeeperError::Config(e.to_string()))?;
        }

        let store = open_store(&config).await?;
        let dlq = Arc::new(
            DeadLetterQueue::new(store)
                .with_default_max_retries(config.dlq.default_max_retries)
                .with_concurrency(config.dlq.concurrency),
        );
        dlq.on_permanent_failure(Arc::new(|message| {
            error!(
                id = %message.id,
                message_type = message.message_type().unwrap_or("unknown"),
                retries = message.retry_count,
                "Dead-letter message exhausted its retries"
            );
        }));

        let fallback =
            Arc::new(FallbackProvider::new(Arc::clone(&degradation)).with_sink(dlq.clone()));
        let recovery = Arc::new(
            RecoveryProcessor::new(Arc::clone(&dlq)).with_degradation(Arc::clone(&degradation)),
        );

        let probe_timeout = config.monitor.probe_timeout();
        let aggregator =
            HealthCheckAggregator::new(probe_timeout).with_registry(Arc::clone(&breakers));
        let monitor = Arc::new(DependencyMonitor::new(aggregator));
        for dependency in &config.dependencies {
            monitor
                .register(dependency_from_config(dependency, probe_timeout)?)
                .map_err(|e| InnkeeperError::Config(e.to_string()))?;
        }

        let schedulers = Schedulers {
            degradation: IntervalScheduler::new(
                Arc::new(DegradationJob::new(Arc::clone(&degradation))),
                config.degradation.evaluation_interval(),
            ),
            recovery: IntervalScheduler::new(
                Arc::new(RecoveryJob::new(Arc::clone(&recovery), config.dlq.batch_size)),
                config.dlq.recovery_interval(),
            ),
            monitoring: MonitoringScheduler::new(Arc::clone(&monitor)),
        };

        info!(
            dependencies = config.dependencies.len(),
            critical_breakers = ?config.degradation.critical_breakers,
            persistent_dlq = config.dlq.store_path.is_some(),
            "Application context initialised"
        );

        Ok(Self {
            config,
            breakers,
            degradation,
            fallback,
            dlq,
            recovery,
            monitor,
            schedulers: Mutex::new(schedulers),
        })
    }

    /// Retry policy built from the `retry` section
    pub fn retry_policy<E>(&self) -> Result<RetryPolicy<E>> {
        settings::retry_policy(&self.config.retry)
    }

    /// Block until startup-required dependencies are healthy
    ///
    /// Does nothing when `monitor.startup_checks` is disabled.
    pub async fn run_startup_checks(&self) -> Result<()> {
        let monitor = &self.config.monitor;
        if !monitor.startup_checks {
            info!("Startup dependency checks disabled");
            return Ok(());
        }

        self.monitor
            .check_startup_dependencies(monitor.startup_attempts, monitor.startup_interval())
            .await
            .map_err(|e| InnkeeperError::Unavailable(e.to_string()))
    }

    /// Start the degradation, recovery and monitoring loops
    pub async fn start_background(&self) -> Result<()> {
        let mut schedulers = self.schedulers.lock().await;
        schedulers.degradation.start()?;
        schedulers.recovery.start()?;
        schedulers.monitoring.start_monitoring(self.config.monitor.interval())?;
        info!("Background schedulers started");
        Ok(())
    }

    pub async fn is_background_running(&self) -> bool {
        let schedulers = self.schedulers.lock().await;
        schedulers.degradation.is_running()
            && schedulers.recovery.is_running()
            && schedulers.monitoring.is_monitoring()
    }

    /// Stop every background loop, logging anything that fails to stop
    pub async fn shutdown(&self) {
        let mut schedulers = self.schedulers.lock().await;
        if schedulers.degradation.is_running() {
            if let Err(err) = schedulers.degradation.stop().await {
                warn!(error = %err, "Failed to stop degradation scheduler");
            }
        }
        if schedulers.recovery.is_running() {
            if let Err(err) = schedulers.recovery.stop().await {
                warn!(error = %err, "Failed to stop recovery scheduler");
            }
        }
        if let Err(err) = schedulers.monitoring.stop_monitoring().await {
            warn!(error = %err, "Failed to stop monitoring scheduler");
        }
        info!("Background schedulers stopped");
    }
}

async fn open_store(config: &InnkeeperConfig) -> Result<Arc<dyn KeyValueStore>> {
    match config.dlq.store_path.as_deref() {
        Some(path) => {
            let store = FileKeyValueStore::open(path).await?;
            info!(path = %store.path().display(), "Using file-backed dead-letter store");
            Ok(Arc::new(store))
        }
        None => {
            warn!("No dlq.store_path configured; dead letters will not survive a restart");
            Ok(Arc::new(MemoryKeyValueStore::new()))
        }
    }
}
