//! Fixed-interval background loop
//!
//! Runs one [`ScheduledJob`] every `interval` until stopped. Each tick awaits
//! the job before the next tick is taken, so runs of the same job never
//! overlap; ticks missed while a slow run is in flight are delayed rather
//! than bunched up. Job errors, timeouts and panics are logged and counted,
//! never propagated, and the loop keeps going.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use async_trait::async_trait;
//! use innkeeper_infra::errors::InfraError;
//! use innkeeper_infra::scheduling::{IntervalScheduler, ScheduledJob, SchedulerResult};
//!
//! struct NoopJob;
//!
//! #[async_trait]
//! impl ScheduledJob for NoopJob {
//!     fn name(&self) -> &str {
//!         "noop"
//!     }
//!
//!     async fn run(&self) -> Result<(), InfraError> {
//!         Ok(())
//!     }
//! }
//!
//! # async fn example() -> SchedulerResult<()> {
//! let mut scheduler = IntervalScheduler::new(Arc::new(NoopJob), Duration::from_secs(30));
//! scheduler.start()?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::errors::InfraError;
use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Work executed on every tick
#[async_trait]
pub trait ScheduledJob: Send + Sync {
    /// Name used in logs and errors
    fn name(&self) -> &str;

    /// Execute one run
    async fn run(&self) -> Result<(), InfraError>;
}

/// Configuration for an interval scheduler
#[derive(Debug, Clone)]
pub struct IntervalSchedulerConfig {
    /// Time between the starts of consecutive ticks
    pub interval: Duration,
    /// Upper bound on a single run
    pub job_timeout: Duration,
    /// Timeout for awaiting the loop task on stop
    pub join_timeout: Duration,
    /// Run once as soon as the scheduler starts
    pub run_immediately: bool,
}

impl Default for IntervalSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(30),
            job_timeout: Duration::from_secs(300),
            join_timeout: Duration::from_secs(5),
            run_immediately: true,
        }
    }
}

/// Run counters shared with the loop task
#[derive(Debug, Default)]
pub struct SchedulerStats {
    runs: AtomicU64,
    failures: AtomicU64,
}

impl SchedulerStats {
    /// Completed runs, successful or not
    pub fn runs(&self) -> u64 {
        self.runs.load(Ordering::Relaxed)
    }

    /// Runs that returned an error, timed out or panicked
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

/// Interval scheduler with explicit lifecycle management
pub struct IntervalScheduler {
    job: Arc<dyn ScheduledJob>,
    config: IntervalSchedulerConfig,
    cancellation: CancellationToken,
    handle: Option<JoinHandle<()>>,
    stats: Arc<SchedulerStats>,
}

impl std::fmt::Debug for IntervalScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntervalScheduler")
            .field("job", &self.job.name())
            .field("config", &self.config)
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl IntervalScheduler {
    /// Create a scheduler with the default configuration
    pub fn new(job: Arc<dyn ScheduledJob>, interval: Duration) -> Self {
        Self::with_config(job, IntervalSchedulerConfig { interval, ..Default::default() })
    }

    pub fn with_config(job: Arc<dyn ScheduledJob>, config: IntervalSchedulerConfig) -> Self {
        Self {
            job,
            config,
            cancellation: CancellationToken::new(),
            handle: None,
            stats: Arc::new(SchedulerStats::default()),
        }
    }

    pub fn name(&self) -> &str {
        self.job.name()
    }

    pub fn stats(&self) -> Arc<SchedulerStats> {
        Arc::clone(&self.stats)
    }

    /// Spawn the loop task
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the scheduler is already running or the interval is
    /// zero
    #[instrument(skip(self), fields(job = %self.job.name()))]
    pub fn start(&mut self) -> SchedulerResult<()> {
        if self.config.interval.is_zero() {
            return Err(SchedulerError::InvalidInterval { name: self.name().to_string() });
        }
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning { name: self.name().to_string() });
        }

        // Fresh token so a stopped scheduler can be restarted
        self.cancellation = CancellationToken::new();

        let job = Arc::clone(&self.job);
        let config = self.config.clone();
        let cancel = self.cancellation.clone();
        let stats = Arc::clone(&self.stats);
        self.handle = Some(tokio::spawn(async move {
            Self::run_loop(job, config, cancel, stats).await;
        }));

        info!(interval = ?self.config.interval, "Scheduler started");
        Ok(())
    }

    /// Cancel the loop and wait for it to finish
    ///
    /// A run in flight is abandoned at its next await point.
    ///
    /// # Errors
    ///
    /// Returns error if the scheduler is not running or the loop task does
    /// not finish within the join timeout
    #[instrument(skip(self), fields(job = %self.job.name()))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            self.handle = None;
            return Err(SchedulerError::NotRunning { name: self.name().to_string() });
        }

        self.cancellation.cancel();

        if let Some(handle) = self.handle.take() {
            let join_timeout = self.config.join_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { duration: join_timeout })?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        info!(runs = self.stats.runs(), failures = self.stats.failures(), "Scheduler stopped");
        Ok(())
    }

    /// A scheduler is running while its loop task has not finished
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    async fn run_loop(
        job: Arc<dyn ScheduledJob>,
        config: IntervalSchedulerConfig,
        cancel: CancellationToken,
        stats: Arc<SchedulerStats>,
    ) {
        let mut ticker = tokio::time::interval(config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        if !config.run_immediately {
            // The first tick completes immediately
            ticker.tick().await;
        }

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            let started = Instant::now();
            let run = AssertUnwindSafe(tokio::time::timeout(config.job_timeout, job.run()))
                .catch_unwind();

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => break,
                outcome = run => outcome,
            };

            stats.runs.fetch_add(1, Ordering::Relaxed);
            let elapsed_ms = started.elapsed().as_millis() as u64;
            match outcome {
                Ok(Ok(Ok(()))) => debug!(job = job.name(), elapsed_ms, "Scheduled run complete"),
                Ok(Ok(Err(err))) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    error!(job = job.name(), error = %err, "Scheduled run failed");
                }
                Ok(Err(_)) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(job = job.name(), timeout = ?config.job_timeout, "Scheduled run timed out");
                }
                Err(_) => {
                    stats.failures.fetch_add(1, Ordering::Relaxed);
                    error!(job = job.name(), "Scheduled run panicked");
                }
            }
        }

        debug!(job = job.name(), "Scheduler loop cancelled");
    }
}

impl Drop for IntervalScheduler {
    fn drop(&mut self) {
        self.cancellation.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use innkeeper_domain::InnkeeperError;

    use super::*;

    /// Sleeps for `work`, tracks the peak number of concurrent runs and
    /// fails or panics on request
    struct ProbeJob {
        work: Duration,
        active: AtomicUsize,
        peak: AtomicUsize,
        calls: AtomicUsize,
        fail_every: Option<usize>,
        panic_on_first: bool,
    }

    impl ProbeJob {
        fn new(work: Duration) -> Self {
            Self {
                work,
                active: AtomicUsize::new(0),
                peak: AtomicUsize::new(0),
                calls: AtomicUsize::new(0),
                fail_every: None,
                panic_on_first: false,
            }
        }
    }

    #[async_trait]
    impl ScheduledJob for ProbeJob {
        fn name(&self) -> &str {
            "probe"
        }

        async fn run(&self) -> Result<(), InfraError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if self.panic_on_first && call == 1 {
                panic!("job bug");
            }

            let now_active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now_active, Ordering::SeqCst);
            tokio::time::sleep(self.work).await;
            self.active.fetch_sub(1, Ordering::SeqCst);

            match self.fail_every {
                Some(n) if call % n == 0 => Err(InfraError(InnkeeperError::Internal("boom".into()))),
                _ => Ok(()),
            }
        }
    }

    /// Validates the loop runs on every tick and stops cleanly.
    ///
    /// Assertions:
    /// - Confirms runs at 0s, 10s, 20s and 30s within 35 seconds.
    /// - Confirms no further runs after stop.
    #[tokio::test(start_paused = true)]
    async fn test_runs_every_interval() {
        let job = Arc::new(ProbeJob::new(Duration::ZERO));
        let mut scheduler = IntervalScheduler::new(job.clone(), Duration::from_secs(10));

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_secs(35)).await;
        scheduler.stop().await.unwrap();

        assert_eq!(job.calls.load(Ordering::SeqCst), 4);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(job.calls.load(Ordering::SeqCst), 4);
        assert!(!scheduler.is_running());
    }

    /// Validates a run longer than the interval never overlaps the next.
    #[tokio::test(start_paused = true)]
    async fn test_slow_runs_do_not_overlap() {
        let job = Arc::new(ProbeJob::new(Duration::from_secs(25)));
        let mut scheduler = IntervalScheduler::new(job.clone(), Duration::from_secs(10));

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_secs(120)).await;
        scheduler.stop().await.unwrap();

        assert_eq!(job.peak.load(Ordering::SeqCst), 1);
        assert!(job.calls.load(Ordering::SeqCst) >= 4);
    }

    /// Validates errors and panics are counted and the loop survives them.
    #[tokio::test(start_paused = true)]
    async fn test_failures_are_isolated() {
        let job = Arc::new(ProbeJob {
            fail_every: Some(2),
            panic_on_first: true,
            ..ProbeJob::new(Duration::ZERO)
        });
        let mut scheduler = IntervalScheduler::new(job.clone(), Duration::from_secs(1));
        let stats = scheduler.stats();

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_millis(4500)).await;
        scheduler.stop().await.unwrap();

        // Calls 1..=5: panic, fail, ok, fail, ok
        assert_eq!(stats.runs(), 5);
        assert_eq!(stats.failures(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_counts_as_failure() {
        let job = Arc::new(ProbeJob::new(Duration::from_secs(60)));
        let config = IntervalSchedulerConfig {
            interval: Duration::from_secs(10),
            job_timeout: Duration::from_secs(2),
            ..Default::default()
        };
        let mut scheduler = IntervalScheduler::with_config(job, config);
        let stats = scheduler.stats();

        scheduler.start().unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;
        scheduler.stop().await.unwrap();

        assert_eq!(stats.runs(), 1);
        assert_eq!(stats.failures(), 1);
    }

    #[tokio::test]
    async fn test_lifecycle_errors_and_restart() {
        let job = Arc::new(ProbeJob::new(Duration::ZERO));
        let mut scheduler = IntervalScheduler::new(job.clone(), Duration::from_secs(3600));

        assert!(matches!(scheduler.stop().await, Err(SchedulerError::NotRunning { .. })));
        scheduler.start().unwrap();
        assert!(matches!(scheduler.start(), Err(SchedulerError::AlreadyRunning { .. })));
        scheduler.stop().await.unwrap();
        scheduler.start().unwrap();
        assert!(scheduler.is_running());
        scheduler.stop().await.unwrap();

        let mut zero = IntervalScheduler::new(job, Duration::ZERO);
        assert!(matches!(zero.start(), Err(SchedulerError::InvalidInterval { .. })));
    }
}
