//! Strategy-driven recovery of dead-lettered messages

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use innkeeper_domain::{
    DeadLetterMessage, FailureReason, RecoveryReport, RecoveryStrategy, DELAYED_RETRY_BASE_SECS,
    DELAYED_RETRY_CAP_SECS, EXPONENTIAL_BACKOFF_BASE_SECS, EXPONENTIAL_BACKOFF_CAP_SECS,
    META_MANUAL_INTERVENTION,
};
use parking_lot::RwLock;
use tracing::{debug, info, instrument, warn};

use super::queue::DeadLetterQueue;
use super::DlqResult;
use crate::degradation::DegradationEngine;

/// What happened to one message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryOutcome {
    Recovered,
    Failed,
    /// Not due yet, or paused by degradation
    Deferred,
    Discarded,
    /// Flagged for an operator
    Manual,
}

/// Wait before the next attempt for `strategy` after `retry_count` failures
///
/// Delayed retry doubles from 30s up to 5 minutes, exponential backoff
/// doubles from 60s up to an hour.
pub fn retry_delay(strategy: RecoveryStrategy, retry_count: u32) -> Duration {
    let backoff = |base: u64, cap: u64| {
        let factor = 2u64.checked_pow(retry_count).unwrap_or(u64::MAX);
        Duration::from_secs(base.saturating_mul(factor).min(cap))
    };

    match strategy {
        RecoveryStrategy::DelayedRetry => backoff(DELAYED_RETRY_BASE_SECS, DELAYED_RETRY_CAP_SECS),
        RecoveryStrategy::ExponentialBackoff => {
            backoff(EXPONENTIAL_BACKOFF_BASE_SECS, EXPONENTIAL_BACKOFF_CAP_SECS)
        }
        RecoveryStrategy::ImmediateRetry
        | RecoveryStrategy::ManualIntervention
        | RecoveryStrategy::Discard => Duration::ZERO,
    }
}

/// Applies a recovery strategy per failure reason
pub struct RecoveryProcessor {
    queue: Arc<DeadLetterQueue>,
    degradation: Option<Arc<DegradationEngine>>,
    strategies: RwLock<HashMap<FailureReason, RecoveryStrategy>>,
}

impl std::fmt::Debug for RecoveryProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecoveryProcessor")
            .field("strategies", &*self.strategies.read())
            .finish_non_exhaustive()
    }
}

impl RecoveryProcessor {
    pub fn new(queue: Arc<DeadLetterQueue>) -> Self {
        let strategies = FailureReason::ALL
            .iter()
            .map(|reason| (*reason, RecoveryStrategy::default_for(*reason)))
            .collect();
        Self { queue, degradation: None, strategies: RwLock::new(strategies) }
    }

    /// Pause delayed work while the system is severely degraded
    pub fn with_degradation(mut self, engine: Arc<DegradationEngine>) -> Self {
        self.degradation = Some(engine);
        self
    }

    pub fn set_strategy(&self, reason: FailureReason, strategy: RecoveryStrategy) {
        info!(%reason, %strategy, "Recovery strategy updated");
        self.strategies.write().insert(reason, strategy);
    }

    pub fn strategy_for(&self, reason: FailureReason) -> RecoveryStrategy {
        self.strategies
            .read()
            .get(&reason)
            .copied()
            .unwrap_or_else(|| RecoveryStrategy::default_for(reason))
    }

    /// Recover one message, waiting out its strategy's delay first
    #[instrument(skip(self, message), fields(id = %message.id, reason = %message.failure_reason))]
    pub async fn process(&self, message: &DeadLetterMessage) -> DlqResult<RecoveryOutcome> {
        let strategy = self.strategy_for(message.failure_reason);
        let delay = retry_delay(strategy, message.retry_count);
        if !delay.is_zero() {
            debug!(?delay, %strategy, "Waiting before retry");
            tokio::time::sleep(delay).await;
        }
        self.apply(message, strategy).await
    }

    /// Work through up to `limit` of the oldest unflagged messages without
    /// waiting
    ///
    /// An error on one message is logged and counted as a failure; the rest
    /// of the cycle continues.
    ///
    /// Messages whose delay has not elapsed since their last failure are
    /// deferred. While the degradation level is severe or worse, delayed
    /// strategies are deferred as well.
    #[instrument(skip(self))]
    pub async fn process_pending(&self, limit: usize) -> DlqResult<RecoveryReport> {
        let paused = self
            .degradation
            .as_ref()
            .is_some_and(|engine| engine.current_level().is_severe_or_worse());
        let now = Utc::now();
        let mut report = RecoveryReport::default();

        for message in self.queue.oldest_unflagged(limit).await? {
            let strategy = self.strategy_for(message.failure_reason);
            let due = || {
                chrono::Duration::from_std(retry_delay(strategy, message.retry_count))
                    .map_or(false, |delay| message.last_failed_at + delay <= now)
            };
            let result = if strategy.is_delayed() && (paused || !due()) {
                Ok(RecoveryOutcome::Deferred)
            } else {
                self.apply(&message, strategy).await
            };
            let outcome = result.unwrap_or_else(|err| {
                warn!(id = %message.id, error = %err, "Recovery of dead-letter message failed");
                RecoveryOutcome::Failed
            });

            match outcome {
                RecoveryOutcome::Recovered => report.recovered += 1,
                RecoveryOutcome::Failed => report.failed += 1,
                RecoveryOutcome::Deferred => report.deferred += 1,
                RecoveryOutcome::Discarded => report.discarded += 1,
                RecoveryOutcome::Manual => report.manual += 1,
            }
            if outcome != RecoveryOutcome::Deferred {
                report.attempted += 1;
            }
        }

        if report.attempted > 0 || report.deferred > 0 {
            info!(
                attempted = report.attempted,
                recovered = report.recovered,
                failed = report.failed,
                deferred = report.deferred,
                paused,
                "Recovery cycle finished"
            );
        }
        Ok(report)
    }

    async fn apply(
        &self,
        message: &DeadLetterMessage,
        strategy: RecoveryStrategy,
    ) -> DlqResult<RecoveryOutcome> {
        match strategy {
            RecoveryStrategy::ManualIntervention => {
                warn!(id = %message.id, error = %message.error_message, "Message requires manual intervention");
                self.queue.set_metadata(&message.id, META_MANUAL_INTERVENTION, "true").await?;
                Ok(RecoveryOutcome::Manual)
            }
            RecoveryStrategy::Discard => {
                self.queue.discard(&message.id).await?;
                Ok(RecoveryOutcome::Discarded)
            }
            RecoveryStrategy::ImmediateRetry
            | RecoveryStrategy::DelayedRetry
            | RecoveryStrategy::ExponentialBackoff => {
                if self.queue.retry(&message.id).await? {
                    Ok(RecoveryOutcome::Recovered)
                } else {
                    Ok(RecoveryOutcome::Failed)
                }
            }
        }
    }
}
