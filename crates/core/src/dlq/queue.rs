//! Dead-letter queue service

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use innkeeper_domain::{
    BatchReport, DeadLetterMessage, DlqPage, DlqStats, FailureReason, MessageType, ServiceKind,
    COUNTER_TOTAL_DISCARDED, COUNTER_TOTAL_ENQUEUED, COUNTER_TOTAL_PERMANENT_FAILURES,
    COUNTER_TOTAL_RECOVERED, COUNTER_TOTAL_RETRIED, DEFAULT_DLQ_CONCURRENCY,
    DEFAULT_DLQ_MAX_RETRIES, DLQ_COUNTERS_KEY, DLQ_MESSAGES_KEY, DLQ_PERMANENT_FAILURES_KEY,
    META_ERROR_TYPE,
};
use parking_lot::{Mutex, RwLock};
use serde_json::Value;
use tracing::{debug, error, info, instrument, warn};

use super::classifier::{FailureClassifier, KeywordClassifier};
use super::ports::{FailureCallback, KeyValueStore, MessageProcessor};
use super::{DlqError, DlqResult};
use crate::fallback::{DeferredWorkSink, FallbackError};

/// Removes an id from the in-flight set when a retry finishes
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

/// Stores failed work and replays it through registered processors
pub struct DeadLetterQueue {
    store: Arc<dyn KeyValueStore>,
    classifier: Arc<dyn FailureClassifier>,
    processors: RwLock<HashMap<MessageType, Arc<dyn MessageProcessor>>>,
    failure_callbacks: RwLock<Vec<FailureCallback>>,
    in_flight: Mutex<HashSet<String>>,
    default_max_retries: u32,
    concurrency: usize,
}

impl std::fmt::Debug for DeadLetterQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeadLetterQueue")
            .field("processors", &self.processors.read().keys().collect::<Vec<_>>())
            .field("default_max_retries", &self.default_max_retries)
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl DeadLetterQueue {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            classifier: Arc::new(KeywordClassifier),
            processors: RwLock::new(HashMap::new()),
            failure_callbacks: RwLock::new(Vec::new()),
            in_flight: Mutex::new(HashSet::new()),
            default_max_retries: DEFAULT_DLQ_MAX_RETRIES,
            concurrency: DEFAULT_DLQ_CONCURRENCY,
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn FailureClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_default_max_retries(mut self, max_retries: u32) -> Self {
        self.default_max_retries = max_retries;
        self
    }

    /// Bound on concurrent retries in [`process_batch`](Self::process_batch)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    //==========================================================================
    // Registration
    //==========================================================================

    /// Register the processor for `message_type`
    pub fn register_processor(
        &self,
        message_type: &str,
        processor: Arc<dyn MessageProcessor>,
    ) -> DlqResult<()> {
        let message_type = parse_message_type(message_type)?;
        let mut processors = self.processors.write();
        if processors.contains_key(&message_type) {
            return Err(DlqError::DuplicateProcessor { message_type: message_type.to_string() });
        }

        debug!(%message_type, "Registered dead-letter processor");
        processors.insert(message_type, processor);
        Ok(())
    }

    pub fn has_processor(&self, message_type: &str) -> bool {
        MessageType::new(message_type)
            .map(|mt| self.processors.read().contains_key(&mt))
            .unwrap_or(false)
    }

    /// Called with each message that exhausts its retries
    pub fn on_permanent_failure(&self, callback: FailureCallback) {
        self.failure_callbacks.write().push(callback);
    }

    //==========================================================================
    // Enqueue
    //==========================================================================

    /// Store failed work, classifying `error` to pick the failure reason
    pub async fn enqueue(
        &self,
        payload: Value,
        error: &str,
        message_type: &str,
        max_retries: Option<u32>,
    ) -> DlqResult<String> {
        let reason = self.classifier.classify(error);
        self.enqueue_classified(payload, reason, error, message_type, max_retries).await
    }

    /// Store failed work with an already known failure reason
    #[instrument(skip(self, payload, error), fields(%reason))]
    pub async fn enqueue_classified(
        &self,
        payload: Value,
        reason: FailureReason,
        error: &str,
        message_type: &str,
        max_retries: Option<u32>,
    ) -> DlqResult<String> {
        let message_type = parse_message_type(message_type)?;
        let mut message = DeadLetterMessage::new(
            payload,
            reason,
            error,
            &message_type,
            max_retries.unwrap_or(self.default_max_retries),
            Utc::now(),
        );
        message.metadata.insert(META_ERROR_TYPE.to_string(), reason.to_string());

        self.save_active(&message).await?;
        self.store.hincr(DLQ_COUNTERS_KEY, COUNTER_TOTAL_ENQUEUED, 1).await?;

        info!(id = %message.id, %message_type, "Message added to dead-letter queue");
        Ok(message.id)
    }

    //==========================================================================
    // Queries
    //==========================================================================

    /// Active messages, most recently failed first
    pub async fn list(&self, limit: usize) -> DlqResult<Vec<DeadLetterMessage>> {
        let mut messages = self.load_all(DLQ_MESSAGES_KEY).await?;
        messages.sort_by(|a, b| b.last_failed_at.cmp(&a.last_failed_at));
        messages.truncate(limit);
        Ok(messages)
    }

    /// Oldest active messages that are not waiting on an operator
    pub async fn oldest_unflagged(&self, limit: usize) -> DlqResult<Vec<DeadLetterMessage>> {
        let mut messages = self.load_all(DLQ_MESSAGES_KEY).await?;
        messages.retain(|message| !message.requires_manual_intervention());
        messages.sort_by(|a, b| a.first_failed_at.cmp(&b.first_failed_at));
        messages.truncate(limit);
        Ok(messages)
    }

    /// One page of active messages in [`list`](Self::list) order
    pub async fn list_page(&self, offset: usize, limit: usize) -> DlqResult<DlqPage> {
        let mut messages = self.load_all(DLQ_MESSAGES_KEY).await?;
        messages.sort_by(|a, b| b.last_failed_at.cmp(&a.last_failed_at));
        let total = messages.len();
        let messages = messages.into_iter().skip(offset).take(limit).collect();
        Ok(DlqPage { offset, limit, total, messages })
    }

    pub async fn get(&self, id: &str) -> DlqResult<Option<DeadLetterMessage>> {
        match self.store.hget(DLQ_MESSAGES_KEY, id).await? {
            Some(value) => decode(id, value).map(Some),
            None => Ok(None),
        }
    }

    /// Messages that exhausted their retries, most recent first
    pub async fn permanent_failures(&self, limit: usize) -> DlqResult<Vec<DeadLetterMessage>> {
        let mut messages = self.load_all(DLQ_PERMANENT_FAILURES_KEY).await?;
        messages.sort_by(|a, b| b.last_failed_at.cmp(&a.last_failed_at));
        messages.truncate(limit);
        Ok(messages)
    }

    pub async fn stats(&self) -> DlqResult<DlqStats> {
        let active = self.load_all(DLQ_MESSAGES_KEY).await?;
        let permanent_failures = self.store.hlen(DLQ_PERMANENT_FAILURES_KEY).await?;
        let counters: HashMap<String, u64> = self
            .store
            .hgetall(DLQ_COUNTERS_KEY)
            .await?
            .into_iter()
            .map(|(name, value)| (name, value.as_u64().unwrap_or(0)))
            .collect();
        let counter = |name: &str| counters.get(name).copied().unwrap_or(0);

        let mut by_reason = BTreeMap::new();
        for message in &active {
            *by_reason.entry(message.failure_reason).or_insert(0) += 1;
        }

        Ok(DlqStats {
            active: active.len(),
            permanent_failures,
            total_enqueued: counter(COUNTER_TOTAL_ENQUEUED),
            total_retried: counter(COUNTER_TOTAL_RETRIED),
            total_recovered: counter(COUNTER_TOTAL_RECOVERED),
            total_permanent_failures: counter(COUNTER_TOTAL_PERMANENT_FAILURES),
            total_discarded: counter(COUNTER_TOTAL_DISCARDED),
            by_reason,
        })
    }

    /// Ids of active messages, oldest failure first
    pub async fn oldest(&self, limit: usize) -> DlqResult<Vec<DeadLetterMessage>> {
        let mut messages = self.load_all(DLQ_MESSAGES_KEY).await?;
        messages.sort_by(|a, b| a.first_failed_at.cmp(&b.first_failed_at));
        messages.truncate(limit);
        Ok(messages)
    }

    //==========================================================================
    // Processing
    //==========================================================================

    /// Replay one message through its processor
    ///
    /// Returns `Ok(true)` when the processor succeeded and the message was
    /// removed. `Ok(false)` covers a missing processor, a retry already in
    /// progress, and a failed attempt (which may move the message to the
    /// permanent-failure store).
    #[instrument(skip(self))]
    pub async fn retry(&self, id: &str) -> DlqResult<bool> {
        if !self.in_flight.lock().insert(id.to_string()) {
            debug!("Retry already in progress");
            return Ok(false);
        }
        let _guard = InFlightGuard { set: &self.in_flight, id: id.to_string() };

        let Some(mut message) = self.get(id).await? else {
            return Err(DlqError::NotFound { id: id.to_string() });
        };

        let processor = message
            .message_type()
            .and_then(|raw| MessageType::new(raw).ok())
            .and_then(|mt| self.processors.read().get(&mt).cloned());
        let Some(processor) = processor else {
            warn!(message_type = ?message.message_type(), "No processor registered, message left queued");
            return Ok(false);
        };

        self.store.hincr(DLQ_COUNTERS_KEY, COUNTER_TOTAL_RETRIED, 1).await?;

        match processor.process(&message).await {
            Ok(()) => {
                self.store.hdel(DLQ_MESSAGES_KEY, id).await?;
                self.store.hincr(DLQ_COUNTERS_KEY, COUNTER_TOTAL_RECOVERED, 1).await?;
                info!("Dead-letter message recovered");
                Ok(true)
            }
            Err(err) => {
                message.record_failure(err.to_string(), Utc::now());
                if message.is_exhausted() {
                    self.move_to_permanent(&message).await?;
                } else {
                    self.save_active(&message).await?;
                    warn!(
                        retry_count = message.retry_count,
                        max_retries = message.max_retries,
                        error = %err,
                        "Dead-letter retry failed"
                    );
                }
                Ok(false)
            }
        }
    }

    /// Retry up to `batch_size` of the oldest messages with bounded
    /// concurrency
    #[instrument(skip(self))]
    pub async fn process_batch(&self, batch_size: usize) -> DlqResult<BatchReport> {
        let ids: Vec<String> =
            self.oldest(batch_size).await?.into_iter().map(|message| message.id).collect();

        let outcomes: Vec<(String, DlqResult<bool>)> = stream::iter(ids)
            .map(|id| async move {
                let outcome = self.retry(&id).await;
                (id, outcome)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        let mut report = BatchReport { attempted: outcomes.len(), ..BatchReport::default() };
        for (id, outcome) in outcomes {
            match outcome {
                Ok(true) => report.succeeded += 1,
                Ok(false) => {
                    report.failed += 1;
                    report.failed_ids.push(id);
                }
                Err(err) => {
                    error!(%id, error = %err, "Dead-letter retry errored");
                    report.failed += 1;
                    report.failed_ids.push(id);
                }
            }
        }

        info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            failed = report.failed,
            "Dead-letter batch processed"
        );
        Ok(report)
    }

    /// Remove a message without processing it
    pub async fn discard(&self, id: &str) -> DlqResult<bool> {
        let removed = self.store.hdel(DLQ_MESSAGES_KEY, id).await?;
        if removed {
            self.store.hincr(DLQ_COUNTERS_KEY, COUNTER_TOTAL_DISCARDED, 1).await?;
            info!(%id, "Dead-letter message discarded");
        }
        Ok(removed)
    }

    /// Set one metadata entry on an active message
    pub async fn set_metadata(&self, id: &str, key: &str, value: &str) -> DlqResult<()> {
        let Some(mut message) = self.get(id).await? else {
            return Err(DlqError::NotFound { id: id.to_string() });
        };
        message.metadata.insert(key.to_string(), value.to_string());
        self.save_active(&message).await
    }

    /// Drop every active message
    ///
    /// Permanent failures and counters are kept. Returns the number of
    /// messages removed.
    pub async fn clear(&self, confirm: bool) -> DlqResult<usize> {
        if !confirm {
            return Err(DlqError::ClearNotConfirmed);
        }

        let active = self.store.delete(DLQ_MESSAGES_KEY).await?;
        warn!(active, "Dead-letter queue cleared");
        Ok(active)
    }

    //==========================================================================
    // Storage helpers
    //==========================================================================

    async fn save_active(&self, message: &DeadLetterMessage) -> DlqResult<()> {
        let value = encode(message)?;
        self.store.hset(DLQ_MESSAGES_KEY, &message.id, value).await?;
        Ok(())
    }

    async fn move_to_permanent(&self, message: &DeadLetterMessage) -> DlqResult<()> {
        let value = encode(message)?;
        self.store.hset(DLQ_PERMANENT_FAILURES_KEY, &message.id, value).await?;
        self.store.hdel(DLQ_MESSAGES_KEY, &message.id).await?;
        self.store.hincr(DLQ_COUNTERS_KEY, COUNTER_TOTAL_PERMANENT_FAILURES, 1).await?;

        error!(
            id = %message.id,
            retry_count = message.retry_count,
            reason = %message.failure_reason,
            "Dead-letter message permanently failed"
        );

        let callbacks = self.failure_callbacks.read().clone();
        for callback in callbacks {
            callback(message);
        }
        Ok(())
    }

    async fn load_all(&self, key: &str) -> DlqResult<Vec<DeadLetterMessage>> {
        let entries = self.store.hgetall(key).await?;
        Ok(entries
            .into_iter()
            .filter_map(|(id, value)| match decode(&id, value) {
                Ok(message) => Some(message),
                Err(err) => {
                    warn!(error = %err, "Skipping unreadable dead-letter record");
                    None
                }
            })
            .collect())
    }
}

fn parse_message_type(raw: &str) -> DlqResult<MessageType> {
    MessageType::new(raw).map_err(|err| DlqError::InvalidMessageType { message: err.to_string() })
}

fn encode(message: &DeadLetterMessage) -> DlqResult<Value> {
    serde_json::to_value(message)
        .map_err(|err| DlqError::Corrupt { id: message.id.clone(), message: err.to_string() })
}

fn decode(id: &str, value: Value) -> DlqResult<DeadLetterMessage> {
    serde_json::from_value(value)
        .map_err(|err| DlqError::Corrupt { id: id.to_string(), message: err.to_string() })
}

/// Deferred writes land in the queue as `deferred.<service>` messages
#[async_trait]
impl DeferredWorkSink for DeadLetterQueue {
    async fn defer(&self, service: ServiceKind, envelope: Value) -> Result<String, FallbackError> {
        let message_type = format!("deferred.{service}");
        let id = self
            .enqueue_classified(
                envelope,
                FailureReason::ServiceUnavailable,
                &format!("{service} unavailable"),
                &message_type,
                None,
            )
            .await?;
        Ok(id)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    //! In-memory store and processors for unit tests

    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use innkeeper_domain::{DeadLetterMessage, InnkeeperError, Result};
    use parking_lot::Mutex;
    use serde_json::Value;

    use super::super::ports::{KeyValueStore, MessageProcessor};

    #[derive(Default)]
    pub struct MemoryStore(Mutex<HashMap<String, HashMap<String, Value>>>);

    #[async_trait]
    impl KeyValueStore for MemoryStore {
        async fn hget(&self, key: &str, field: &str) -> Result<Option<Value>> {
            Ok(self.0.lock().get(key).and_then(|h| h.get(field).cloned()))
        }

        async fn hset(&self, key: &str, field: &str, value: Value) -> Result<()> {
            self.0.lock().entry(key.to_string()).or_default().insert(field.to_string(), value);
            Ok(())
        }

        async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
            Ok(self.0.lock().get_mut(key).and_then(|h| h.remove(field)).is_some())
        }

        async fn hgetall(&self, key: &str) -> Result<Vec<(String, Value)>> {
            Ok(self
                .0
                .lock()
                .get(key)
                .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
                .unwrap_or_default())
        }

        async fn hlen(&self, key: &str) -> Result<usize> {
            Ok(self.0.lock().get(key).map_or(0, HashMap::len))
        }

        async fn hincr(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
            let mut inner = self.0.lock();
            let slot = inner
                .entry(key.to_string())
                .or_default()
                .entry(field.to_string())
                .or_insert(Value::from(0));
            let next = slot.as_i64().unwrap_or(0) + delta;
            *slot = Value::from(next);
            Ok(next)
        }

        async fn delete(&self, key: &str) -> Result<usize> {
            Ok(self.0.lock().remove(key).map_or(0, |h| h.len()))
        }
    }

    /// Fails the first `failures` calls, then succeeds
    pub struct FlakyProcessor {
        failures: usize,
        pub calls: AtomicUsize,
    }

    impl FlakyProcessor {
        pub fn new(failures: usize) -> Self {
            Self { failures, calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl MessageProcessor for FlakyProcessor {
        async fn process(&self, _message: &DeadLetterMessage) -> Result<()> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(InnkeeperError::Unavailable(format!("attempt {} failed", call + 1)))
            } else {
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use serde_json::json;

    use super::test_support::{FlakyProcessor, MemoryStore};
    use super::*;

    fn queue() -> DeadLetterQueue {
        DeadLetterQueue::new(Arc::new(MemoryStore::default()))
    }

    /// Validates a message without a processor stays queued until one is
    /// registered.
    ///
    /// Assertions:
    /// - Confirms `retry` returns false and leaves the message unchanged.
    /// - Confirms `retry` returns true once a processor exists.
    /// - Confirms the message is gone from `list`.
    #[tokio::test]
    async fn test_retry_requires_processor() {
        let queue = queue();
        let id = queue.enqueue(json!({ "n": 1 }), "boom", "x", None).await.unwrap();

        assert!(!queue.retry(&id).await.unwrap());
        let unchanged = queue.get(&id).await.unwrap().unwrap();
        assert_eq!(unchanged.retry_count, 0);

        queue.register_processor("x", Arc::new(FlakyProcessor::new(0))).unwrap();
        assert!(queue.retry(&id).await.unwrap());
        assert!(queue.list(10).await.unwrap().is_empty());

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.total_enqueued, 1);
        assert_eq!(stats.total_retried, 1);
        assert_eq!(stats.total_recovered, 1);
    }

    /// Validates exhausted messages move to the permanent store and fire
    /// callbacks.
    #[tokio::test]
    async fn test_exhaustion_moves_to_permanent() {
        let queue = queue();
        let fired = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&fired);
        queue.on_permanent_failure(Arc::new(move |_msg: &DeadLetterMessage| {
            counter.fetch_add(1, Ordering::SeqCst);
        }));
        queue.register_processor("sms.send", Arc::new(FlakyProcessor::new(10))).unwrap();

        let id = queue
            .enqueue(json!({}), "connection reset", "sms.send", Some(2))
            .await
            .unwrap();

        assert!(!queue.retry(&id).await.unwrap());
        let after_first = queue.get(&id).await.unwrap().unwrap();
        assert_eq!(after_first.retry_count, 1);
        assert_eq!(after_first.failure_reason, FailureReason::ConnectionError);

        assert!(!queue.retry(&id).await.unwrap());
        assert!(queue.get(&id).await.unwrap().is_none());
        let permanent = queue.permanent_failures(10).await.unwrap();
        assert_eq!(permanent.len(), 1);
        assert_eq!(permanent[0].retry_count, 2);
        assert_eq!(fired.load(Ordering::SeqCst), 1);

        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.active, 0);
        assert_eq!(stats.permanent_failures, 1);
        assert_eq!(stats.total_permanent_failures, 1);
    }

    #[tokio::test]
    async fn test_registration_validation() {
        let queue = queue();
        let processor = Arc::new(FlakyProcessor::new(0));

        assert!(matches!(
            queue.register_processor("bad type!", processor.clone()),
            Err(DlqError::InvalidMessageType { .. })
        ));
        queue.register_processor("email", processor.clone()).unwrap();
        assert!(matches!(
            queue.register_processor("email", processor),
            Err(DlqError::DuplicateProcessor { .. })
        ));
        assert!(queue.has_processor("email"));
        assert!(queue.enqueue(json!({}), "x", "", None).await.is_err());
    }

    /// Validates batch processing, pagination, discard and clear.
    #[tokio::test]
    async fn test_batch_page_discard_clear() {
        let queue = queue().with_concurrency(2);
        queue.register_processor("ok", Arc::new(FlakyProcessor::new(0))).unwrap();

        let mut ids = Vec::new();
        for n in 0..4 {
            ids.push(queue.enqueue(json!({ "n": n }), "timeout", "ok", None).await.unwrap());
        }
        let orphan = queue.enqueue(json!({}), "timeout", "orphan", None).await.unwrap();

        let page = queue.list_page(1, 2).await.unwrap();
        assert_eq!(page.total, 5);
        assert_eq!(page.messages.len(), 2);

        let report = queue.process_batch(10).await.unwrap();
        assert_eq!(report.attempted, 5);
        assert_eq!(report.succeeded, 4);
        assert_eq!(report.failed_ids, vec![orphan.clone()]);

        assert!(matches!(queue.clear(false).await, Err(DlqError::ClearNotConfirmed)));
        assert!(queue.discard(&orphan).await.unwrap());
        assert!(!queue.discard(&orphan).await.unwrap());
        assert_eq!(queue.stats().await.unwrap().total_discarded, 1);

        queue.register_processor("broken", Arc::new(FlakyProcessor::new(10))).unwrap();
        let broken = queue.enqueue(json!({}), "timeout", "broken", Some(1)).await.unwrap();
        assert!(!queue.retry(&broken).await.unwrap());

        queue.enqueue(json!({}), "timeout", "orphan", None).await.unwrap();
        assert_eq!(queue.clear(true).await.unwrap(), 1);
        assert!(queue.list(10).await.unwrap().is_empty());

        // Only active messages go; the permanent store and counters stay.
        let permanent = queue.permanent_failures(10).await.unwrap();
        assert_eq!(permanent.len(), 1);
        assert_eq!(permanent[0].id, broken);
        let stats = queue.stats().await.unwrap();
        assert_eq!(stats.permanent_failures, 1);
        assert_eq!(stats.total_enqueued, 7);
    }

    #[tokio::test]
    async fn test_retry_unknown_id() {
        let queue = queue();
        assert!(matches!(queue.retry("missing").await, Err(DlqError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_deferred_sink_enqueues_unavailable() {
        let queue = queue();
        let id = queue.defer(ServiceKind::Messaging, json!({ "to": "+1" })).await.unwrap();

        let message = queue.get(&id).await.unwrap().unwrap();
        assert_eq!(message.failure_reason, FailureReason::ServiceUnavailable);
        assert_eq!(message.message_type(), Some("deferred.messaging"));
    }
}
