//! End-to-end scenarios across the core services
//!
//! Wires a breaker registry, degradation engine, fallback provider and
//! dead-letter queue together the way the application context does.

mod support;

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use innkeeper_common::resilience::{CircuitBreakerConfig, CircuitBreakerRegistry, MockClock};
use innkeeper_core::degradation::rules::default_rules;
use innkeeper_core::{DeadLetterQueue, DegradationEngine, FallbackProvider, RecoveryProcessor};
use innkeeper_domain::{DegradationLevel, FallbackKind, FailureReason, Intent};
use serde_json::json;
use support::ports::{FixedGauge, InMemoryStore, SwitchProcessor};

fn registry(clock: &MockClock) -> Arc<CircuitBreakerRegistry> {
    let config = CircuitBreakerConfig::builder()
        .failure_threshold(2)
        .window_size(5)
        .minimum_requests(2)
        .recovery_timeout(Duration::from_secs(30))
        .build()
        .expect("valid config");
    Arc::new(CircuitBreakerRegistry::with_clock(config, Arc::new(clock.clone())).expect("registry"))
}

/// Validates a database outage drives the whole degradation path.
///
/// # Test Steps
/// 1. Open the `database` breaker through recorded failures
/// 2. Evaluate rules and confirm the level jumps to severe
/// 3. Confirm the AI fallback switches to maintenance text
/// 4. Queue a message through the messaging fallback into the DLQ
/// 5. Confirm recovery defers delayed work while severe
/// 6. Reset the breaker and confirm the level steps back to normal
#[tokio::test(flavor = "multi_thread")]
async fn test_database_outage_degrades_and_recovers() {
    let clock = MockClock::new();
    let registry = registry(&clock);
    let engine = Arc::new(DegradationEngine::with_clock(100, Arc::new(clock.clone())));
    for rule in default_rules(
        &registry,
        Arc::new(FixedGauge(35.0)),
        vec!["database".to_string()],
        90.0,
        Duration::ZERO,
    )
    .expect("rules")
    {
        engine.register_rule(rule).expect("unique rule");
    }

    let store = Arc::new(InMemoryStore::default());
    let queue = Arc::new(DeadLetterQueue::new(store));
    let fallback = FallbackProvider::new(Arc::clone(&engine)).with_sink(queue.clone());
    let recovery = RecoveryProcessor::new(Arc::clone(&queue)).with_degradation(Arc::clone(&engine));

    let database = registry.get_or_create("database", None).expect("breaker");
    database.record_failure();
    database.record_failure();
    assert!(!database.is_available());

    assert_eq!(engine.evaluate(), Some(DegradationLevel::Severe));
    assert_eq!(engine.status().active_rules, vec!["critical_service_down".to_string()]);

    let reply = fallback.ai_fallback(Intent::Greeting, &json!({}));
    assert_eq!(reply.fallback_used, FallbackKind::PredefinedResponse);
    assert_eq!(reply.data["intent"], "maintenance");

    let queued = fallback.messaging_fallback(json!({ "to": "+15550100", "body": "Hi" })).await;
    assert_eq!(queued.fallback_used, FallbackKind::Queue);
    assert_eq!(queued.level, DegradationLevel::Severe);

    let stats = queue.stats().await.expect("stats");
    assert_eq!(stats.active, 1);
    assert_eq!(stats.by_reason.get(&FailureReason::ServiceUnavailable), Some(&1));

    let report = recovery.process_pending(10).await.expect("recovery");
    assert_eq!(report.deferred, 1);
    assert_eq!(report.attempted, 0);

    registry.reset("database");
    let mut levels = Vec::new();
    while let Some(level) = engine.evaluate() {
        levels.push(level);
    }
    assert_eq!(
        levels,
        vec![DegradationLevel::Moderate, DegradationLevel::Minor, DegradationLevel::Normal]
    );
}

/// Validates a dead-lettered message stays queued until a processor exists
/// and is removed after a successful retry.
///
/// # Test Steps
/// 1. Enqueue a message of type `x` with no processor registered
/// 2. Confirm `retry` returns false and the message remains
/// 3. Register an always-succeeding processor
/// 4. Confirm `retry` returns true and the message is gone
#[tokio::test(flavor = "multi_thread")]
async fn test_dead_letter_retry_after_processor_registration() {
    let queue = DeadLetterQueue::new(Arc::new(InMemoryStore::default()));
    let id = queue
        .enqueue(json!({ "conversation": 7 }), "processing failed", "x", None)
        .await
        .expect("enqueue");

    assert!(!queue.retry(&id).await.expect("retry"));
    assert_eq!(queue.list(10).await.expect("list").len(), 1);

    let processor = SwitchProcessor::default();
    processor.healthy.store(true, Ordering::SeqCst);
    queue.register_processor("x", Arc::new(processor)).expect("register");

    assert!(queue.retry(&id).await.expect("retry"));
    assert!(queue.list(10).await.expect("list").iter().all(|m| m.id != id));
}

/// Validates concurrent batch processing against a flapping dependency.
///
/// # Test Steps
/// 1. Enqueue twenty messages while the processor fails
/// 2. Process a batch and confirm every retry failed and was counted
/// 3. Heal the processor and process again
/// 4. Confirm all messages recovered and counters add up
#[tokio::test(flavor = "multi_thread")]
async fn test_batch_recovery_after_outage() {
    let queue = DeadLetterQueue::new(Arc::new(InMemoryStore::default())).with_concurrency(4);
    let processor = SwitchProcessor::default();
    queue.register_processor("sms.send", Arc::new(processor.clone())).expect("register");

    for n in 0..20 {
        queue
            .enqueue(json!({ "n": n }), "503 unavailable", "sms.send", Some(5))
            .await
            .expect("enqueue");
    }

    let failed = queue.process_batch(20).await.expect("batch");
    assert_eq!(failed.attempted, 20);
    assert_eq!(failed.failed, 20);
    assert!(queue.list(50).await.expect("list").iter().all(|m| m.retry_count == 1));

    processor.healthy.store(true, Ordering::SeqCst);
    let recovered = queue.process_batch(20).await.expect("batch");
    assert_eq!(recovered.succeeded, 20);

    let stats = queue.stats().await.expect("stats");
    assert_eq!(stats.active, 0);
    assert_eq!(stats.total_enqueued, 20);
    assert_eq!(stats.total_retried, 40);
    assert_eq!(stats.total_recovered, 20);
}
