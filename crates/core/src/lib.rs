//! # Innkeeper Core
//!
//! Resilience services for the messaging backend - no infrastructure
//! dependencies.
//!
//! This crate contains:
//! - Degradation engine and built-in rules
//! - Fallback provider
//! - Dead-letter queue and recovery processor
//! - Health check aggregator and dependency monitor
//!
//! ## Architecture Principles
//! - Only depends on `innkeeper-common` and `innkeeper-domain`
//! - Storage, probes and gauges are reached through port traits
//! - Services are constructed explicitly and shared through `Arc`

pub mod degradation;
pub mod dlq;
pub mod fallback;
pub mod health;

pub use degradation::{
    DegradationEngine, DegradationError, DegradationRule, MemoryGauge, RuleCondition,
};
pub use dlq::{
    DeadLetterQueue, DlqError, FailureClassifier, KeyValueStore, KeywordClassifier,
    MessageProcessor, RecoveryOutcome, RecoveryProcessor,
};
pub use fallback::{
    DatabaseOperation, DeferredWorkSink, FallbackError, FallbackHandler, FallbackProvider,
};
pub use health::{
    DependencyDefinition, DependencyMonitor, HealthCheckAggregator, HealthError, HealthProbe,
    SystemHealth,
};
