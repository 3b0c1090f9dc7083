//! Domain types and models

pub mod dead_letter;
pub mod degradation;
pub mod fallback;
pub mod health;

pub use dead_letter::{
    BatchReport, DeadLetterMessage, DlqPage, DlqStats, FailureReason, MessageType,
    RecoveryReport, RecoveryStrategy,
};
pub use degradation::{DegradationEvent, DegradationLevel, DegradationStatus};
pub use fallback::{FallbackKind, FallbackResponse, Intent, ServiceKind};
pub use health::{
    DependencyPriority, DependencyState, DependencySummary, HealthCheckResult, HealthStatus,
};
