//! Graceful degradation
//!
//! A [`DegradationEngine`] tracks one system-wide [`DegradationLevel`]
//! driven by pluggable [`DegradationRule`]s. Firing rules raise the level
//! immediately; once nothing fires the level steps down one notch per
//! evaluation.
//!
//! [`DegradationLevel`]: innkeeper_domain::DegradationLevel

pub mod engine;
pub mod rules;

use thiserror::Error;

pub use engine::DegradationEngine;
pub use rules::{DegradationRule, MemoryGauge, RuleCondition};

/// Degradation engine errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DegradationError {
    #[error("Invalid degradation rule: {message}")]
    InvalidRule { message: String },

    #[error("Degradation rule '{name}' is already registered")]
    DuplicateRule { name: String },

    #[error("Rule condition failed: {message}")]
    Condition { message: String },

    #[error("Memory gauge unavailable: {message}")]
    Gauge { message: String },
}

pub type DegradationResult<T> = Result<T, DegradationError>;
