//! Degradation levels and the events recorded when the level changes

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// System-wide service degradation level
///
/// Totally ordered from `Normal` (everything available) to `Critical`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DegradationLevel {
    #[default]
    Normal,
    Minor,
    Moderate,
    Severe,
    Critical,
}

impl_domain_status_conversions!(DegradationLevel {
    Normal => "normal",
    Minor => "minor",
    Moderate => "moderate",
    Severe => "severe",
    Critical => "critical",
});

impl DegradationLevel {
    /// All levels in ascending order
    pub const ALL: [DegradationLevel; 5] =
        [Self::Normal, Self::Minor, Self::Moderate, Self::Severe, Self::Critical];

    /// The next lower level; `Normal` stays `Normal`
    pub fn step_down(self) -> Self {
        match self {
            Self::Critical => Self::Severe,
            Self::Severe => Self::Moderate,
            Self::Moderate => Self::Minor,
            Self::Minor | Self::Normal => Self::Normal,
        }
    }

    /// Whether non-essential background work should pause
    pub fn is_severe_or_worse(self) -> bool {
        self >= Self::Severe
    }
}

/// One recorded level change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradationEvent {
    pub timestamp: DateTime<Utc>,
    /// Rule that caused the change (`recovery` for step-downs,
    /// `manual_override` for operator changes)
    pub rule: String,
    pub old_level: DegradationLevel,
    pub new_level: DegradationLevel,
    pub reason: String,
}

/// Current degradation state as reported to operators
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DegradationStatus {
    pub level: DegradationLevel,
    /// Rules that fired on the most recent evaluation
    pub active_rules: Vec<String>,
    pub rule_count: usize,
    pub recent_events: Vec<DegradationEvent>,
}
