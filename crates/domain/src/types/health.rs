//! Health check results and dependency classification

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::impl_domain_status_conversions;

/// Health of one dependency or of the whole system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
    Unknown,
}

impl_domain_status_conversions!(HealthStatus {
    Healthy => "healthy",
    Degraded => "degraded",
    Unhealthy => "unhealthy",
    Unknown => "unknown",
});

/// How much the service depends on a dependency
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyPriority {
    Critical,
    Important,
    Optional,
}

impl_domain_status_conversions!(DependencyPriority {
    Critical => "critical",
    Important => "important",
    Optional => "optional",
});

/// Result of probing one dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckResult {
    pub status: HealthStatus,
    pub response_time_ms: u64,
    pub details: String,
    pub error: Option<String>,
    pub metadata: BTreeMap<String, String>,
    pub timestamp: DateTime<Utc>,
}

impl HealthCheckResult {
    fn with_status(status: HealthStatus, details: impl Into<String>) -> Self {
        Self {
            status,
            response_time_ms: 0,
            details: details.into(),
            error: None,
            metadata: BTreeMap::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn healthy(details: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Healthy, details)
    }

    pub fn degraded(details: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Degraded, details)
    }

    pub fn unknown(details: impl Into<String>) -> Self {
        Self::with_status(HealthStatus::Unknown, details)
    }

    pub fn unhealthy(details: impl Into<String>, error: impl Into<String>) -> Self {
        let mut result = Self::with_status(HealthStatus::Unhealthy, details);
        result.error = Some(error.into());
        result
    }

    pub fn with_response_time(mut self, millis: u64) -> Self {
        self.response_time_ms = millis;
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Last known state of one monitored dependency
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyState {
    pub name: String,
    pub priority: DependencyPriority,
    pub required_for_startup: bool,
    pub status: HealthStatus,
    pub last_checked: Option<DateTime<Utc>>,
    pub last_result: Option<HealthCheckResult>,
}

/// Dependencies grouped by priority
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DependencySummary {
    pub total: usize,
    pub healthy: usize,
    pub unhealthy: usize,
    pub by_priority: BTreeMap<DependencyPriority, Vec<DependencyState>>,
}
