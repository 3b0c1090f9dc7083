//! Dead-letter messages and recovery bookkeeping

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants::{MAX_MESSAGE_TYPE_LENGTH, META_MANUAL_INTERVENTION, META_MESSAGE_TYPE};
use crate::errors::{InnkeeperError, Result};
use crate::impl_domain_status_conversions;

/* -------------------------------------------------------------------------- */
/* Failure Reasons & Strategies */
/* -------------------------------------------------------------------------- */

/// Why a message ended up in the dead-letter queue
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    ConnectionError,
    ValidationError,
    ProcessingError,
    RateLimit,
    ServiceUnavailable,
    Unknown,
}

impl_domain_status_conversions!(FailureReason {
    Timeout => "timeout",
    ConnectionError => "connection_error",
    ValidationError => "validation_error",
    ProcessingError => "processing_error",
    RateLimit => "rate_limit",
    ServiceUnavailable => "service_unavailable",
    Unknown => "unknown",
});

impl FailureReason {
    pub const ALL: [FailureReason; 7] = [
        Self::Timeout,
        Self::ConnectionError,
        Self::ValidationError,
        Self::ProcessingError,
        Self::RateLimit,
        Self::ServiceUnavailable,
        Self::Unknown,
    ];
}

/// How the recovery processor handles a failure reason
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryStrategy {
    ImmediateRetry,
    DelayedRetry,
    ExponentialBackoff,
    ManualIntervention,
    Discard,
}

impl_domain_status_conversions!(RecoveryStrategy {
    ImmediateRetry => "immediate_retry",
    DelayedRetry => "delayed_retry",
    ExponentialBackoff => "exponential_backoff",
    ManualIntervention => "manual_intervention",
    Discard => "discard",
});

impl RecoveryStrategy {
    /// Default strategy for a failure reason
    pub fn default_for(reason: FailureReason) -> Self {
        match reason {
            FailureReason::Timeout | FailureReason::ProcessingError | FailureReason::Unknown => {
                Self::DelayedRetry
            }
            FailureReason::ConnectionError
            | FailureReason::RateLimit
            | FailureReason::ServiceUnavailable => Self::ExponentialBackoff,
            FailureReason::ValidationError => Self::ManualIntervention,
        }
    }

    /// Whether this strategy waits before retrying
    pub fn is_delayed(self) -> bool {
        matches!(self, Self::DelayedRetry | Self::ExponentialBackoff)
    }
}

/* -------------------------------------------------------------------------- */
/* Message Type */
/* -------------------------------------------------------------------------- */

/// Validated processor key carried in a message's `message_type` metadata
///
/// Non-empty, at most 64 characters, ASCII alphanumerics plus `_`, `-`, `.`
/// and `:`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MessageType(String);

impl MessageType {
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_MESSAGE_TYPE_LENGTH {
            return Err(InnkeeperError::InvalidInput(format!(
                "message_type must be 1..={MAX_MESSAGE_TYPE_LENGTH} characters, got {}",
                value.len()
            )));
        }
        if let Some(bad) =
            value.chars().find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':')))
        {
            return Err(InnkeeperError::InvalidInput(format!(
                "message_type '{value}' contains invalid character '{bad}'"
            )));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MessageType {
    type Error = InnkeeperError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<MessageType> for String {
    fn from(value: MessageType) -> Self {
        value.0
    }
}

/* -------------------------------------------------------------------------- */
/* Dead-Letter Message */
/* -------------------------------------------------------------------------- */

/// A unit of work that failed and awaits recovery
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterMessage {
    pub id: String,
    pub original_payload: serde_json::Value,
    pub failure_reason: FailureReason,
    pub error_message: String,
    pub retry_count: u32,
    pub max_retries: u32,
    pub first_failed_at: DateTime<Utc>,
    pub last_failed_at: DateTime<Utc>,
    /// Always contains `message_type`
    pub metadata: BTreeMap<String, String>,
}

impl DeadLetterMessage {
    /// Create a new message with a fresh id and both timestamps set to `now`
    pub fn new(
        payload: serde_json::Value,
        failure_reason: FailureReason,
        error_message: impl Into<String>,
        message_type: &MessageType,
        max_retries: u32,
        now: DateTime<Utc>,
    ) -> Self {
        let mut metadata = BTreeMap::new();
        metadata.insert(META_MESSAGE_TYPE.to_string(), message_type.to_string());
        Self {
            id: Uuid::now_v7().to_string(),
            original_payload: payload,
            failure_reason,
            error_message: error_message.into(),
            retry_count: 0,
            max_retries,
            first_failed_at: now,
            last_failed_at: now,
            metadata,
        }
    }

    /// Raw `message_type` metadata value
    pub fn message_type(&self) -> Option<&str> {
        self.metadata.get(META_MESSAGE_TYPE).map(String::as_str)
    }

    /// Whether the retry budget is used up
    pub fn is_exhausted(&self) -> bool {
        self.retry_count >= self.max_retries
    }

    /// Record one more failed attempt
    pub fn record_failure(&mut self, error_message: impl Into<String>, now: DateTime<Utc>) {
        self.retry_count += 1;
        self.last_failed_at = now;
        self.error_message = error_message.into();
    }

    /// Whether an operator has to look at this message
    pub fn requires_manual_intervention(&self) -> bool {
        self.metadata.get(META_MANUAL_INTERVENTION).is_some_and(|v| v == "true")
    }
}

/* -------------------------------------------------------------------------- */
/* Statistics & Reports */
/* -------------------------------------------------------------------------- */

/// Dead-letter queue statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DlqStats {
    /// Messages awaiting recovery
    pub active: usize,
    /// Messages moved to the permanent-failure store
    pub permanent_failures: usize,
    pub total_enqueued: u64,
    pub total_retried: u64,
    pub total_recovered: u64,
    pub total_permanent_failures: u64,
    pub total_discarded: u64,
    /// Active messages per failure reason
    pub by_reason: BTreeMap<FailureReason, usize>,
}

/// One page of active messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DlqPage {
    pub offset: usize,
    pub limit: usize,
    pub total: usize,
    pub messages: Vec<DeadLetterMessage>,
}

/// Outcome of a batch retry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchReport {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Ids of messages that failed again
    pub failed_ids: Vec<String>,
}

/// Outcome of one recovery cycle
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecoveryReport {
    pub attempted: usize,
    pub recovered: usize,
    pub failed: usize,
    /// Left for a later cycle because the system is degraded
    pub deferred: usize,
    pub discarded: usize,
    /// Flagged for manual intervention
    pub manual: usize,
}
