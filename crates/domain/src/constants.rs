//! Domain constants
//!
//! Storage keys, metadata keys and defaults shared across crates.

// Dead-letter queue storage (hash names in the key-value store)
pub const DLQ_MESSAGES_KEY: &str = "dlq:messages";
pub const DLQ_PERMANENT_FAILURES_KEY: &str = "dlq:permanent_failures";
pub const DLQ_COUNTERS_KEY: &str = "dlq:counters";

// Dead-letter counters
pub const COUNTER_TOTAL_ENQUEUED: &str = "total_enqueued";
pub const COUNTER_TOTAL_RETRIED: &str = "total_retried";
pub const COUNTER_TOTAL_RECOVERED: &str = "total_recovered";
pub const COUNTER_TOTAL_PERMANENT_FAILURES: &str = "total_permanent_failures";
pub const COUNTER_TOTAL_DISCARDED: &str = "total_discarded";

// Dead-letter metadata keys
pub const META_MESSAGE_TYPE: &str = "message_type";
pub const META_MANUAL_INTERVENTION: &str = "manual_intervention_required";
pub const META_ERROR_TYPE: &str = "error_type";

// Dead-letter defaults
pub const DEFAULT_DLQ_MAX_RETRIES: u32 = 3;
pub const DEFAULT_DLQ_BATCH_SIZE: usize = 10;
pub const DEFAULT_DLQ_CONCURRENCY: usize = 5;
pub const MAX_MESSAGE_TYPE_LENGTH: usize = 64;

// Recovery delays (seconds)
pub const DELAYED_RETRY_BASE_SECS: u64 = 30;
pub const DELAYED_RETRY_CAP_SECS: u64 = 300;
pub const EXPONENTIAL_BACKOFF_BASE_SECS: u64 = 60;
pub const EXPONENTIAL_BACKOFF_CAP_SECS: u64 = 3600;

// Degradation
pub const MANUAL_OVERRIDE_RULE: &str = "manual_override";
pub const RECOVERY_RULE: &str = "recovery";
pub const DEFAULT_DEGRADATION_HISTORY: usize = 100;

// Health
pub const MAX_UNKNOWN_BEFORE_DEGRADED: usize = 1;
pub const MAX_OPEN_BREAKERS_BEFORE_UNHEALTHY: usize = 2;

#[cfg(test)]
mod tests {
    #[test]
    fn test_constants_available_from_crate_root() {
        assert_eq!(crate::DLQ_MESSAGES_KEY, super::DLQ_MESSAGES_KEY);
        assert_ne!(crate::RECOVERY_RULE, crate::MANUAL_OVERRIDE_RULE);
        assert!(crate::MAX_OPEN_BREAKERS_BEFORE_UNHEALTHY > crate::MAX_UNKNOWN_BEFORE_DEGRADED);
    }
}
