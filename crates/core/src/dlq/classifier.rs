//! Failure classification for dead-lettered work

use innkeeper_domain::FailureReason;

/// Maps a failure to a [`FailureReason`]
pub trait FailureClassifier: Send + Sync {
    fn classify(&self, error: &str) -> FailureReason;
}

/// Classifies by keywords in the error message (case-insensitive)
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl FailureClassifier for KeywordClassifier {
    fn classify(&self, error: &str) -> FailureReason {
        let error = error.to_lowercase();

        if error.contains("timeout") || error.contains("timed out") {
            FailureReason::Timeout
        } else if error.contains("connection") {
            FailureReason::ConnectionError
        } else if error.contains("validation") {
            FailureReason::ValidationError
        } else if error.contains("rate") && error.contains("limit") {
            FailureReason::RateLimit
        } else if error.contains("unavailable") || error.contains("503") {
            FailureReason::ServiceUnavailable
        } else {
            FailureReason::Unknown
        }
    }
}

/// Map an `ErrorClass` name to a failure reason
///
/// Lets callers holding structured errors skip keyword matching.
pub fn reason_for_error_class(class: &str) -> FailureReason {
    match class {
        "timeout" => FailureReason::Timeout,
        "connection" => FailureReason::ConnectionError,
        "validation" => FailureReason::ValidationError,
        "rate_limit" | "rate_limit_exceeded" => FailureReason::RateLimit,
        "circuit_open" | "circuit_breaker_open" | "unavailable" => {
            FailureReason::ServiceUnavailable
        }
        "backend" | "internal" | "serialization" | "persistence" => FailureReason::ProcessingError,
        _ => FailureReason::Unknown,
    }
}
