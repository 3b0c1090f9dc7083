//! Integration tests for `innkeeper_common::error`.
//!
//! Validates classification and module error delegation so downstream
//! services receive consistent failure semantics.

use std::time::Duration;

use innkeeper_common::error::{CommonError, ErrorClassification, ErrorSeverity};
use innkeeper_common::{impl_error_classification, impl_error_conversion};
use thiserror::Error;

/// Validates that `CommonError` classification surfaces the expected
/// retryable, severity and criticality combinations for each variant.
#[test]
fn classification_matrix_matches_expected_contract() {
    let cases = vec![
        (CommonError::config("missing api key"), false, ErrorSeverity::Error, false),
        (CommonError::lock_resource("dlq", "contended"), true, ErrorSeverity::Warning, false),
        (
            CommonError::circuit_breaker("messaging", Some(Duration::from_secs(5))),
            true,
            ErrorSeverity::Warning,
            false,
        ),
        (CommonError::serialization_format("JSON", "eof"), false, ErrorSeverity::Error, false),
        (CommonError::persistence_op("write", "disk full"), false, ErrorSeverity::Error, false),
        (CommonError::timeout("probe", Duration::from_secs(2)), true, ErrorSeverity::Warning, false),
        (CommonError::backend("ai", "503", true), true, ErrorSeverity::Error, false),
        (CommonError::validation("phone", "not E.164"), false, ErrorSeverity::Error, false),
        (CommonError::not_found_with_id("message", "abc"), false, ErrorSeverity::Info, false),
        (CommonError::internal("invariant"), false, ErrorSeverity::Critical, true),
        (CommonError::task_cancelled("monitor", "shutdown"), false, ErrorSeverity::Info, false),
    ];

    for (err, retryable, severity, critical) in cases {
        assert_eq!(err.is_retryable(), retryable, "retryable mismatch for {err}");
        assert_eq!(err.severity(), severity, "severity mismatch for {err}");
        assert_eq!(err.is_critical(), critical, "critical mismatch for {err}");
    }
}

#[derive(Debug, Error)]
enum QueueError {
    #[error("queue is full ({0} messages)")]
    Full(usize),

    #[error("message is malformed: {0}")]
    Malformed(String),

    #[error(transparent)]
    Common(#[from] CommonError),
}

impl_error_conversion!(QueueError, Common);

impl_error_classification!(
    QueueError,
    Common,
    QueueError::Full(_) => {
        retryable: true,
        severity: ErrorSeverity::Warning,
        critical: false,
        retry_after: Some(Duration::from_secs(1)),
    },
    QueueError::Malformed(_) => {
        retryable: false,
        severity: ErrorSeverity::Error,
        critical: false,
    },
);

/// Validates module errors delegate to the embedded `CommonError` and use
/// their own classification for module-specific variants.
#[test]
fn module_errors_delegate_classification() {
    let full = QueueError::Full(1000);
    assert!(full.is_retryable());
    assert_eq!(full.retry_after(), Some(Duration::from_secs(1)));

    let malformed = QueueError::Malformed("missing id".into());
    assert!(!malformed.is_retryable());
    assert_eq!(malformed.retry_after(), None);

    let delegated = QueueError::from(CommonError::internal("boom"));
    assert!(delegated.is_critical());
}

/// Validates the generated conversions from JSON and IO errors.
#[test]
fn module_errors_convert_from_json_and_io() {
    let parse: Result<serde_json::Value, _> = serde_json::from_str("{");
    let json = QueueError::from(parse.unwrap_err());
    assert!(matches!(json, QueueError::Common(CommonError::Serialization { .. })));

    let io = QueueError::from(std::io::Error::new(std::io::ErrorKind::TimedOut, "slow disk"));
    assert!(io.is_retryable());
}
