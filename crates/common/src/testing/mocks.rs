//! Mock operations for exercising resilience components

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::resilience::ErrorClass;

/// Error with an explicit failure class
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{class}: {message}")]
pub struct TestError {
    pub class: String,
    pub message: String,
}

impl TestError {
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self { class: class.into(), message: message.into() }
    }
}

impl ErrorClass for TestError {
    fn error_class(&self) -> &str {
        &self.class
    }
}

/// Operation that fails a fixed number of times, then succeeds
///
/// Clones share the call counter.
#[derive(Debug, Clone)]
pub struct ScriptedOperation {
    failures: u32,
    class: String,
    calls: Arc<AtomicU32>,
}

impl ScriptedOperation {
    /// Fail `failures` times with errors of `class`, then succeed
    pub fn failing_times(failures: u32, class: impl Into<String>) -> Self {
        Self { failures, class: class.into(), calls: Arc::new(AtomicU32::new(0)) }
    }

    /// Never fail
    pub fn always_ok() -> Self {
        Self::failing_times(0, "none")
    }

    /// Always fail with errors of `class`
    pub fn always_failing(class: impl Into<String>) -> Self {
        Self::failing_times(u32::MAX, class)
    }

    /// Number of calls made so far
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// Run one attempt synchronously, returning the 1-based call number
    pub fn call_blocking(&self) -> Result<u32, TestError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if call <= self.failures {
            Err(TestError::new(self.class.clone(), format!("scripted failure #{call}")))
        } else {
            Ok(call)
        }
    }

    /// Run one attempt asynchronously
    pub async fn call(&self) -> Result<u32, TestError> {
        tokio::task::yield_now().await;
        self.call_blocking()
    }
}
