//! Testing utilities and helpers
//!
//! - **[`assertions`]**: assertion macros and helpers for errors and timings
//! - **[`async_utils`]**: polling and timeout helpers for async tests
//! - **[`mocks`]**: scripted operations and a classified test error
//!
//! ## Usage
//!
//! ```rust
//! # #[cfg(feature = "runtime")]
//! # {
//! use innkeeper_common::testing::ScriptedOperation;
//!
//! // Fails twice with a "timeout" class error, then succeeds.
//! let op = ScriptedOperation::failing_times(2, "timeout");
//! assert!(op.call_blocking().is_err());
//! # }
//! ```

pub mod assertions;
pub mod async_utils;
pub mod mocks;

pub use assertions::assert_duration_in_range;
pub use async_utils::{poll_until, timeout_ok};
pub use mocks::{ScriptedOperation, TestError};

pub use crate::resilience::{Clock, MockClock, SystemClock};
