//! Fallback responses for degraded capabilities

pub mod ports;
pub mod provider;

use thiserror::Error;

pub use ports::{DeferredWorkSink, FallbackHandler};
pub use provider::{DatabaseOperation, FallbackProvider};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FallbackError {
    #[error("Fallback handler failed: {message}")]
    Handler { message: String },

    #[error("Deferred work could not be stored: {message}")]
    Sink { message: String },
}
