//! Dead-letter queue and recovery
//!
//! Failed work is stored as [`DeadLetterMessage`]s in a [`KeyValueStore`]
//! and replayed through processors registered per message type. The
//! [`RecoveryProcessor`] picks a strategy per failure reason.
//!
//! [`DeadLetterMessage`]: innkeeper_domain::DeadLetterMessage

pub mod classifier;
pub mod ports;
pub mod queue;
pub mod recovery;

use innkeeper_domain::InnkeeperError;
use thiserror::Error;

pub use classifier::{reason_for_error_class, FailureClassifier, KeywordClassifier};
pub use ports::{FailureCallback, KeyValueStore, MessageProcessor};
pub use queue::DeadLetterQueue;
pub use recovery::{RecoveryOutcome, RecoveryProcessor};

/// Dead-letter queue errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DlqError {
    #[error("Invalid message type: {message}")]
    InvalidMessageType { message: String },

    #[error("A processor is already registered for message type '{message_type}'")]
    DuplicateProcessor { message_type: String },

    #[error("Dead-letter message '{id}' not found")]
    NotFound { id: String },

    #[error("Refusing to clear the dead-letter queue without confirmation")]
    ClearNotConfirmed,

    #[error("Corrupt dead-letter record '{id}': {message}")]
    Corrupt { id: String, message: String },

    #[error(transparent)]
    Store(#[from] InnkeeperError),
}

pub type DlqResult<T> = Result<T, DlqError>;

impl From<DlqError> for crate::fallback::FallbackError {
    fn from(err: DlqError) -> Self {
        Self::Sink { message: err.to_string() }
    }
}
