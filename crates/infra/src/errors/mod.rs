//! Infrastructure error types
//!
//! Adapters report failures as [`InfraError`] (a newtype over the domain
//! error) so that port implementations can return the domain `Result`.
//! Storage adapters use the richer [`StoreError`] internally.

mod conversions;

use std::path::PathBuf;

use innkeeper_domain::InnkeeperError;
use thiserror::Error;

pub use conversions::InfraError;

/// Failures inside the key-value store adapters
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Failed to read store file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write store file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Store file {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Field '{field}' of '{key}' is not an integer")]
    NotAnInteger { key: String, field: String },

    #[error("Failed to serialize store contents: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("Store task failed: {0}")]
    TaskFailed(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for InnkeeperError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotAnInteger { .. } => InnkeeperError::InvalidInput(err.to_string()),
            _ => InnkeeperError::Storage(err.to_string()),
        }
    }
}

impl From<StoreError> for InfraError {
    fn from(err: StoreError) -> Self {
        InfraError(err.into())
    }
}

impl From<innkeeper_core::DlqError> for InfraError {
    fn from(err: innkeeper_core::DlqError) -> Self {
        use innkeeper_core::DlqError;

        let domain = match err {
            DlqError::Store(inner) => inner,
            DlqError::NotFound { .. } => InnkeeperError::NotFound(err.to_string()),
            DlqError::InvalidMessageType { .. }
            | DlqError::DuplicateProcessor { .. }
            | DlqError::ClearNotConfirmed => InnkeeperError::InvalidInput(err.to_string()),
            DlqError::Corrupt { .. } => InnkeeperError::Storage(err.to_string()),
        };
        InfraError(domain)
    }
}
