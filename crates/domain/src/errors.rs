//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for Innkeeper
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum InnkeeperError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Dependency unavailable: {0}")]
    Unavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Result type alias for Innkeeper operations
pub type Result<T> = std::result::Result<T, InnkeeperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serializes_with_type_tag() {
        let err = InnkeeperError::Config("missing dlq path".into());
        let json = serde_json::to_value(&err).unwrap();

        assert_eq!(json["type"], "Config");
        assert_eq!(json["message"], "missing dlq path");
        assert_eq!(err.to_string(), "Configuration error: missing dlq path");
    }
}
