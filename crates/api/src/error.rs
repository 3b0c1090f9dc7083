//! HTTP error responses for the admin routes

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use innkeeper_core::{DlqError, HealthError};
use innkeeper_domain::InnkeeperError;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Errors returned by admin handlers
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(String),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            ApiError::NotFound(message) => (StatusCode::NOT_FOUND, "NOT_FOUND", message),
            ApiError::BadRequest(message) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", message),
            ApiError::Internal(message) => {
                error!(error = %message, "Admin request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", message)
            }
        };

        (status, Json(json!({ "error": { "code": code, "message": message } }))).into_response()
    }
}

/* -------------------------------------------------------------------------- */
/* Conversions                                                                */
/* -------------------------------------------------------------------------- */

impl From<InnkeeperError> for ApiError {
    fn from(err: InnkeeperError) -> Self {
        match err {
            InnkeeperError::NotFound(message) => ApiError::NotFound(message),
            InnkeeperError::InvalidInput(message) | InnkeeperError::Config(message) => {
                ApiError::BadRequest(message)
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<DlqError> for ApiError {
    fn from(err: DlqError) -> Self {
        match err {
            DlqError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            DlqError::InvalidMessageType { .. }
            | DlqError::DuplicateProcessor { .. }
            | DlqError::ClearNotConfirmed => ApiError::BadRequest(err.to_string()),
            DlqError::Store(inner) => inner.into(),
            DlqError::Corrupt { .. } => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<HealthError> for ApiError {
    fn from(err: HealthError) -> Self {
        match err {
            HealthError::UnknownProbe { .. } => ApiError::NotFound(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}
