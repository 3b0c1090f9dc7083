//! Conversions from external infrastructure errors into domain errors.

use innkeeper_domain::InnkeeperError;
use reqwest::Error as HttpError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub InnkeeperError);

impl std::fmt::Display for InfraError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::error::Error for InfraError {}

impl From<InfraError> for InnkeeperError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<InnkeeperError> for InfraError {
    fn from(value: InnkeeperError) -> Self {
        InfraError(value)
    }
}

trait IntoInnkeeperError {
    fn into_innkeeper(self) -> InnkeeperError;
}

/* -------------------------------------------------------------------------- */
/* std::io::Error → InnkeeperError */
/* -------------------------------------------------------------------------- */

impl IntoInnkeeperError for std::io::Error {
    fn into_innkeeper(self) -> InnkeeperError {
        use std::io::ErrorKind;

        match self.kind() {
            ErrorKind::NotFound => InnkeeperError::NotFound(self.to_string()),
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::TimedOut => InnkeeperError::Unavailable(self.to_string()),
            ErrorKind::InvalidInput | ErrorKind::InvalidData => {
                InnkeeperError::InvalidInput(self.to_string())
            }
            _ => InnkeeperError::Storage(self.to_string()),
        }
    }
}

impl From<std::io::Error> for InfraError {
    fn from(value: std::io::Error) -> Self {
        InfraError(value.into_innkeeper())
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → InnkeeperError */
/* -------------------------------------------------------------------------- */

impl IntoInnkeeperError for HttpError {
    fn into_innkeeper(self) -> InnkeeperError {
        if self.is_timeout() {
            return InnkeeperError::Unavailable("HTTP request timed out".into());
        }

        if self.is_connect() {
            return InnkeeperError::Unavailable("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => InnkeeperError::NotFound(message),
                400..=499 if code != 429 => InnkeeperError::InvalidInput(message),
                _ => InnkeeperError::Unavailable(message),
            };
        }

        InnkeeperError::Unavailable(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_innkeeper())
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
