//! Tracing initialisation
//!
//! Installs the global `tracing` subscriber once at process start. The
//! filter comes from `RUST_LOG` when set and from [`LoggingConfig::level`]
//! otherwise; the output is human-readable or one JSON object per line.

use innkeeper_domain::{InnkeeperError, LogFormat, LoggingConfig, Result};
use tracing_subscriber::EnvFilter;

/// Build the filter: `RUST_LOG` wins over the configured level
///
/// # Errors
/// Returns `InnkeeperError::Config` if the configured directive is invalid.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level).map_err(|e| {
            InnkeeperError::Config(format!("Invalid log level '{}': {}", config.level, e))
        }),
    }
}

/// Install the global subscriber
///
/// # Errors
/// Returns `InnkeeperError::Config` for an invalid level and
/// `InnkeeperError::Internal` if a subscriber is already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    let installed = match config.format {
        LogFormat::Json => builder.json().with_current_span(true).try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    installed
        .map_err(|e| InnkeeperError::Internal(format!("Failed to install tracing subscriber: {e}")))?;

    tracing::debug!(level = %config.level, format = %config.format, "Tracing initialised");
    Ok(())
}
