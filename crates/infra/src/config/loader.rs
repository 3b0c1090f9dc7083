//! Configuration loader
//!
//! Builds an [`InnkeeperConfig`] from defaults, an optional file and the
//! environment.
//!
//! ## Loading Strategy
//! 1. Loads `.env` into the process environment (if present)
//! 2. Reads the config file from the explicit path, `INNKEEPER_CONFIG`, or
//!    the first file found by [`probe_config_paths`]; with no file the
//!    defaults are used
//! 3. Applies `INNKEEPER_*` environment overrides
//! 4. Validates the result
//!
//! ## Environment Variables
//! - `INNKEEPER_CONFIG`: Config file path
//! - `INNKEEPER_BIND_ADDRESS`: Admin server bind address
//! - `INNKEEPER_LOG_LEVEL`: Default log filter
//! - `INNKEEPER_LOG_FORMAT`: `pretty` or `json`
//! - `INNKEEPER_CB_FAILURE_THRESHOLD`: Breaker failure threshold
//! - `INNKEEPER_CB_RECOVERY_TIMEOUT_SECS`: Breaker recovery timeout
//! - `INNKEEPER_RETRY_MAX_RETRIES`: Retry attempts after the first call
//! - `INNKEEPER_DEGRADATION_INTERVAL_SECS`: Rule evaluation interval
//! - `INNKEEPER_MEMORY_THRESHOLD_PERCENT`: High-memory rule threshold
//! - `INNKEEPER_DLQ_STORE_PATH`: File-backed DLQ store (in-memory when unset)
//! - `INNKEEPER_DLQ_CONCURRENCY`: Concurrent DLQ retries
//! - `INNKEEPER_DLQ_RECOVERY_INTERVAL_SECS`: Recovery scan interval
//! - `INNKEEPER_MONITOR_INTERVAL_SECS`: Dependency check interval
//! - `INNKEEPER_STARTUP_CHECKS`: Whether startup gating runs (true/false)
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./innkeeper.toml` or `./innkeeper.json` (current working directory)
//! 2. `./config.toml` or `./config.json` (current working directory)
//! 3. `./config/innkeeper.toml` or `./config/innkeeper.json`
//! 4. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use innkeeper_domain::{InnkeeperConfig, InnkeeperError, LogFormat, Result};

const FILE_NAMES: [&str; 4] = ["innkeeper.toml", "innkeeper.json", "config.toml", "config.json"];

/// Load configuration with the full fallback strategy
///
/// # Errors
/// Returns `InnkeeperError::Config` if:
/// - An explicitly named file does not exist or cannot be parsed
/// - An environment override has an invalid value
/// - The merged configuration fails validation
pub fn load(path: Option<PathBuf>) -> Result<InnkeeperConfig> {
    match dotenvy::dotenv() {
        Ok(env_path) => tracing::debug!(path = %env_path.display(), "Loaded .env file"),
        Err(e) if e.not_found() => {}
        Err(e) => tracing::warn!(error = %e, "Ignoring unreadable .env file"),
    }

    let explicit = path.or_else(|| std::env::var("INNKEEPER_CONFIG").ok().map(PathBuf::from));
    let mut config = match explicit.or_else(probe_config_paths) {
        Some(path) => load_from_file(&path)?,
        None => {
            tracing::info!("No config file found, using defaults");
            InnkeeperConfig::default()
        }
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// Format is detected by extension (`.toml` or `.json`). Missing sections
/// and fields take their defaults.
///
/// # Errors
/// Returns `InnkeeperError::Config` if the file is missing, unreadable or
/// malformed.
pub fn load_from_file(path: &Path) -> Result<InnkeeperConfig> {
    if !path.exists() {
        return Err(InnkeeperError::Config(format!("Config file not found: {}", path.display())));
    }

    tracing::info!(path = %path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(path)
        .map_err(|e| InnkeeperError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, path)
}

/// Parse configuration from string content
fn parse_config(contents: &str, path: &Path) -> Result<InnkeeperConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| InnkeeperError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| InnkeeperError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(InnkeeperError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd.join("config"));
        dirs.insert(0, cwd);
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            dirs.push(exe_dir.to_path_buf());
        }
    }

    dirs.iter().flat_map(|dir| FILE_NAMES.iter().map(move |name| dir.join(name))).find(|p| p.exists())
}

/// Apply `INNKEEPER_*` variables from the process environment
///
/// # Errors
/// Returns `InnkeeperError::Config` naming the variable with a bad value.
pub fn apply_env_overrides(config: &mut InnkeeperConfig) -> Result<()> {
    apply_overrides_from(config, |key| std::env::var(key).ok())
}

fn apply_overrides_from(
    config: &mut InnkeeperConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<()> {
    if let Some(value) = lookup("INNKEEPER_BIND_ADDRESS") {
        config.server.bind_address = value;
    }
    if let Some(value) = lookup("INNKEEPER_LOG_LEVEL") {
        config.logging.level = value;
    }
    if let Some(value) = lookup("INNKEEPER_LOG_FORMAT") {
        config.logging.format = LogFormat::from_str(&value).map_err(InnkeeperError::Config)?;
    }

    override_parsed(&lookup, "INNKEEPER_CB_FAILURE_THRESHOLD", &mut config.circuit_breaker.failure_threshold)?;
    override_parsed(
        &lookup,
        "INNKEEPER_CB_RECOVERY_TIMEOUT_SECS",
        &mut config.circuit_breaker.recovery_timeout_secs,
    )?;
    override_parsed(&lookup, "INNKEEPER_RETRY_MAX_RETRIES", &mut config.retry.max_retries)?;
    override_parsed(
        &lookup,
        "INNKEEPER_DEGRADATION_INTERVAL_SECS",
        &mut config.degradation.evaluation_interval_secs,
    )?;
    override_parsed(
        &lookup,
        "INNKEEPER_MEMORY_THRESHOLD_PERCENT",
        &mut config.degradation.memory_threshold_percent,
    )?;

    if let Some(value) = lookup("INNKEEPER_DLQ_STORE_PATH") {
        config.dlq.store_path = (!value.trim().is_empty()).then_some(value);
    }
    override_parsed(&lookup, "INNKEEPER_DLQ_CONCURRENCY", &mut config.dlq.concurrency)?;
    override_parsed(
        &lookup,
        "INNKEEPER_DLQ_RECOVERY_INTERVAL_SECS",
        &mut config.dlq.recovery_interval_secs,
    )?;
    override_parsed(&lookup, "INNKEEPER_MONITOR_INTERVAL_SECS", &mut config.monitor.interval_secs)?;

    if let Some(value) = lookup("INNKEEPER_STARTUP_CHECKS") {
        config.monitor.startup_checks = parse_bool(&value);
    }

    Ok(())
}

fn override_parsed<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
    slot: &mut T,
) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    if let Some(value) = lookup(key) {
        *slot = value
            .trim()
            .parse()
            .map_err(|e| InnkeeperError::Config(format!("Invalid value for {}: {}", key, e)))?;
    }
    Ok(())
}

/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn parse_bool(value: &str) -> bool {
    matches!(value.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;
    use std::sync::Mutex;

    use innkeeper_domain::{DependencyPriority, ProbeKind};
    use tempfile::NamedTempFile;

    use super::*;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> =
            vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| vars.get(key).cloned()
    }

    fn temp_config(contents: &str, extension: &str) -> (NamedTempFile, PathBuf) {
        let mut file = tempfile::Builder::new().suffix(&format!(".{extension}")).tempfile().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        let path = file.path().to_path_buf();
        (file, path)
    }

    #[test]
    fn test_parse_bool() {
        for value in ["1", "true", "YES", "On"] {
            assert!(parse_bool(value), "{value} should parse as true");
        }
        for value in ["0", "false", "no", "off", "maybe"] {
            assert!(!parse_bool(value), "{value} should parse as false");
        }
    }

    #[test]
    fn test_overrides_apply_typed_values() {
        let mut config = InnkeeperConfig::default();
        apply_overrides_from(
            &mut config,
            lookup(&[
                ("INNKEEPER_BIND_ADDRESS", "0.0.0.0:9000"),
                ("INNKEEPER_LOG_FORMAT", "JSON"),
                ("INNKEEPER_CB_FAILURE_THRESHOLD", "7"),
                ("INNKEEPER_MEMORY_THRESHOLD_PERCENT", "75.5"),
                ("INNKEEPER_DLQ_STORE_PATH", "/var/lib/innkeeper/dlq.json"),
                ("INNKEEPER_STARTUP_CHECKS", "off"),
            ]),
        )
        .unwrap();

        assert_eq!(config.server.bind_address, "0.0.0.0:9000");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.circuit_breaker.failure_threshold, 7);
        assert_eq!(config.degradation.memory_threshold_percent, 75.5);
        assert_eq!(config.dlq.store_path.as_deref(), Some("/var/lib/innkeeper/dlq.json"));
        assert!(!config.monitor.startup_checks);
    }

    #[test]
    fn test_invalid_override_names_variable() {
        let mut config = InnkeeperConfig::default();
        let err = apply_overrides_from(
            &mut config,
            lookup(&[("INNKEEPER_DLQ_CONCURRENCY", "many")]),
        )
        .unwrap_err();

        match err {
            InnkeeperError::Config(message) => {
                assert!(message.contains("INNKEEPER_DLQ_CONCURRENCY"))
            }
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_empty_store_path_means_memory() {
        let mut config = InnkeeperConfig::default();
        config.dlq.store_path = Some("dlq.json".into());
        apply_overrides_from(&mut config, lookup(&[("INNKEEPER_DLQ_STORE_PATH", " ")])).unwrap();
        assert!(config.dlq.store_path.is_none());
    }

    #[test]
    fn test_load_from_file_toml() {
        let (_file, path) = temp_config(
            r#"
[server]
bind_address = "127.0.0.1:9100"

[dlq]
batch_size = 25

[[dependencies]]
name = "database"
kind = "tcp"
target = "127.0.0.1:5432"
priority = "critical"
required_for_startup = true
"#,
            "toml",
        );

        let config = load_from_file(&path).unwrap();

        assert_eq!(config.server.bind_address, "127.0.0.1:9100");
        assert_eq!(config.dlq.batch_size, 25);
        assert_eq!(config.dlq.concurrency, InnkeeperConfig::default().dlq.concurrency);
        assert_eq!(config.dependencies.len(), 1);
        assert_eq!(config.dependencies[0].kind, ProbeKind::Tcp);
        assert_eq!(config.dependencies[0].priority, DependencyPriority::Critical);
    }

    #[test]
    fn test_load_from_file_json() {
        let (_file, path) =
            temp_config(r#"{ "logging": { "level": "debug", "format": "json" } }"#, "json");

        let config = load_from_file(&path).unwrap();

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_from_file_errors() {
        assert!(matches!(
            load_from_file(Path::new("/nonexistent/innkeeper.toml")),
            Err(InnkeeperError::Config(_))
        ));

        let (_file, path) = temp_config("{ \"server\": ", "json");
        assert!(matches!(load_from_file(&path), Err(InnkeeperError::Config(_))));

        let (_file, path) = temp_config("server: {}", "yaml");
        assert!(matches!(load_from_file(&path), Err(InnkeeperError::Config(_))));
    }

    /// Validates the full strategy with an explicit file and a process
    /// environment override, then rejects an invalid merged result.
    #[test]
    fn test_load_merges_file_and_env() {
        let _guard = ENV_LOCK.lock().unwrap();
        let (_file, path) = temp_config("[monitor]\ninterval_secs = 45\n", "toml");

        std::env::set_var("INNKEEPER_MONITOR_INTERVAL_SECS", "12");
        let config = load(Some(path.clone()));
        std::env::remove_var("INNKEEPER_MONITOR_INTERVAL_SECS");
        assert_eq!(config.unwrap().monitor.interval_secs, 12);

        std::env::set_var("INNKEEPER_DLQ_CONCURRENCY", "0");
        let invalid = load(Some(path));
        std::env::remove_var("INNKEEPER_DLQ_CONCURRENCY");
        assert!(matches!(invalid, Err(InnkeeperError::Config(_))));
    }
}
