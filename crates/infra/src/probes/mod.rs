//! Built-in dependency health probes
//!
//! [`TcpProbe`] checks that a socket accepts connections; [`HttpProbe`]
//! checks that an endpoint answers with a success status. Both implement
//! the core [`HealthProbe`] port and are built from configuration with
//! [`dependency_from_config`].

mod http;
mod tcp;

use std::sync::Arc;
use std::time::Duration;

use innkeeper_core::{DependencyDefinition, HealthProbe};
use innkeeper_domain::{DependencyConfig, ProbeKind, Result};

pub use http::HttpProbe;
pub use tcp::TcpProbe;

/// Build the probe described by `config`
///
/// `default_timeout` applies when the dependency does not set its own.
pub fn probe_from_config(
    config: &DependencyConfig,
    default_timeout: Duration,
) -> Result<Arc<dyn HealthProbe>> {
    let timeout = config.timeout_ms.map_or(default_timeout, Duration::from_millis);
    Ok(match config.kind {
        ProbeKind::Tcp => Arc::new(TcpProbe::new(config.target.clone(), timeout)),
        ProbeKind::Http => Arc::new(HttpProbe::new(config.target.clone(), timeout)?),
    })
}

/// Build the monitor registration for one configured dependency
pub fn dependency_from_config(
    config: &DependencyConfig,
    default_timeout: Duration,
) -> Result<DependencyDefinition> {
    Ok(DependencyDefinition {
        name: config.name.clone(),
        probe: probe_from_config(config, default_timeout)?,
        priority: config.priority,
        timeout: config.timeout_ms.map(Duration::from_millis),
        required_for_startup: config.required_for_startup,
    })
}

#[cfg(test)]
mod tests {
    use innkeeper_domain::DependencyPriority;

    use super::*;

    #[test]
    fn test_dependency_from_config_copies_settings() {
        let config = DependencyConfig {
            name: "database".into(),
            kind: ProbeKind::Tcp,
            target: "127.0.0.1:5432".into(),
            priority: DependencyPriority::Critical,
            timeout_ms: Some(750),
            required_for_startup: true,
        };

        let definition = dependency_from_config(&config, Duration::from_secs(5)).unwrap();

        assert_eq!(definition.name, "database");
        assert_eq!(definition.priority, DependencyPriority::Critical);
        assert_eq!(definition.timeout, Some(Duration::from_millis(750)));
        assert!(definition.required_for_startup);
    }
}
