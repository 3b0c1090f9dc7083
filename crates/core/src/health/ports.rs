//! Port interfaces for dependency health checks

use async_trait::async_trait;
use innkeeper_domain::HealthCheckResult;

/// Checks one dependency
///
/// Implementations report failures through the returned result rather than
/// panicking; the aggregator still isolates panics and enforces a timeout.
#[async_trait]
pub trait HealthProbe: Send + Sync {
    async fn check(&self) -> HealthCheckResult;
}
