//! Port interfaces for fallback handling

use async_trait::async_trait;
use innkeeper_domain::ServiceKind;
use serde_json::Value;

use super::FallbackError;

/// Substitute implementation registered for one service
#[async_trait]
pub trait FallbackHandler: Send + Sync {
    /// Produce a best-effort result for the failed operation
    async fn handle(&self, context: &Value) -> Result<Value, FallbackError>;
}

/// Destination for writes that must be replayed once the service recovers
#[async_trait]
pub trait DeferredWorkSink: Send + Sync {
    /// Store `envelope` for later processing; returns the storage id
    async fn defer(&self, service: ServiceKind, envelope: Value) -> Result<String, FallbackError>;
}
