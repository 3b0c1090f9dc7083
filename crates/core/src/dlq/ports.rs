//! Port interfaces for the dead-letter queue

use std::sync::Arc;

use async_trait::async_trait;
use innkeeper_domain::{DeadLetterMessage, Result};
use serde_json::Value;

/// Hash-oriented key-value storage
///
/// Each `key` names a hash of `field -> JSON value`. Implementations must be
/// safe for concurrent use; individual operations are atomic.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read one field
    async fn hget(&self, key: &str, field: &str) -> Result<Option<Value>>;

    /// Insert or replace one field
    async fn hset(&self, key: &str, field: &str, value: Value) -> Result<()>;

    /// Remove one field; returns whether it existed
    async fn hdel(&self, key: &str, field: &str) -> Result<bool>;

    /// Every field of a hash, in no particular order
    async fn hgetall(&self, key: &str) -> Result<Vec<(String, Value)>>;

    /// Number of fields in a hash
    async fn hlen(&self, key: &str) -> Result<usize>;

    /// Add `delta` to an integer field (missing counts as 0)
    async fn hincr(&self, key: &str, field: &str, delta: i64) -> Result<i64>;

    /// Remove a whole hash; returns the number of fields removed
    async fn delete(&self, key: &str) -> Result<usize>;
}

/// Replays one kind of dead-lettered work
#[async_trait]
pub trait MessageProcessor: Send + Sync {
    /// Reprocess the message; an error counts as a failed retry
    async fn process(&self, message: &DeadLetterMessage) -> Result<()>;
}

/// Invoked when a message exhausts its retries
pub type FailureCallback = Arc<dyn Fn(&DeadLetterMessage) + Send + Sync>;
