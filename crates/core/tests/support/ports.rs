//! In-memory port implementations

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use innkeeper_core::degradation::DegradationResult;
use innkeeper_core::{KeyValueStore, MemoryGauge, MessageProcessor};
use innkeeper_domain::{DeadLetterMessage, InnkeeperError, Result as DomainResult};
use parking_lot::Mutex;
use serde_json::Value;

/// Hash store backed by nested maps
#[derive(Default)]
pub struct InMemoryStore {
    hashes: Mutex<HashMap<String, HashMap<String, Value>>>,
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn hget(&self, key: &str, field: &str) -> DomainResult<Option<Value>> {
        Ok(self.hashes.lock().get(key).and_then(|h| h.get(field).cloned()))
    }

    async fn hset(&self, key: &str, field: &str, value: Value) -> DomainResult<()> {
        self.hashes.lock().entry(key.to_string()).or_default().insert(field.to_string(), value);
        Ok(())
    }

    async fn hdel(&self, key: &str, field: &str) -> DomainResult<bool> {
        Ok(self.hashes.lock().get_mut(key).and_then(|h| h.remove(field)).is_some())
    }

    async fn hgetall(&self, key: &str) -> DomainResult<Vec<(String, Value)>> {
        Ok(self
            .hashes
            .lock()
            .get(key)
            .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    async fn hlen(&self, key: &str) -> DomainResult<usize> {
        Ok(self.hashes.lock().get(key).map_or(0, HashMap::len))
    }

    async fn hincr(&self, key: &str, field: &str, delta: i64) -> DomainResult<i64> {
        let mut hashes = self.hashes.lock();
        let slot = hashes
            .entry(key.to_string())
            .or_default()
            .entry(field.to_string())
            .or_insert(Value::from(0));
        let next = slot.as_i64().unwrap_or(0) + delta;
        *slot = Value::from(next);
        Ok(next)
    }

    async fn delete(&self, key: &str) -> DomainResult<usize> {
        Ok(self.hashes.lock().remove(key).map_or(0, |h| h.len()))
    }
}

/// Processor whose outcome is toggled by the test
#[derive(Clone, Default)]
pub struct SwitchProcessor {
    pub healthy: Arc<AtomicBool>,
}

#[async_trait]
impl MessageProcessor for SwitchProcessor {
    async fn process(&self, _message: &DeadLetterMessage) -> DomainResult<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(InnkeeperError::Unavailable("messaging provider returned 503".into()))
        }
    }
}

/// Gauge reporting a fixed percentage
pub struct FixedGauge(pub f64);

impl MemoryGauge for FixedGauge {
    fn usage_percent(&self) -> DegradationResult<f64> {
        Ok(self.0)
    }
}
