use async_trait::async_trait;
use innkeeper_core::KeyValueStore;
use innkeeper_domain::Result;
use parking_lot::Mutex;
use serde_json::Value;

use super::{fields, increment, remove_field, Hashes};

/// In-process hash store
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    hashes: Mutex<Hashes>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn hget(&self, key: &str, field: &str) -> Result<Option<Value>> {
        Ok(self.hashes.lock().get(key).and_then(|h| h.get(field).cloned()))
    }

    async fn hset(&self, key: &str, field: &str, value: Value) -> Result<()> {
        self.hashes.lock().entry(key.to_string()).or_default().insert(field.to_string(), value);
        Ok(())
    }

    async fn hdel(&self, key: &str, field: &str) -> Result<bool> {
        Ok(remove_field(&mut self.hashes.lock(), key, field))
    }

    async fn hgetall(&self, key: &str) -> Result<Vec<(String, Value)>> {
        Ok(fields(&self.hashes.lock(), key))
    }

    async fn hlen(&self, key: &str) -> Result<usize> {
        Ok(self.hashes.lock().get(key).map_or(0, |h| h.len()))
    }

    async fn hincr(&self, key: &str, field: &str, delta: i64) -> Result<i64> {
        Ok(increment(&mut self.hashes.lock(), key, field, delta)?)
    }

    async fn delete(&self, key: &str) -> Result<usize> {
        Ok(self.hashes.lock().remove(key).map_or(0, |h| h.len()))
    }
}
