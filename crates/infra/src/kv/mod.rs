//! Key-value store adapters for the dead-letter queue
//!
//! - [`MemoryKeyValueStore`]: process-local, lost on restart
//! - [`FileKeyValueStore`]: JSON file rewritten atomically on every mutation

mod file;
mod memory;

use std::collections::BTreeMap;

use serde_json::Value;

pub use file::FileKeyValueStore;
pub use memory::MemoryKeyValueStore;

use crate::errors::{StoreError, StoreResult};

/// `key -> field -> value`
pub(crate) type Hashes = BTreeMap<String, BTreeMap<String, Value>>;

/// Shared `hincr` semantics: a missing field counts as 0, anything other
/// than an integer is rejected
pub(crate) fn increment(hashes: &mut Hashes, key: &str, field: &str, delta: i64) -> StoreResult<i64> {
    let slot =
        hashes.entry(key.to_string()).or_default().entry(field.to_string()).or_insert(Value::from(0));
    let current = slot.as_i64().ok_or_else(|| StoreError::NotAnInteger {
        key: key.to_string(),
        field: field.to_string(),
    })?;
    let next = current.saturating_add(delta);
    *slot = Value::from(next);
    Ok(next)
}

/// Remove a field, dropping the hash once it is empty
pub(crate) fn remove_field(hashes: &mut Hashes, key: &str, field: &str) -> bool {
    let Some(hash) = hashes.get_mut(key) else {
        return false;
    };
    let removed = hash.remove(field).is_some();
    if hash.is_empty() {
        hashes.remove(key);
    }
    removed
}

pub(crate) fn fields(hashes: &Hashes, key: &str) -> Vec<(String, Value)> {
    hashes
        .get(key)
        .map(|h| h.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default()
}
