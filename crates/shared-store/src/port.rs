//! Driven port for key-value persistence.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;

/// Key-value store with glob key queries.
///
/// Values are stored as `serde_json::Value`; a read returns a structurally
/// equal value to the one written.
pub trait Store: Send + Sync {
    /// Read a value. Expired entries read as absent.
    fn get(&self, key: &str) -> Option<Value>;

    /// Write a value with no expiry.
    fn set(&self, key: &str, value: Value);

    /// Write a value that expires after `ttl`.
    fn set_with_ttl(&self, key: &str, value: Value, ttl: Duration);

    fn has(&self, key: &str) -> bool;

    /// Remove a key. Returns true if it existed.
    fn delete(&self, key: &str) -> bool;

    /// Live keys matching `pattern` (all keys when `None`), sorted.
    fn keys(&self, pattern: Option<&str>) -> Vec<String>;

    /// All live entries whose key matches `pattern`.
    fn get_many(&self, pattern: &str) -> BTreeMap<String, Value> {
        self.keys(Some(pattern))
            .into_iter()
            .filter_map(|k| self.get(&k).map(|v| (k, v)))
            .collect()
    }

    /// Remove matching keys (all when `None`). Returns how many were removed.
    fn clear(&self, pattern: Option<&str>) -> usize {
        self.keys(pattern)
            .iter()
            .filter(|k| self.delete(k))
            .count()
    }

    fn stats(&self) -> StoreStats;
}

/// Operation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StoreStats {
    pub sets: u64,
    pub gets: u64,
    pub hits: u64,
    pub misses: u64,
    pub deletes: u64,
    pub expirations: u64,
    pub entries: usize,
}
