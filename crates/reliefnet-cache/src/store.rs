use std::sync::Arc;

use chrono::Duration;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use reliefnet_core::Clock;
use reliefnet_storage::{CacheRow, DynCacheStorage};

/// TTL cache over a durable [`reliefnet_storage::CacheStorage`] backend.
///
/// All backend failures are swallowed: a failing read is a miss, a failing
/// write is a no-op. Callers never see a cache error.
#[derive(Clone)]
pub struct CacheStore {
    backend: DynCacheStorage,
    clock: Arc<dyn Clock>,
}

impl CacheStore {
    pub fn new(backend: DynCacheStorage, clock: Arc<dyn Clock>) -> Self {
        Self { backend, clock }
    }

    /// Looks up a cached value.
    ///
    /// Returns `None` for missing keys, expired entries (which are deleted as
    /// a side effect) and backend failures. A value whose expiry has passed
    /// is never returned.
    pub async fn get(&self, key: &str) -> Option<Value> {
        if key.is_empty() {
            return None;
        }

        let row = match self.backend.get_entry(key).await {
            Ok(row) => row?,
            Err(e) => {
                warn!(key, error = %e, "cache read failed; treating as miss");
                return None;
            }
        };

        if row.expires_at <= self.clock.now() {
            debug!(key, "cache entry expired; removing");
            if let Err(e) = self.backend.delete_entry(key).await {
                warn!(key, error = %e, "failed to remove expired cache entry");
            }
            return None;
        }

        Some(row.value)
    }

    /// Looks up and deserializes a cached value. Entries that no longer
    /// deserialize (shape changed between releases) count as misses.
    pub async fn get_as<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let value = self.get(key).await?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                warn!(key, error = %e, "cached value no longer deserializes; ignoring");
                None
            }
        }
    }

    /// Stores a value with the given TTL, overwriting any existing entry for
    /// the key. Failures are logged and swallowed.
    pub async fn set(&self, key: &str, value: Value, ttl: Duration) {
        if key.is_empty() {
            return;
        }

        let row = CacheRow {
            key: key.to_string(),
            value,
            expires_at: self.clock.now() + ttl,
        };
        if let Err(e) = self.backend.put_entry(row).await {
            warn!(key, error = %e, "cache write failed; continuing without cache");
        }
    }

    /// Serializes and stores a value. Failures are logged and swallowed.
    pub async fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Duration) {
        match serde_json::to_value(value) {
            Ok(json) => self.set(key, json, ttl).await,
            Err(e) => warn!(key, error = %e, "failed to serialize value for cache"),
        }
    }

    /// Removes an entry. Failures are logged and swallowed.
    pub async fn delete(&self, key: &str) {
        if let Err(e) = self.backend.delete_entry(key).await {
            warn!(key, error = %e, "cache delete failed");
        }
    }

    /// Deletes all entries whose expiry has passed, returning how many were
    /// removed. Idempotent; safe to run concurrently with get/set traffic.
    pub async fn cleanup(&self) -> u64 {
        match self.backend.delete_expired(self.clock.now()).await {
            Ok(removed) => {
                if removed > 0 {
                    debug!(removed, "cache cleanup removed expired entries");
                }
                removed
            }
            Err(e) => {
                warn!(error = %e, "cache cleanup failed");
                0
            }
        }
    }
}
