//! Storage traits for the ReliefNet storage abstraction layer.
//!
//! This module defines the core traits that all storage backends must
//! implement. Implementations must be thread-safe (`Send + Sync`) and must
//! tolerate concurrent access without coordination from callers; upsert
//! atomicity is the backend's responsibility.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::StorageError;
use crate::types::{CacheRow, RecordPage, RecordQuery, StoredRecord};

/// Row-oriented access over named collections.
///
/// # Example
///
/// ```ignore
/// use reliefnet_storage::{RecordStore, RecordQuery, StorageError};
///
/// async fn disaster_exists(store: &dyn RecordStore, id: &str) -> Result<bool, StorageError> {
///     Ok(store.get("disasters", id).await?.is_some())
/// }
/// ```
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts a new record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::AlreadyExists` if a record with the same
    /// collection and ID exists. Returns `StorageError::UnknownCollection`
    /// for collections the backend does not manage.
    async fn insert(&self, collection: &str, record: StoredRecord)
    -> Result<(), StorageError>;

    /// Reads a record by collection and ID.
    ///
    /// Returns `None` if the record does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing
    /// records.
    async fn get(&self, collection: &str, id: &str)
    -> Result<Option<StoredRecord>, StorageError>;

    /// Replaces the body of an existing record.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        body: Value,
    ) -> Result<StoredRecord, StorageError>;

    /// Deletes a record by collection and ID.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the record does not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError>;

    /// Queries a collection with filter, sort and pagination semantics.
    ///
    /// # Errors
    ///
    /// Returns an error for infrastructure issues or unknown collections.
    async fn query(
        &self,
        collection: &str,
        query: &RecordQuery,
    ) -> Result<RecordPage, StorageError>;

    /// Returns the name of this storage backend for logging/debugging.
    fn backend_name(&self) -> &'static str;
}

/// Raw access to the durable cache table.
///
/// The cache policy layer (`reliefnet-cache`) owns expiry semantics and error
/// swallowing; this trait reports failures honestly and returns expired rows
/// unchanged.
#[async_trait]
pub trait CacheStorage: Send + Sync {
    /// Reads a cache row by key, expired or not.
    async fn get_entry(&self, key: &str) -> Result<Option<CacheRow>, StorageError>;

    /// Upserts a cache row. A second write to the same key replaces the
    /// previous value and expiry atomically.
    async fn put_entry(&self, row: CacheRow) -> Result<(), StorageError>;

    /// Deletes a cache row. Deleting a missing key is not an error.
    async fn delete_entry(&self, key: &str) -> Result<(), StorageError>;

    /// Deletes every row with `expires_at < cutoff`, returning the number of
    /// rows removed. Idempotent; safe to run concurrently with get/put.
    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError>;
}
