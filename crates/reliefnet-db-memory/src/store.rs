use std::cmp::Ordering;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::Value;

use reliefnet_storage::{
    CacheRow, CacheStorage, RecordPage, RecordQuery, RecordStore, SortOrder, StorageError,
    StoredRecord, collections,
};

type StorageKey = String; // Format: "collection/id"

fn make_key(collection: &str, id: &str) -> StorageKey {
    format!("{collection}/{id}")
}

/// In-memory implementation of [`RecordStore`] and [`CacheStorage`].
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: DashMap<StorageKey, StoredRecord>,
    cache: DashMap<String, CacheRow>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_collection(collection: &str) -> Result<(), StorageError> {
        if collections::is_known(collection) {
            Ok(())
        } else {
            Err(StorageError::unknown_collection(collection))
        }
    }
}

/// True when a record body matches an equality filter. Array fields match
/// when they contain the filter value, so tag filters behave like the
/// relational backend's array-contains queries.
fn matches_filter(body: &Value, field: &str, expected: &Value) -> bool {
    match body.get(field) {
        Some(Value::Array(items)) => items.contains(expected),
        Some(actual) => actual == expected,
        None => false,
    }
}

fn compare_values(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        _ => Ordering::Equal,
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert(&self, collection: &str, record: StoredRecord) -> Result<(), StorageError> {
        Self::check_collection(collection)?;
        let key = make_key(collection, &record.id);
        match self.records.entry(key) {
            dashmap::mapref::entry::Entry::Occupied(_) => {
                Err(StorageError::already_exists(collection, &record.id))
            }
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(record);
                Ok(())
            }
        }
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredRecord>, StorageError> {
        Self::check_collection(collection)?;
        Ok(self
            .records
            .get(&make_key(collection, id))
            .map(|entry| entry.clone()))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        body: Value,
    ) -> Result<StoredRecord, StorageError> {
        Self::check_collection(collection)?;
        let key = make_key(collection, id);
        match self.records.get_mut(&key) {
            Some(mut entry) => {
                entry.body = body;
                entry.updated_at = Utc::now();
                Ok(entry.clone())
            }
            None => Err(StorageError::not_found(collection, id)),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError> {
        Self::check_collection(collection)?;
        self.records
            .remove(&make_key(collection, id))
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found(collection, id))
    }

    async fn query(
        &self,
        collection: &str,
        query: &RecordQuery,
    ) -> Result<RecordPage, StorageError> {
        Self::check_collection(collection)?;
        let prefix = format!("{collection}/");

        let mut matching: Vec<StoredRecord> = self
            .records
            .iter()
            .filter(|entry| entry.key().starts_with(&prefix))
            .filter(|entry| {
                query
                    .filters
                    .iter()
                    .all(|(field, expected)| matches_filter(&entry.body, field, expected))
            })
            .map(|entry| entry.clone())
            .collect();

        matching.sort_by(|a, b| {
            let ordering = match &query.sort_by {
                Some(field) => {
                    let av = a.body.get(field).unwrap_or(&Value::Null);
                    let bv = b.body.get(field).unwrap_or(&Value::Null);
                    compare_values(av, bv)
                }
                None => a.created_at.cmp(&b.created_at),
            };
            match query.sort_order {
                SortOrder::Asc => ordering,
                SortOrder::Desc => ordering.reverse(),
            }
        });

        let total = matching.len();
        let entries: Vec<StoredRecord> = matching
            .into_iter()
            .skip(query.offset)
            .take(query.limit.unwrap_or(usize::MAX))
            .collect();
        let has_more = query.offset + entries.len() < total;

        Ok(RecordPage {
            entries,
            total,
            has_more,
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[async_trait]
impl CacheStorage for MemoryStore {
    async fn get_entry(&self, key: &str) -> Result<Option<CacheRow>, StorageError> {
        Ok(self.cache.get(key).map(|entry| entry.clone()))
    }

    async fn put_entry(&self, row: CacheRow) -> Result<(), StorageError> {
        self.cache.insert(row.key.clone(), row);
        Ok(())
    }

    async fn delete_entry(&self, key: &str) -> Result<(), StorageError> {
        self.cache.remove(key);
        Ok(())
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        let before = self.cache.len() as u64;
        self.cache.retain(|_, row| row.expires_at >= cutoff);
        Ok(before.saturating_sub(self.cache.len() as u64))
    }
}
