//! Shared types for the ReliefNet storage abstraction layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A domain record as stored in a backend.
///
/// The body is the full camelCase JSON document; backends never interpret it
/// beyond the fields they index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredRecord {
    /// The record ID.
    pub id: String,
    /// The collection this record belongs to.
    pub collection: String,
    /// The full record content as JSON.
    pub body: Value,
    /// When the record was originally created.
    pub created_at: DateTime<Utc>,
    /// When this record was last updated.
    pub updated_at: DateTime<Utc>,
}

impl StoredRecord {
    /// Creates a new `StoredRecord` stamped with the given instant.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        collection: impl Into<String>,
        body: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            collection: collection.into(),
            body,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Sort direction for a record query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filter, sort and pagination parameters for a collection query.
#[derive(Debug, Clone, Default)]
pub struct RecordQuery {
    /// Equality filters over top-level body fields.
    pub filters: Vec<(String, Value)>,
    /// Field to sort by (top-level body field); backends fall back to
    /// `created_at` when unset.
    pub sort_by: Option<String>,
    pub sort_order: SortOrder,
    pub offset: usize,
    /// Page size; `None` means backend default.
    pub limit: Option<usize>,
}

impl RecordQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filters.push((field.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_sort(mut self, field: impl Into<String>, order: SortOrder) -> Self {
        self.sort_by = Some(field.into());
        self.sort_order = order;
        self
    }

    #[must_use]
    pub fn with_offset(mut self, offset: usize) -> Self {
        self.offset = offset;
        self
    }

    #[must_use]
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One page of query results.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordPage {
    /// The matching records, in query order.
    pub entries: Vec<StoredRecord>,
    /// Total count of records matching the filters, ignoring pagination.
    pub total: usize,
    /// Whether more results exist beyond this page.
    pub has_more: bool,
}

impl RecordPage {
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A raw cache table row.
///
/// Expiry enforcement is the cache layer's job; backends return rows as-is so
/// the lazy-expiry read path can delete stale rows as a side effect.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheRow {
    pub key: String,
    pub value: Value,
    pub expires_at: DateTime<Utc>,
}
