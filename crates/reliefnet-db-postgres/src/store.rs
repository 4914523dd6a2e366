//! PostgreSQL implementation of the record and cache storage traits.
//!
//! Records live in a single JSONB-bodied table keyed by `(collection, id)`;
//! equality filters are answered with JSONB containment so scalar fields and
//! array fields (tags) share one query path. Cache rows live in their own
//! table with an `expires_at` index for the periodic sweep.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use serde_json::{Value, json};
use sqlx_postgres::PgPool;
use tracing::{debug, info, instrument};

use reliefnet_storage::{
    CacheRow, CacheStorage, RecordPage, RecordQuery, RecordStore, SortOrder, StorageError,
    StoredRecord, collections,
};

use crate::config::PostgresConfig;
use crate::error::{is_unique_violation, storage_err};
use crate::pool;

/// PostgreSQL storage backend for ReliefNet records and cache rows.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    tables_created: Arc<DashSet<String>>,
}

impl PostgresStore {
    /// Creates a new `PostgresStore` with the given configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection pool cannot be created.
    pub async fn new(config: PostgresConfig) -> Result<Self, StorageError> {
        let pool = pool::create_pool(&config)
            .await
            .map_err(StorageError::from)?;
        Ok(Self::from_pool(pool))
    }

    /// Creates a new `PostgresStore` from an existing connection pool.
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            tables_created: Arc::new(DashSet::new()),
        }
    }

    /// Returns a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Ensure the record and cache tables exist.
    #[instrument(skip(self))]
    async fn ensure_tables(&self) -> Result<(), StorageError> {
        if self.tables_created.contains("records") {
            return Ok(());
        }

        sqlx_core::query::query(
            r#"
            CREATE TABLE IF NOT EXISTS records (
                collection TEXT NOT NULL,
                id TEXT NOT NULL,
                body JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx_core::query::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_records_body ON records USING GIN (body);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx_core::query::query(
            r#"
            CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                value JSONB NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        sqlx_core::query::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_cache_expires ON cache(expires_at);
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        info!("Created records and cache tables");
        self.tables_created.insert("records".to_string());
        Ok(())
    }

    fn check_collection(collection: &str) -> Result<(), StorageError> {
        if collections::is_known(collection) {
            Ok(())
        } else {
            Err(StorageError::unknown_collection(collection))
        }
    }

    /// Sort fields are interpolated into the ORDER BY clause, so only plain
    /// identifier characters are accepted.
    fn check_sort_field(field: &str) -> Result<(), StorageError> {
        if !field.is_empty()
            && field
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            Ok(())
        } else {
            Err(StorageError::invalid_record(format!(
                "invalid sort field '{field}'"
            )))
        }
    }

    fn build_where(filter_count: usize) -> String {
        let mut sql = String::from("collection = $1");
        let mut arg = 2;
        for _ in 0..filter_count {
            sql.push_str(&format!(" AND (body @> ${} OR body @> ${})", arg, arg + 1));
            arg += 2;
        }
        sql
    }
}

#[async_trait]
impl RecordStore for PostgresStore {
    async fn insert(&self, collection: &str, record: StoredRecord) -> Result<(), StorageError> {
        Self::check_collection(collection)?;
        self.ensure_tables().await?;

        let result = sqlx_core::query::query(
            r#"
            INSERT INTO records (collection, id, body, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(collection)
        .bind(&record.id)
        .bind(&record.body)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => {
                debug!(collection, id = %record.id, "Inserted record");
                Ok(())
            }
            Err(e) if is_unique_violation(&e) => {
                Err(StorageError::already_exists(collection, &record.id))
            }
            Err(e) => Err(storage_err(e)),
        }
    }

    async fn get(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<StoredRecord>, StorageError> {
        Self::check_collection(collection)?;
        self.ensure_tables().await?;

        let row: Option<(String, Value, DateTime<Utc>, DateTime<Utc>)> =
            sqlx_core::query_as::query_as(
                r#"
                SELECT id, body, created_at, updated_at
                FROM records WHERE collection = $1 AND id = $2
                "#,
            )
            .bind(collection)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(row.map(|(id, body, created_at, updated_at)| StoredRecord {
            id,
            collection: collection.to_string(),
            body,
            created_at,
            updated_at,
        }))
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        body: Value,
    ) -> Result<StoredRecord, StorageError> {
        Self::check_collection(collection)?;
        self.ensure_tables().await?;

        let row: Option<(Value, DateTime<Utc>, DateTime<Utc>)> = sqlx_core::query_as::query_as(
            r#"
            UPDATE records SET body = $3, updated_at = NOW()
            WHERE collection = $1 AND id = $2
            RETURNING body, created_at, updated_at
            "#,
        )
        .bind(collection)
        .bind(id)
        .bind(body)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        match row {
            Some((body, created_at, updated_at)) => Ok(StoredRecord {
                id: id.to_string(),
                collection: collection.to_string(),
                body,
                created_at,
                updated_at,
            }),
            None => Err(StorageError::not_found(collection, id)),
        }
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<(), StorageError> {
        Self::check_collection(collection)?;
        self.ensure_tables().await?;

        let result = sqlx_core::query::query(
            "DELETE FROM records WHERE collection = $1 AND id = $2",
        )
        .bind(collection)
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        if result.rows_affected() == 0 {
            return Err(StorageError::not_found(collection, id));
        }
        debug!(collection, id, "Deleted record");
        Ok(())
    }

    async fn query(
        &self,
        collection: &str,
        query: &RecordQuery,
    ) -> Result<RecordPage, StorageError> {
        Self::check_collection(collection)?;
        self.ensure_tables().await?;

        let where_sql = Self::build_where(query.filters.len());

        // Containment objects: one for scalar equality, one for the
        // array-contains form so tag filters match.
        let mut containments: Vec<(Value, Value)> = Vec::with_capacity(query.filters.len());
        for (field, value) in &query.filters {
            containments.push((
                json!({ field.as_str(): value }),
                json!({ field.as_str(): [value] }),
            ));
        }

        let count_sql = format!("SELECT COUNT(*) FROM records WHERE {where_sql}");
        let mut count_query =
            sqlx_core::query_as::query_as::<_, (i64,)>(&count_sql).bind(collection);
        for (scalar, array) in &containments {
            count_query = count_query.bind(scalar).bind(array);
        }
        let (total,): (i64,) = count_query
            .fetch_one(&self.pool)
            .await
            .map_err(storage_err)?;

        let order_sql = {
            let dir = match query.sort_order {
                SortOrder::Asc => "ASC",
                SortOrder::Desc => "DESC",
            };
            match &query.sort_by {
                Some(field) => {
                    Self::check_sort_field(field)?;
                    format!("ORDER BY body->'{field}' {dir} NULLS LAST")
                }
                None => format!("ORDER BY created_at {dir}"),
            }
        };

        let limit_arg = 2 + containments.len() * 2;
        let offset_arg = limit_arg + 1;
        let page_sql = format!(
            "SELECT id, body, created_at, updated_at FROM records WHERE {where_sql} \
             {order_sql} LIMIT ${limit_arg} OFFSET ${offset_arg}"
        );

        let mut page_query =
            sqlx_core::query_as::query_as::<_, (String, Value, DateTime<Utc>, DateTime<Utc>)>(
                &page_sql,
            )
            .bind(collection);
        for (scalar, array) in &containments {
            page_query = page_query.bind(scalar).bind(array);
        }
        let limit = query.limit.map(|l| l as i64).unwrap_or(i64::MAX);
        let rows = page_query
            .bind(limit)
            .bind(query.offset as i64)
            .fetch_all(&self.pool)
            .await
            .map_err(storage_err)?;

        let entries: Vec<StoredRecord> = rows
            .into_iter()
            .map(|(id, body, created_at, updated_at)| StoredRecord {
                id,
                collection: collection.to_string(),
                body,
                created_at,
                updated_at,
            })
            .collect();

        let total = total as usize;
        let has_more = query.offset + entries.len() < total;

        Ok(RecordPage {
            entries,
            total,
            has_more,
        })
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl CacheStorage for PostgresStore {
    async fn get_entry(&self, key: &str) -> Result<Option<CacheRow>, StorageError> {
        self.ensure_tables().await?;

        let row: Option<(String, Value, DateTime<Utc>)> = sqlx_core::query_as::query_as(
            "SELECT key, value, expires_at FROM cache WHERE key = $1",
        )
        .bind(key)
        .fetch_optional(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(row.map(|(key, value, expires_at)| CacheRow {
            key,
            value,
            expires_at,
        }))
    }

    async fn put_entry(&self, row: CacheRow) -> Result<(), StorageError> {
        self.ensure_tables().await?;

        sqlx_core::query::query(
            r#"
            INSERT INTO cache (key, value, expires_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE
                SET value = EXCLUDED.value, expires_at = EXCLUDED.expires_at
            "#,
        )
        .bind(&row.key)
        .bind(&row.value)
        .bind(row.expires_at)
        .execute(&self.pool)
        .await
        .map_err(storage_err)?;

        Ok(())
    }

    async fn delete_entry(&self, key: &str) -> Result<(), StorageError> {
        self.ensure_tables().await?;

        sqlx_core::query::query("DELETE FROM cache WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(())
    }

    async fn delete_expired(&self, cutoff: DateTime<Utc>) -> Result<u64, StorageError> {
        self.ensure_tables().await?;

        let result = sqlx_core::query::query("DELETE FROM cache WHERE expires_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await
            .map_err(storage_err)?;

        Ok(result.rows_affected())
    }
}
