//! PostgreSQL storage backend for the ReliefNet server.
//!
//! Implements [`reliefnet_storage::RecordStore`] over a JSONB-bodied records
//! table and [`reliefnet_storage::CacheStorage`] over the cache table.

mod config;
mod error;
mod pool;
mod store;

pub use config::PostgresConfig;
pub use error::PostgresError;
pub use pool::create_pool;
pub use store::PostgresStore;
