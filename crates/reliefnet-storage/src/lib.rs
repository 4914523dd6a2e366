//! # reliefnet-storage
//!
//! Storage abstraction layer for the ReliefNet server.
//!
//! This crate defines the traits and types that all storage backends must
//! implement. It does not contain any implementations - those are provided by
//! separate crates (`reliefnet-db-postgres`, `reliefnet-db-memory`).
//!
//! Two independent contracts live here:
//!
//! - [`RecordStore`]: row-oriented access with filter/sort/paginate semantics
//!   over named collections (`disasters`, `resources`, `reports`).
//! - [`CacheStorage`]: the durable key/value table with expiry timestamps that
//!   backs the response cache. Cache policy (lazy expiry, key construction,
//!   error swallowing) lives in `reliefnet-cache`; this trait is only the raw
//!   row access.

mod error;
mod traits;
mod types;

pub use error::StorageError;
pub use traits::{CacheStorage, RecordStore};
pub use types::{CacheRow, RecordPage, RecordQuery, SortOrder, StoredRecord};

/// Type alias for a storage result.
pub type StorageResult<T> = Result<T, StorageError>;

/// Type alias for a shared record store trait object.
pub type DynRecordStore = std::sync::Arc<dyn RecordStore>;

/// Type alias for a shared cache storage trait object.
pub type DynCacheStorage = std::sync::Arc<dyn CacheStorage>;

/// Collection names known to the system.
pub mod collections {
    pub const DISASTERS: &str = "disasters";
    pub const RESOURCES: &str = "resources";
    pub const REPORTS: &str = "reports";

    /// All record collections, in no particular order.
    pub const ALL: &[&str] = &[DISASTERS, RESOURCES, REPORTS];

    pub fn is_known(name: &str) -> bool {
        ALL.contains(&name)
    }
}
