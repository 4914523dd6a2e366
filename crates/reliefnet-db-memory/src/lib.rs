//! In-memory storage backend for the ReliefNet server.
//!
//! Backs both the record collections and the cache table with `DashMap`s.
//! Used by unit and handler tests, and as a development fallback when no
//! PostgreSQL connection is configured. Data does not survive a restart.

mod store;

pub use store::MemoryStore;
