//! TTL response cache with lazy expiry.
//!
//! Shields the system from slow, unreliable or rate-limited external services.
//! The cache is a performance optimization, never a correctness dependency:
//! every backend failure is swallowed and reported as a miss, so a broken
//! cache degrades the system to "no cache" rather than failing requests.
//!
//! Expiry is enforced two ways:
//! - lazily, on read: an expired entry is treated as absent and deleted as a
//!   side effect;
//! - periodically, by [`CacheSweeper`], which deletes all expired rows.

mod key;
mod store;
mod sweeper;

pub use key::{coord_key, text_key};
pub use store::CacheStore;
pub use sweeper::CacheSweeper;
