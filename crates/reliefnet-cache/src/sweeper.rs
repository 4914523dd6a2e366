use std::time::Duration;

use tokio::time::interval;
use tracing::info;

use crate::store::CacheStore;

/// Periodic cleanup task for the cache table.
///
/// Runs independently of request handling; each tick deletes all expired
/// rows. Lazy expiry on the read path already guarantees stale data is never
/// served, the sweep only bounds table growth.
pub struct CacheSweeper {
    store: CacheStore,
    period: Duration,
}

impl CacheSweeper {
    pub fn new(store: CacheStore, period: Duration) -> Self {
        Self { store, period }
    }

    /// Run the sweep loop forever.
    pub async fn run(self) {
        let mut ticker = interval(self.period);
        // The first tick fires immediately; skip it so startup is quiet.
        ticker.tick().await;

        info!(period_secs = self.period.as_secs(), "Cache sweeper started");

        loop {
            ticker.tick().await;
            let removed = self.store.cleanup().await;
            if removed > 0 {
                info!(removed, "Cache sweep removed expired entries");
            }
        }
    }

    /// Spawn the sweep loop onto the runtime.
    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }
}
