//! Official update aggregation across independent feed sources.
//!
//! Unlike the fallback chains, sources here are fanned out concurrently and
//! their failures are isolated: one feed being down never drops the items
//! the others returned. The merged feed obeys a hard sort contract of
//! priority rank descending, then publication time descending, so critical
//! and recent items always surface first.

mod fema;
mod redcross;

pub use fema::FemaSource;
pub use redcross::RedCrossSource;

use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use reliefnet_cache::{CacheStore, text_key};
use reliefnet_core::Priority;

use crate::error::ProviderError;

/// One aggregated update item.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateItem {
    pub id: String,
    /// Source tag, e.g. `"fema"`.
    pub source: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub priority: Priority,
    pub category: String,
    pub published_at: DateTime<Utc>,
}

/// Post-fetch filters, applied before pagination.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UpdateFilters {
    pub min_priority: Option<Priority>,
    pub category: Option<String>,
    pub offset: usize,
    pub limit: Option<usize>,
}

const DEFAULT_PAGE_LIMIT: usize = 20;

/// A filtered, paginated page of updates.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFeed {
    pub items: Vec<UpdateItem>,
    /// Items aggregated before filtering.
    pub total: usize,
    /// Items remaining after filtering, before pagination.
    pub filtered: usize,
}

/// One independent update feed.
#[async_trait]
pub trait UpdateSource: Send + Sync {
    /// Stable source tag carried on every item it produces.
    fn name(&self) -> &'static str;

    /// Computed from configuration at startup.
    fn enabled(&self) -> bool {
        true
    }

    async fn fetch(&self, disaster_id: &str) -> Result<Vec<UpdateItem>, ProviderError>;
}

/// Aggregation service configuration.
#[derive(Debug, Clone)]
pub struct UpdatesOptions {
    /// Per-source fetch timeout.
    pub fetch_timeout: Duration,
    pub cache_ttl: chrono::Duration,
}

impl Default for UpdatesOptions {
    fn default() -> Self {
        Self {
            fetch_timeout: Duration::from_secs(10),
            cache_ttl: chrono::Duration::minutes(30),
        }
    }
}

/// Two-key ordering contract: priority rank descending, then newest first.
pub fn feed_order(a: &UpdateItem, b: &UpdateItem) -> Ordering {
    b.priority
        .rank()
        .cmp(&a.priority.rank())
        .then_with(|| b.published_at.cmp(&a.published_at))
}

/// Aggregates official update feeds with per-source failure isolation.
pub struct UpdateService {
    sources: Vec<Arc<dyn UpdateSource>>,
    cache: CacheStore,
    options: UpdatesOptions,
}

impl UpdateService {
    pub fn new(cache: CacheStore, options: UpdatesOptions) -> Self {
        Self {
            sources: Vec::new(),
            cache,
            options,
        }
    }

    #[must_use]
    pub fn with_source(mut self, source: Arc<dyn UpdateSource>) -> Self {
        self.sources.push(source);
        self
    }

    /// Fetch, merge and sort all sources for one disaster, then apply
    /// filters and pagination. The merged unfiltered feed is cached so
    /// different filter combinations share one round of upstream fetches.
    pub async fn fetch_updates(&self, disaster_id: &str, filters: &UpdateFilters) -> UpdateFeed {
        let merged = self.merged_feed(disaster_id).await;
        paginate(merged, filters)
    }

    async fn merged_feed(&self, disaster_id: &str) -> Vec<UpdateItem> {
        let key = text_key("updates", "auto", disaster_id);
        if let Some(cached) = self.cache.get_as::<Vec<UpdateItem>>(&key).await {
            return cached;
        }

        let fetches = self
            .sources
            .iter()
            .filter(|s| s.enabled())
            .map(|source| async move {
                let result =
                    tokio::time::timeout(self.options.fetch_timeout, source.fetch(disaster_id))
                        .await
                        .unwrap_or(Err(ProviderError::Timeout(self.options.fetch_timeout)));
                (source.name(), result)
            });

        let mut merged = Vec::new();
        let mut any_failed = false;
        for (name, result) in join_all(fetches).await {
            match result {
                Ok(items) => {
                    debug!(source = name, count = items.len(), "feed source fetched");
                    merged.extend(items);
                }
                Err(e) => {
                    // Isolation: a failed source contributes nothing but
                    // never drops the other sources' items.
                    any_failed = true;
                    warn!(source = name, error = %e, "feed source failed; continuing");
                }
            }
        }

        merged.sort_by(feed_order);

        // A partial feed is served but not cached, so a recovered source's
        // items appear on the next call rather than after TTL expiry.
        if !any_failed {
            self.cache
                .set_json(&key, &merged, self.options.cache_ttl)
                .await;
        }
        merged
    }
}

fn paginate(merged: Vec<UpdateItem>, filters: &UpdateFilters) -> UpdateFeed {
    let total = merged.len();

    let filtered: Vec<UpdateItem> = merged
        .into_iter()
        .filter(|item| {
            filters
                .min_priority
                .is_none_or(|min| item.priority.rank() >= min.rank())
        })
        .filter(|item| {
            filters
                .category
                .as_deref()
                .is_none_or(|c| item.category.eq_ignore_ascii_case(c))
        })
        .collect();
    let filtered_count = filtered.len();

    let limit = filters.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let items = filtered
        .into_iter()
        .skip(filters.offset)
        .take(limit)
        .collect();

    UpdateFeed {
        items,
        total,
        filtered: filtered_count,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use reliefnet_core::{Clock, FixedClock};
    use reliefnet_db_memory::MemoryStore;

    fn item(id: &str, priority: Priority, published_at: DateTime<Utc>) -> UpdateItem {
        UpdateItem {
            id: id.to_string(),
            source: "test".to_string(),
            title: format!("update {id}"),
            content: String::new(),
            url: None,
            priority,
            category: "flood".to_string(),
            published_at,
        }
    }

    fn at(hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, hour, 0, 0).unwrap()
    }

    struct StaticSource {
        name: &'static str,
        enabled: bool,
        items: Vec<UpdateItem>,
        fail: bool,
    }

    #[async_trait]
    impl UpdateSource for StaticSource {
        fn name(&self) -> &'static str {
            self.name
        }

        fn enabled(&self) -> bool {
            self.enabled
        }

        async fn fetch(&self, _disaster_id: &str) -> Result<Vec<UpdateItem>, ProviderError> {
            if self.fail {
                Err(ProviderError::unexpected("scripted failure"))
            } else {
                Ok(self.items.clone())
            }
        }
    }

    fn source(name: &'static str, items: Vec<UpdateItem>) -> Arc<StaticSource> {
        Arc::new(StaticSource {
            name,
            enabled: true,
            items,
            fail: false,
        })
    }

    fn cache() -> CacheStore {
        let clock: Arc<dyn Clock> = Arc::new(FixedClock::new(at(12)));
        CacheStore::new(Arc::new(MemoryStore::new()), clock)
    }

    #[test]
    fn test_sort_contract_priority_then_recency() {
        // An older critical item outranks a newer high item.
        let mut items = vec![
            item("high-new", Priority::High, at(10)),
            item("critical-old", Priority::Critical, at(1)),
            item("critical-new", Priority::Critical, at(9)),
            item("low", Priority::Low, at(11)),
        ];
        items.sort_by(feed_order);

        let order: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(order, ["critical-new", "critical-old", "high-new", "low"]);
    }

    #[tokio::test]
    async fn test_one_failing_source_does_not_drop_others() {
        let ok = source("ok", vec![item("a", Priority::High, at(1))]);
        let failing = Arc::new(StaticSource {
            name: "down",
            enabled: true,
            items: vec![],
            fail: true,
        });

        let service = UpdateService::new(cache(), UpdatesOptions::default())
            .with_source(failing)
            .with_source(ok);

        let feed = service
            .fetch_updates("d-1", &UpdateFilters::default())
            .await;
        assert_eq!(feed.total, 1);
        assert_eq!(feed.items[0].id, "a");
    }

    #[tokio::test]
    async fn test_disabled_source_is_skipped() {
        let off = Arc::new(StaticSource {
            name: "off",
            enabled: false,
            items: vec![item("hidden", Priority::Critical, at(1))],
            fail: false,
        });
        let service =
            UpdateService::new(cache(), UpdatesOptions::default()).with_source(off);

        let feed = service
            .fetch_updates("d-1", &UpdateFilters::default())
            .await;
        assert_eq!(feed.total, 0);
    }

    #[tokio::test]
    async fn test_filters_apply_before_pagination() {
        let items = vec![
            item("c1", Priority::Critical, at(4)),
            item("c2", Priority::Critical, at(3)),
            item("h1", Priority::High, at(2)),
            item("m1", Priority::Medium, at(1)),
        ];
        let service = UpdateService::new(cache(), UpdatesOptions::default())
            .with_source(source("s", items));

        let filters = UpdateFilters {
            min_priority: Some(Priority::High),
            offset: 1,
            limit: Some(2),
            ..Default::default()
        };
        let feed = service.fetch_updates("d-1", &filters).await;

        assert_eq!(feed.total, 4);
        assert_eq!(feed.filtered, 3);
        // Offset 1 into the filtered order [c1, c2, h1]
        let ids: Vec<&str> = feed.items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, ["c2", "h1"]);
    }

    #[tokio::test]
    async fn test_category_filter_is_case_insensitive() {
        let mut shelter = item("s1", Priority::Low, at(1));
        shelter.category = "Shelter".to_string();
        let service = UpdateService::new(cache(), UpdatesOptions::default())
            .with_source(source("s", vec![shelter, item("f1", Priority::Low, at(2))]));

        let filters = UpdateFilters {
            category: Some("shelter".to_string()),
            ..Default::default()
        };
        let feed = service.fetch_updates("d-1", &filters).await;
        assert_eq!(feed.filtered, 1);
        assert_eq!(feed.items[0].id, "s1");
    }

    #[tokio::test]
    async fn test_merged_feed_is_cached_across_filter_variants() {
        let counted = Arc::new(CountingSource::default());
        let service = UpdateService::new(cache(), UpdatesOptions::default())
            .with_source(counted.clone());

        service
            .fetch_updates("d-1", &UpdateFilters::default())
            .await;
        let filters = UpdateFilters {
            min_priority: Some(Priority::High),
            ..Default::default()
        };
        service.fetch_updates("d-1", &filters).await;

        assert_eq!(counted.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[derive(Default)]
    struct CountingSource {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl UpdateSource for CountingSource {
        fn name(&self) -> &'static str {
            "counting"
        }

        async fn fetch(&self, _disaster_id: &str) -> Result<Vec<UpdateItem>, ProviderError> {
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Ok(vec![item("x", Priority::High, at(1))])
        }
    }
}
