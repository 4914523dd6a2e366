//! Application state and composition root.
//!
//! Every client handle the system owns is constructed here once at startup
//! and injected into the services that need it. Nothing downstream opens
//! its own connections or re-reads the environment.

use std::sync::Arc;

use reliefnet_cache::CacheStore;
use reliefnet_core::{Clock, SystemClock};
use reliefnet_db_memory::MemoryStore;
use reliefnet_db_postgres::PostgresStore;
use reliefnet_providers::analysis::{
    AnalysisOptions, AnalysisService, GeminiClassifier, KeywordClassifier,
};
use reliefnet_providers::chain::FallbackChain;
use reliefnet_providers::geocoding::{
    GeocodeService, GeocodingOptions, GoogleGeocoder, MapboxGeocoder, NominatimGeocoder,
};
use reliefnet_providers::social::SocialService;
use reliefnet_providers::updates::{FemaSource, RedCrossSource, UpdateService, UpdatesOptions};
use reliefnet_storage::{DynCacheStorage, DynRecordStore};

use crate::config::{AppConfig, StorageBackend};
use crate::realtime::EventBroadcaster;

#[derive(Clone)]
pub struct AppState {
    pub records: DynRecordStore,
    pub cache: CacheStore,
    pub geocoding: Arc<GeocodeService>,
    pub analysis: Arc<AnalysisService>,
    pub updates: Arc<UpdateService>,
    pub social: Arc<SocialService>,
    pub events: Arc<EventBroadcaster>,
    pub clock: Arc<dyn Clock>,
    pub pagination: crate::config::PaginationConfig,
}

/// Build the full application state from configuration. Fails only on
/// backend connectivity problems; missing provider credentials just disable
/// the corresponding providers.
pub async fn build_state(cfg: &AppConfig) -> anyhow::Result<AppState> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);

    let (records, cache_backend): (DynRecordStore, DynCacheStorage) = match cfg.storage.backend {
        StorageBackend::Memory => {
            tracing::info!("using in-memory storage backend");
            let store = Arc::new(MemoryStore::new());
            (store.clone(), store)
        }
        StorageBackend::Postgres => {
            let pg_cfg = cfg
                .storage
                .postgres
                .clone()
                .ok_or_else(|| anyhow::anyhow!("postgres backend selected without config"))?;
            let store = Arc::new(PostgresStore::new(pg_cfg).await?);
            (store.clone(), store)
        }
    };

    let cache = CacheStore::new(cache_backend, clock.clone());
    let http_client = reqwest::Client::builder()
        .timeout(cfg.providers.attempt_timeout())
        .build()?;

    let state = AppState {
        geocoding: Arc::new(build_geocoding(cfg, &http_client, &cache, &clock)),
        analysis: Arc::new(build_analysis(cfg, &http_client, &cache, &clock)),
        updates: Arc::new(build_updates(cfg, &http_client, &cache)),
        social: Arc::new(SocialService::new(
            cache.clone(),
            clock.clone(),
            chrono::Duration::seconds(cfg.cache.social_ttl_secs),
        )),
        events: Arc::new(EventBroadcaster::new()),
        records,
        cache,
        clock,
        pagination: cfg.pagination.clone(),
    };

    tracing::info!(
        geocoders = ?state.geocoding.forward_provider_names(),
        "provider chains configured"
    );
    Ok(state)
}

fn build_geocoding(
    cfg: &AppConfig,
    http_client: &reqwest::Client,
    cache: &CacheStore,
    clock: &Arc<dyn Clock>,
) -> GeocodeService {
    let p = &cfg.providers;
    let options = GeocodingOptions {
        attempt_timeout: p.attempt_timeout(),
        cache_ttl: chrono::Duration::seconds(cfg.cache.geocode_ttl_secs),
        ..GeocodingOptions::default()
    };

    let google = Arc::new(GoogleGeocoder::new(
        http_client.clone(),
        p.google_maps_api_key.clone(),
    ));
    let mapbox = Arc::new(MapboxGeocoder::new(
        http_client.clone(),
        p.mapbox_access_token.clone(),
        options.thresholds,
    ));
    let nominatim = Arc::new(NominatimGeocoder::new(
        http_client.clone(),
        p.nominatim_enabled,
        options.thresholds,
    ));

    // Priority order: paid high-accuracy first, free best-effort last
    let forward = FallbackChain::new("geocode", options.attempt_timeout)
        .with(google.clone())
        .with(mapbox)
        .with(nominatim.clone());
    let reverse = FallbackChain::new("reverse-geocode", options.attempt_timeout)
        .with(google)
        .with(nominatim);

    GeocodeService::new(forward, reverse, cache.clone(), clock.clone(), options)
}

fn build_analysis(
    cfg: &AppConfig,
    http_client: &reqwest::Client,
    cache: &CacheStore,
    clock: &Arc<dyn Clock>,
) -> AnalysisService {
    let options = AnalysisOptions {
        attempt_timeout: cfg.providers.attempt_timeout(),
        cache_ttl: chrono::Duration::seconds(cfg.cache.analysis_ttl_secs),
    };

    let gemini = Arc::new(GeminiClassifier::new(
        http_client.clone(),
        cfg.providers.gemini_api_key.clone(),
    ));

    // The keyword matcher is always eligible, so classification never
    // exhausts in practice
    let classify = FallbackChain::new("analyze", options.attempt_timeout)
        .with(gemini.clone())
        .with(Arc::new(KeywordClassifier));
    let verify = FallbackChain::new("verify-image", options.attempt_timeout).with(gemini);

    AnalysisService::new(classify, verify, cache.clone(), clock.clone(), options)
}

fn build_updates(cfg: &AppConfig, http_client: &reqwest::Client, cache: &CacheStore) -> UpdateService {
    let options = UpdatesOptions {
        fetch_timeout: cfg.providers.attempt_timeout(),
        cache_ttl: chrono::Duration::seconds(cfg.cache.updates_ttl_secs),
    };

    UpdateService::new(cache.clone(), options)
        .with_source(Arc::new(FemaSource::new(
            http_client.clone(),
            cfg.providers.fema_enabled,
        )))
        .with_source(Arc::new(RedCrossSource::new(
            http_client.clone(),
            cfg.providers.redcross_feed_url.clone(),
        )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_config_builds_memory_state() {
        let cfg = AppConfig::default();
        let state = build_state(&cfg).await.unwrap();
        assert_eq!(state.records.backend_name(), "memory");
        assert_eq!(state.events.connection_count(), 0);
    }

    #[tokio::test]
    async fn test_provider_order_is_cost_quality() {
        let cfg = AppConfig::default();
        let state = build_state(&cfg).await.unwrap();
        assert_eq!(
            state.geocoding.forward_provider_names(),
            vec!["google", "mapbox", "openstreetmap"]
        );
    }
}
