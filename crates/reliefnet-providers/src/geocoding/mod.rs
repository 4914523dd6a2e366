//! Location resolution over a provider fallback chain.
//!
//! Providers in priority order: Google Maps (paid, highest accuracy), Mapbox
//! (paid, relevance-scored), OpenStreetMap Nominatim (free, keyless, last
//! resort). Each maps its native quality signal onto the coarse
//! [`Confidence`] scale; the thresholds are illustrative defaults surfaced
//! through [`ConfidenceThresholds`], not business requirements.

mod google;
mod mapbox;
mod nominatim;

pub use google::GoogleGeocoder;
pub use mapbox::MapboxGeocoder;
pub use nominatim::NominatimGeocoder;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reliefnet_cache::{CacheStore, coord_key, text_key};
use reliefnet_core::{Clock, GeoPoint};

use crate::MOCK_PROVIDER;
use crate::chain::{ChainOutcome, FallbackChain};

/// Coarse location confidence scale shared by all providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    High,
    Medium,
    Low,
}

/// Per-provider quality thresholds for the confidence mapping.
///
/// Defaults:
/// - Google: `ROOFTOP` location type -> high, `RANGE_INTERPOLATED` /
///   `GEOMETRIC_CENTER` -> medium, `APPROXIMATE` -> low.
/// - Mapbox: relevance >= 0.8 -> high, >= 0.5 -> medium, else low.
/// - Nominatim: importance >= 0.7 -> high, >= 0.4 -> medium, else low.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ConfidenceThresholds {
    pub mapbox_high: f64,
    pub mapbox_medium: f64,
    pub nominatim_high: f64,
    pub nominatim_medium: f64,
}

impl Default for ConfidenceThresholds {
    fn default() -> Self {
        Self {
            mapbox_high: 0.8,
            mapbox_medium: 0.5,
            nominatim_high: 0.7,
            nominatim_medium: 0.4,
        }
    }
}

/// A successful hit from one provider, before the service stamps it.
#[derive(Debug, Clone)]
pub struct GeocodeHit {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
    pub confidence: Confidence,
}

/// Normalized geocoding result returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeResult {
    pub latitude: f64,
    pub longitude: f64,
    pub formatted_address: String,
    pub confidence: Confidence,
    /// Which backend produced this result; `"mock"` marks a degraded result.
    pub provider: String,
    pub timestamp: DateTime<Utc>,
    /// Present only on degraded results: why every provider failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GeocodeResult {
    /// True when this is a synthetic degraded result rather than a real hit.
    pub fn is_degraded(&self) -> bool {
        self.provider == MOCK_PROVIDER
    }
}

/// Geocoding service configuration.
#[derive(Debug, Clone)]
pub struct GeocodingOptions {
    /// Per-attempt timeout for each provider call.
    pub attempt_timeout: Duration,
    /// TTL for cached results.
    pub cache_ttl: chrono::Duration,
    /// Reference point for degraded results (defaults to lower Manhattan,
    /// matching the system's original deployment area).
    pub fallback_reference: GeoPoint,
    pub thresholds: ConfidenceThresholds,
}

impl Default for GeocodingOptions {
    fn default() -> Self {
        Self {
            attempt_timeout: Duration::from_secs(5),
            cache_ttl: chrono::Duration::hours(1),
            fallback_reference: GeoPoint {
                latitude: 40.7128,
                longitude: -74.0060,
            },
            thresholds: ConfidenceThresholds::default(),
        }
    }
}

/// Location resolution service: cache, then fallback chain, then a marked
/// degraded result. `resolve` and `reverse` are total.
pub struct GeocodeService {
    forward: FallbackChain<str, GeocodeHit>,
    reverse: FallbackChain<GeoPoint, GeocodeHit>,
    cache: CacheStore,
    clock: Arc<dyn Clock>,
    options: GeocodingOptions,
}

impl GeocodeService {
    pub fn new(
        forward: FallbackChain<str, GeocodeHit>,
        reverse: FallbackChain<GeoPoint, GeocodeHit>,
        cache: CacheStore,
        clock: Arc<dyn Clock>,
        options: GeocodingOptions,
    ) -> Self {
        Self {
            forward,
            reverse,
            cache,
            clock,
            options,
        }
    }

    /// Resolve free-text location into coordinates. Never fails: on total
    /// provider exhaustion the result is a marked mock near the configured
    /// reference point.
    pub async fn resolve(&self, location_text: &str) -> GeocodeResult {
        let key = text_key("geocode", "auto", location_text);
        if let Some(cached) = self.cache.get_as::<GeocodeResult>(&key).await {
            return cached;
        }

        let result = match self.forward.resolve(location_text).await {
            ChainOutcome::Resolved {
                value, provider, ..
            } => self.stamp(value, provider),
            ChainOutcome::Exhausted { failures } => {
                return self.degraded(location_text, &failures);
            }
        };

        // Degraded results are never cached, so recovery is picked up on the
        // next call.
        self.cache
            .set_json(&key, &result, self.options.cache_ttl)
            .await;
        result
    }

    /// Resolve coordinates into an address. Same orchestration shape as
    /// [`resolve`](Self::resolve) with a coordinate-based cache key.
    pub async fn reverse(&self, point: GeoPoint) -> GeocodeResult {
        let key = coord_key("reverse", "auto", point.latitude, point.longitude);
        if let Some(cached) = self.cache.get_as::<GeocodeResult>(&key).await {
            return cached;
        }

        let result = match self.reverse.resolve(&point).await {
            ChainOutcome::Resolved {
                value, provider, ..
            } => self.stamp(value, provider),
            ChainOutcome::Exhausted { failures } => {
                let mut degraded = self.degraded("reverse", &failures);
                // Reverse lookups already have real coordinates; keep them.
                degraded.latitude = point.latitude;
                degraded.longitude = point.longitude;
                return degraded;
            }
        };

        self.cache
            .set_json(&key, &result, self.options.cache_ttl)
            .await;
        result
    }

    /// Names of the forward-chain providers in priority order.
    pub fn forward_provider_names(&self) -> Vec<&'static str> {
        self.forward.provider_names()
    }

    fn stamp(&self, hit: GeocodeHit, provider: &'static str) -> GeocodeResult {
        GeocodeResult {
            latitude: hit.latitude,
            longitude: hit.longitude,
            formatted_address: hit.formatted_address,
            confidence: hit.confidence,
            provider: provider.to_string(),
            timestamp: self.clock.now(),
            error: None,
        }
    }

    fn degraded(
        &self,
        subject: &str,
        failures: &[crate::chain::AttemptFailure],
    ) -> GeocodeResult {
        let (jitter_lat, jitter_lon) = deterministic_jitter(subject);
        let reference = self.options.fallback_reference;
        GeocodeResult {
            latitude: reference.latitude + jitter_lat,
            longitude: reference.longitude + jitter_lon,
            formatted_address: format!("Unresolved location: {subject}"),
            confidence: Confidence::Low,
            provider: MOCK_PROVIDER.to_string(),
            timestamp: self.clock.now(),
            error: Some(ChainOutcome::<GeocodeHit>::failure_summary(failures)),
        }
    }
}

/// Jitter in the range (-0.05, 0.05) degrees derived from a hash of the
/// input, so repeated degraded lookups for the same text are stable.
fn deterministic_jitter(subject: &str) -> (f64, f64) {
    let mut hasher = DefaultHasher::new();
    subject.hash(&mut hasher);
    let bits = hasher.finish();
    let lat = ((bits & 0xFFFF) as f64 / 65_535.0 - 0.5) * 0.1;
    let lon = (((bits >> 16) & 0xFFFF) as f64 / 65_535.0 - 0.5) * 0.1;
    (lat, lon)
}

/// Map a Mapbox relevance score onto the coarse scale.
pub(crate) fn mapbox_confidence(relevance: f64, t: &ConfidenceThresholds) -> Confidence {
    if relevance >= t.mapbox_high {
        Confidence::High
    } else if relevance >= t.mapbox_medium {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

/// Map a Nominatim importance score onto the coarse scale.
pub(crate) fn nominatim_confidence(importance: f64, t: &ConfidenceThresholds) -> Confidence {
    if importance >= t.nominatim_high {
        Confidence::High
    } else if importance >= t.nominatim_medium {
        Confidence::Medium
    } else {
        Confidence::Low
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::TimeZone;
    use reliefnet_core::FixedClock;
    use reliefnet_db_memory::MemoryStore;

    use crate::FallbackProvider;
    use crate::error::ProviderError;

    struct StubGeocoder {
        name: &'static str,
        fail: bool,
    }

    #[async_trait]
    impl FallbackProvider<str, GeocodeHit> for StubGeocoder {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attempt(&self, _input: &str) -> Result<GeocodeHit, ProviderError> {
            if self.fail {
                return Err(ProviderError::Empty);
            }
            Ok(GeocodeHit {
                latitude: 40.7580,
                longitude: -73.9855,
                formatted_address: "Times Square, NYC".into(),
                confidence: Confidence::High,
            })
        }
    }

    fn service(fail: bool) -> GeocodeService {
        let backend = Arc::new(MemoryStore::new());
        let clock = Arc::new(FixedClock::new(
            Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
        ));
        let cache = CacheStore::new(backend, clock.clone());

        let forward = FallbackChain::new("geocode", Duration::from_secs(1)).with(Arc::new(
            StubGeocoder {
                name: "stub",
                fail,
            },
        ));
        let reverse = FallbackChain::new("reverse", Duration::from_secs(1));
        GeocodeService::new(forward, reverse, cache, clock, GeocodingOptions::default())
    }

    #[tokio::test]
    async fn test_resolve_success_is_stamped_and_cached() {
        let svc = service(false);
        let result = svc.resolve("Times Square").await;
        assert_eq!(result.provider, "stub");
        assert!(!result.is_degraded());
        assert!(result.error.is_none());

        // Second call is served from cache (same timestamp under FixedClock)
        let again = svc.resolve("Times Square").await;
        assert_eq!(again.timestamp, result.timestamp);
        assert_eq!(again.formatted_address, "Times Square, NYC");
    }

    #[tokio::test]
    async fn test_exhaustion_yields_marked_mock() {
        let svc = service(true);
        let result = svc.resolve("Manhattan, NYC").await;

        assert_eq!(result.provider, MOCK_PROVIDER);
        assert!(result.is_degraded());
        assert_eq!(result.confidence, Confidence::Low);
        assert!(result.error.as_deref().unwrap().contains("stub"));
        // Coordinates are near the reference point
        assert!((result.latitude - 40.7128).abs() < 0.06);
        assert!((result.longitude + 74.0060).abs() < 0.06);
    }

    #[tokio::test]
    async fn test_degraded_results_are_not_cached() {
        let svc = service(true);
        let first = svc.resolve("Manhattan, NYC").await;
        let second = svc.resolve("Manhattan, NYC").await;
        // Same deterministic jitter, but each call re-ran the chain and was
        // not served from cache; the degraded coordinates still match.
        assert_eq!(first.latitude, second.latitude);
        assert_eq!(first.longitude, second.longitude);
        assert!(second.is_degraded());
    }

    #[tokio::test]
    async fn test_reverse_exhaustion_keeps_real_coordinates() {
        let svc = service(true);
        let point = GeoPoint {
            latitude: 40.7580,
            longitude: -73.9855,
        };
        let result = svc.reverse(point).await;
        assert!(result.is_degraded());
        assert_eq!(result.latitude, 40.7580);
        assert_eq!(result.longitude, -73.9855);
    }

    #[test]
    fn test_confidence_threshold_mapping() {
        let t = ConfidenceThresholds::default();
        assert_eq!(mapbox_confidence(0.95, &t), Confidence::High);
        assert_eq!(mapbox_confidence(0.6, &t), Confidence::Medium);
        assert_eq!(mapbox_confidence(0.2, &t), Confidence::Low);
        assert_eq!(nominatim_confidence(0.8, &t), Confidence::High);
        assert_eq!(nominatim_confidence(0.5, &t), Confidence::Medium);
        assert_eq!(nominatim_confidence(0.1, &t), Confidence::Low);
    }

    #[test]
    fn test_jitter_is_deterministic_and_bounded() {
        let (a_lat, a_lon) = deterministic_jitter("Manhattan, NYC");
        let (b_lat, b_lon) = deterministic_jitter("Manhattan, NYC");
        assert_eq!((a_lat, a_lon), (b_lat, b_lon));
        assert!(a_lat.abs() <= 0.05);
        assert!(a_lon.abs() <= 0.05);

        let (c_lat, _) = deterministic_jitter("Brooklyn, NYC");
        assert_ne!(a_lat, c_lat);
    }
}
