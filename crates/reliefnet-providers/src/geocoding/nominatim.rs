use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use reliefnet_core::GeoPoint;

use super::{ConfidenceThresholds, GeocodeHit, nominatim_confidence};
use crate::chain::FallbackProvider;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://nominatim.openstreetmap.org";

/// Nominatim usage policy requires an identifying User-Agent.
const USER_AGENT: &str = concat!("reliefnet/", env!("CARGO_PKG_VERSION"));

/// OpenStreetMap Nominatim client - the keyless last-resort provider.
///
/// Quality signal: the `importance` score, mapped onto the coarse scale via
/// [`ConfidenceThresholds`]. Free tier, heavily rate limited; always last in
/// the chain.
pub struct NominatimGeocoder {
    http_client: Client,
    enabled: bool,
    thresholds: ConfidenceThresholds,
    base_url: String,
}

impl NominatimGeocoder {
    pub fn new(http_client: Client, enabled: bool, thresholds: ConfidenceThresholds) -> Self {
        Self {
            http_client,
            enabled,
            thresholds,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn parse_place(
        place: &Value,
        thresholds: &ConfidenceThresholds,
    ) -> Result<GeocodeHit, ProviderError> {
        // Nominatim returns coordinates as strings
        let latitude = place["lat"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| ProviderError::unexpected("malformed lat"))?;
        let longitude = place["lon"]
            .as_str()
            .and_then(|s| s.parse::<f64>().ok())
            .ok_or_else(|| ProviderError::unexpected("malformed lon"))?;
        let importance = place["importance"].as_f64().unwrap_or(0.0);

        Ok(GeocodeHit {
            latitude,
            longitude,
            formatted_address: place["display_name"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            confidence: nominatim_confidence(importance, thresholds),
        })
    }
}

#[async_trait]
impl FallbackProvider<str, GeocodeHit> for NominatimGeocoder {
    fn name(&self) -> &'static str {
        "openstreetmap"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn attempt(&self, input: &str) -> Result<GeocodeHit, ProviderError> {
        let url = format!("{}/search", self.base_url);

        let body: Value = self
            .http_client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .query(&[("q", input), ("format", "json"), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let place = body.get(0).ok_or(ProviderError::Empty)?;
        Self::parse_place(place, &self.thresholds)
    }
}

#[async_trait]
impl FallbackProvider<GeoPoint, GeocodeHit> for NominatimGeocoder {
    fn name(&self) -> &'static str {
        "openstreetmap"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn attempt(&self, input: &GeoPoint) -> Result<GeocodeHit, ProviderError> {
        let url = format!("{}/reverse", self.base_url);
        let lat = input.latitude.to_string();
        let lon = input.longitude.to_string();

        let body: Value = self
            .http_client
            .get(&url)
            .header("User-Agent", USER_AGENT)
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("format", "json"),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if body.get("error").is_some() {
            return Err(ProviderError::Empty);
        }
        Self::parse_place(&body, &self.thresholds)
    }
}
