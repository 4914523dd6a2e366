use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use reliefnet_core::GeoPoint;

use super::{Confidence, GeocodeHit};
use crate::chain::FallbackProvider;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://maps.googleapis.com";

/// Google Maps Geocoding API client.
///
/// Quality signal: `geometry.location_type`. `ROOFTOP` is building-level
/// precision and maps to high confidence; interpolated or centered results
/// map to medium; `APPROXIMATE` to low.
pub struct GoogleGeocoder {
    http_client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl GoogleGeocoder {
    pub fn new(http_client: Client, api_key: Option<String>) -> Self {
        Self {
            http_client,
            api_key,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn key(&self) -> Result<&str, ProviderError> {
        self.api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured("google"))
    }

    fn parse_first_result(body: &Value) -> Result<GeocodeHit, ProviderError> {
        let status = body["status"].as_str().unwrap_or("UNKNOWN");
        if status == "ZERO_RESULTS" {
            return Err(ProviderError::Empty);
        }
        if status != "OK" {
            return Err(ProviderError::unexpected(format!(
                "google status {status}"
            )));
        }

        let result = body["results"]
            .get(0)
            .ok_or(ProviderError::Empty)?;
        let location = &result["geometry"]["location"];
        let latitude = location["lat"]
            .as_f64()
            .ok_or_else(|| ProviderError::unexpected("missing geometry.location.lat"))?;
        let longitude = location["lng"]
            .as_f64()
            .ok_or_else(|| ProviderError::unexpected("missing geometry.location.lng"))?;

        let confidence = match result["geometry"]["location_type"].as_str() {
            Some("ROOFTOP") => Confidence::High,
            Some("RANGE_INTERPOLATED") | Some("GEOMETRIC_CENTER") => Confidence::Medium,
            _ => Confidence::Low,
        };

        Ok(GeocodeHit {
            latitude,
            longitude,
            formatted_address: result["formatted_address"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            confidence,
        })
    }
}

#[async_trait]
impl FallbackProvider<str, GeocodeHit> for GoogleGeocoder {
    fn name(&self) -> &'static str {
        "google"
    }

    fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn attempt(&self, input: &str) -> Result<GeocodeHit, ProviderError> {
        let key = self.key()?;
        let url = format!("{}/maps/api/geocode/json", self.base_url);

        let body: Value = self
            .http_client
            .get(&url)
            .query(&[("address", input), ("key", key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Self::parse_first_result(&body)
    }
}

#[async_trait]
impl FallbackProvider<GeoPoint, GeocodeHit> for GoogleGeocoder {
    fn name(&self) -> &'static str {
        "google"
    }

    fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn attempt(&self, input: &GeoPoint) -> Result<GeocodeHit, ProviderError> {
        let key = self.key()?;
        let url = format!("{}/maps/api/geocode/json", self.base_url);
        let latlng = format!("{},{}", input.latitude, input.longitude);

        let body: Value = self
            .http_client
            .get(&url)
            .query(&[("latlng", latlng.as_str()), ("key", key)])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Self::parse_first_result(&body)
    }
}
