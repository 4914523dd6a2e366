use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

use super::{ConfidenceThresholds, GeocodeHit, mapbox_confidence};
use crate::chain::FallbackProvider;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://api.mapbox.com";

/// Mapbox Geocoding API client.
///
/// Quality signal: the per-feature `relevance` score in `[0, 1]`, mapped
/// onto the coarse scale via [`ConfidenceThresholds`].
pub struct MapboxGeocoder {
    http_client: Client,
    access_token: Option<String>,
    thresholds: ConfidenceThresholds,
    base_url: String,
}

impl MapboxGeocoder {
    pub fn new(
        http_client: Client,
        access_token: Option<String>,
        thresholds: ConfidenceThresholds,
    ) -> Self {
        Self {
            http_client,
            access_token,
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

    fn parse_first_feature(
        body: &Value,
        thresholds: &ConfidenceThresholds,
    ) -> Result<GeocodeHit, ProviderError> {
        let feature = body["features"].get(0).ok_or(ProviderError::Empty)?;
        let center = feature["center"]
            .as_array()
            .ok_or_else(|| ProviderError::unexpected("missing feature center"))?;
        let longitude = center
            .first()
            .and_then(Value::as_f64)
            .ok_or_else(|| ProviderError::unexpected("malformed center[0]"))?;
        let latitude = center
            .get(1)
            .and_then(Value::as_f64)
            .ok_or_else(|| ProviderError::unexpected("malformed center[1]"))?;
        let relevance = feature["relevance"].as_f64().unwrap_or(0.0);

        Ok(GeocodeHit {
            latitude,
            longitude,
            formatted_address: feature["place_name"]
                .as_str()
                .unwrap_or_default()
                .to_string(),
            confidence: mapbox_confidence(relevance, thresholds),
        })
    }
}

#[async_trait]
impl FallbackProvider<str, GeocodeHit> for MapboxGeocoder {
    fn name(&self) -> &'static str {
        "mapbox"
    }

    fn enabled(&self) -> bool {
        self.access_token.is_some()
    }

    async fn attempt(&self, input: &str) -> Result<GeocodeHit, ProviderError> {
        let token = self
            .access_token
            .as_deref()
            .ok_or(ProviderError::NotConfigured("mapbox"))?;
        // Mapbox takes the query in the path; build the URL through the
        // parser so reserved characters ('#', '?', '%', '/') get
        // percent-encoded instead of truncating or corrupting the path.
        let mut url = reqwest::Url::parse(&self.base_url)
            .map_err(|e| ProviderError::unexpected(format!("invalid mapbox base url: {e}")))?;
        url.path_segments_mut()
            .map_err(|_| ProviderError::unexpected("mapbox base url cannot hold a path"))?
            .pop_if_empty()
            .extend(["geocoding", "v5", "mapbox.places"])
            .push(&format!("{input}.json"));

        let body: Value = self
            .http_client
            .get(url)
            .query(&[("access_token", token), ("limit", "1")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Self::parse_first_feature(&body, &self.thresholds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geocoding::Confidence;
    use serde_json::json;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_response(relevance: f64) -> Value {
        json!({
            "features": [{
                "place_name": "Manhattan, New York, United States",
                "center": [-73.9712, 40.7831],
                "relevance": relevance
            }]
        })
    }

    #[test]
    fn test_relevance_mapping() {
        let t = ConfidenceThresholds::default();
        let hit = MapboxGeocoder::parse_first_feature(&sample_response(0.9), &t).unwrap();
        assert_eq!(hit.confidence, Confidence::High);
        // Center is [lon, lat]
        assert_eq!(hit.latitude, 40.7831);
        assert_eq!(hit.longitude, -73.9712);

        let hit = MapboxGeocoder::parse_first_feature(&sample_response(0.3), &t).unwrap();
        assert_eq!(hit.confidence, Confidence::Low);
    }

    #[test]
    fn test_no_features_is_empty() {
        let t = ConfidenceThresholds::default();
        let body = json!({ "features": [] });
        assert!(matches!(
            MapboxGeocoder::parse_first_feature(&body, &t),
            Err(ProviderError::Empty)
        ));
    }

    #[tokio::test]
    async fn test_forward_geocode_against_mock_server() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/geocoding/v5/mapbox\.places/.*\.json$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_response(0.85)))
            .mount(&server)
            .await;

        let geocoder = MapboxGeocoder::new(
            Client::new(),
            Some("pk.test".into()),
            ConfidenceThresholds::default(),
        )
        .with_base_url(server.uri());

        let hit = geocoder.attempt("Manhattan NYC").await.unwrap();
        assert_eq!(hit.confidence, Confidence::High);
        assert_eq!(hit.formatted_address, "Manhattan, New York, United States");
    }

    #[tokio::test]
    async fn test_reserved_characters_reach_the_provider_intact() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_response(0.85)))
            .mount(&server)
            .await;

        let geocoder = MapboxGeocoder::new(
            Client::new(),
            Some("pk.test".into()),
            ConfidenceThresholds::default(),
        )
        .with_base_url(server.uri());

        let hit = geocoder.attempt("123 Main St #4, 50% Bldg").await.unwrap();
        assert_eq!(hit.confidence, Confidence::High);

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        // '#' must not start a fragment and '%' must arrive escaped, so the
        // full text and the trailing .json survive in the path.
        assert_eq!(
            requests[0].url.path(),
            "/geocoding/v5/mapbox.places/123%20Main%20St%20%234,%2050%25%20Bldg.json"
        );
        assert!(
            requests[0]
                .url
                .query()
                .unwrap_or("")
                .contains("access_token=pk.test")
        );
    }
}
