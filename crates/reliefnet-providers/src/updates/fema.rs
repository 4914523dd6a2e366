use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use reliefnet_core::Priority;

use super::{UpdateItem, UpdateSource};
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://www.fema.gov";

/// Declarations considered life-threatening at declaration time.
const SEVERE_INCIDENTS: &[&str] = &["hurricane", "earthquake", "tsunami", "dam break"];

/// FEMA OpenFEMA disaster declarations feed.
///
/// The API has no per-incident stream, so the recent declarations summary is
/// fetched and mapped onto update items; the disaster id is carried into the
/// item id for traceability.
pub struct FemaSource {
    http_client: Client,
    enabled: bool,
    base_url: String,
}

#[derive(Deserialize)]
struct DeclarationsBody {
    #[serde(rename = "DisasterDeclarationsSummaries", default)]
    summaries: Vec<Declaration>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Declaration {
    disaster_number: u64,
    declaration_title: String,
    #[serde(default)]
    incident_type: String,
    declaration_date: DateTime<Utc>,
    #[serde(default)]
    state: String,
}

impl FemaSource {
    pub fn new(http_client: Client, enabled: bool) -> Self {
        Self {
            http_client,
            enabled,
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn priority_for(incident_type: &str) -> Priority {
        let incident = incident_type.to_lowercase();
        if SEVERE_INCIDENTS.iter().any(|s| incident.contains(s)) {
            Priority::Critical
        } else if incident.contains("flood") || incident.contains("fire") {
            Priority::High
        } else {
            Priority::Medium
        }
    }
}

#[async_trait]
impl UpdateSource for FemaSource {
    fn name(&self) -> &'static str {
        "fema"
    }

    fn enabled(&self) -> bool {
        self.enabled
    }

    async fn fetch(&self, disaster_id: &str) -> Result<Vec<UpdateItem>, ProviderError> {
        let url = format!(
            "{}/api/open/v2/DisasterDeclarationsSummaries",
            self.base_url
        );

        let body: DeclarationsBody = self
            .http_client
            .get(&url)
            .query(&[("$orderby", "declarationDate desc"), ("$top", "20")])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(body
            .summaries
            .into_iter()
            .map(|d| UpdateItem {
                id: format!("fema-{}-{}", disaster_id, d.disaster_number),
                source: "fema".to_string(),
                title: d.declaration_title,
                content: format!("{} declaration for {}", d.incident_type, d.state),
                url: Some(format!(
                    "https://www.fema.gov/disaster/{}",
                    d.disaster_number
                )),
                priority: Self::priority_for(&d.incident_type),
                category: d.incident_type.to_lowercase(),
                published_at: d.declaration_date,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_incident_priority_mapping() {
        assert_eq!(FemaSource::priority_for("Hurricane"), Priority::Critical);
        assert_eq!(FemaSource::priority_for("Flood"), Priority::High);
        assert_eq!(FemaSource::priority_for("Snowstorm"), Priority::Medium);
    }

    #[tokio::test]
    async fn test_fetch_maps_declarations() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/open/v2/DisasterDeclarationsSummaries"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "DisasterDeclarationsSummaries": [{
                    "disasterNumber": 4781,
                    "declarationTitle": "SEVERE STORMS AND FLOODING",
                    "incidentType": "Flood",
                    "declarationDate": "2025-05-20T00:00:00Z",
                    "state": "NY"
                }]
            })))
            .mount(&server)
            .await;

        let source = FemaSource::new(Client::new(), true).with_base_url(server.uri());
        let items = source.fetch("d-1").await.unwrap();

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "fema-d-1-4781");
        assert_eq!(items[0].priority, Priority::High);
        assert_eq!(items[0].category, "flood");
        assert!(items[0].content.contains("NY"));
    }

    #[tokio::test]
    async fn test_upstream_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = FemaSource::new(Client::new(), true).with_base_url(server.uri());
        assert!(source.fetch("d-1").await.is_err());
    }
}
