//! Domain record types stored in the relational backend.
//!
//! Wire format is camelCase JSON. The HTTP layer accepts and returns these
//! shapes directly; the storage layer treats them as opaque JSON bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{CoreError, Result};

/// A WGS84 coordinate pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(CoreError::InvalidCoordinate {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }
}

/// Verification state of a citizen-submitted report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    #[default]
    Pending,
    Verified,
    Rejected,
}

/// A tracked disaster event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Disaster {
    pub id: String,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub owner_id: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Disaster {
    /// Validate client-supplied fields before any storage or orchestration.
    pub fn validate(&self) -> Result<()> {
        crate::id::validate_id(&self.id)?;
        if self.title.trim().is_empty() {
            return Err(CoreError::invalid_record("title must not be empty"));
        }
        if self.description.len() > 10_000 {
            return Err(CoreError::invalid_record("description exceeds 10000 bytes"));
        }
        Ok(())
    }
}

/// A relief resource (shelter, hospital, supply point) tied to a disaster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub id: String,
    pub disaster_id: String,
    pub name: String,
    pub location_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<GeoPoint>,
    /// Resource kind: shelter, hospital, food, water, medical
    #[serde(rename = "type")]
    pub resource_type: String,
    pub created_at: DateTime<Utc>,
}

impl ResourceRecord {
    pub fn validate(&self) -> Result<()> {
        crate::id::validate_id(&self.id)?;
        crate::id::validate_id(&self.disaster_id)?;
        if self.name.trim().is_empty() {
            return Err(CoreError::invalid_record("name must not be empty"));
        }
        if self.resource_type.trim().is_empty() {
            return Err(CoreError::invalid_record("type must not be empty"));
        }
        Ok(())
    }
}

/// A citizen-submitted report attached to a disaster.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitizenReport {
    pub id: String,
    pub disaster_id: String,
    pub user_id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub verification_status: VerificationStatus,
    pub created_at: DateTime<Utc>,
}

impl CitizenReport {
    pub fn validate(&self) -> Result<()> {
        crate::id::validate_id(&self.id)?;
        crate::id::validate_id(&self.disaster_id)?;
        if self.content.trim().is_empty() {
            return Err(CoreError::invalid_record("content must not be empty"));
        }
        if self.content.len() > 10_000 {
            return Err(CoreError::invalid_record("content exceeds 10000 bytes"));
        }
        Ok(())
    }
}

/// Serialize any record into the opaque JSON body the storage layer expects.
pub fn to_body<T: Serialize>(record: &T) -> Result<Value> {
    Ok(serde_json::to_value(record)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_disaster() -> Disaster {
        Disaster {
            id: "nyc-flood".into(),
            title: "NYC Flood".into(),
            location_name: Some("Manhattan, NYC".into()),
            location: None,
            description: "Heavy flooding in lower Manhattan".into(),
            tags: vec!["flood".into(), "urgent".into()],
            owner_id: "netrunnerX".into(),
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn test_geo_point_bounds() {
        assert!(GeoPoint::new(40.7128, -74.0060).is_ok());
        assert!(GeoPoint::new(90.1, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.5).is_err());
    }

    #[test]
    fn test_disaster_validation() {
        let mut d = sample_disaster();
        assert!(d.validate().is_ok());

        d.title = "  ".into();
        assert!(d.validate().is_err());
    }

    #[test]
    fn test_disaster_serializes_camel_case() {
        let d = sample_disaster();
        let v = serde_json::to_value(&d).unwrap();
        assert!(v.get("locationName").is_some());
        assert!(v.get("ownerId").is_some());
        assert!(v.get("createdAt").is_some());
        assert!(v.get("location_name").is_none());
    }

    #[test]
    fn test_report_content_limit() {
        let r = CitizenReport {
            id: "r1".into(),
            disaster_id: "nyc-flood".into(),
            user_id: "citizen1".into(),
            content: "x".repeat(10_001),
            image_url: None,
            verification_status: VerificationStatus::default(),
            created_at: Utc::now(),
        };
        assert!(r.validate().is_err());
    }

    #[test]
    fn test_verification_status_default() {
        let json = r#"{
            "id": "r1",
            "disasterId": "d1",
            "userId": "u1",
            "content": "need water",
            "createdAt": "2024-06-01T12:00:00Z"
        }"#;
        let r: CitizenReport = serde_json::from_str(json).unwrap();
        assert_eq!(r.verification_status, VerificationStatus::Pending);
    }
}
