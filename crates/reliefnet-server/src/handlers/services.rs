//! Domain service endpoints.
//!
//! These are total: provider failure produces a degraded result with a 200,
//! never a 5xx. Only malformed input (400) and a missing parent disaster
//! (404) are error responses.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;

use reliefnet_core::{Disaster, GeoPoint};
use reliefnet_providers::updates::UpdateFilters;
use reliefnet_storage::collections;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeocodeRequest {
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
}

/// `POST /api/geocode` with either a free-text `location` (forward) or a
/// `latitude`/`longitude` pair (reverse).
pub async fn geocode(
    State(state): State<AppState>,
    Json(request): Json<GeocodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    match (request.location, request.latitude, request.longitude) {
        (Some(location), _, _) => {
            if location.trim().is_empty() {
                return Err(ApiError::bad_request("location must not be empty"));
            }
            Ok(Json(state.geocoding.resolve(&location).await))
        }
        (None, Some(latitude), Some(longitude)) => {
            let point = GeoPoint::new(latitude, longitude)?;
            Ok(Json(state.geocoding.reverse(point).await))
        }
        _ => Err(ApiError::bad_request(
            "provide either location or latitude and longitude",
        )),
    }
}

#[derive(Debug, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
}

/// `POST /api/analyze`
pub async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<AnalyzeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    if request.text.trim().is_empty() {
        return Err(ApiError::bad_request("text must not be empty"));
    }
    if request.text.len() > 10_000 {
        return Err(ApiError::bad_request("text exceeds 10000 bytes"));
    }
    Ok(Json(state.analysis.classify(&request.text).await))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyImageRequest {
    pub image_url: String,
}

/// `POST /api/verify-image`
pub async fn verify_image(
    State(state): State<AppState>,
    Json(request): Json<VerifyImageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let url = request.image_url.trim();
    if !url.starts_with("http://") && !url.starts_with("https://") {
        return Err(ApiError::bad_request("imageUrl must be an http(s) URL"));
    }
    Ok(Json(state.analysis.verify_image(url).await))
}

/// `GET /api/disasters/{id}/updates`
pub async fn disaster_updates(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(mut filters): Query<UpdateFilters>,
) -> Result<impl IntoResponse, ApiError> {
    require_disaster(&state, &id).await?;

    filters.limit = Some(
        filters
            .limit
            .unwrap_or(state.pagination.default_count)
            .min(state.pagination.max_count),
    );

    Ok(Json(state.updates.fetch_updates(&id, &filters).await))
}

/// `GET /api/disasters/{id}/social`
pub async fn disaster_social(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let disaster = require_disaster(&state, &id).await?;

    // Monitoring keywords: explicit tags first, then the headline fields
    let mut keywords = disaster.tags.clone();
    if keywords.is_empty() {
        if let Some(location) = &disaster.location_name {
            keywords.push(location.clone());
        }
        keywords.push(disaster.title.clone());
    }

    Ok(Json(state.social.fetch_social(&id, &keywords).await))
}

async fn require_disaster(state: &AppState, id: &str) -> Result<Disaster, ApiError> {
    let record = state
        .records
        .get(collections::DISASTERS, id)
        .await?
        .ok_or_else(|| ApiError::NotFound {
            collection: collections::DISASTERS.to_string(),
            id: id.to_string(),
        })?;
    serde_json::from_value(record.body)
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("stored disaster is malformed: {e}")))
}
