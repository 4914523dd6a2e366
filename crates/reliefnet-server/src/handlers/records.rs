//! CRUD handlers over the record collections.
//!
//! Bodies are validated against the typed domain records before any storage
//! call, so malformed input surfaces as a 400 and never reaches the backend.

use std::collections::HashMap;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::{Map, Value, json};

use reliefnet_core::{CitizenReport, Disaster, ResourceRecord, generate_id};
use reliefnet_storage::{RecordQuery, SortOrder, StoredRecord, collections};

use crate::error::ApiError;
use crate::realtime::DomainEvent;
use crate::state::AppState;

/// Query parameter names with structural meaning; everything else is an
/// equality filter on a body field.
const RESERVED_PARAMS: &[&str] = &["_sort", "_order", "_offset", "_count"];

fn check_collection(collection: &str) -> Result<(), ApiError> {
    if collections::is_known(collection) {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!(
            "unknown collection: {collection}"
        )))
    }
}

/// Validate a body against the typed record for its collection.
fn validate_body(collection: &str, body: &Value) -> Result<(), ApiError> {
    match collection {
        collections::DISASTERS => {
            let record: Disaster = serde_json::from_value(body.clone())
                .map_err(|e| ApiError::bad_request(format!("invalid disaster: {e}")))?;
            record.validate()?;
        }
        collections::RESOURCES => {
            let record: ResourceRecord = serde_json::from_value(body.clone())
                .map_err(|e| ApiError::bad_request(format!("invalid resource: {e}")))?;
            record.validate()?;
        }
        collections::REPORTS => {
            let record: CitizenReport = serde_json::from_value(body.clone())
                .map_err(|e| ApiError::bad_request(format!("invalid report: {e}")))?;
            record.validate()?;
        }
        other => return Err(ApiError::bad_request(format!("unknown collection: {other}"))),
    }
    Ok(())
}

fn event_kind(collection: &str, created: bool) -> &'static str {
    match collection {
        collections::REPORTS if created => "report_created",
        collections::REPORTS => "report_updated",
        collections::RESOURCES => "resources_updated",
        _ => "disaster_updated",
    }
}

fn as_object(body: Value) -> Result<Map<String, Value>, ApiError> {
    match body {
        Value::Object(map) => Ok(map),
        _ => Err(ApiError::bad_request("body must be a JSON object")),
    }
}

pub async fn create_record(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    check_collection(&collection)?;
    let mut body = as_object(payload)?;

    let id = match body.get("id").and_then(Value::as_str) {
        Some(id) => id.to_string(),
        None => {
            let id = generate_id();
            body.insert("id".into(), json!(id));
            id
        }
    };
    let now = state.clock.now();
    body.entry("createdAt".to_string())
        .or_insert_with(|| json!(now));

    let body = Value::Object(body);
    validate_body(&collection, &body)?;

    let record = StoredRecord::new(id.as_str(), collection.as_str(), body.clone(), now);
    state.records.insert(&collection, record).await?;

    state
        .events
        .broadcast(&DomainEvent::new(event_kind(&collection, true), &collection, &id).with_body(body.clone()));

    Ok((StatusCode::CREATED, Json(body)))
}

pub async fn read_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    check_collection(&collection)?;
    let record = state
        .records
        .get(&collection, &id)
        .await?
        .ok_or(ApiError::NotFound {
            collection: collection.clone(),
            id,
        })?;
    Ok(Json(record.body))
}

pub async fn update_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> Result<impl IntoResponse, ApiError> {
    check_collection(&collection)?;
    let existing = state
        .records
        .get(&collection, &id)
        .await?
        .ok_or(ApiError::NotFound {
            collection: collection.clone(),
            id: id.clone(),
        })?;

    let mut body = as_object(payload)?;
    // The path is authoritative for the id; creation time survives updates
    body.insert("id".into(), json!(id));
    body.entry("createdAt".to_string())
        .or_insert_with(|| json!(existing.created_at));
    body.insert("updatedAt".into(), json!(state.clock.now()));

    let body = Value::Object(body);
    validate_body(&collection, &body)?;

    let updated = state.records.update(&collection, &id, body).await?;

    state.events.broadcast(
        &DomainEvent::new(event_kind(&collection, false), &collection, &id)
            .with_body(updated.body.clone()),
    );

    Ok(Json(updated.body))
}

pub async fn delete_record(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    check_collection(&collection)?;
    state.records.delete(&collection, &id).await?;

    state
        .events
        .broadcast(&DomainEvent::new(event_kind(&collection, false), &collection, &id));

    Ok(StatusCode::NO_CONTENT)
}

pub async fn list_records(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    check_collection(&collection)?;

    let mut query = RecordQuery::new();
    for (key, value) in &params {
        if RESERVED_PARAMS.contains(&key.as_str()) {
            continue;
        }
        query = query.with_filter(key.clone(), coerce_filter_value(value));
    }

    if let Some(sort) = params.get("_sort") {
        let order = match params.get("_order").map(String::as_str) {
            Some("asc") => SortOrder::Asc,
            Some("desc") | None => SortOrder::Desc,
            Some(other) => {
                return Err(ApiError::bad_request(format!(
                    "_order must be asc or desc, got {other}"
                )));
            }
        };
        query = query.with_sort(sort.clone(), order);
    }

    if let Some(offset) = params.get("_offset") {
        let offset: usize = offset
            .parse()
            .map_err(|_| ApiError::bad_request("_offset must be a non-negative integer"))?;
        query = query.with_offset(offset);
    }

    let count = match params.get("_count") {
        Some(raw) => raw
            .parse::<usize>()
            .map_err(|_| ApiError::bad_request("_count must be a positive integer"))?
            .min(state.pagination.max_count),
        None => state.pagination.default_count,
    };
    query = query.with_limit(count);

    let page = state.records.query(&collection, &query).await?;
    let items: Vec<Value> = page.entries.into_iter().map(|r| r.body).collect();

    Ok(Json(json!({
        "items": items,
        "total": page.total,
        "hasMore": page.has_more,
    })))
}

/// Query values arrive as strings; compare numbers and booleans natively
/// when they parse as such.
fn coerce_filter_value(raw: &str) -> Value {
    if let Ok(n) = raw.parse::<i64>() {
        return json!(n);
    }
    if let Ok(f) = raw.parse::<f64>() {
        return json!(f);
    }
    match raw {
        "true" => json!(true),
        "false" => json!(false),
        _ => json!(raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_filter_value() {
        assert_eq!(coerce_filter_value("42"), json!(42));
        assert_eq!(coerce_filter_value("4.5"), json!(4.5));
        assert_eq!(coerce_filter_value("true"), json!(true));
        assert_eq!(coerce_filter_value("flood"), json!("flood"));
    }

    #[test]
    fn test_event_kinds() {
        assert_eq!(event_kind("reports", true), "report_created");
        assert_eq!(event_kind("resources", true), "resources_updated");
        assert_eq!(event_kind("disasters", false), "disaster_updated");
    }

    #[test]
    fn test_unknown_collection_rejected() {
        assert!(check_collection("patients").is_err());
        assert!(check_collection("disasters").is_ok());
    }
}
