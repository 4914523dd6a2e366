//! HTTP error mapping.
//!
//! Domain and storage errors carry their own client/server classification;
//! this module translates them into status codes and a uniform JSON error
//! body. Provider failures never reach here: the domain services are total
//! and return degraded results instead.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use thiserror::Error;

use reliefnet_core::CoreError;
use reliefnet_storage::StorageError;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    #[error("{collection}/{id} already exists")]
    Conflict { collection: String, id: String },

    #[error("internal error")]
    Internal(anyhow::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NotFound { .. } => StatusCode::NOT_FOUND,
            Self::Conflict { .. } => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "invalid",
            Self::NotFound { .. } => "not-found",
            Self::Conflict { .. } => "conflict",
            Self::Internal(_) => "internal",
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::RecordNotFound { collection, id } => Self::NotFound { collection, id },
            e if e.is_client_error() => Self::BadRequest(e.to_string()),
            e => Self::Internal(e.into()),
        }
    }
}

impl From<StorageError> for ApiError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound { collection, id } => Self::NotFound { collection, id },
            StorageError::AlreadyExists { collection, id } => Self::Conflict { collection, id },
            StorageError::InvalidRecord { message } => Self::BadRequest(message),
            StorageError::UnknownCollection { collection } => {
                Self::BadRequest(format!("unknown collection: {collection}"))
            }
            e => Self::Internal(e.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        }
        // Internal details stay in the log, not the response body
        let message = match &self {
            Self::Internal(_) => "internal server error".to_string(),
            other => other.to_string(),
        };
        let body = json!({
            "error": {
                "code": self.code(),
                "message": message,
            }
        });
        (status, Json(body)).into_response()
    }
}
