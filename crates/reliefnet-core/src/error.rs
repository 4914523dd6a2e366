use thiserror::Error;

/// Core error types for ReliefNet operations
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("Invalid collection: {0}")]
    InvalidCollection(String),

    #[error("Invalid ID: {0}")]
    InvalidId(String),

    #[error("Invalid coordinate: latitude {latitude}, longitude {longitude}")]
    InvalidCoordinate { latitude: f64, longitude: f64 },

    #[error("JSON serialization error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("UUID error: {0}")]
    UuidError(#[from] uuid::Error),

    #[error("Record not found: {collection}/{id}")]
    RecordNotFound { collection: String, id: String },

    #[error("Invalid record data: {message}")]
    InvalidRecord { message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    /// Create a new InvalidCollection error
    pub fn invalid_collection(collection: impl Into<String>) -> Self {
        Self::InvalidCollection(collection.into())
    }

    /// Create a new InvalidId error
    pub fn invalid_id(id: impl Into<String>) -> Self {
        Self::InvalidId(id.into())
    }

    /// Create a new RecordNotFound error
    pub fn record_not_found(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self::RecordNotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }

    /// Create a new InvalidRecord error
    pub fn invalid_record(message: impl Into<String>) -> Self {
        Self::InvalidRecord {
            message: message.into(),
        }
    }

    /// Create a new Configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Check if this error is a client error (4xx category)
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidCollection(_)
                | Self::InvalidId(_)
                | Self::InvalidCoordinate { .. }
                | Self::InvalidRecord { .. }
                | Self::RecordNotFound { .. }
                | Self::JsonError(_)
        )
    }

    /// Check if this error is a server error (5xx category)
    pub fn is_server_error(&self) -> bool {
        matches!(self, Self::Configuration(_) | Self::UuidError(_))
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidCollection(_)
            | Self::InvalidId(_)
            | Self::InvalidCoordinate { .. }
            | Self::InvalidRecord { .. } => ErrorCategory::Validation,
            Self::RecordNotFound { .. } => ErrorCategory::NotFound,
            Self::JsonError(_) => ErrorCategory::Serialization,
            Self::UuidError(_) => ErrorCategory::System,
            Self::Configuration(_) => ErrorCategory::Configuration,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    NotFound,
    Serialization,
    System,
    Configuration,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::NotFound => write!(f, "not_found"),
            Self::Serialization => write!(f, "serialization"),
            Self::System => write!(f, "system"),
            Self::Configuration => write!(f, "configuration"),
        }
    }
}

/// Convenience result type for core operations
pub type Result<T> = std::result::Result<T, CoreError>;
