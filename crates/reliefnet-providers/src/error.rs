use std::time::Duration;

use thiserror::Error;

/// Errors a single provider attempt can fail with.
///
/// The orchestrator treats all variants identically - log, record, advance
/// to the next provider - but keeping them distinct makes the attempt log
/// useful.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(&'static str),

    #[error("No result for input")]
    Empty,

    #[error("Timed out after {0:?}")]
    Timeout(Duration),
}

impl ProviderError {
    /// Create an `UnexpectedResponse` error.
    pub fn unexpected(message: impl Into<String>) -> Self {
        Self::UnexpectedResponse(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages() {
        assert_eq!(
            ProviderError::unexpected("missing field 'lat'").to_string(),
            "Unexpected response: missing field 'lat'"
        );
        assert_eq!(
            ProviderError::NotConfigured("google").to_string(),
            "Provider not configured: google"
        );
        assert!(
            ProviderError::Timeout(Duration::from_secs(5))
                .to_string()
                .contains("5s")
        );
    }
}
