//! External provider integrations and fallback orchestration.
//!
//! Every domain service here follows the same shape: check the response
//! cache, then walk an ordered provider chain until one succeeds, then cache
//! the result. When every provider fails the service returns a
//! clearly-marked degraded result instead of an error - "resolve a value"
//! operations are total.

pub mod analysis;
pub mod chain;
pub mod error;
pub mod geocoding;
pub mod social;
pub mod updates;

pub use chain::{AttemptFailure, ChainOutcome, FallbackChain, FallbackProvider};
pub use error::ProviderError;

/// Provider tag carried by degraded results. Callers that need to tell a
/// genuine low-confidence hit from a synthetic one check for this value.
pub const MOCK_PROVIDER: &str = "mock";
