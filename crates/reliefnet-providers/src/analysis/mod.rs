//! Content classification over a provider fallback chain.
//!
//! The primary classifier is an opaque hosted model; the fallback is a
//! deterministic keyword matcher producing the identical output shape, so
//! downstream consumers never special-case model availability. Priority
//! scoring lives here too: [`priority_score`] is the only place a business
//! priority is computed.

mod gemini;
mod keyword;

pub use gemini::GeminiClassifier;
pub use keyword::KeywordClassifier;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use reliefnet_cache::{CacheStore, text_key};
use reliefnet_core::{Clock, Priority};

use crate::MOCK_PROVIDER;
use crate::chain::{ChainOutcome, FallbackChain};

/// Upper bound of the priority score scale.
pub const MAX_PRIORITY_SCORE: u8 = 10;

/// Lower bound of the priority score scale.
pub const MIN_PRIORITY_SCORE: u8 = 1;

/// How urgent a piece of content reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Urgency {
    Low,
    Medium,
    High,
    Critical,
}

impl Urgency {
    fn weight(self) -> u8 {
        match self {
            Urgency::Low => 0,
            Urgency::Medium => 1,
            Urgency::High => 2,
            Urgency::Critical => 4,
        }
    }
}

/// What kind of content a report is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    HelpRequest,
    DamageReport,
    OfferHelp,
    Information,
}

impl ContentType {
    fn weight(self) -> u8 {
        match self {
            ContentType::HelpRequest | ContentType::DamageReport => 2,
            ContentType::OfferHelp => 1,
            ContentType::Information => 0,
        }
    }
}

/// Raw classifier output, before the service stamps provider and timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifierOutput {
    /// Disaster relevance in `[0, 1]`.
    pub relevance: f64,
    pub urgency: Urgency,
    pub category: String,
    pub content_type: ContentType,
    pub keywords: Vec<String>,
}

/// Normalized classification returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Classification {
    pub relevance: f64,
    pub urgency: Urgency,
    pub category: String,
    pub content_type: ContentType,
    pub keywords: Vec<String>,
    /// Which backend produced this result; `"mock"` marks a degraded result.
    pub provider: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Classification {
    pub fn is_degraded(&self) -> bool {
        self.provider == MOCK_PROVIDER
    }
}

/// Image authenticity verdict scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verdict {
    Authentic,
    Suspicious,
    Unverified,
}

/// Raw verification output from a provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationOutput {
    pub verdict: Verdict,
    /// Provider confidence in the verdict, `[0, 1]`.
    pub confidence: f64,
    pub notes: String,
}

/// Normalized image verification result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImageVerification {
    pub verdict: Verdict,
    pub confidence: f64,
    pub notes: String,
    pub provider: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ImageVerification {
    pub fn is_degraded(&self) -> bool {
        self.provider == MOCK_PROVIDER
    }
}

/// The single priority scoring function. Every ranking caller goes through
/// here: base score, urgency weight, content-type weight, keyword-hit count,
/// engagement bonus, clamped to `[MIN_PRIORITY_SCORE, MAX_PRIORITY_SCORE]`.
pub fn priority_score(classification: &ClassifierOutput, engagement: u64) -> u8 {
    let keyword_hits = classification.keywords.len().min(2) as u8;
    let engagement_bonus = if engagement >= 1000 {
        2
    } else if engagement >= 100 {
        1
    } else {
        0
    };

    let score = MIN_PRIORITY_SCORE
        + classification.urgency.weight()
        + classification.content_type.weight()
        + keyword_hits
        + engagement_bonus;
    score.clamp(MIN_PRIORITY_SCORE, MAX_PRIORITY_SCORE)
}

/// Map a priority score onto the coarse [`Priority`] enum used for ranking
/// feed items.
pub fn priority_for_score(score: u8) -> Priority {
    match score {
        s if s >= 8 => Priority::Critical,
        s if s >= 6 => Priority::High,
        s if s >= 4 => Priority::Medium,
        _ => Priority::Low,
    }
}

/// Classification service configuration.
#[derive(Debug, Clone)]
pub struct AnalysisOptions {
    pub attempt_timeout: std::time::Duration,
    pub cache_ttl: chrono::Duration,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            attempt_timeout: std::time::Duration::from_secs(10),
            cache_ttl: chrono::Duration::hours(1),
        }
    }
}

/// Content analysis service: cache, then classifier chain, then a marked
/// degraded result. `classify` and `verify_image` are total.
pub struct AnalysisService {
    classify: FallbackChain<str, ClassifierOutput>,
    verify: FallbackChain<str, VerificationOutput>,
    cache: CacheStore,
    clock: Arc<dyn Clock>,
    options: AnalysisOptions,
}

impl AnalysisService {
    pub fn new(
        classify: FallbackChain<str, ClassifierOutput>,
        verify: FallbackChain<str, VerificationOutput>,
        cache: CacheStore,
        clock: Arc<dyn Clock>,
        options: AnalysisOptions,
    ) -> Self {
        Self {
            classify,
            verify,
            cache,
            clock,
            options,
        }
    }

    /// Classify free-text content. Never fails: on total provider
    /// exhaustion a neutral marked result is returned.
    pub async fn classify(&self, text: &str) -> Classification {
        let key = text_key("analyze", "auto", text);
        if let Some(cached) = self.cache.get_as::<Classification>(&key).await {
            return cached;
        }

        let result = match self.classify.resolve(text).await {
            ChainOutcome::Resolved {
                value, provider, ..
            } => Classification {
                relevance: value.relevance,
                urgency: value.urgency,
                category: value.category,
                content_type: value.content_type,
                keywords: value.keywords,
                provider: provider.to_string(),
                timestamp: self.clock.now(),
                error: None,
            },
            ChainOutcome::Exhausted { failures } => {
                return Classification {
                    relevance: 0.0,
                    urgency: Urgency::Low,
                    category: "unknown".to_string(),
                    content_type: ContentType::Information,
                    keywords: Vec::new(),
                    provider: MOCK_PROVIDER.to_string(),
                    timestamp: self.clock.now(),
                    error: Some(ChainOutcome::<ClassifierOutput>::failure_summary(&failures)),
                };
            }
        };

        // Degraded results are never cached.
        self.cache
            .set_json(&key, &result, self.options.cache_ttl)
            .await;
        result
    }

    /// Assess image authenticity from a URL. Same orchestration shape as
    /// [`classify`](Self::classify).
    pub async fn verify_image(&self, image_url: &str) -> ImageVerification {
        let key = text_key("verify-image", "auto", image_url);
        if let Some(cached) = self.cache.get_as::<ImageVerification>(&key).await {
            return cached;
        }

        let result = match self.verify.resolve(image_url).await {
            ChainOutcome::Resolved {
                value, provider, ..
            } => ImageVerification {
                verdict: value.verdict,
                confidence: value.confidence,
                notes: value.notes,
                provider: provider.to_string(),
                timestamp: self.clock.now(),
                error: None,
            },
            ChainOutcome::Exhausted { failures } => {
                return ImageVerification {
                    verdict: Verdict::Unverified,
                    confidence: 0.0,
                    notes: "no verification provider available".to_string(),
                    provider: MOCK_PROVIDER.to_string(),
                    timestamp: self.clock.now(),
                    error: Some(ChainOutcome::<VerificationOutput>::failure_summary(
                        &failures,
                    )),
                };
            }
        };

        self.cache
            .set_json(&key, &result, self.options.cache_ttl)
            .await;
        result
    }
}
