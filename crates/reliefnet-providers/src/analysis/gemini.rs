use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{ClassifierOutput, VerificationOutput};
use crate::chain::FallbackProvider;
use crate::error::ProviderError;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-1.5-flash";

const CLASSIFY_PROMPT: &str = "Classify this disaster-related report. Respond with a single \
    JSON object, no markdown, with fields: relevance (0-1), urgency (low|medium|high|critical), \
    category (short noun like flood, fire, medical), contentType \
    (help_request|damage_report|offer_help|information), keywords (array of strings).\n\nReport:\n";

const VERIFY_PROMPT: &str = "Assess whether the image at this URL plausibly documents a real, \
    current disaster scene. Respond with a single JSON object, no markdown, with fields: \
    verdict (authentic|suspicious|unverified), confidence (0-1), notes (one sentence).\n\nURL:\n";

/// Hosted LLM classifier. Treated as a black box: it is prompted for strict
/// JSON and the reply is parsed into the shared output shape.
pub struct GeminiClassifier {
    http_client: Client,
    api_key: Option<String>,
    model: String,
    base_url: String,
}

impl GeminiClassifier {
    pub fn new(http_client: Client, api_key: Option<String>) -> Self {
        Self {
            http_client,
            api_key,
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (tests).
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    async fn generate(&self, prompt: String) -> Result<String, ProviderError> {
        let key = self
            .api_key
            .as_deref()
            .ok_or(ProviderError::NotConfigured("gemini"))?;
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        );

        let body: Value = self
            .http_client
            .post(&url)
            .query(&[("key", key)])
            .json(&json!({
                "contents": [{ "parts": [{ "text": prompt }] }],
                "generationConfig": { "temperature": 0.1 }
            }))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        body["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ProviderError::unexpected("missing candidate text"))
    }

    /// Models often wrap JSON replies in a markdown code fence despite the
    /// prompt; strip it before parsing.
    fn extract_json(text: &str) -> &str {
        let trimmed = text.trim();
        let trimmed = trimmed
            .strip_prefix("```json")
            .or_else(|| trimmed.strip_prefix("```"))
            .unwrap_or(trimmed);
        trimmed.strip_suffix("```").unwrap_or(trimmed).trim()
    }
}

#[async_trait]
impl FallbackProvider<str, ClassifierOutput> for GeminiClassifier {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn attempt(&self, input: &str) -> Result<ClassifierOutput, ProviderError> {
        let reply = self.generate(format!("{CLASSIFY_PROMPT}{input}")).await?;
        serde_json::from_str(Self::extract_json(&reply))
            .map_err(|e| ProviderError::unexpected(format!("unparseable classification: {e}")))
    }
}

#[async_trait]
impl FallbackProvider<str, VerificationOutput> for GeminiClassifier {
    fn name(&self) -> &'static str {
        "gemini"
    }

    fn enabled(&self) -> bool {
        self.api_key.is_some()
    }

    async fn attempt(&self, input: &str) -> Result<VerificationOutput, ProviderError> {
        let reply = self.generate(format!("{VERIFY_PROMPT}{input}")).await?;
        serde_json::from_str(Self::extract_json(&reply))
            .map_err(|e| ProviderError::unexpected(format!("unparseable verdict: {e}")))
    }
}
