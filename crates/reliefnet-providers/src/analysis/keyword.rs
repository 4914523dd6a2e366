use async_trait::async_trait;

use super::{ClassifierOutput, ContentType, Urgency};
use crate::chain::FallbackProvider;
use crate::error::ProviderError;

/// Terms that escalate urgency when present.
const CRITICAL_TERMS: &[&str] = &[
    "trapped", "sos", "drowning", "collapsed", "unconscious", "bleeding", "dying",
];
const HIGH_TERMS: &[&str] = &[
    "urgent",
    "emergency",
    "help",
    "rescue",
    "injured",
    "missing",
    "stranded",
];
const MEDIUM_TERMS: &[&str] = &["need", "shortage", "damaged", "without power", "evacuate"];

/// Disaster category markers, first match wins.
const CATEGORIES: &[(&str, &[&str])] = &[
    ("flood", &["flood", "water rising", "submerged", "levee"]),
    ("fire", &["fire", "smoke", "burning", "wildfire"]),
    ("earthquake", &["earthquake", "tremor", "aftershock"]),
    ("storm", &["hurricane", "tornado", "storm", "wind"]),
    ("medical", &["medical", "injured", "hospital", "ambulance"]),
    ("shelter", &["shelter", "homeless", "displaced"]),
    ("supplies", &["food", "water", "supplies", "medicine"]),
];

const OFFER_MARKERS: &[&str] = &["offering", "we have", "available", "can provide", "volunteer"];
const REQUEST_MARKERS: &[&str] = &["need", "help", "please", "send", "require", "sos"];
const DAMAGE_MARKERS: &[&str] = &["damaged", "destroyed", "collapsed", "flooded", "burned"];

/// Deterministic keyword-matching classifier. Last in the chain and always
/// eligible, so classification degrades gracefully when the hosted model is
/// down or unconfigured.
pub struct KeywordClassifier;

impl KeywordClassifier {
    fn matched_terms(text: &str, terms: &[&str]) -> Vec<String> {
        terms
            .iter()
            .filter(|t| text.contains(*t))
            .map(|t| t.to_string())
            .collect()
    }

    /// Deterministic classification, usable directly without a chain.
    pub fn classify_text(text: &str) -> ClassifierOutput {
        let text = text.to_lowercase();

        let critical = Self::matched_terms(&text, CRITICAL_TERMS);
        let high = Self::matched_terms(&text, HIGH_TERMS);
        let medium = Self::matched_terms(&text, MEDIUM_TERMS);

        let urgency = if !critical.is_empty() {
            Urgency::Critical
        } else if !high.is_empty() {
            Urgency::High
        } else if !medium.is_empty() {
            Urgency::Medium
        } else {
            Urgency::Low
        };

        let category = CATEGORIES
            .iter()
            .find(|(_, markers)| markers.iter().any(|m| text.contains(m)))
            .map(|(name, _)| name.to_string())
            .unwrap_or_else(|| "general".to_string());

        let content_type = if DAMAGE_MARKERS.iter().any(|m| text.contains(m)) {
            ContentType::DamageReport
        } else if OFFER_MARKERS.iter().any(|m| text.contains(m)) {
            ContentType::OfferHelp
        } else if REQUEST_MARKERS.iter().any(|m| text.contains(m)) {
            ContentType::HelpRequest
        } else {
            ContentType::Information
        };

        let mut keywords: Vec<String> = critical;
        keywords.extend(high);
        keywords.extend(medium);

        // Relevance: how strongly the text matches any disaster vocabulary.
        let relevance = if category != "general" || !keywords.is_empty() {
            (0.4 + 0.15 * keywords.len() as f64).min(0.9)
        } else {
            0.1
        };

        ClassifierOutput {
            relevance,
            urgency,
            category,
            content_type,
            keywords,
        }
    }
}

#[async_trait]
impl FallbackProvider<str, ClassifierOutput> for KeywordClassifier {
    fn name(&self) -> &'static str {
        "keyword"
    }

    async fn attempt(&self, input: &str) -> Result<ClassifierOutput, ProviderError> {
        Ok(Self::classify_text(input))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_terms_dominate() {
        let out = KeywordClassifier::classify_text("Trapped on the roof, water rising, need help");
        assert_eq!(out.urgency, Urgency::Critical);
        assert_eq!(out.category, "flood");
        assert!(out.keywords.contains(&"trapped".to_string()));
    }

    #[test]
    fn test_offer_detection() {
        let out = KeywordClassifier::classify_text("We have blankets and food available downtown");
        assert_eq!(out.content_type, ContentType::OfferHelp);
        assert_eq!(out.category, "supplies");
    }

    #[test]
    fn test_damage_report_detection() {
        let out = KeywordClassifier::classify_text("Bridge on 5th street collapsed after the earthquake");
        assert_eq!(out.content_type, ContentType::DamageReport);
        assert_eq!(out.category, "earthquake");
        assert_eq!(out.urgency, Urgency::Critical);
    }

    #[test]
    fn test_unrelated_text_is_low_relevance() {
        let out = KeywordClassifier::classify_text("Nice weather for a picnic today");
        assert_eq!(out.urgency, Urgency::Low);
        assert_eq!(out.category, "general");
        assert_eq!(out.content_type, ContentType::Information);
        assert!(out.relevance < 0.2);
    }

    #[test]
    fn test_same_input_same_output() {
        let a = KeywordClassifier::classify_text("urgent: need water at the shelter");
        let b = KeywordClassifier::classify_text("urgent: need water at the shelter");
        assert_eq!(a.urgency, b.urgency);
        assert_eq!(a.keywords, b.keywords);
        assert_eq!(a.relevance, b.relevance);
    }
}
