//! Deterministic cache key construction.
//!
//! Keys are `operation:scope:encoded-input`. The provider scope is part of
//! the key so a forced provider choice (`geocode:google:...`) never collides
//! with the auto-fallback entry (`geocode:auto:...`).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Key for an operation over free text (location names, report content,
/// URLs). The subject is trimmed and lowercased before encoding so trivially
/// different spellings share an entry.
pub fn text_key(operation: &str, scope: &str, subject: &str) -> String {
    let normalized = subject.trim().to_lowercase();
    format!(
        "{operation}:{scope}:{}",
        URL_SAFE_NO_PAD.encode(normalized.as_bytes())
    )
}

/// Key for an operation over coordinates (reverse geocoding). Coordinates
/// are rounded to four decimal places (~11m) so nearby lookups share an
/// entry.
pub fn coord_key(operation: &str, scope: &str, latitude: f64, longitude: f64) -> String {
    format!("{operation}:{scope}:{latitude:.4},{longitude:.4}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_key_is_deterministic() {
        let a = text_key("geocode", "auto", "Manhattan, NYC");
        let b = text_key("geocode", "auto", "  manhattan, nyc ");
        assert_eq!(a, b);
        assert!(a.starts_with("geocode:auto:"));
    }

    #[test]
    fn test_scope_separates_entries() {
        let auto = text_key("geocode", "auto", "Manhattan, NYC");
        let forced = text_key("geocode", "google", "Manhattan, NYC");
        assert_ne!(auto, forced);
    }

    #[test]
    fn test_coord_key_rounds() {
        let a = coord_key("reverse", "auto", 40.712_83, -74.006_01);
        let b = coord_key("reverse", "auto", 40.712_829_9, -74.006_012);
        assert_eq!(a, b);
        assert_eq!(a, "reverse:auto:40.7128,-74.0060");
    }

    #[test]
    fn test_key_has_no_raw_subject() {
        let key = text_key("analyze", "auto", "urgent: need water at 5th ave");
        assert!(!key.contains(' '));
        assert!(!key.contains("water"));
    }
}
