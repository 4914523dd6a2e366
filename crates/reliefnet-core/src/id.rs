use crate::error::{CoreError, Result};

/// Generate a new record ID (UUID v4).
pub fn generate_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Validate a record ID supplied by a client.
///
/// IDs are limited to 64 characters of `[A-Za-z0-9._-]`, which covers both
/// generated UUIDs and externally supplied slugs.
pub fn validate_id(id: &str) -> Result<()> {
    if id.is_empty() || id.len() > 64 {
        return Err(CoreError::invalid_id(id));
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
    {
        return Err(CoreError::invalid_id(id));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_id_is_valid() {
        let id = generate_id();
        assert!(validate_id(&id).is_ok());
    }

    #[test]
    fn test_rejects_empty_and_oversized() {
        assert!(validate_id("").is_err());
        assert!(validate_id(&"x".repeat(65)).is_err());
    }

    #[test]
    fn test_rejects_invalid_characters() {
        assert!(validate_id("abc/def").is_err());
        assert!(validate_id("abc def").is_err());
        assert!(validate_id("nyc-flood-2024").is_ok());
    }
}
