//! Object identifiers
//!
//! Identifiers are interpolated into a query string literal and into IRIs,
//! so anything that could close either is rejected up front.

use std::fmt;

use crate::error::ManifestError;

/// Characters that may not appear in an identifier
const FORBIDDEN: &[char] = &['"', '\'', '\\', '<', '>', '{', '}', '|', '^', '`'];

/// Identifier of one digitized object in the source catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectIdentifier(String);

impl ObjectIdentifier {
    /// Validate and wrap an identifier
    pub fn parse(raw: &str) -> Result<Self, ManifestError> {
        validate_identifier(raw).map_err(|reason| ManifestError::InvalidIdentifier {
            identifier: raw.to_string(),
            reason,
        })?;
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ObjectIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectIdentifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Check an identifier is safe for query interpolation
pub fn validate_identifier(raw: &str) -> Result<(), String> {
    if raw.is_empty() {
        return Err("Identifier cannot be empty".to_string());
    }
    if let Some(c) = raw
        .chars()
        .find(|c| c.is_whitespace() || c.is_control() || FORBIDDEN.contains(c))
    {
        return Err(format!("Identifier contains disallowed character {:?}", c));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accepts_catalog_identifiers() {
        assert!(ObjectIdentifier::parse("ubb-ms-0003").is_ok());
        assert!(ObjectIdentifier::parse("ubb-jg-k-0001-01").is_ok());
        assert!(ObjectIdentifier::parse("ubm.bros.1234_a").is_ok());
    }

    #[test]
    fn test_rejects_empty() {
        let err = ObjectIdentifier::parse("").unwrap_err();
        assert!(matches!(err, ManifestError::InvalidIdentifier { .. }));
    }

    #[test]
    fn test_rejects_query_injection() {
        assert!(validate_identifier("x\" } ; DROP ALL ; #").is_err());
        assert!(validate_identifier("x> <http://evil").is_err());
        assert!(validate_identifier("a b").is_err());
        assert!(validate_identifier("line\nbreak").is_err());
        assert!(validate_identifier("back\\slash").is_err());
    }

    #[test]
    fn test_display() {
        let id = ObjectIdentifier::parse("ubb-ms-0003").unwrap();
        assert_eq!(id.to_string(), "ubb-ms-0003");
        assert_eq!(id.as_str(), "ubb-ms-0003");
    }
}
