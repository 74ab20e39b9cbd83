//! Identifier validation and quoting.
//!
//! SQL identifiers (table and column names) cannot be bound as parameters,
//! so every statement this crate builds splices them in quoted form. Both
//! supported dialects use ANSI double quotes with embedded quotes doubled.
//!
//! Table names supplied by the user are validated once, before any
//! connection is opened; column names come from the source catalog and are
//! validated during introspection.

use crate::error::{CopyError, Result};

/// Maximum identifier length (conservative limit across databases).
/// - PostgreSQL: 63 bytes
/// - SQLite: no fixed limit
const MAX_IDENTIFIER_LENGTH: usize = 128;

/// Validate an identifier for security issues.
///
/// Rejects:
/// - Empty identifiers
/// - Identifiers containing null bytes (injection vector)
/// - Identifiers exceeding maximum length
///
/// # Errors
///
/// Returns `CopyError::Config` for invalid identifiers with a descriptive message.
pub fn validate_identifier(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CopyError::Config("Identifier cannot be empty".to_string()));
    }

    if name.contains('\0') {
        return Err(CopyError::Config(format!(
            "SECURITY: Identifier contains null byte (possible injection attempt): {:?}",
            name
        )));
    }

    if name.len() > MAX_IDENTIFIER_LENGTH {
        return Err(CopyError::Config(format!(
            "SECURITY: Identifier exceeds maximum length of {} bytes (got {} bytes): {:?}",
            MAX_IDENTIFIER_LENGTH,
            name.len(),
            name
        )));
    }

    Ok(())
}

/// Quote an identifier with ANSI double quotes.
///
/// Escapes double quotes by doubling them. Callers are expected to have
/// validated the identifier already.
///
/// # Examples
///
/// ```
/// use db_copy::core::identifier::quote_double;
///
/// assert_eq!(quote_double("users"), "\"users\"");
/// assert_eq!(quote_double("table\"name"), "\"table\"\"name\"");
/// ```
pub fn quote_double(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_identifier_normal() {
        assert!(validate_identifier("users").is_ok());
        assert!(validate_identifier("sample_users").is_ok());
        assert!(validate_identifier("Order Details").is_ok());
    }

    #[test]
    fn test_validate_identifier_rejects_empty() {
        let err = validate_identifier("").unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_validate_identifier_rejects_null_byte() {
        let err = validate_identifier("users\0; DROP TABLE x").unwrap_err();
        assert!(err.to_string().contains("null byte"));
    }

    #[test]
    fn test_validate_identifier_rejects_too_long() {
        let name = "a".repeat(MAX_IDENTIFIER_LENGTH + 1);
        let err = validate_identifier(&name).unwrap_err();
        assert!(err.to_string().contains("maximum length"));
    }

    #[test]
    fn test_validate_identifier_accepts_max_length() {
        let name = "a".repeat(MAX_IDENTIFIER_LENGTH);
        assert!(validate_identifier(&name).is_ok());
    }

    #[test]
    fn test_quote_double_sql_injection_safely_quoted() {
        let quoted = quote_double("users\"; DROP TABLE users; --");
        assert_eq!(quoted, "\"users\"\"; DROP TABLE users; --\"");
        assert!(quoted.starts_with('"') && quoted.ends_with('"'));
    }
}
