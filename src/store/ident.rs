//! Identifier validation for generated SQL
//!
//! Table and column names cannot be bound as parameters, so they are checked
//! against an allow-list before being quoted into statement text.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{ConvertError, Result};

/// Longest identifier MySQL accepts
const MAX_IDENTIFIER_LEN: usize = 64;

static TABLE_NAME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,63}$").expect("valid table name regex"));

/// Check a table name: ASCII letters, digits and underscores, not starting
/// with a digit, at most 64 characters.
pub fn validate_table_name(name: &str) -> Result<&str> {
    if TABLE_NAME.is_match(name) {
        Ok(name)
    } else {
        Err(ConvertError::InvalidIdentifier(name.to_string()))
    }
}

/// Check a column name. Column names come from data keys, so spaces and
/// non-ASCII letters are allowed; quotes, backticks, control characters and
/// trailing spaces are not.
pub fn validate_column_name(name: &str) -> Result<&str> {
    let ok = !name.is_empty()
        && name.chars().count() <= MAX_IDENTIFIER_LEN
        && !name.ends_with(' ')
        && !name
            .chars()
            .any(|c| c.is_control() || matches!(c, '`' | '"' | '\'' | '\\'));
    if ok {
        Ok(name)
    } else {
        Err(ConvertError::InvalidIdentifier(name.to_string()))
    }
}

/// Wrap a validated identifier in backticks (accepted by MySQL and SQLite)
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_names() {
        assert!(validate_table_name("users").is_ok());
        assert!(validate_table_name("_tmp_2024").is_ok());
        assert!(validate_table_name("2024_users").is_err());
        assert!(validate_table_name("").is_err());
        assert!(validate_table_name("a.b").is_err());
        assert!(validate_table_name(&"t".repeat(65)).is_err());
        assert!(matches!(
            validate_table_name("\"; DROP TABLE x; --").unwrap_err(),
            ConvertError::InvalidIdentifier(_)
        ));
    }

    #[test]
    fn test_column_names() {
        assert!(validate_column_name("first name").is_ok());
        assert!(validate_column_name("città").is_ok());
        assert!(validate_column_name("a`b").is_err());
        assert!(validate_column_name("x\"); DROP TABLE y; --").is_err());
        assert!(validate_column_name("trailing ").is_err());
        assert!(validate_column_name("").is_err());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("users"), "`users`");
    }
}
