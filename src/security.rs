//! SQL construction safety for generated checks.
//!
//! Every identifier and literal interpolated into generated SQL passes
//! through this module. Column names are validated against a strict
//! pattern before being quoted, string literals have their quotes doubled,
//! and the free-form predicate fragments accepted by the `sql_query` check
//! kind are vetted against a statement/DDL blocklist. Rule JSON is the only
//! source of these values, so this is what keeps a hostile catalog from
//! smuggling SQL into the engine.

use crate::error::{FocusError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

static IDENTIFIER_REGEX: Lazy<Regex> = Lazy::new(|| {
    #[allow(clippy::expect_used)]
    Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("hard-coded regex pattern is valid")
});

/// Maximum accepted identifier length. FOCUS column ids are far shorter.
const MAX_IDENTIFIER_LEN: usize = 128;

/// Maximum accepted length for a `sql_query` predicate fragment.
const MAX_PREDICATE_LEN: usize = 5_000;

/// Validates a SQL identifier (column name) without quoting it.
///
/// Identifiers must match `[A-Za-z_][A-Za-z0-9_]*`, which also rules out
/// every quoting or comment character an injection would need.
pub fn validate_identifier(identifier: &str) -> Result<()> {
    if identifier.is_empty() || identifier.trim().is_empty() {
        return Err(FocusError::Security(
            "SQL identifier cannot be empty".to_string(),
        ));
    }
    if identifier.len() > MAX_IDENTIFIER_LEN {
        return Err(FocusError::Security(format!(
            "SQL identifier too long (max {MAX_IDENTIFIER_LEN} characters)"
        )));
    }
    if !IDENTIFIER_REGEX.is_match(identifier) {
        return Err(FocusError::Security(format!(
            "Invalid SQL identifier '{identifier}': identifiers must start with a letter or \
             underscore and contain only letters, digits, and underscores"
        )));
    }
    Ok(())
}

/// Validates an identifier and returns it double-quoted for the engine.
///
/// FOCUS column ids are CamelCase; quoting preserves their case through the
/// engine's identifier normalization.
pub fn quote_identifier(identifier: &str) -> Result<String> {
    validate_identifier(identifier)?;
    Ok(format!("\"{identifier}\""))
}

/// Escapes a string value as a single-quoted SQL literal.
pub fn lit(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Renders a JSON parameter value as a SQL literal.
///
/// Numbers and booleans pass through unquoted, `null` becomes `NULL`, and
/// everything else is escaped as a string literal.
pub fn lit_json(value: &serde_json::Value) -> Result<String> {
    match value {
        serde_json::Value::Null => Ok("NULL".to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string().to_uppercase()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::String(s) => Ok(lit(s)),
        other => Err(FocusError::Security(format!(
            "Cannot render {other} as a SQL literal"
        ))),
    }
}

/// Vets a boolean predicate fragment supplied by a `sql_query` rule.
///
/// The fragment is restricted to a single read-only expression: statement
/// separators, comments, and DDL/DML keywords are rejected outright.
pub fn vet_predicate(predicate: &str) -> Result<()> {
    if predicate.trim().is_empty() {
        return Err(FocusError::Security(
            "SQL predicate cannot be empty".to_string(),
        ));
    }
    if predicate.len() > MAX_PREDICATE_LEN {
        return Err(FocusError::Security(format!(
            "SQL predicate too long (max {MAX_PREDICATE_LEN} characters)"
        )));
    }
    if predicate.contains('\0') {
        return Err(FocusError::Security(
            "SQL predicate cannot contain null bytes".to_string(),
        ));
    }
    if predicate.contains(';') || predicate.contains("--") || predicate.contains("/*") {
        return Err(FocusError::Security(
            "SQL predicate cannot contain statement separators or comments".to_string(),
        ));
    }

    let lowered = predicate.to_lowercase();
    const FORBIDDEN: &[&str] = &[
        "drop", "create", "alter", "truncate", "insert", "update", "delete", "attach", "copy",
        "pragma", "install", "load", "set ", "grant", "revoke", "select",
    ];
    for keyword in FORBIDDEN {
        // Match on word boundaries so column names like `updated_at` survive.
        let pattern = format!(r"\b{}\b", keyword.trim());
        if Regex::new(&pattern)
            .map(|re| re.is_match(&lowered))
            .unwrap_or(false)
        {
            return Err(FocusError::Security(format!(
                "SQL predicate contains forbidden keyword '{}'",
                keyword.trim()
            )));
        }
    }
    Ok(())
}

/// Validates that a regex pattern compiles and escapes it for embedding.
pub fn vet_regex(pattern: &str) -> Result<String> {
    if pattern.len() > 1_000 {
        return Err(FocusError::Security(
            "Regex pattern too long (max 1000 characters)".to_string(),
        ));
    }
    Regex::new(pattern)
        .map_err(|e| FocusError::Security(format!("Invalid regex pattern: {e}")))?;
    Ok(pattern.replace('\'', "''"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_identifiers() {
        assert!(validate_identifier("BilledCost").is_ok());
        assert!(validate_identifier("_private").is_ok());
        assert!(validate_identifier("col1").is_ok());
    }

    #[test]
    fn test_invalid_identifiers() {
        assert!(validate_identifier("").is_err());
        assert!(validate_identifier("1col").is_err());
        assert!(validate_identifier("col name").is_err());
        assert!(validate_identifier("col-name").is_err());
        assert!(validate_identifier("col;DROP TABLE x").is_err());
        assert!(validate_identifier(&"a".repeat(200)).is_err());
    }

    #[test]
    fn test_quote_identifier() {
        assert_eq!(quote_identifier("BilledCost").unwrap(), "\"BilledCost\"");
        assert!(quote_identifier("a\"b").is_err());
    }

    #[test]
    fn test_lit_escapes_quotes() {
        assert_eq!(lit("O'Brien"), "'O''Brien'");
        assert_eq!(lit("plain"), "'plain'");
    }

    #[test]
    fn test_lit_json() {
        assert_eq!(lit_json(&serde_json::json!(null)).unwrap(), "NULL");
        assert_eq!(lit_json(&serde_json::json!(42)).unwrap(), "42");
        assert_eq!(lit_json(&serde_json::json!(1.5)).unwrap(), "1.5");
        assert_eq!(lit_json(&serde_json::json!("USD")).unwrap(), "'USD'");
        assert!(lit_json(&serde_json::json!(["a"])).is_err());
    }

    #[test]
    fn test_vet_predicate_accepts_boolean_expressions() {
        assert!(vet_predicate("\"BilledCost\" < 0").is_ok());
        assert!(vet_predicate("\"BillingCurrency\" IS NOT NULL AND \"BilledCost\" > 100").is_ok());
    }

    #[test]
    fn test_vet_predicate_rejects_statements() {
        assert!(vet_predicate("1 = 1; DROP TABLE focus_data").is_err());
        assert!(vet_predicate("x > 0 -- comment").is_err());
        assert!(vet_predicate("id IN (SELECT id FROM other)").is_err());
        assert!(vet_predicate("DELETE FROM focus_data").is_err());
    }

    #[test]
    fn test_vet_predicate_allows_keyword_like_columns() {
        assert!(vet_predicate("\"updated_at\" IS NOT NULL").is_ok());
    }

    #[test]
    fn test_vet_regex() {
        assert_eq!(vet_regex("^[A-Z]{3}$").unwrap(), "^[A-Z]{3}$");
        assert_eq!(vet_regex("it's").unwrap(), "it''s");
        assert!(vet_regex("[unclosed").is_err());
    }
}
