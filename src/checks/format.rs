//! Value-format checks: datetime, numeric, ASCII, currency, unit, key-value.

use super::{apply_condition, violation_query};
use crate::catalog::rule::CheckParams;
use crate::error::{FocusError, Result};
use crate::security;

const RFC3339_PATTERN: &str =
    r"^[0-9]{4}-[0-1][0-9]-[0-3][0-9]T[0-2][0-9]:[0-5][0-9]:[0-5][0-9](\.[0-9]+)?(Z|\+00:00)$";
const DATE_PATTERN: &str = r"^[0-9]{4}-[0-1][0-9]-[0-3][0-9]$";
const NUMERIC_PATTERN: &str = r"^[+-]?([0-9]*[.])?[0-9]+([eE][+-]?[0-9]+)?$";
const ASCII_PATTERN: &str = r"^[\x00-\x7F]*$";
const CURRENCY_PATTERN: &str = r"^[A-Z]{3}$";
const KEY_VALUE_PATTERN: &str = r#"^\s*\{.+\}\s*$"#;

fn datetime_pattern(format: &str) -> Result<&'static str> {
    match format {
        "rfc3339" => Ok(RFC3339_PATTERN),
        "date" => Ok(DATE_PATTERN),
        other => Err(FocusError::Security(format!(
            "Unknown datetime format '{other}' (expected 'rfc3339' or 'date')"
        ))),
    }
}

pub(super) fn format_datetime_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    let pattern = datetime_pattern(params.str("format")?)?;
    // Natively-typed temporal columns pass outright; text columns must have
    // the right shape and survive an engine-side parse.
    Ok(format!(
        "{col} IS NOT NULL AND arrow_typeof({col}) NOT LIKE 'Timestamp%' \
         AND arrow_typeof({col}) NOT IN ('Date32', 'Date64') \
         AND (TRY_CAST({col} AS TIMESTAMP) IS NULL \
         OR NOT (CAST({col} AS VARCHAR) ~ '{pattern}'))"
    ))
}

pub(super) fn format_datetime(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let format = params.str("format")?;
    let predicate = apply_condition(format_datetime_predicate(params)?, condition);
    let message = format!("{column} MUST be a valid {format} date/time value in UTC.");
    Ok(violation_query(&predicate, &message))
}

pub(super) fn format_numeric_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    Ok(format!(
        "{col} IS NOT NULL AND NOT (TRIM(CAST({col} AS VARCHAR)) ~ '{NUMERIC_PATTERN}')"
    ))
}

pub(super) fn format_numeric(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let predicate = apply_condition(format_numeric_predicate(params)?, condition);
    let message = format!("{column} MUST be a numeric value.");
    Ok(violation_query(&predicate, &message))
}

pub(super) fn format_string_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    Ok(format!(
        "{col} IS NOT NULL AND NOT (CAST({col} AS VARCHAR) ~ '{ASCII_PATTERN}')"
    ))
}

pub(super) fn format_string(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let predicate = apply_condition(format_string_predicate(params)?, condition);
    let message = format!("{column} MUST contain only ASCII characters.");
    Ok(violation_query(&predicate, &message))
}

pub(super) fn format_currency_code_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    Ok(format!(
        "{col} IS NOT NULL AND NOT (TRIM(CAST({col} AS VARCHAR)) ~ '{CURRENCY_PATTERN}')"
    ))
}

pub(super) fn format_currency_code(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let predicate = apply_condition(format_currency_code_predicate(params)?, condition);
    let message =
        format!("{column} MUST be an ISO 4217 currency code (3 uppercase letters, e.g. USD).");
    Ok(violation_query(&predicate, &message))
}

/// Builds the combined regex for the FOCUS unit format grammar.
///
/// Accepted shapes: a standalone unit, `<unit>-<PluralTimeUnit>`,
/// `<unit>/<SingularTimeUnit>`, `<quantity> <unit>`, and
/// `<unit>/<n> <PluralTimeUnit>`.
fn unit_format_pattern() -> String {
    const DATA_SIZE_UNITS: &[&str] = &[
        "b", "Kb", "Mb", "Gb", "Tb", "Pb", "Eb", "B", "KB", "MB", "GB", "TB", "PB", "EB", "Kib",
        "Mib", "Gib", "Tib", "Pib", "Eib", "KiB", "MiB", "GiB", "TiB", "PiB", "EiB",
    ];
    const TIME_SINGULAR: &[&str] = &["Year", "Month", "Day", "Hour", "Minute", "Second"];
    const TIME_PLURAL: &[&str] = &["Years", "Months", "Days", "Hours", "Minutes", "Seconds"];

    let data_size = DATA_SIZE_UNITS.join("|");
    let time_singular = TIME_SINGULAR.join("|");
    let time_plural = TIME_PLURAL.join("|");
    // Count units are free-form words: "Request", "API Request", "vCPU".
    let count = r"[A-Za-z][A-Za-z0-9]*( [A-Za-z][A-Za-z0-9]*)*";

    let patterns = [
        format!("^({data_size}|{time_singular}|{time_plural}|{count})$"),
        format!("^({data_size}|{count})-({time_plural})$"),
        format!("^({data_size}|{count}|{time_plural})/({time_singular})$"),
        format!("^[0-9]+ ({data_size}|{time_singular}|{time_plural}|{count})$"),
        format!("^({data_size}|{count}|{time_plural})/[0-9]+ ({time_plural})$"),
    ];
    patterns
        .iter()
        .map(|p| format!("({p})"))
        .collect::<Vec<_>>()
        .join("|")
}

pub(super) fn format_unit_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    let pattern = unit_format_pattern();
    Ok(format!(
        "{col} IS NOT NULL AND NOT (CAST({col} AS VARCHAR) ~ '{pattern}')"
    ))
}

pub(super) fn format_unit(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let predicate = apply_condition(format_unit_predicate(params)?, condition);
    let message = format!("{column} SHOULD follow the FOCUS unit format.");
    Ok(violation_query(&predicate, &message))
}

pub(super) fn format_key_value_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    // Structural shape only: a serialized non-empty key-value object.
    Ok(format!(
        "{col} IS NOT NULL AND NOT (CAST({col} AS VARCHAR) ~ '{KEY_VALUE_PATTERN}')"
    ))
}

pub(super) fn format_key_value(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let predicate = apply_condition(format_key_value_predicate(params)?, condition);
    let message = format!("{column} MUST be a serialized key-value object.");
    Ok(violation_query(&predicate, &message))
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    fn column_params(name: &str) -> CheckParams {
        [
            ("column".to_string(), serde_json::json!(name)),
            ("format".to_string(), serde_json::json!("rfc3339")),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_rfc3339_pattern_accepts_utc_instants() {
        let re = Regex::new(RFC3339_PATTERN).unwrap();
        assert!(re.is_match("2024-01-01T00:00:00Z"));
        assert!(re.is_match("2024-06-30T23:59:59.123Z"));
        assert!(!re.is_match("2024-01-01 00:00:00"));
        assert!(!re.is_match("2024-13-01T00:00:00Z"));
    }

    #[test]
    fn test_unknown_datetime_format_rejected() {
        let params: CheckParams = [
            ("column".to_string(), serde_json::json!("ChargePeriodStart")),
            ("format".to_string(), serde_json::json!("epoch")),
        ]
        .into_iter()
        .collect();
        assert!(format_datetime(&params, None).is_err());
    }

    #[test]
    fn test_numeric_pattern() {
        let re = Regex::new(NUMERIC_PATTERN).unwrap();
        for ok in ["123", "-123", "1.5", "+0.5", "1.23e10", "1.23E-4"] {
            assert!(re.is_match(ok), "{ok} should match");
        }
        for bad in ["", "1.2.3", "abc", "1e"] {
            assert!(!re.is_match(bad), "{bad} should not match");
        }
    }

    #[test]
    fn test_unit_pattern_covers_focus_shapes() {
        let re = Regex::new(&unit_format_pattern()).unwrap();
        for ok in [
            "GB",
            "Hours",
            "vCPU",
            "API Request",
            "GB-Hours",
            "Requests/Day",
            "1000 Requests",
            "Requests/3 Months",
        ] {
            assert!(re.is_match(ok), "{ok} should match");
        }
        for bad in ["GB-Hour", "/Day", "Requests per day?"] {
            assert!(!re.is_match(bad), "{bad} should not match");
        }
    }

    #[test]
    fn test_format_sql_shape() {
        let sql = format_currency_code(&column_params("BillingCurrency"), None).unwrap();
        assert!(sql.contains("TRIM(CAST(\"BillingCurrency\" AS VARCHAR))"));
        assert!(sql.contains("ISO 4217"));
    }
}
