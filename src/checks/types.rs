//! Runtime-type checks over dataset columns.
//!
//! The engine reports per-value runtime types through `arrow_typeof`;
//! these predicates accept the Arrow type families that correspond to the
//! FOCUS notion of string, decimal, and date/time columns.

use super::{apply_condition, violation_query};
use crate::catalog::rule::CheckParams;
use crate::error::Result;
use crate::security;

/// ISO 8601 UTC instant, e.g. `2024-01-01T00:00:00Z`.
const ISO_UTC_PATTERN: &str = r"^[0-9]{4}-[0-1][0-9]-[0-3][0-9]T[0-2][0-9]:[0-5][0-9]:[0-5][0-9]Z$";

pub(super) fn type_string_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    Ok(format!(
        "{col} IS NOT NULL AND arrow_typeof({col}) NOT IN ('Utf8', 'LargeUtf8', 'Utf8View')"
    ))
}

/// Values must be strings.
pub(super) fn type_string(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let predicate = apply_condition(type_string_predicate(params)?, condition);
    let message = format!("{column} MUST be of type VARCHAR (string).");
    Ok(violation_query(&predicate, &message))
}

pub(super) fn type_decimal_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    Ok(format!(
        "{col} IS NOT NULL AND arrow_typeof({col}) NOT LIKE 'Decimal%' \
         AND arrow_typeof({col}) NOT IN ('Float64', 'Float32', 'Int64', 'Int32')"
    ))
}

/// Values must be decimal-family numerics.
pub(super) fn type_decimal(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let predicate = apply_condition(type_decimal_predicate(params)?, condition);
    let message = format!("{column} MUST be of type DECIMAL, DOUBLE, or BIGINT.");
    Ok(violation_query(&predicate, &message))
}

pub(super) fn type_datetime_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    // Native temporal types pass outright; string columns pass per value
    // when they hold an ISO 8601 UTC instant.
    Ok(format!(
        "{col} IS NOT NULL AND arrow_typeof({col}) NOT LIKE 'Timestamp%' \
         AND arrow_typeof({col}) NOT IN ('Date32', 'Date64') \
         AND NOT (CAST({col} AS VARCHAR) ~ '{ISO_UTC_PATTERN}')"
    ))
}

/// Values must be date/time typed, or ISO 8601 UTC text.
pub(super) fn type_datetime(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let predicate = apply_condition(type_datetime_predicate(params)?, condition);
    let message = format!(
        "{column} MUST be a DATE/TIMESTAMP or an ISO 8601 UTC string (YYYY-MM-DDTHH:mm:ssZ)."
    );
    Ok(violation_query(&predicate, &message))
}
