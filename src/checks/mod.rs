//! The closed check-generator registry.
//!
//! Every leaf check kind maps to exactly one SQL generator. Generators are
//! a closed enumeration: new kinds are added here, never by evaluating
//! user-provided SQL. Each generator declares its required parameter keys
//! and defaults, validated once at catalog load, and produces a query with
//! a `{table_name}` placeholder that evaluates to a single row
//! `(violations BIGINT, error_message VARCHAR NULL)`.

mod column;
mod custom_sql;
mod format;
mod types;
mod values;

use crate::catalog::rule::CheckParams;
use crate::error::{FocusError, Result};
use crate::security;
use serde::{Deserialize, Serialize};

/// The closed set of check kinds understood by the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    ColumnRequired,
    ColumnAllowed,
    TypeString,
    TypeDecimal,
    TypeDatetime,
    FormatDatetime,
    FormatNumeric,
    FormatString,
    FormatCurrencyCode,
    FormatUnit,
    FormatKeyValue,
    ValueNotNull,
    ValueEquals,
    ValueNotEquals,
    AllowedValues,
    ValueIn,
    ColumnsEqual,
    ColumnsNotEqual,
    ColumnByColumnEqualsColumnValue,
    GreaterOrEqual,
    DistinctCount,
    RegexMatch,
    DimensionValues,
    SqlQuery,
    CompositeAnd,
    CompositeOr,
    ModelRuleReference,
}

/// Declarative metadata for one check generator.
#[derive(Debug, Clone, Copy)]
pub struct GeneratorSpec {
    /// Generator name surfaced by explain mode
    pub name: &'static str,
    /// Parameter keys that must be present in `validation_criteria`
    pub required_keys: &'static [&'static str],
    /// Parameter keys filled in when absent
    pub defaults: &'static [(&'static str, &'static str)],
}

macro_rules! spec {
    ($name:literal, [$($req:literal),*]) => {
        GeneratorSpec { name: $name, required_keys: &[$($req),*], defaults: &[] }
    };
    ($name:literal, [$($req:literal),*], [$(($dk:literal, $dv:literal)),*]) => {
        GeneratorSpec { name: $name, required_keys: &[$($req),*], defaults: &[$(($dk, $dv)),*] }
    };
}

impl CheckKind {
    /// Returns the generator metadata for a leaf kind, or `None` for
    /// composites and references, which do not generate SQL.
    pub fn generator(&self) -> Option<&'static GeneratorSpec> {
        use CheckKind::*;
        const COLUMN_REQUIRED: GeneratorSpec = spec!("ColumnRequiredGenerator", ["column"]);
        const COLUMN_ALLOWED: GeneratorSpec = spec!("ColumnAllowedGenerator", ["columns"]);
        const TYPE_STRING: GeneratorSpec = spec!("TypeStringGenerator", ["column"]);
        const TYPE_DECIMAL: GeneratorSpec = spec!("TypeDecimalGenerator", ["column"]);
        const TYPE_DATETIME: GeneratorSpec = spec!("TypeDatetimeGenerator", ["column"]);
        const FORMAT_DATETIME: GeneratorSpec =
            spec!("FormatDatetimeGenerator", ["column"], [("format", "rfc3339")]);
        const FORMAT_NUMERIC: GeneratorSpec = spec!("FormatNumericGenerator", ["column"]);
        const FORMAT_STRING: GeneratorSpec = spec!("FormatStringGenerator", ["column"]);
        const FORMAT_CURRENCY: GeneratorSpec = spec!("FormatCurrencyCodeGenerator", ["column"]);
        const FORMAT_UNIT: GeneratorSpec = spec!("FormatUnitGenerator", ["column"]);
        const FORMAT_KEY_VALUE: GeneratorSpec = spec!("FormatKeyValueGenerator", ["column"]);
        const VALUE_NOT_NULL: GeneratorSpec = spec!("ValueNotNullGenerator", ["column"]);
        const VALUE_EQUALS: GeneratorSpec = spec!("ValueEqualsGenerator", ["column", "value"]);
        const VALUE_NOT_EQUALS: GeneratorSpec =
            spec!("ValueNotEqualsGenerator", ["column", "value"]);
        const ALLOWED_VALUES: GeneratorSpec = spec!("AllowedValuesGenerator", ["column", "values"]);
        const VALUE_IN: GeneratorSpec = spec!("ValueInGenerator", ["column", "values"]);
        const COLUMNS_EQUAL: GeneratorSpec =
            spec!("ColumnsEqualGenerator", ["column_a", "column_b"]);
        const COLUMNS_NOT_EQUAL: GeneratorSpec =
            spec!("ColumnsNotEqualGenerator", ["column_a", "column_b"]);
        const COLUMN_PRODUCT: GeneratorSpec = spec!(
            "ColumnByColumnEqualsColumnValueGenerator",
            ["column_a", "column_b", "result_column"]
        );
        const GREATER_OR_EQUAL: GeneratorSpec =
            spec!("GreaterOrEqualGenerator", ["column", "value"]);
        const DISTINCT_COUNT: GeneratorSpec = spec!(
            "DistinctCountGenerator",
            ["column_a", "column_b", "expected_count"]
        );
        const REGEX_MATCH: GeneratorSpec = spec!("RegexMatchGenerator", ["column", "pattern"]);
        const DIMENSION_VALUES: GeneratorSpec =
            spec!("DimensionValuesGenerator", ["column", "values"]);
        const SQL_QUERY: GeneratorSpec = spec!("SqlQueryGenerator", ["predicate"]);

        match self {
            ColumnRequired => Some(&COLUMN_REQUIRED),
            ColumnAllowed => Some(&COLUMN_ALLOWED),
            TypeString => Some(&TYPE_STRING),
            TypeDecimal => Some(&TYPE_DECIMAL),
            TypeDatetime => Some(&TYPE_DATETIME),
            FormatDatetime => Some(&FORMAT_DATETIME),
            FormatNumeric => Some(&FORMAT_NUMERIC),
            FormatString => Some(&FORMAT_STRING),
            FormatCurrencyCode => Some(&FORMAT_CURRENCY),
            FormatUnit => Some(&FORMAT_UNIT),
            FormatKeyValue => Some(&FORMAT_KEY_VALUE),
            ValueNotNull => Some(&VALUE_NOT_NULL),
            ValueEquals => Some(&VALUE_EQUALS),
            ValueNotEquals => Some(&VALUE_NOT_EQUALS),
            AllowedValues => Some(&ALLOWED_VALUES),
            ValueIn => Some(&VALUE_IN),
            ColumnsEqual => Some(&COLUMNS_EQUAL),
            ColumnsNotEqual => Some(&COLUMNS_NOT_EQUAL),
            ColumnByColumnEqualsColumnValue => Some(&COLUMN_PRODUCT),
            GreaterOrEqual => Some(&GREATER_OR_EQUAL),
            DistinctCount => Some(&DISTINCT_COUNT),
            RegexMatch => Some(&REGEX_MATCH),
            DimensionValues => Some(&DIMENSION_VALUES),
            SqlQuery => Some(&SQL_QUERY),
            CompositeAnd | CompositeOr | ModelRuleReference => None,
        }
    }

    /// Returns the snake_case token for this kind (the catalog spelling).
    pub fn as_str(&self) -> &'static str {
        use CheckKind::*;
        match self {
            ColumnRequired => "column_required",
            ColumnAllowed => "column_allowed",
            TypeString => "type_string",
            TypeDecimal => "type_decimal",
            TypeDatetime => "type_datetime",
            FormatDatetime => "format_datetime",
            FormatNumeric => "format_numeric",
            FormatString => "format_string",
            FormatCurrencyCode => "format_currency_code",
            FormatUnit => "format_unit",
            FormatKeyValue => "format_key_value",
            ValueNotNull => "value_not_null",
            ValueEquals => "value_equals",
            ValueNotEquals => "value_not_equals",
            AllowedValues => "allowed_values",
            ValueIn => "value_in",
            ColumnsEqual => "columns_equal",
            ColumnsNotEqual => "columns_not_equal",
            ColumnByColumnEqualsColumnValue => "column_by_column_equals_column_value",
            GreaterOrEqual => "greater_or_equal",
            DistinctCount => "distinct_count",
            RegexMatch => "regex_match",
            DimensionValues => "dimension_values",
            SqlQuery => "sql_query",
            CompositeAnd => "composite_and",
            CompositeOr => "composite_or",
            ModelRuleReference => "model_rule_reference",
        }
    }

    /// Returns true for `composite_and` / `composite_or`.
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::CompositeAnd | Self::CompositeOr)
    }

    /// Returns true when the kind generates SQL.
    pub fn is_leaf(&self) -> bool {
        self.generator().is_some()
    }

    /// Validates required keys and merges defaults into `params`.
    ///
    /// Called once per rule at catalog load; the parameters are frozen
    /// afterwards.
    pub fn validate_params(&self, rule_id: &str, params: &mut CheckParams) -> Result<()> {
        let Some(generator) = self.generator() else {
            return Ok(());
        };
        for (key, default) in generator.defaults {
            if !params.contains(key) {
                params.insert(*key, serde_json::Value::String((*default).to_string()));
            }
        }
        for key in generator.required_keys {
            if !params.contains(key) {
                return Err(FocusError::MissingParameter {
                    rule_id: rule_id.to_string(),
                    kind: self.as_str().to_string(),
                    key: (*key).to_string(),
                });
            }
        }
        Ok(())
    }

    /// Generates the violation-counting SQL for a leaf kind.
    ///
    /// The returned query contains a `{table_name}` placeholder and, when an
    /// inherited row condition is present, the violation predicate is
    /// conjoined with it.
    pub fn generate_sql(&self, params: &CheckParams, condition: Option<&str>) -> Result<String> {
        use CheckKind::*;
        match self {
            ColumnRequired => column::column_required(params),
            ColumnAllowed => column::column_allowed(params),
            TypeString => types::type_string(params, condition),
            TypeDecimal => types::type_decimal(params, condition),
            TypeDatetime => types::type_datetime(params, condition),
            FormatDatetime => format::format_datetime(params, condition),
            FormatNumeric => format::format_numeric(params, condition),
            FormatString => format::format_string(params, condition),
            FormatCurrencyCode => format::format_currency_code(params, condition),
            FormatUnit => format::format_unit(params, condition),
            FormatKeyValue => format::format_key_value(params, condition),
            ValueNotNull => values::value_not_null(params, condition),
            ValueEquals => values::value_equals(params, condition),
            ValueNotEquals => values::value_not_equals(params, condition),
            AllowedValues | ValueIn => values::allowed_values(params, condition, "allowed"),
            DimensionValues => values::allowed_values(params, condition, "dimension"),
            ColumnsEqual => values::columns_equal(params, condition),
            ColumnsNotEqual => values::columns_not_equal(params, condition),
            ColumnByColumnEqualsColumnValue => {
                values::column_by_column_equals_column_value(params, condition)
            }
            GreaterOrEqual => values::greater_or_equal(params, condition),
            DistinctCount => values::distinct_count(params, condition),
            RegexMatch => values::regex_match(params, condition),
            SqlQuery => custom_sql::sql_query(params, condition),
            CompositeAnd | CompositeOr | ModelRuleReference => Err(FocusError::Internal(format!(
                "check kind '{}' does not generate SQL",
                self.as_str()
            ))),
        }
    }

    /// Generates the companion sample query fetching offending values, for
    /// kinds that inspect rows. Schema-level kinds return `None`.
    pub fn sample_sql(
        &self,
        params: &CheckParams,
        condition: Option<&str>,
        limit: usize,
    ) -> Result<Option<String>> {
        use CheckKind::*;
        let built = match self {
            // DistinctCount violates per group, not per row, so it has no
            // row-level sample either.
            ColumnRequired | ColumnAllowed | SqlQuery | DistinctCount | CompositeAnd
            | CompositeOr | ModelRuleReference => return Ok(None),
            ColumnByColumnEqualsColumnValue => {
                let col_a = security::quote_identifier(params.str("column_a")?)?;
                let col_b = security::quote_identifier(params.str("column_b")?)?;
                let result = security::quote_identifier(params.str("result_column")?)?;
                let predicate = self.row_predicate(params, condition)?;
                let select = format!(
                    "CAST({col_a} AS VARCHAR) AS sample_a, CAST({col_b} AS VARCHAR) AS sample_b, \
                     CAST({result} AS VARCHAR) AS sample_result"
                );
                sample_query(&select, &predicate, limit)
            }
            ColumnsEqual | ColumnsNotEqual => {
                let col_a = security::quote_identifier(params.str("column_a")?)?;
                let col_b = security::quote_identifier(params.str("column_b")?)?;
                let predicate = self.row_predicate(params, condition)?;
                let select = format!(
                    "CAST({col_a} AS VARCHAR) AS sample_a, CAST({col_b} AS VARCHAR) AS sample_b"
                );
                sample_query(&select, &predicate, limit)
            }
            _ => {
                let col = security::quote_identifier(params.str("column")?)?;
                let predicate = self.row_predicate(params, condition)?;
                let select = format!("CAST({col} AS VARCHAR) AS sample_value");
                sample_query(&select, &predicate, limit)
            }
        };
        Ok(Some(built))
    }

    /// Rebuilds just the violation predicate for a row-level kind. Shared
    /// between the violation query and the sample query.
    fn row_predicate(&self, params: &CheckParams, condition: Option<&str>) -> Result<String> {
        use CheckKind::*;
        let predicate = match self {
            TypeString => types::type_string_predicate(params)?,
            TypeDecimal => types::type_decimal_predicate(params)?,
            TypeDatetime => types::type_datetime_predicate(params)?,
            FormatDatetime => format::format_datetime_predicate(params)?,
            FormatNumeric => format::format_numeric_predicate(params)?,
            FormatString => format::format_string_predicate(params)?,
            FormatCurrencyCode => format::format_currency_code_predicate(params)?,
            FormatUnit => format::format_unit_predicate(params)?,
            FormatKeyValue => format::format_key_value_predicate(params)?,
            ValueNotNull => values::value_not_null_predicate(params)?,
            ValueEquals => values::value_equals_predicate(params)?,
            ValueNotEquals => values::value_not_equals_predicate(params)?,
            AllowedValues | ValueIn | DimensionValues => values::allowed_values_predicate(params)?,
            ColumnsEqual => values::columns_equal_predicate(params)?,
            ColumnsNotEqual => values::columns_not_equal_predicate(params)?,
            ColumnByColumnEqualsColumnValue => {
                values::column_by_column_equals_column_value_predicate(params)?
            }
            GreaterOrEqual => values::greater_or_equal_predicate(params)?,
            RegexMatch => values::regex_match_predicate(params)?,
            _ => {
                return Err(FocusError::Internal(format!(
                    "check kind '{}' has no row predicate",
                    self.as_str()
                )))
            }
        };
        Ok(apply_condition(predicate, condition))
    }
}

/// Conjoins a violation predicate with an inherited row condition.
pub(crate) fn apply_condition(predicate: String, condition: Option<&str>) -> String {
    match condition {
        Some(cond) if !cond.trim().is_empty() => format!("({predicate}) AND ({cond})"),
        _ => predicate,
    }
}

/// Wraps a violation predicate in the standard single-row counting query.
pub(crate) fn violation_query(predicate: &str, message: &str) -> String {
    let msg_sql = message.replace('\'', "''");
    format!(
        "WITH invalid AS (\n    SELECT 1 FROM {{table_name}} WHERE {predicate}\n)\nSELECT\n    COUNT(*) AS violations,\n    CASE WHEN COUNT(*) > 0 THEN '{msg_sql}' END AS error_message\nFROM invalid"
    )
}

/// Builds the companion query that fetches sample offending values.
pub(crate) fn sample_query(select_list: &str, predicate: &str, limit: usize) -> String {
    format!("SELECT {select_list} FROM {{table_name}} WHERE {predicate} LIMIT {limit}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::rule::CheckParams;

    fn params(pairs: &[(&str, serde_json::Value)]) -> CheckParams {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_kind_round_trips_through_serde() {
        for kind in [
            CheckKind::ColumnRequired,
            CheckKind::TypeDecimal,
            CheckKind::ModelRuleReference,
            CheckKind::CompositeOr,
        ] {
            let token = serde_json::to_value(kind).unwrap();
            assert_eq!(token, serde_json::Value::String(kind.as_str().to_string()));
            let back: CheckKind = serde_json::from_value(token).unwrap();
            assert_eq!(back, kind);
        }
    }

    #[test]
    fn test_unknown_kind_fails_deserialization() {
        let result: std::result::Result<CheckKind, _> =
            serde_json::from_value(serde_json::json!("frobnicate"));
        assert!(result.is_err());
    }

    #[test]
    fn test_validate_params_missing_key() {
        let mut empty = CheckParams::new();
        let err = CheckKind::TypeString
            .validate_params("AvailabilityZone-C-001-M", &mut empty)
            .unwrap_err();
        assert!(err.to_string().contains("column"));
    }

    #[test]
    fn test_validate_params_merges_defaults() {
        let mut p = params(&[("column", serde_json::json!("BillingPeriodStart"))]);
        CheckKind::FormatDatetime
            .validate_params("BillingPeriodStart-C-002-M", &mut p)
            .unwrap();
        assert_eq!(p.str("format").unwrap(), "rfc3339");
    }

    #[test]
    fn test_composites_have_no_generator() {
        assert!(CheckKind::CompositeAnd.generator().is_none());
        assert!(CheckKind::CompositeOr.generator().is_none());
        assert!(CheckKind::ModelRuleReference.generator().is_none());
        assert!(CheckKind::TypeString.generator().is_some());
    }

    #[test]
    fn test_generated_sql_is_deterministic() {
        let p = params(&[("column", serde_json::json!("AvailabilityZone"))]);
        let first = CheckKind::TypeString.generate_sql(&p, None).unwrap();
        let second = CheckKind::TypeString.generate_sql(&p, None).unwrap();
        assert_eq!(first, second);
        assert!(first.contains("{table_name}"));
    }

    #[test]
    fn test_inherited_condition_is_conjoined() {
        let p = params(&[("column", serde_json::json!("BilledCost"))]);
        let sql = CheckKind::ValueNotNull
            .generate_sql(&p, Some("\"BillingCurrency\" IS NOT NULL"))
            .unwrap();
        assert!(sql.contains("AND (\"BillingCurrency\" IS NOT NULL)"));

        let bare = CheckKind::ValueNotNull.generate_sql(&p, None).unwrap();
        assert!(!bare.contains("BillingCurrency"));
    }

    #[test]
    fn test_sample_sql_only_for_row_level_kinds() {
        let p = params(&[("column", serde_json::json!("BilledCost"))]);
        assert!(CheckKind::ColumnRequired
            .sample_sql(&p, None, 2)
            .unwrap()
            .is_none());
        let sample = CheckKind::ValueNotNull.sample_sql(&p, None, 2).unwrap();
        assert!(sample.unwrap().ends_with("LIMIT 2"));
    }
}
