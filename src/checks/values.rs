//! Value-level checks: nullability, equality, membership, comparisons.

use super::{apply_condition, violation_query};
use crate::catalog::rule::CheckParams;
use crate::error::{FocusError, Result};
use crate::security;

pub(super) fn value_not_null_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    Ok(format!("{col} IS NULL"))
}

/// Values must not be null.
pub(super) fn value_not_null(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let predicate = apply_condition(value_not_null_predicate(params)?, condition);
    let message = format!("{column} MUST NOT be null.");
    Ok(violation_query(&predicate, &message))
}

pub(super) fn value_equals_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    let value = params
        .get("value")
        .ok_or_else(|| FocusError::internal("parameter 'value' missing"))?;
    // A null target flips the requirement to "must be NULL". A non-null
    // target counts only non-null differing rows, matching SQL equality.
    if value.is_null() {
        Ok(format!("{col} IS NOT NULL"))
    } else {
        Ok(format!("{col} <> {}", security::lit_json(value)?))
    }
}

/// Values must equal a fixed literal (or be NULL when the target is null).
pub(super) fn value_equals(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let value = params
        .get("value")
        .ok_or_else(|| FocusError::internal("parameter 'value' missing"))?;
    let predicate = apply_condition(value_equals_predicate(params)?, condition);
    let message = if value.is_null() {
        format!("{column} MUST be NULL.")
    } else {
        format!("{column} MUST equal {value}.")
    };
    Ok(violation_query(&predicate, &message))
}

pub(super) fn value_not_equals_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    let value = params
        .get("value")
        .ok_or_else(|| FocusError::internal("parameter 'value' missing"))?;
    if value.is_null() {
        Ok(format!("{col} IS NULL"))
    } else {
        Ok(format!(
            "({col} IS NOT NULL AND {col} = {})",
            security::lit_json(value)?
        ))
    }
}

/// Values must differ from a fixed literal (or be non-NULL when the target
/// is null).
pub(super) fn value_not_equals(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let value = params
        .get("value")
        .ok_or_else(|| FocusError::internal("parameter 'value' missing"))?;
    let predicate = apply_condition(value_not_equals_predicate(params)?, condition);
    let message = if value.is_null() {
        format!("{column} MUST NOT be NULL.")
    } else {
        format!("{column} MUST NOT be {value}.")
    };
    Ok(violation_query(&predicate, &message))
}

pub(super) fn allowed_values_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    let values = params.str_list("values")?;
    if values.is_empty() {
        return Err(FocusError::internal("parameter 'values' is empty"));
    }
    let list = values
        .iter()
        .map(|v| security::lit(v))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(format!("{col} IS NOT NULL AND {col} NOT IN ({list})"))
}

/// Non-null values must belong to a closed value list. Shared by
/// `allowed_values`, `value_in`, and `dimension_values`.
pub(super) fn allowed_values(
    params: &CheckParams,
    condition: Option<&str>,
    flavor: &str,
) -> Result<String> {
    let column = params.str("column")?;
    let values = params.str_list("values")?;
    let predicate = apply_condition(allowed_values_predicate(params)?, condition);
    let message = format!(
        "{column} MUST be one of the {flavor} values: {}.",
        values.join(", ")
    );
    Ok(violation_query(&predicate, &message))
}

pub(super) fn columns_equal_predicate(params: &CheckParams) -> Result<String> {
    let col_a = security::quote_identifier(params.str("column_a")?)?;
    let col_b = security::quote_identifier(params.str("column_b")?)?;
    Ok(format!(
        "{col_a} IS NOT NULL AND {col_b} IS NOT NULL AND {col_a} <> {col_b}"
    ))
}

/// Two columns must carry the same value on every row.
pub(super) fn columns_equal(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column_a = params.str("column_a")?;
    let column_b = params.str("column_b")?;
    let predicate = apply_condition(columns_equal_predicate(params)?, condition);
    let message = format!("{column_a} and {column_b} MUST have the same value.");
    Ok(violation_query(&predicate, &message))
}

pub(super) fn columns_not_equal_predicate(params: &CheckParams) -> Result<String> {
    let col_a = security::quote_identifier(params.str("column_a")?)?;
    let col_b = security::quote_identifier(params.str("column_b")?)?;
    Ok(format!(
        "{col_a} IS NOT NULL AND {col_b} IS NOT NULL AND {col_a} = {col_b}"
    ))
}

/// Two columns must not carry the same value.
pub(super) fn columns_not_equal(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column_a = params.str("column_a")?;
    let column_b = params.str("column_b")?;
    let predicate = apply_condition(columns_not_equal_predicate(params)?, condition);
    let message = format!("{column_a} and {column_b} MUST NOT have the same value.");
    Ok(violation_query(&predicate, &message))
}

pub(super) fn column_by_column_equals_column_value_predicate(
    params: &CheckParams,
) -> Result<String> {
    let col_a = security::quote_identifier(params.str("column_a")?)?;
    let col_b = security::quote_identifier(params.str("column_b")?)?;
    let result = security::quote_identifier(params.str("result_column")?)?;
    Ok(format!(
        "{col_a} IS NOT NULL AND {col_b} IS NOT NULL AND {result} IS NOT NULL \
         AND ({col_a} * {col_b}) <> {result}"
    ))
}

/// A result column must equal the product of two other columns on every
/// row where all three are present.
pub(super) fn column_by_column_equals_column_value(
    params: &CheckParams,
    condition: Option<&str>,
) -> Result<String> {
    let column_a = params.str("column_a")?;
    let column_b = params.str("column_b")?;
    let result_column = params.str("result_column")?;
    let predicate = apply_condition(
        column_by_column_equals_column_value_predicate(params)?,
        condition,
    );
    let message = format!("{result_column} MUST equal {column_a} * {column_b}.");
    Ok(violation_query(&predicate, &message))
}

/// Every group of `column_a` values must carry exactly `expected_count`
/// distinct `column_b` values. Violations count offending groups, so the
/// row condition filters rows before the grouping, not after.
pub(super) fn distinct_count(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column_a = params.str("column_a")?;
    let column_b = params.str("column_b")?;
    let expected = params
        .get("expected_count")
        .ok_or_else(|| FocusError::internal("parameter 'expected_count' missing"))?;
    if !expected.is_number() {
        return Err(FocusError::Security(
            "distinct_count requires a numeric 'expected_count'".to_string(),
        ));
    }
    let col_a = security::quote_identifier(column_a)?;
    let col_b = security::quote_identifier(column_b)?;
    let count = security::lit_json(expected)?;
    let message = format!(
        "For each {column_a}, there MUST be exactly {expected} distinct {column_b} values."
    );
    let msg_sql = message.replace('\'', "''");
    let where_clause = match condition {
        Some(cond) if !cond.trim().is_empty() => format!("\n    WHERE {cond}"),
        _ => String::new(),
    };

    Ok(format!(
        "WITH counts AS (\n    SELECT {col_a} AS grp, COUNT(DISTINCT {col_b}) AS distinct_values\n    FROM {{table_name}}{where_clause}\n    GROUP BY {col_a}\n),\ninvalid AS (\n    SELECT grp FROM counts WHERE distinct_values <> {count}\n)\nSELECT\n    COUNT(*) AS violations,\n    CASE WHEN COUNT(*) > 0 THEN '{msg_sql}' END AS error_message\nFROM invalid"
    ))
}

pub(super) fn greater_or_equal_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    let value = params
        .get("value")
        .ok_or_else(|| FocusError::internal("parameter 'value' missing"))?;
    if !value.is_number() {
        return Err(FocusError::Security(
            "greater_or_equal requires a numeric 'value'".to_string(),
        ));
    }
    Ok(format!(
        "{col} IS NOT NULL AND {col} < {}",
        security::lit_json(value)?
    ))
}

/// Values must be greater than or equal to a numeric threshold.
pub(super) fn greater_or_equal(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let value = params
        .get("value")
        .ok_or_else(|| FocusError::internal("parameter 'value' missing"))?;
    let predicate = apply_condition(greater_or_equal_predicate(params)?, condition);
    let message = format!("{column} MUST be greater than or equal to {value}.");
    Ok(violation_query(&predicate, &message))
}

pub(super) fn regex_match_predicate(params: &CheckParams) -> Result<String> {
    let col = security::quote_identifier(params.str("column")?)?;
    let pattern = security::vet_regex(params.str("pattern")?)?;
    Ok(format!(
        "{col} IS NOT NULL AND NOT (CAST({col} AS VARCHAR) ~ '{pattern}')"
    ))
}

/// Non-null values must match a regex pattern.
pub(super) fn regex_match(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let column = params.str("column")?;
    let pattern = params.str("pattern")?;
    let predicate = apply_condition(regex_match_predicate(params)?, condition);
    let message = format!("{column} MUST match the pattern {pattern}.");
    Ok(violation_query(&predicate, &message))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, serde_json::Value)]) -> CheckParams {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_value_not_null() {
        let sql = value_not_null(&params(&[("column", serde_json::json!("BilledCost"))]), None)
            .unwrap();
        assert!(sql.contains("\"BilledCost\" IS NULL"));
        assert!(sql.contains("BilledCost MUST NOT be null."));
    }

    #[test]
    fn test_value_equals_null_target_flips() {
        let sql = value_equals(
            &params(&[
                ("column", serde_json::json!("CommitmentDiscountId")),
                ("value", serde_json::json!(null)),
            ]),
            None,
        )
        .unwrap();
        assert!(sql.contains("\"CommitmentDiscountId\" IS NOT NULL"));
        assert!(sql.contains("MUST be NULL."));
    }

    #[test]
    fn test_value_equals_literal_escaping() {
        let sql = value_equals(
            &params(&[
                ("column", serde_json::json!("ChargeCategory")),
                ("value", serde_json::json!("O'Usage")),
            ]),
            None,
        )
        .unwrap();
        assert!(sql.contains("<> 'O''Usage'"));
    }

    #[test]
    fn test_allowed_values_list() {
        let sql = allowed_values(
            &params(&[
                ("column", serde_json::json!("ChargeCategory")),
                (
                    "values",
                    serde_json::json!(["Usage", "Purchase", "Tax", "Credit", "Adjustment"]),
                ),
            ]),
            None,
            "allowed",
        )
        .unwrap();
        assert!(sql.contains("NOT IN ('Usage', 'Purchase', 'Tax', 'Credit', 'Adjustment')"));
    }

    #[test]
    fn test_allowed_values_empty_list_rejected() {
        let result = allowed_values(
            &params(&[
                ("column", serde_json::json!("ChargeCategory")),
                ("values", serde_json::json!([])),
            ]),
            None,
            "allowed",
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_columns_equal() {
        let sql = columns_equal(
            &params(&[
                ("column_a", serde_json::json!("BilledCost")),
                ("column_b", serde_json::json!("EffectiveCost")),
            ]),
            None,
        )
        .unwrap();
        assert!(sql.contains("\"BilledCost\" <> \"EffectiveCost\""));
    }

    #[test]
    fn test_column_product_check() {
        let sql = column_by_column_equals_column_value(
            &params(&[
                ("column_a", serde_json::json!("PricingQuantity")),
                ("column_b", serde_json::json!("ContractedUnitPrice")),
                ("result_column", serde_json::json!("ContractedCost")),
            ]),
            None,
        )
        .unwrap();
        assert!(sql.contains("(\"PricingQuantity\" * \"ContractedUnitPrice\") <> \"ContractedCost\""));
        assert!(sql.contains("ContractedCost MUST equal PricingQuantity * ContractedUnitPrice."));
    }

    #[test]
    fn test_distinct_count_groups_before_counting() {
        let sql = distinct_count(
            &params(&[
                ("column_a", serde_json::json!("ServiceName")),
                ("column_b", serde_json::json!("ServiceSubcategory")),
                ("expected_count", serde_json::json!(1)),
            ]),
            None,
        )
        .unwrap();
        assert!(sql.contains("COUNT(DISTINCT \"ServiceSubcategory\")"));
        assert!(sql.contains("GROUP BY \"ServiceName\""));
        assert!(sql.contains("distinct_values <> 1"));
        assert!(sql.contains("exactly 1 distinct ServiceSubcategory values."));
    }

    #[test]
    fn test_distinct_count_condition_filters_rows_before_grouping() {
        let sql = distinct_count(
            &params(&[
                ("column_a", serde_json::json!("ServiceName")),
                ("column_b", serde_json::json!("ServiceSubcategory")),
                ("expected_count", serde_json::json!(1)),
            ]),
            Some("\"ServiceName\" IS NOT NULL"),
        )
        .unwrap();
        let where_pos = sql.find("WHERE \"ServiceName\" IS NOT NULL").unwrap();
        let group_pos = sql.find("GROUP BY").unwrap();
        assert!(where_pos < group_pos);
    }

    #[test]
    fn test_distinct_count_requires_numeric_expected_count() {
        let result = distinct_count(
            &params(&[
                ("column_a", serde_json::json!("ServiceName")),
                ("column_b", serde_json::json!("ServiceSubcategory")),
                ("expected_count", serde_json::json!("one")),
            ]),
            None,
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_greater_or_equal_requires_number() {
        let bad = greater_or_equal(
            &params(&[
                ("column", serde_json::json!("BilledCost")),
                ("value", serde_json::json!("zero")),
            ]),
            None,
        );
        assert!(bad.is_err());

        let sql = greater_or_equal(
            &params(&[
                ("column", serde_json::json!("BilledCost")),
                ("value", serde_json::json!(0)),
            ]),
            None,
        )
        .unwrap();
        assert!(sql.contains("\"BilledCost\" < 0"));
    }

    #[test]
    fn test_regex_match_rejects_bad_pattern() {
        let result = regex_match(
            &params(&[
                ("column", serde_json::json!("RegionId")),
                ("pattern", serde_json::json!("[unclosed")),
            ]),
            None,
        );
        assert!(result.is_err());
    }
}
