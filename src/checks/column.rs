//! Schema-level checks against the engine's information schema.

use crate::catalog::rule::CheckParams;
use crate::error::Result;
use crate::security;

/// A column must be present in the dataset. Violation count is 0 or 1.
pub(super) fn column_required(params: &CheckParams) -> Result<String> {
    let column = params.str("column")?;
    security::validate_identifier(column)?;
    let message = format!("Column '{column}' MUST be present in the dataset.");
    let msg_sql = message.replace('\'', "''");

    Ok(format!(
        "WITH col_check AS (\n    SELECT COUNT(*) AS found\n    FROM information_schema.columns\n    WHERE table_name = '{{table_name}}'\n      AND column_name = {col_lit}\n)\nSELECT\n    CASE WHEN found = 0 THEN 1 ELSE 0 END AS violations,\n    CASE WHEN found = 0 THEN '{msg_sql}' END AS error_message\nFROM col_check",
        col_lit = security::lit(column),
    ))
}

/// Every dataset column must belong to the allowed column list. The
/// violation count is the number of unexpected columns.
pub(super) fn column_allowed(params: &CheckParams) -> Result<String> {
    let columns = params.str_list("columns")?;
    for column in &columns {
        security::validate_identifier(column)?;
    }
    let allowed = columns
        .iter()
        .map(|c| security::lit(c))
        .collect::<Vec<_>>()
        .join(", ");
    let message = "Dataset contains columns outside the allowed FOCUS column set.";

    Ok(format!(
        "WITH unexpected AS (\n    SELECT column_name\n    FROM information_schema.columns\n    WHERE table_name = '{{table_name}}'\n      AND column_name NOT IN ({allowed})\n)\nSELECT\n    COUNT(*) AS violations,\n    CASE WHEN COUNT(*) > 0 THEN '{message}' END AS error_message\nFROM unexpected"
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params_with(key: &str, value: serde_json::Value) -> CheckParams {
        [(key.to_string(), value)].into_iter().collect()
    }

    #[test]
    fn test_column_required_probes_information_schema() {
        let sql = column_required(&params_with("column", serde_json::json!("RegionId"))).unwrap();
        assert!(sql.contains("information_schema.columns"));
        assert!(sql.contains("column_name = 'RegionId'"));
        assert!(sql.contains("table_name = '{table_name}'"));
        assert!(sql.contains("CASE WHEN found = 0 THEN 1 ELSE 0 END AS violations"));
    }

    #[test]
    fn test_column_required_rejects_bad_identifier() {
        let result = column_required(&params_with("column", serde_json::json!("Region;Id")));
        assert!(result.is_err());
    }

    #[test]
    fn test_column_allowed_lists_literals() {
        let sql = column_allowed(&params_with(
            "columns",
            serde_json::json!(["BilledCost", "BillingCurrency"]),
        ))
        .unwrap();
        assert!(sql.contains("NOT IN ('BilledCost', 'BillingCurrency')"));
    }
}
