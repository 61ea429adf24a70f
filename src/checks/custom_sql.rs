//! The `sql_query` check kind: a vetted boolean predicate over the dataset.
//!
//! The predicate comes from the rule catalog, not from end users, but it is
//! still forced through the security vetting so a tampered catalog cannot
//! escalate into arbitrary statements.

use super::{apply_condition, violation_query};
use crate::catalog::rule::CheckParams;
use crate::error::Result;
use crate::security;

pub(super) fn sql_query(params: &CheckParams, condition: Option<&str>) -> Result<String> {
    let predicate = params.str("predicate")?;
    security::vet_predicate(predicate)?;
    let wrapped = apply_condition(format!("({predicate})"), condition);
    let message = params
        .get("message")
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or_else(|| "Rows violate the rule's SQL predicate.".to_string());
    Ok(violation_query(&wrapped, &message))
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
    fn test_sql_query_wraps_predicate() {
        let sql = sql_query(
            &params(&[(
                "predicate",
                serde_json::json!("\"BilledCost\" < 0 AND \"ChargeCategory\" <> 'Credit'"),
            )]),
            None,
        )
        .unwrap();
        assert!(sql.contains("(\"BilledCost\" < 0 AND \"ChargeCategory\" <> 'Credit')"));
    }

    #[test]
    fn test_sql_query_uses_custom_message() {
        let sql = sql_query(
            &params(&[
                ("predicate", serde_json::json!("\"BilledCost\" < 0")),
                ("message", serde_json::json!("Negative cost outside credits.")),
            ]),
            None,
        )
        .unwrap();
        assert!(sql.contains("Negative cost outside credits."));
    }

    #[test]
    fn test_sql_query_rejects_statements() {
        let result = sql_query(
            &params(&[("predicate", serde_json::json!("1=1; DROP TABLE focus_data"))]),
            None,
        );
        assert!(result.is_err());
    }
}
