//! In-memory dataset and catalog builders shared by tests.

use arrow::array::{ArrayRef, Float64Array, Int64Array, StringArray};
use arrow::datatypes::{Field, Schema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::{SessionConfig, SessionContext};
use std::sync::Arc;

/// Builds a string column from optional values.
pub fn string_column(values: Vec<Option<&str>>) -> ArrayRef {
    Arc::new(StringArray::from(values))
}

/// Builds an integer column from optional values.
pub fn int_column(values: Vec<Option<i64>>) -> ArrayRef {
    Arc::new(Int64Array::from(values))
}

/// Builds a float column from optional values.
pub fn float_column(values: Vec<Option<f64>>) -> ArrayRef {
    Arc::new(Float64Array::from(values))
}

/// Creates a session with the given columns registered as `focus_data`.
///
/// The information schema is enabled so column-presence checks work.
pub async fn context_with_table(columns: Vec<(&str, ArrayRef)>) -> SessionContext {
    let ctx = SessionContext::new_with_config(SessionConfig::new().with_information_schema(true));
    let fields: Vec<Field> = columns
        .iter()
        .map(|(name, array)| Field::new(*name, array.data_type().clone(), true))
        .collect();
    let schema = Arc::new(Schema::new(fields));
    let arrays: Vec<ArrayRef> = columns.into_iter().map(|(_, array)| array).collect();
    let batch = RecordBatch::try_new(schema.clone(), arrays).expect("fixture batch");
    let table = MemTable::try_new(schema, vec![vec![batch]]).expect("fixture table");
    ctx.register_table("focus_data", Arc::new(table))
        .expect("register fixture table");
    ctx
}

/// Creates a session with an empty `focus_data` table holding the given
/// column names (all string typed).
pub async fn context_with_empty_table(column_names: &[&str]) -> SessionContext {
    let columns = column_names
        .iter()
        .map(|name| (*name, string_column(Vec::new())))
        .collect();
    context_with_table(columns).await
}

/// JSON for a single-column leaf rule.
pub fn leaf_rule_json(rule_id: &str, check: &str, column: &str) -> serde_json::Value {
    serde_json::json!({
        "rule_id": rule_id,
        "column_id": column,
        "check_type": check,
        "validation_criteria": {"check": check, "params": {"column": column}},
        "must_satisfy": format!("{column} satisfies {check}.")
    })
}

/// JSON for a composite rule referencing other rules by id.
pub fn composite_rule_json(rule_id: &str, logic: &str, refs: &[&str]) -> serde_json::Value {
    let items: Vec<serde_json::Value> = refs
        .iter()
        .map(|target| serde_json::json!({"ref": target}))
        .collect();
    let key = match logic {
        "composite_or" => "any_of",
        _ => "all_of",
    };
    serde_json::json!({
        "rule_id": rule_id,
        "check_type": logic,
        "validation_criteria": {key: items},
        "must_satisfy": format!("{rule_id} composite holds.")
    })
}
