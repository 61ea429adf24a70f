//! Catalog loading from version-set directories on disk.

use focus_guard::catalog::RuleCatalog;
use focus_guard::error::FocusError;
use std::fs;

fn write_rule(dir: &std::path::Path, name: &str, value: &serde_json::Value) {
    fs::write(dir.join(name), serde_json::to_string_pretty(value).unwrap()).unwrap();
}

#[test]
fn test_load_version_dir_merges_rule_files() {
    let root = tempfile::tempdir().unwrap();
    let version_dir = root.path().join("1.2");
    fs::create_dir_all(&version_dir).unwrap();

    write_rule(
        &version_dir,
        "billed_cost.json",
        &serde_json::json!({
            "rule_id": "BilledCost-C-001-M",
            "column_id": "BilledCost",
            "check_type": "value_not_null",
            "validation_criteria": {"check": "value_not_null", "params": {"column": "BilledCost"}},
            "must_satisfy": "BilledCost MUST NOT be null."
        }),
    );
    // A file may also hold an array of rules.
    write_rule(
        &version_dir,
        "charge_category.json",
        &serde_json::json!([
            {
                "rule_id": "ChargeCategory-C-001-M",
                "column_id": "ChargeCategory",
                "check_type": "type_string",
                "validation_criteria": {"check": "type_string", "params": {"column": "ChargeCategory"}},
                "must_satisfy": "ChargeCategory MUST be a string."
            }
        ]),
    );
    // Non-JSON files are ignored.
    fs::write(version_dir.join("README.md"), "notes").unwrap();

    let catalog = RuleCatalog::load_version_dir(root.path(), "1.2").unwrap();
    assert_eq!(catalog.len(), 2);
    assert_eq!(catalog.version(), "1.2");
    assert!(catalog.get("BilledCost-C-001-M").is_some());
    assert!(catalog.get("ChargeCategory-C-001-M").is_some());
}

#[test]
fn test_load_version_dir_missing_version_is_error() {
    let root = tempfile::tempdir().unwrap();
    let err = RuleCatalog::load_version_dir(root.path(), "9.9").unwrap_err();
    assert!(matches!(err, FocusError::Io(_)));
}

#[test]
fn test_duplicate_rule_across_files_is_error() {
    let root = tempfile::tempdir().unwrap();
    let version_dir = root.path().join("1.2");
    fs::create_dir_all(&version_dir).unwrap();

    let rule = serde_json::json!({
        "rule_id": "BilledCost-C-001-M",
        "check_type": "value_not_null",
        "validation_criteria": {"check": "value_not_null", "params": {"column": "BilledCost"}},
        "must_satisfy": "BilledCost MUST NOT be null."
    });
    write_rule(&version_dir, "a.json", &rule);
    write_rule(&version_dir, "b.json", &rule);

    let err = RuleCatalog::load_version_dir(root.path(), "1.2").unwrap_err();
    assert!(matches!(err, FocusError::DuplicateRuleId { .. }));
}

#[test]
fn test_malformed_row_condition_is_load_error() {
    let source = serde_json::json!([{
        "rule_id": "BilledCost-C-001-M",
        "check_type": "value_not_null",
        "validation_criteria": {"check": "value_not_null", "params": {"column": "BilledCost"}},
        "row_condition": "\"X\" > 0; DROP TABLE focus_data",
        "must_satisfy": "?"
    }]);
    let err = RuleCatalog::load("1.2", &source.to_string()).unwrap_err();
    assert!(err.is_catalog_error());
}
