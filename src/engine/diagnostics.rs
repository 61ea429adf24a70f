//! Query-engine error classification.
//!
//! A missing dataset column is an expected, recoverable condition: the rule
//! fails with a structured diagnostic and the run continues. Everything
//! else coming back from the engine is fatal.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Classification of a query-engine error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineErrorClass {
    /// The query referenced columns absent from the dataset. Column names
    /// are deduplicated and sorted.
    MissingColumns(Vec<String>),
    /// Any other engine failure; aborts the run.
    Fatal,
}

/// Ordered extraction patterns. The first group of each captures the
/// column identifier, optionally quoted.
static MISSING_COLUMN_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r#"No field named "?([A-Za-z0-9_]+)"?"#,
        r#"Column with name "?([A-Za-z0-9_]+)"? does not exist"#,
        r#"Binder Error:.*?column "?([A-Za-z0-9_]+)"?"#,
        r#""([A-Za-z0-9_]+)" not found"#,
    ]
    .iter()
    .map(|pattern| {
        #[allow(clippy::expect_used)]
        Regex::new(pattern).expect("hard-coded regex pattern is valid")
    })
    .collect()
});

/// Classifies an engine error message, extracting missing column names
/// when the message matches a known binder-error shape.
pub fn classify_engine_error(message: &str) -> EngineErrorClass {
    let mut columns: BTreeSet<String> = BTreeSet::new();
    for pattern in MISSING_COLUMN_PATTERNS.iter() {
        for capture in pattern.captures_iter(message) {
            if let Some(name) = capture.get(1) {
                let name = name.as_str().trim_matches('"');
                if !name.is_empty() {
                    columns.insert(name.to_string());
                }
            }
        }
    }
    if columns.is_empty() {
        EngineErrorClass::Fatal
    } else {
        EngineErrorClass::MissingColumns(columns.into_iter().collect())
    }
}
