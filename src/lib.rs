//! # focus-guard - FOCUS conformance validation for Rust
//!
//! focus-guard validates tabular cost-and-usage datasets against the FOCUS
//! (FinOps Open Source Cost and Usage) conformance rule catalog. It loads
//! a versioned set of typed rules, resolves their dependency graph,
//! compiles a layered execution plan of generated SQL checks, and executes
//! the plan against a DataFusion session holding the dataset.
//!
//! ## Pipeline
//!
//! ```text
//! RuleCatalog --resolve--> DependencyGraph --build_plan--> ExecutionPlan --run--> Report
//! ```
//!
//! - **[`catalog`]**: parses versioned rule JSON into immutable typed rules,
//!   including composite (AND/OR) rules, applicability criteria, and
//!   row-level conditions.
//! - **[`checks`]**: a closed registry of check generators, one per check
//!   kind, each producing a violation-counting SQL query.
//! - **[`graph`]**: builds the rule dependency graph, propagates composite
//!   row conditions through AND composites, and rejects cycles with a
//!   concrete diagnostic.
//! - **[`plan`]**: marks applicability, layers the graph with Kahn's
//!   algorithm (lexicographic tie-breaking, so plans are reproducible), and
//!   compiles every leaf to SQL. [`plan::explain`] describes a plan fully
//!   offline.
//! - **[`engine`]**: executes layers in order against the session, maps
//!   missing-column engine errors to structured failures, aggregates
//!   composite outcomes, and produces the per-rule [`report::Report`].
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use arrow::array::StringArray;
//! use arrow::datatypes::{DataType, Field, Schema};
//! use arrow::record_batch::RecordBatch;
//! use datafusion::datasource::MemTable;
//! use datafusion::prelude::{SessionConfig, SessionContext};
//! use focus_guard::prelude::*;
//!
//! # async fn example() -> Result<()> {
//! let source = r#"[{
//!     "rule_id": "AvailabilityZone-C-001-M",
//!     "column_id": "AvailabilityZone",
//!     "check_type": "type_string",
//!     "validation_criteria": {
//!         "check": "type_string",
//!         "params": {"column": "AvailabilityZone"}
//!     },
//!     "must_satisfy": "AvailabilityZone MUST be of type String."
//! }]"#;
//!
//! let catalog = RuleCatalog::load("1.2", source)?;
//! let config = ValidatorConfig::default();
//! let graph = focus_guard::graph::resolve(&catalog, None)?;
//! let plan = build_plan(&graph, &config)?;
//!
//! // The dataset must be registered under the configured table name, with
//! // the information schema enabled for column-presence checks.
//! let ctx = SessionContext::new_with_config(
//!     SessionConfig::new().with_information_schema(true),
//! );
//! let schema = Arc::new(Schema::new(vec![Field::new(
//!     "AvailabilityZone",
//!     DataType::Utf8,
//!     true,
//! )]));
//! let batch = RecordBatch::try_new(
//!     schema.clone(),
//!     vec![Arc::new(StringArray::from(vec![Some("us-east-1a")]))],
//! )
//! .unwrap();
//! let table = MemTable::try_new(schema, vec![vec![batch]]).unwrap();
//! ctx.register_table("focus_data", Arc::new(table)).unwrap();
//!
//! let report = focus_guard::engine::run(&plan, &ctx, &config).await?;
//! for (rule_id, outcome) in report.iter() {
//!     println!("{rule_id}: {:?}", outcome.status);
//! }
//! assert!(report.is_conformant());
//! # Ok(())
//! # }
//! ```
//!
//! ## Guarantees
//!
//! - Resolution and compilation are deterministic: the same catalog yields
//!   byte-identical SQL and an identical layer schedule on every run.
//! - Every rule in the closure gets exactly one outcome, keyed by rule id;
//!   report iteration is lexicographic.
//! - Cycles in the catalog are rejected at load with the cycle enumerated;
//!   they are never silently tolerated.
//! - A missing dataset column fails the affected rule and never crashes
//!   the run.

pub mod catalog;
pub mod checks;
pub mod config;
pub mod engine;
pub mod error;
pub mod graph;
pub mod logging;
pub mod plan;
pub mod prelude;
pub mod report;
pub mod security;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;
