//! Plan execution against the query engine.
//!
//! Layers run strictly in order. Within a layer, leaf queries may run
//! concurrently up to the configured parallelism; composite aggregation is
//! purely in-memory and runs between query batches. Outcomes are keyed by
//! rule id, so execution order inside a layer never affects the report.

use super::diagnostics::{classify_engine_error, EngineErrorClass};
use crate::catalog::rule::CompositeLogic;
use crate::config::ValidatorConfig;
use crate::error::{FocusError, Result};
use crate::plan::{CompiledCheck, ExecutionPlan, PlanNode};
use crate::report::{Outcome, OutcomeStatus, Report};
use arrow::array::{Array, Int64Array, StringArray};
use arrow::record_batch::RecordBatch;
use datafusion::prelude::SessionContext;
use futures::stream::{self, StreamExt};
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Executes a compiled plan against a session holding the dataset.
///
/// The dataset must already be registered under the configured table name
/// (`focus_data` by default); the session is only read from.
///
/// On a fatal engine error the run stops, every unfinished rule is marked
/// aborted, and the error carries the partial report. A deadline expiry is
/// not an error: remaining rules are marked aborted and the partial report
/// is returned.
#[instrument(skip_all, fields(
    plan.nodes = plan.len(),
    plan.layers = plan.layers().len(),
    table = %config.table_name,
))]
pub async fn run(
    plan: &ExecutionPlan,
    ctx: &SessionContext,
    config: &ValidatorConfig,
) -> Result<Report> {
    info!(
        plan.nodes = plan.len(),
        plan.layers = plan.layers().len(),
        parallelism = config.parallelism,
        "Starting validation run"
    );
    let start = Instant::now();
    let mut report = Report::new();
    let nodes_by_id: BTreeMap<&str, &PlanNode> = plan
        .iter_nodes()
        .map(|node| (node.rule_id.as_str(), node))
        .collect();

    for (layer_index, layer) in plan.layers().iter().enumerate() {
        if deadline_exceeded(config, &start) {
            warn!(layer = layer_index, "Run deadline exceeded, aborting");
            abort_remaining(plan, &mut report);
            return Ok(report);
        }
        debug!(layer = layer_index, nodes = layer.len(), "Executing layer");

        // Predetermined outcomes first, then leaf queries, then in-memory
        // aggregation. Composites and references always come after their
        // children's layer, so the order inside one layer is safe.
        for node in layer {
            if let CompiledCheck::Skip { status, reason } = &node.check {
                report.record(node.rule_id.as_str(), skip_outcome(*status, reason));
            }
        }

        if let Err(message) = execute_layer_queries(layer, ctx, config, &mut report).await {
            abort_remaining(plan, &mut report);
            return Err(FocusError::EngineAborted {
                message,
                report: Box::new(report),
            });
        }

        for node in layer {
            match &node.check {
                CompiledCheck::Composite { logic, children } => {
                    let outcome = aggregate_composite(&report, &node.rule_id, *logic, children);
                    report.record(node.rule_id.as_str(), outcome);
                }
                CompiledCheck::Reference { target } => {
                    let outcome = mirror_reference(&report, &nodes_by_id, target);
                    report.record(node.rule_id.as_str(), outcome);
                }
                _ => {}
            }
        }
    }

    let summary = report.summary();
    info!(
        outcomes.passed = summary.passed,
        outcomes.failed = summary.failed,
        outcomes.skipped_non_applicable = summary.skipped_non_applicable,
        outcomes.skipped_dynamic = summary.skipped_dynamic,
        outcomes.skipped_upstream = summary.skipped_upstream,
        duration_ms = start.elapsed().as_millis() as u64,
        "Validation run completed"
    );
    Ok(report)
}

fn deadline_exceeded(config: &ValidatorConfig, start: &Instant) -> bool {
    config
        .deadline
        .is_some_and(|deadline| start.elapsed() >= deadline)
}

fn skip_outcome(status: OutcomeStatus, reason: &str) -> Outcome {
    match status {
        OutcomeStatus::SkippedDynamic => Outcome::skipped_dynamic(),
        OutcomeStatus::SkippedUpstream => Outcome::skipped_upstream(reason),
        _ => Outcome::skipped_non_applicable(reason),
    }
}

/// Runs every `Query` node of the layer. Returns `Err(message)` on the
/// first fatal engine error, after recording the outcomes that completed.
/// The run deadline is only checked at layer boundaries, so a started
/// layer always finishes and composites never see missing children.
async fn execute_layer_queries(
    layer: &[PlanNode],
    ctx: &SessionContext,
    config: &ValidatorConfig,
    report: &mut Report,
) -> std::result::Result<(), String> {
    let queries: Vec<&PlanNode> = layer
        .iter()
        .filter(|node| matches!(node.check, CompiledCheck::Query { .. }))
        .collect();
    if queries.is_empty() {
        return Ok(());
    }

    let mut results: Vec<(String, std::result::Result<Outcome, String>)> =
        if config.parallelism > 1 {
            stream::iter(queries.into_iter().map(|node| {
                let ctx = ctx.clone();
                let table = config.table_name.clone();
                async move {
                    let outcome = execute_leaf(&ctx, &table, node).await;
                    (node.rule_id.clone(), outcome)
                }
            }))
            .buffer_unordered(config.parallelism)
            .collect()
            .await
        } else {
            let mut collected = Vec::with_capacity(queries.len());
            for node in queries {
                let outcome = execute_leaf(ctx, &config.table_name, node).await;
                collected.push((node.rule_id.clone(), outcome));
            }
            collected
        };

    // Store in id order regardless of completion order.
    results.sort_by(|a, b| a.0.cmp(&b.0));
    let mut fatal: Option<String> = None;
    for (rule_id, result) in results {
        match result {
            Ok(outcome) => {
                if outcome.is_fail() {
                    warn!(
                        rule.id = %rule_id,
                        violations = outcome.violations.unwrap_or(0),
                        message = outcome.message.as_deref().unwrap_or(""),
                        "Check failed"
                    );
                }
                report.record(rule_id, outcome);
            }
            Err(message) if fatal.is_none() => fatal = Some(message),
            Err(_) => {}
        }
    }
    match fatal {
        Some(message) => Err(message),
        None => Ok(()),
    }
}

/// Executes one leaf check. A missing dataset column maps to a structured
/// failure; any other engine error is fatal and returned as `Err`.
async fn execute_leaf(
    ctx: &SessionContext,
    table: &str,
    node: &PlanNode,
) -> std::result::Result<Outcome, String> {
    let CompiledCheck::Query { sql, sample_sql } = &node.check else {
        return Err(format!("node '{}' is not a query", node.rule_id));
    };
    debug!(rule.id = %node.rule_id, "Submitting check query");

    let query = sql.replace("{table_name}", table);
    let (violations, message) = match run_single_row_query(ctx, &query).await {
        Ok(row) => row,
        Err(engine_message) => {
            return match classify_engine_error(&engine_message) {
                EngineErrorClass::MissingColumns(columns) => Ok(Outcome::fail(
                    1,
                    format!("Missing column(s): {}", columns.join(", ")),
                )),
                EngineErrorClass::Fatal => {
                    Err(format!("rule '{}': {engine_message}", node.rule_id))
                }
            };
        }
    };

    if violations == 0 {
        return Ok(Outcome::pass());
    }
    let mut outcome = Outcome::fail(
        violations,
        message.unwrap_or_else(|| format!("Validation rule {} failed", node.rule_id)),
    );
    if let Some(sample_sql) = sample_sql {
        let sample_query = sample_sql.replace("{table_name}", table);
        match fetch_samples(ctx, &sample_query).await {
            Ok(samples) if !samples.is_empty() => outcome = outcome.with_samples(samples),
            Ok(_) => {}
            Err(error) => {
                warn!(rule.id = %node.rule_id, error = %error, "Sample query failed")
            }
        }
    }
    Ok(outcome)
}

/// Submits a check query and reads its single `(violations, error_message)`
/// row.
async fn run_single_row_query(
    ctx: &SessionContext,
    query: &str,
) -> std::result::Result<(u64, Option<String>), String> {
    let df = ctx.sql(query).await.map_err(|e| e.to_string())?;
    let batches = df.collect().await.map_err(|e| e.to_string())?;
    read_check_row(&batches).map_err(|e| e.to_string())
}

fn read_check_row(batches: &[RecordBatch]) -> Result<(u64, Option<String>)> {
    let batch = batches
        .iter()
        .find(|batch| batch.num_rows() > 0)
        .ok_or_else(|| FocusError::internal("check query returned no rows"))?;

    let violations = batch
        .column(0)
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or_else(|| FocusError::internal("violations column is not an integer"))?
        .value(0);
    let violations = u64::try_from(violations)
        .map_err(|_| FocusError::internal("negative violation count"))?;

    let message = batch
        .column(1)
        .as_any()
        .downcast_ref::<StringArray>()
        .and_then(|array| (!array.is_null(0)).then(|| array.value(0).to_string()));

    Ok((violations, message))
}

/// Reads sample offending values, joining multi-column rows with `, `.
async fn fetch_samples(
    ctx: &SessionContext,
    query: &str,
) -> std::result::Result<Vec<String>, String> {
    let df = ctx.sql(query).await.map_err(|e| e.to_string())?;
    let batches = df.collect().await.map_err(|e| e.to_string())?;
    let mut samples = Vec::new();
    for batch in &batches {
        for row in 0..batch.num_rows() {
            let mut parts = Vec::new();
            for column in batch.columns() {
                if let Some(strings) = column.as_any().downcast_ref::<StringArray>() {
                    if !strings.is_null(row) {
                        parts.push(strings.value(row).to_string());
                    }
                }
            }
            if !parts.is_empty() {
                samples.push(parts.join(", "));
            }
        }
    }
    Ok(samples)
}

/// Applies AND/OR logic over child outcomes already in the report.
///
/// Non-applicable and dynamic skips are neutral; they neither satisfy an
/// OR nor fail an AND. Children skipped upstream (or aborted) make the
/// composite itself skipped upstream.
fn aggregate_composite(
    report: &Report,
    rule_id: &str,
    logic: CompositeLogic,
    children: &[String],
) -> Outcome {
    let mut failing: Vec<&str> = Vec::new();
    let mut passing = 0usize;
    let mut upstream: Vec<&str> = Vec::new();
    let mut missing: Vec<&str> = Vec::new();
    let mut total_violations = 0u64;

    for child in children {
        match report.outcome(child) {
            None => missing.push(child),
            Some(outcome) => match outcome.status {
                OutcomeStatus::Pass => passing += 1,
                OutcomeStatus::Fail => {
                    failing.push(child);
                    total_violations += outcome.violations.unwrap_or(1);
                }
                OutcomeStatus::SkippedUpstream | OutcomeStatus::Aborted => upstream.push(child),
                OutcomeStatus::SkippedNonApplicable | OutcomeStatus::SkippedDynamic => {}
            },
        }
    }

    if !missing.is_empty() {
        // Children always topologically precede their composite; a missing
        // outcome is a scheduler bug surfaced as a failure, not a crash.
        return Outcome::fail(
            missing.len() as u64,
            format!(
                "{rule_id}: internal error - child outcome(s) missing: [{}]",
                missing.join(", ")
            ),
        );
    }

    match logic {
        CompositeLogic::And => {
            if !failing.is_empty() {
                Outcome::fail(
                    total_violations.max(failing.len() as u64),
                    format!(
                        "{rule_id}: AND failed - failing children: [{}]",
                        failing.join(", ")
                    ),
                )
            } else if !upstream.is_empty() {
                Outcome::skipped_upstream(format!(
                    "upstream dependency skipped: [{}]",
                    upstream.join(", ")
                ))
            } else {
                Outcome::pass()
            }
        }
        CompositeLogic::Or => {
            if passing > 0 {
                Outcome::pass()
            } else if !failing.is_empty() {
                Outcome::fail(
                    total_violations.max(failing.len() as u64),
                    format!(
                        "{rule_id}: OR failed - all child rules failed: [{}]",
                        failing.join(", ")
                    ),
                )
            } else if !upstream.is_empty() {
                Outcome::skipped_upstream(format!(
                    "upstream dependency skipped: [{}]",
                    upstream.join(", ")
                ))
            } else {
                Outcome::skipped_non_applicable("all children were skipped")
            }
        }
    }
}

/// Mirrors a referenced rule's outcome.
///
/// A failed referenced *composite* does not re-fail here: the reference is
/// a dependent of an already short-circuited rule and is skipped upstream,
/// citing it. A failed referenced leaf is mirrored as a failure.
fn mirror_reference(
    report: &Report,
    nodes_by_id: &BTreeMap<&str, &PlanNode>,
    target: &str,
) -> Outcome {
    let Some(target_outcome) = report.outcome(target) else {
        return Outcome::fail(1, format!("Referenced rule '{target}' not found upstream"));
    };
    match target_outcome.status {
        OutcomeStatus::Pass => Outcome::pass(),
        OutcomeStatus::Fail => {
            let target_is_composite = nodes_by_id
                .get(target)
                .is_some_and(|node| node.kind.is_composite());
            if target_is_composite {
                Outcome::skipped_upstream(format!("upstream composite '{target}' failed"))
            } else {
                Outcome::fail(
                    target_outcome.violations.unwrap_or(1),
                    format!("Conformance reference to {target} failed"),
                )
            }
        }
        _ => Outcome::skipped_upstream(format!("upstream rule '{target}' was skipped")),
    }
}

/// Marks every rule without a recorded outcome as aborted.
fn abort_remaining(plan: &ExecutionPlan, report: &mut Report) {
    for node in plan.iter_nodes() {
        if report.outcome(&node.rule_id).is_none() {
            report.record(node.rule_id.as_str(), Outcome::aborted());
        }
    }
}
