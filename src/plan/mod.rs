//! Layered execution plans.
//!
//! A plan is a totally ordered sequence of layers. Within a layer,
//! execution order has no semantic effect; across layers, earlier layers
//! complete before later ones begin. Node identity (rule ids, including
//! synthesized inline-child ids) is stable across runs.

pub mod builder;
pub mod explain;

pub use builder::build_plan;
pub use explain::{explain, RuleExplanation};

use crate::catalog::rule::CompositeLogic;
use crate::checks::CheckKind;
use crate::report::OutcomeStatus;

/// The executable form of one rule.
#[derive(Debug, Clone)]
pub enum CompiledCheck {
    /// A leaf check: SQL with a `{table_name}` placeholder that returns a
    /// single row `(violations, error_message)`.
    Query {
        sql: String,
        /// Companion query fetching sample offending values, when enabled
        sample_sql: Option<String>,
    },
    /// A composite: aggregate the ordered children's outcomes.
    Composite {
        logic: CompositeLogic,
        children: Vec<String>,
    },
    /// A reference: mirror the target rule's outcome.
    Reference { target: String },
    /// A predetermined outcome resolved at plan time.
    Skip {
        status: OutcomeStatus,
        reason: String,
    },
}

/// One schedulable unit of the plan.
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub rule_id: String,
    pub kind: CheckKind,
    /// The FOCUS column the rule pertains to, for diagnostics
    pub column_id: Option<String>,
    /// Human-readable requirement text, for diagnostics and explain mode
    pub must_satisfy: String,
    pub check: CompiledCheck,
}

/// A compiled, layered execution plan.
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    layers: Vec<Vec<PlanNode>>,
}

impl ExecutionPlan {
    pub(crate) fn new(layers: Vec<Vec<PlanNode>>) -> Self {
        Self { layers }
    }

    /// The ordered layers of the plan.
    pub fn layers(&self) -> &[Vec<PlanNode>] {
        &self.layers
    }

    /// Total number of plan nodes across all layers.
    pub fn len(&self) -> usize {
        self.layers.iter().map(Vec::len).sum()
    }

    /// Returns true when the plan holds no nodes.
    pub fn is_empty(&self) -> bool {
        self.layers.iter().all(Vec::is_empty)
    }

    /// Iterates every node in layer order.
    pub fn iter_nodes(&self) -> impl Iterator<Item = &PlanNode> {
        self.layers.iter().flatten()
    }

    /// Returns the layer index a rule was scheduled into.
    pub fn layer_of(&self, rule_id: &str) -> Option<usize> {
        self.layers
            .iter()
            .position(|layer| layer.iter().any(|node| node.rule_id == rule_id))
    }
}
