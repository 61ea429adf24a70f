//! The versioned FOCUS rule catalog: typed rule records and their loader.

pub mod loader;
pub mod rule;

pub use loader::{load_rules, RuleCatalog};
pub use rule::{CheckParams, CompositeLogic, Requirement, Rule, RuleStatus};
