//! # Built-in Optimization Rules
//!
//! This crate provides the default set of plan rewrite rules for the
//! [`Optimizer`](joinopt_core::optimizer::Optimizer):
//!
//! - **`JoinReorderingRule`**: Extracts every cluster of inner/cross joins and
//!   join predicates as a join graph and replaces it with the join tree chosen by
//!   DPsize (small graphs) or the greedy orderer (large graphs).

pub mod join_reordering;

use joinopt_core::optimizer::OptimizerConfig;
use joinopt_core::rule::RuleRegistry;

/// Create a rule registry with all built-in rules, configured from `config`.
pub fn default_rule_registry(config: &OptimizerConfig) -> RuleRegistry {
    let mut registry = RuleRegistry::new();
    registry.add_rule(Box::new(join_reordering::JoinReorderingRule::new(
        config.join_ordering.clone(),
    )));
    registry
}
