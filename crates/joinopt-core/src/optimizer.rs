//! # Rule-Driven Optimizer
//!
//! The optimizer wraps the input plan in an explicit `Root` node, so that every
//! node a rule may replace (including the input's top node) sits in a parent
//! slot, and applies the registered rules in order until a full pass changes
//! nothing or `max_iterations` passes have run.

use crate::error::{OptimizeError, Result};
use crate::ordering::JoinOrderingConfig;
use crate::plan::{ChildSide, NodeId, NodeKind, PlanArena};
use crate::rule::RuleRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::debug;

/// Configuration of an optimization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerConfig {
    /// Upper bound on the number of passes over the rule registry.
    pub max_iterations: usize,
    pub join_ordering: JoinOrderingConfig,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self {
            max_iterations: 10,
            join_ordering: JoinOrderingConfig::default(),
        }
    }
}

pub struct Optimizer {
    registry: Arc<RuleRegistry>,
    max_iterations: usize,
}

impl Optimizer {
    pub fn new(registry: Arc<RuleRegistry>, config: &OptimizerConfig) -> Self {
        Self {
            registry,
            max_iterations: config.max_iterations,
        }
    }

    /// Optimize the plan rooted at `input` and return its new top node.
    pub fn optimize(&self, arena: &mut PlanArena, input: NodeId) -> Result<NodeId> {
        let root = arena.add_unary(NodeKind::Root, input);

        for iteration in 0..self.max_iterations {
            let mut changed = false;
            for rule in self.registry.rules() {
                let rule_changed = rule.apply_to(arena, root)?;
                if rule_changed {
                    debug!(rule = rule.name(), iteration, "rule changed the plan");
                }
                changed |= rule_changed;
            }
            if !changed {
                break;
            }
        }

        let output = arena
            .left_child(root)
            .ok_or_else(|| OptimizeError::InvalidPlan("root lost its input".into()))?;
        arena.set_child(root, ChildSide::Left, None);
        Ok(output)
    }
}
