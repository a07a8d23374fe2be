//! # Rule System
//!
//! Rules rewrite a logical plan in place. The [`Optimizer`](crate::optimizer::Optimizer)
//! hands every rule the explicit `Root` node of the plan; a rule walks the plan
//! from there, rewrites what it matches and reports whether it changed anything.
//!
//! ## Rewriting
//!
//! Rules operate on the [`PlanArena`] directly. A rewrite builds the replacement
//! subtree out of new nodes and the moved subtrees of the old one, then installs
//! it into the parent slot the old subtree occupied. Because the walk always
//! starts at `Root`, every node a rule can match has a parent.
//!
//! ## Rule Registry
//!
//! The `RuleRegistry` holds rules in application order.

use crate::error::Result;
use crate::plan::{NodeId, PlanArena};

/// A logical plan rewrite.
pub trait Rule: Send + Sync {
    /// Unique name of this rule.
    fn name(&self) -> &str;

    /// Apply the rule to the plan below `node`. Returns whether the plan changed.
    fn apply_to(&self, arena: &mut PlanArena, node: NodeId) -> Result<bool>;
}

/// Apply `rule` to both inputs of `node`.
pub fn apply_to_children(rule: &dyn Rule, arena: &mut PlanArena, node: NodeId) -> Result<bool> {
    let children = [arena.left_child(node), arena.right_child(node)];
    let mut changed = false;
    for child in children.into_iter().flatten() {
        changed |= rule.apply_to(arena, child)?;
    }
    Ok(changed)
}

/// Registry of optimization rules.
#[derive(Default)]
pub struct RuleRegistry {
    rules: Vec<Box<dyn Rule>>,
}

impl RuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: Box<dyn Rule>) {
        self.rules.push(rule);
    }

    /// All rules, in application order.
    pub fn rules(&self) -> impl Iterator<Item = &dyn Rule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    pub fn names(&self) -> Vec<String> {
        self.rules.iter().map(|r| r.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
