//! # Join Reordering Rule
//!
//! Walks the plan top-down. At the first inner/cross join or predicate of each
//! join cluster it extracts the cluster's join graph, orders it with DPsize or
//! Greedy (per [`JoinOrderingConfig`]) and installs the produced tree in the
//! parent slot the cluster occupied. It then continues inside the graph's
//! vertices, which may contain further clusters below outer joins, projections
//! or limits.
//!
//! ## Column Order
//!
//! Reordering permutes the output columns of the cluster. When the permutation
//! is not the identity, a `Projection` restoring the original order is placed
//! above the new tree, so the plan above the cluster keeps addressing the same
//! columns.
//!
//! ## Shared Subtrees
//!
//! A cluster whose top node has several parents is not reordered: replacing it
//! would require updating every parent. Its inputs are still searched.

use joinopt_core::builder::build_join_graph;
use joinopt_core::error::{OptimizeError, Result};
use joinopt_core::expr::{ColumnId, JoinMode};
use joinopt_core::join_graph::JoinGraph;
use joinopt_core::ordering::{order_joins, JoinOrderingConfig, JoinTree};
use joinopt_core::plan::{NodeId, NodeKind, PlanArena};
use joinopt_core::rule::{apply_to_children, Rule};
use tracing::debug;

/// Reorders every join cluster of a plan.
#[derive(Debug, Clone, Default)]
pub struct JoinReorderingRule {
    config: JoinOrderingConfig,
}

impl JoinReorderingRule {
    pub fn new(config: JoinOrderingConfig) -> Self {
        Self { config }
    }

    /// Whether a join graph extracted at a node of this kind can have more than
    /// one vertex.
    fn starts_cluster(kind: &NodeKind) -> bool {
        match kind {
            NodeKind::Join { mode, .. } => matches!(mode, JoinMode::Inner | JoinMode::Cross),
            NodeKind::Predicate { .. } => true,
            _ => false,
        }
    }
}

impl Rule for JoinReorderingRule {
    fn name(&self) -> &str {
        "JoinReordering"
    }

    fn apply_to(&self, arena: &mut PlanArena, node: NodeId) -> Result<bool> {
        if !Self::starts_cluster(arena.kind(node)) || arena.num_parents(node) != 1 {
            return apply_to_children(self, arena, node);
        }

        let graph = build_join_graph(arena, node)?;
        if graph.vertices().len() <= 1 {
            return apply_to_children(self, arena, node);
        }

        let parent = arena.parents(node)[0];
        let side = arena.child_side(parent, node).ok_or_else(|| {
            OptimizeError::InvalidPlan(format!("node {node} is not a child of its parent {parent}"))
        })?;
        let before = arena.display(node);

        let tree = order_joins(&graph, arena, &self.config)?;
        let top = restore_column_order(arena, &graph, &tree);
        arena.set_child(parent, side, Some(top));

        let mut changed = top != tree.root || arena.display(tree.root) != before;
        debug!(
            node,
            vertices = graph.vertices().len(),
            strategy = %tree.strategy,
            changed,
            "reordered join graph"
        );

        for vertex in graph.vertices() {
            changed |= self.apply_to(arena, vertex.node)?;
        }
        Ok(changed)
    }
}

/// Put a projection above `tree` that restores the column order of the
/// original cluster, in which the vertices appeared in id order. Returns the
/// new top node, or `tree.root` if the order did not change.
fn restore_column_order(arena: &mut PlanArena, graph: &JoinGraph, tree: &JoinTree) -> NodeId {
    let column_counts = graph.column_counts(arena);

    let mut reordered_offsets = vec![0; column_counts.len()];
    let mut offset = 0;
    for &vertex_id in &tree.vertex_order {
        reordered_offsets[vertex_id] = offset;
        offset += column_counts[vertex_id];
    }

    let mut column_ids: Vec<ColumnId> = Vec::with_capacity(offset);
    for (vertex_id, &count) in column_counts.iter().enumerate() {
        column_ids.extend((0..count).map(|column| reordered_offsets[vertex_id] + column));
    }

    if column_ids.iter().enumerate().all(|(position, &id)| position == id) {
        return tree.root;
    }
    arena.add_unary(NodeKind::Projection { column_ids }, tree.root)
}

#[cfg(test)]
mod tests {
    use super::*;
    use joinopt_core::expr::{ColumnComparison, Comparator, PredicateValue};
    use joinopt_core::ordering::JoinOrderingStrategy;
    use joinopt_core::stats::{ColumnStatistics, Statistics};

    fn mock(arena: &mut PlanArena, name: &str, rows: f64, columns: usize) -> NodeId {
        let stats = (0..columns).fold(Statistics::new(rows), |s, _| {
            s.with_column(ColumnStatistics::new(rows, 0.0))
        });
        arena.add_mock(name, stats)
    }

    fn eq(left: ColumnId, right: ColumnId) -> Option<ColumnComparison> {
        Some(ColumnComparison::new(left, Comparator::Equals, right))
    }

    fn apply(rule: &JoinReorderingRule, arena: &mut PlanArena, input: NodeId) -> (NodeId, bool) {
        let root = arena.add_unary(NodeKind::Root, input);
        let changed = rule.apply_to(arena, root).unwrap();
        (arena.left_child(root).unwrap(), changed)
    }

    #[test]
    fn test_predicate_over_cross_join_becomes_inner_join() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 100.0, 1);
        let b = mock(&mut arena, "b", 10.0, 1);
        let cross = arena.add_join(JoinMode::Cross, None, a, b);
        let pred = arena.add_predicate(0, Comparator::Equals, PredicateValue::Column(1), cross);

        let rule = JoinReorderingRule::default();
        let (output, changed) = apply(&rule, &mut arena, pred);
        assert!(changed);
        assert_eq!(
            arena.display(output),
            "Join INNER [#0 = #0]\n  Mock [a]\n  Mock [b]\n"
        );
        assert_eq!(arena.parents(a).len(), 1);

        // Reordering its own output changes nothing.
        let root = arena.parents(output)[0];
        assert!(!rule.apply_to(&mut arena, root).unwrap());
    }

    #[test]
    fn test_projection_restores_column_order() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 1000.0, 2);
        let b = mock(&mut arena, "b", 10.0, 1);
        let join = arena.add_join(JoinMode::Inner, eq(0, 0), a, b);

        let rule = JoinReorderingRule::new(JoinOrderingConfig {
            strategy: JoinOrderingStrategy::Greedy,
            ..Default::default()
        });
        let (output, changed) = apply(&rule, &mut arena, join);
        assert!(changed);
        assert_eq!(
            arena.display(output),
            "Projection [#1, #2, #0]\n  Join INNER [#0 = #0]\n    Mock [b]\n    Mock [a]\n"
        );
        assert_eq!(arena.output_column_count(output), 3);

        let root = arena.parents(output)[0];
        assert!(!rule.apply_to(&mut arena, root).unwrap());
    }

    #[test]
    fn test_clusters_below_outer_joins_are_reordered() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 100.0, 1);
        let b = mock(&mut arena, "b", 10.0, 1);
        let c = mock(&mut arena, "c", 10.0, 1);
        let d = mock(&mut arena, "d", 10.0, 1);
        let cross = arena.add_join(JoinMode::Cross, None, a, b);
        let pred = arena.add_predicate(0, Comparator::Equals, PredicateValue::Column(1), cross);
        let left = arena.add_join(JoinMode::Left, eq(0, 0), pred, d);
        let top = arena.add_join(JoinMode::Inner, eq(0, 0), left, c);

        let (output, changed) = apply(&JoinReorderingRule::default(), &mut arena, top);
        assert!(changed);
        assert_eq!(
            arena.display(output),
            "Join INNER [#0 = #0]\n  Join LEFT [#0 = #0]\n    Join INNER [#0 = #0]\n      Mock [a]\n      Mock [b]\n    Mock [d]\n  Mock [c]\n"
        );
    }

    #[test]
    fn test_single_vertex_is_untouched() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 100.0, 1);
        let pred = arena.add_predicate(
            0,
            Comparator::GreaterThan,
            PredicateValue::Literal(joinopt_core::expr::ScalarValue::Int64(3)),
            a,
        );

        let (output, changed) = apply(&JoinReorderingRule::default(), &mut arena, pred);
        assert!(!changed);
        assert_eq!(output, pred);
    }

    #[test]
    fn test_shared_cluster_is_not_replaced() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 100.0, 1);
        let b = mock(&mut arena, "b", 10.0, 1);
        let join = arena.add_join(JoinMode::Inner, eq(0, 0), a, b);
        let limit = arena.add_unary(NodeKind::Limit { count: 5 }, join);
        let top = arena.add_join(JoinMode::Cross, None, join, limit);

        let (output, _) = apply(&JoinReorderingRule::default(), &mut arena, top);
        // The shared join stays in place as a vertex of the outer cluster.
        assert_eq!(arena.num_parents(join), 2);
        assert_eq!(arena.left_child(join), Some(a));
        assert_eq!(arena.output_column_count(output), 4);
    }
}
