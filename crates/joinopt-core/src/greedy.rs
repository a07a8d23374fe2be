//! # Greedy Join Ordering
//!
//! Builds a left-deep join tree in O(V·E) estimates:
//!
//! 1. Start with the vertex that has the lowest estimated row count.
//! 2. Keep a *neighbourhood* of the edges between the plan and the vertices
//!    outside it. Join the plan with the vertex behind the neighbourhood edge
//!    that yields the lowest estimated row count (lowest edge index on ties).
//! 3. Other neighbourhood edges that lead to the vertex just added are now
//!    redundant join conditions. They become predicates above the new join.
//! 4. Add the new vertex's edges to vertices still outside the plan to the
//!    neighbourhood, and repeat until every vertex is planned.
//!
//! An empty neighbourhood with vertices left over means the graph is not
//! connected.

use crate::error::{OptimizeError, Result};
use crate::expr::PredicateValue;
use crate::join_graph::{remap_condition, JoinGraph, JoinVertexId};
use crate::ordering::{JoinOrderer, JoinOrderingStrategy, JoinTree};
use crate::plan::PlanArena;
use crate::stats::Statistics;
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, trace};

/// Greedy join orderer for one graph.
pub struct GreedyJoinOrdering<'a> {
    graph: &'a JoinGraph,
}

impl<'a> GreedyJoinOrdering<'a> {
    pub fn new(graph: &'a JoinGraph) -> Self {
        Self { graph }
    }

    /// Vertex with the lowest estimated row count, lowest id on ties.
    fn initial_vertex(vertex_stats: &[Arc<Statistics>]) -> JoinVertexId {
        let mut initial = 0;
        for (vertex_id, stats) in vertex_stats.iter().enumerate() {
            if stats.row_count < vertex_stats[initial].row_count {
                initial = vertex_id;
            }
        }
        initial
    }

    /// Check that every vertex can be reached before any subtree is moved.
    fn check_connected(&self) -> Result<()> {
        let n = self.graph.vertices().len();
        let mut reached = vec![false; n];
        let mut stack = vec![0];
        reached[0] = true;
        let mut count = 1;
        while let Some(vertex_id) = stack.pop() {
            for edge in self.graph.edges().iter().filter(|e| e.touches(vertex_id)) {
                let other = edge.other(vertex_id);
                if !reached[other] {
                    reached[other] = true;
                    count += 1;
                    stack.push(other);
                }
            }
        }
        if count < n {
            return Err(OptimizeError::DisconnectedGraph {
                planned: count,
                total: n,
            });
        }
        Ok(())
    }
}

impl JoinOrderer for GreedyJoinOrdering<'_> {
    fn order(&self, arena: &mut PlanArena) -> Result<JoinTree> {
        let n = self.graph.vertices().len();
        if n == 0 {
            return Err(OptimizeError::InvalidPlan("join graph has no vertices".into()));
        }
        self.check_connected()?;

        let edges = self.graph.edges();
        let column_counts = self.graph.column_counts(arena);
        let vertex_stats: Vec<Arc<Statistics>> = (0..n)
            .map(|vertex_id| self.graph.vertex_statistics(arena, vertex_id))
            .collect();

        let initial = Self::initial_vertex(&vertex_stats);
        trace!(vertex = initial, rows = vertex_stats[initial].row_count, "greedy start");

        let mut in_plan = vec![false; n];
        let mut queued = vec![false; edges.len()];
        let mut layout = vec![initial];
        let mut neighbourhood: BTreeSet<usize> = BTreeSet::new();

        in_plan[initial] = true;
        let mut root = self.graph.materialize_vertex(arena, initial);
        let mut statistics = Statistics::clone(&vertex_stats[initial]);
        for (edge_idx, edge) in edges.iter().enumerate() {
            if edge.touches(initial) && edge.other(initial) != initial {
                neighbourhood.insert(edge_idx);
                queued[edge_idx] = true;
            }
        }

        while layout.len() < n {
            // Pick the cheapest join over the neighbourhood.
            let mut cheapest: Option<(usize, JoinVertexId, Statistics)> = None;
            for &edge_idx in &neighbourhood {
                let edge = &edges[edge_idx];
                let (a, b) = edge.vertex_ids;
                let (from, next) = if in_plan[a] { (a, b) } else { (b, a) };
                debug_assert!(in_plan[from] && !in_plan[next]);

                let condition = remap_condition(edge, from, &layout, &[next], &column_counts)?;
                let estimate = statistics.estimate_join(
                    &vertex_stats[next],
                    edge.predicate.mode,
                    condition.as_ref(),
                );
                if cheapest
                    .as_ref()
                    .map_or(true, |(_, _, best)| estimate.row_count < best.row_count)
                {
                    cheapest = Some((edge_idx, next, estimate));
                }
            }
            let Some((edge_idx, next, estimate)) = cheapest else {
                return Err(OptimizeError::DisconnectedGraph {
                    planned: layout.len(),
                    total: n,
                });
            };

            let edge = &edges[edge_idx];
            let condition = remap_condition(edge, edge.other(next), &layout, &[next], &column_counts)?;
            let right = self.graph.materialize_vertex(arena, next);
            root = arena.add_join(edge.predicate.mode, condition, root, right);
            statistics = estimate;
            neighbourhood.remove(&edge_idx);
            in_plan[next] = true;
            layout.push(next);
            trace!(vertex = next, edge = edge_idx, rows = statistics.row_count, "greedy join");

            // Remaining edges to `next` connect two planned vertices now.
            let redundant: Vec<usize> = neighbourhood
                .iter()
                .copied()
                .filter(|&e| edges[e].touches(next))
                .collect();
            for redundant_idx in redundant {
                neighbourhood.remove(&redundant_idx);
                let edge = &edges[redundant_idx];
                if let Some(c) =
                    remap_condition(edge, edge.vertex_ids.0, &layout, &layout, &column_counts)?
                {
                    let value = PredicateValue::Column(c.right);
                    statistics = statistics.estimate_predicate(c.left, c.comparator, &value);
                    root = arena.add_predicate(c.left, c.comparator, value, root);
                }
            }

            for (idx, edge) in edges.iter().enumerate() {
                if !queued[idx] && edge.touches(next) && !in_plan[edge.other(next)] {
                    neighbourhood.insert(idx);
                    queued[idx] = true;
                }
            }
        }

        debug!(vertices = n, rows = statistics.row_count, "greedy ordering finished");
        Ok(JoinTree {
            root,
            vertex_order: layout,
            strategy: JoinOrderingStrategy::Greedy,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{ColumnComparison, Comparator};
    use crate::join_graph::{JoinEdge, JoinVertex};
    use crate::stats::ColumnStatistics;

    fn mock(arena: &mut PlanArena, name: &str, rows: f64) -> JoinVertex {
        let stats = Statistics::new(rows).with_column(ColumnStatistics::new(rows, 0.0));
        JoinVertex::new(arena.add_mock(name, stats))
    }

    fn eq() -> ColumnComparison {
        ColumnComparison::new(0, Comparator::Equals, 0)
    }

    #[test]
    fn test_chain_starts_at_cheapest_vertex() {
        let mut arena = PlanArena::new();
        let c = mock(&mut arena, "c", 10.0);
        let d = mock(&mut arena, "d", 100.0);
        let e = mock(&mut arena, "e", 1000.0);
        let graph = JoinGraph::new(
            vec![c, d, e],
            vec![JoinEdge::inner(0, 1, eq()), JoinEdge::inner(1, 2, eq())],
        );

        let tree = GreedyJoinOrdering::new(&graph).order(&mut arena).unwrap();
        assert_eq!(tree.vertex_order, vec![0, 1, 2]);
        assert_eq!(
            arena.display(tree.root),
            "Join INNER [#1 = #0]\n  Join INNER [#0 = #0]\n    Mock [c]\n    Mock [d]\n  Mock [e]\n"
        );
    }

    #[test]
    fn test_chain_from_middle_vertex() {
        let mut arena = PlanArena::new();
        let c = mock(&mut arena, "c", 100.0);
        let d = mock(&mut arena, "d", 10.0);
        let e = mock(&mut arena, "e", 1000.0);
        let graph = JoinGraph::new(
            vec![c, d, e],
            vec![JoinEdge::inner(0, 1, eq()), JoinEdge::inner(1, 2, eq())],
        );

        let tree = GreedyJoinOrdering::new(&graph).order(&mut arena).unwrap();
        assert_eq!(tree.vertex_order, vec![1, 0, 2]);
        // c is joined first; the d.e condition addresses d at offset 0.
        assert_eq!(
            arena.display(tree.root),
            "Join INNER [#0 = #0]\n  Join INNER [#0 = #0]\n    Mock [d]\n    Mock [c]\n  Mock [e]\n"
        );
    }

    #[test]
    fn test_cycle_edge_becomes_predicate() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 10.0);
        let b = mock(&mut arena, "b", 20.0);
        let c = mock(&mut arena, "c", 30.0);
        let graph = JoinGraph::new(
            vec![a, b, c],
            vec![
                JoinEdge::inner(0, 1, eq()),
                JoinEdge::inner(1, 2, eq()),
                JoinEdge::inner(2, 0, eq()),
            ],
        );

        let tree = GreedyJoinOrdering::new(&graph).order(&mut arena).unwrap();
        let root = tree.root;
        // a-b (200 / 20 = 10 rows) beats a-c (300 / 30 = 10 rows) on the edge index.
        assert_eq!(tree.vertex_order, vec![0, 1, 2]);
        assert_eq!(
            arena.display(root),
            "Predicate [#2 = #0]\n  Join INNER [#1 = #0]\n    Join INNER [#0 = #0]\n      Mock [a]\n      Mock [b]\n    Mock [c]\n"
        );
        assert_eq!(arena.output_column_count(root), 3);
    }

    #[test]
    fn test_cross_edges() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 5.0);
        let b = mock(&mut arena, "b", 3.0);
        let graph = JoinGraph::new(vec![a, b], vec![JoinEdge::cross(0, 1)]);

        let root = GreedyJoinOrdering::new(&graph).run(&mut arena).unwrap();
        assert_eq!(arena.display(root), "Join CROSS\n  Mock [b]\n  Mock [a]\n");
        assert_eq!(arena.statistics(root).row_count, 15.0);
    }

    #[test]
    fn test_disconnected_graph() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 10.0);
        let b = mock(&mut arena, "b", 10.0);
        let c = mock(&mut arena, "c", 10.0);
        let graph = JoinGraph::new(vec![a, b, c], vec![JoinEdge::inner(0, 1, eq())]);
        let arena_size = arena.len();

        let err = GreedyJoinOrdering::new(&graph).run(&mut arena).unwrap_err();
        assert_eq!(err, OptimizeError::DisconnectedGraph { planned: 2, total: 3 });
        assert_eq!(arena.len(), arena_size);
    }
}
