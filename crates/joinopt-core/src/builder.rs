//! # Join Graph Extraction
//!
//! The `JoinGraphBuilder` walks a plan subtree top-down and dissolves every node
//! that join reordering is allowed to look through:
//!
//! - inner joins with a condition become edges,
//! - cross joins (and inner joins without a condition) become one cross edge
//!   between the first vertices of their inputs,
//! - predicates over a single vertex become vertex-local predicates,
//! - predicates comparing columns of two different vertices become edges.
//!
//! Everything else (outer joins, projections, limits, leaves, and any node with
//! more than one parent) terminates the walk and becomes a vertex.
//!
//! ## Column Resolution
//!
//! Vertices are discovered left to right, so the output columns of a dissolved
//! node are exactly the concatenated columns of the vertices discovered while
//! walking it. A column id of such a node is resolved by subtracting the column
//! counts of those vertices, in discovery order, until it falls into one.

use crate::error::{OptimizeError, Result};
use crate::expr::{ColumnComparison, ColumnId, JoinMode, PredicateValue};
use crate::join_graph::{JoinEdge, JoinGraph, JoinVertex, JoinVertexId, VertexPredicate};
use crate::plan::{ChildSide, NodeId, NodeKind, PlanArena};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, trace};

/// Extract the join graph rooted at `root`.
pub fn build_join_graph(arena: &PlanArena, root: NodeId) -> Result<JoinGraph> {
    JoinGraphBuilder::new(arena).build(root)
}

/// Extract every join graph with more than one vertex reachable from `root`.
///
/// Vertices of a found graph are searched for further graphs; a node shared by
/// several parents is only visited once.
pub fn build_all_join_graphs(arena: &PlanArena, root: NodeId) -> Result<Vec<JoinGraph>> {
    let mut visited = HashSet::new();
    let mut graphs = Vec::new();
    collect_join_graphs(arena, root, &mut visited, &mut graphs)?;
    Ok(graphs)
}

fn collect_join_graphs(
    arena: &PlanArena,
    node: NodeId,
    visited: &mut HashSet<NodeId>,
    graphs: &mut Vec<JoinGraph>,
) -> Result<()> {
    if !visited.insert(node) {
        return Ok(());
    }

    let graph = build_join_graph(arena, node)?;
    if graph.vertices().len() > 1 {
        let vertex_nodes: Vec<NodeId> = graph.vertices().iter().map(|v| v.node).collect();
        graphs.push(graph);
        for vertex_node in vertex_nodes {
            collect_join_graphs(arena, vertex_node, visited, graphs)?;
        }
    } else {
        for child in [arena.left_child(node), arena.right_child(node)].into_iter().flatten() {
            collect_join_graphs(arena, child, visited, graphs)?;
        }
    }
    Ok(())
}

/// Builder state for a single extraction. Created per graph.
pub struct JoinGraphBuilder<'a> {
    arena: &'a PlanArena,
    vertices: Vec<JoinVertex>,
    edges: Vec<JoinEdge>,
}

impl<'a> JoinGraphBuilder<'a> {
    pub fn new(arena: &'a PlanArena) -> Self {
        Self {
            arena,
            vertices: Vec::new(),
            edges: Vec::new(),
        }
    }

    pub fn build(mut self, root: NodeId) -> Result<JoinGraph> {
        self.traverse(root, None)?;
        self.remove_redundant_cross_edges();

        debug!(
            root,
            vertices = self.vertices.len(),
            edges = self.edges.len(),
            "built join graph"
        );
        let graph = JoinGraph::new(self.vertices, self.edges);
        trace!("\n{}", graph.describe(self.arena));
        Ok(graph)
    }

    /// `parent_link` is `None` only for the node the extraction started at.
    fn traverse(&mut self, node: NodeId, parent_link: Option<(NodeId, ChildSide)>) -> Result<()> {
        // A shared sub-result must be computed once, so the walk may not
        // dissolve it. The starting node is exempt: its parents are outside
        // the graph.
        let arena = self.arena;
        if parent_link.is_some() && arena.num_parents(node) > 1 {
            self.add_vertex(node, parent_link);
            return Ok(());
        }

        match arena.kind(node) {
            NodeKind::Join {
                mode: JoinMode::Inner,
                condition: Some(condition),
            } => self.traverse_inner_join(node, *condition),
            NodeKind::Join {
                mode: JoinMode::Inner,
                condition: None,
            }
            | NodeKind::Join {
                mode: JoinMode::Cross,
                ..
            } => self.traverse_cross_join(node),
            NodeKind::Predicate {
                column_id,
                comparator,
                value: PredicateValue::Literal(literal),
            } => {
                let child = self.required_child(node, ChildSide::Left)?;
                let begin = self.vertices.len();
                self.traverse(child, Some((node, ChildSide::Left)))?;
                let end = self.vertices.len();

                let (vertex_id, local_column) = self.resolve(node, *column_id, begin, end)?;
                self.vertices[vertex_id].predicates.push(VertexPredicate {
                    column_id: local_column,
                    comparator: *comparator,
                    value: PredicateValue::Literal(literal.clone()),
                });
                Ok(())
            }
            NodeKind::Predicate {
                column_id,
                comparator,
                value: PredicateValue::Column(other_column_id),
            } => {
                let child = self.required_child(node, ChildSide::Left)?;
                let begin = self.vertices.len();
                self.traverse(child, Some((node, ChildSide::Left)))?;
                let end = self.vertices.len();

                let (left_vertex, left_column) = self.resolve(node, *column_id, begin, end)?;
                let (right_vertex, right_column) =
                    self.resolve(node, *other_column_id, begin, end)?;

                if left_vertex == right_vertex {
                    self.vertices[left_vertex].predicates.push(VertexPredicate {
                        column_id: left_column,
                        comparator: *comparator,
                        value: PredicateValue::Column(right_column),
                    });
                } else {
                    self.edges.push(JoinEdge::inner(
                        left_vertex,
                        right_vertex,
                        ColumnComparison::new(left_column, *comparator, right_column),
                    ));
                }
                Ok(())
            }
            NodeKind::Root
            | NodeKind::StoredTable { .. }
            | NodeKind::Mock { .. }
            | NodeKind::Join { .. }
            | NodeKind::Projection { .. }
            | NodeKind::Limit { .. } => {
                self.add_vertex(node, parent_link);
                Ok(())
            }
        }
    }

    fn traverse_inner_join(&mut self, node: NodeId, condition: ColumnComparison) -> Result<()> {
        let (begin, middle, end) = self.traverse_join_inputs(node)?;

        let (left_vertex, left_column) = self.resolve(node, condition.left, begin, middle)?;
        let (right_vertex, right_column) = self.resolve(node, condition.right, middle, end)?;
        self.edges.push(JoinEdge::inner(
            left_vertex,
            right_vertex,
            ColumnComparison::new(left_column, condition.comparator, right_column),
        ));
        Ok(())
    }

    /// A single unconditioned edge between the first vertex of each input
    /// stands for the whole product.
    fn traverse_cross_join(&mut self, node: NodeId) -> Result<()> {
        // Every walk adds at least one vertex, so both ranges are non-empty.
        let (begin, middle, _) = self.traverse_join_inputs(node)?;
        self.edges.push(JoinEdge::cross(begin, middle));
        Ok(())
    }

    /// Walk both inputs of a join and return the vertex ranges they produced:
    /// `[begin, middle)` for the left input, `[middle, end)` for the right.
    fn traverse_join_inputs(
        &mut self,
        node: NodeId,
    ) -> Result<(JoinVertexId, JoinVertexId, JoinVertexId)> {
        let left = self.required_child(node, ChildSide::Left)?;
        let right = self.required_child(node, ChildSide::Right)?;

        let begin = self.vertices.len();
        self.traverse(left, Some((node, ChildSide::Left)))?;
        let middle = self.vertices.len();
        self.traverse(right, Some((node, ChildSide::Right)))?;
        let end = self.vertices.len();
        Ok((begin, middle, end))
    }

    fn required_child(&self, node: NodeId, side: ChildSide) -> Result<NodeId> {
        self.arena.child(node, side).ok_or_else(|| {
            OptimizeError::InvalidPlan(format!(
                "{} is missing its {side:?} input",
                self.arena.description(node)
            ))
        })
    }

    fn add_vertex(&mut self, node: NodeId, parent_link: Option<(NodeId, ChildSide)>) {
        trace!(vertex = self.vertices.len(), node, "join graph vertex");
        let mut vertex = JoinVertex::new(node);
        vertex.parent_link = parent_link;
        self.vertices.push(vertex);
    }

    /// Find the vertex in `[begin, end)` that produces `column_id` of `node`'s
    /// input, returning it with the column id local to that vertex.
    fn resolve(
        &self,
        node: NodeId,
        column_id: ColumnId,
        begin: JoinVertexId,
        end: JoinVertexId,
    ) -> Result<(JoinVertexId, ColumnId)> {
        let mut local = column_id;
        for vertex_id in begin..end {
            let count = self.arena.output_column_count(self.vertices[vertex_id].node);
            if local < count {
                return Ok((vertex_id, local));
            }
            local -= count;
        }
        Err(OptimizeError::UnresolvedColumn {
            node,
            column_id,
            range_begin: begin,
            range_end: end,
        })
    }

    /// A cross edge between two vertices that are also connected by an inner
    /// edge adds nothing.
    fn remove_redundant_cross_edges(&mut self) {
        let inner_pairs: BTreeSet<(JoinVertexId, JoinVertexId)> = self
            .edges
            .iter()
            .filter(|e| e.predicate.mode == JoinMode::Inner)
            .map(JoinEdge::unordered_pair)
            .collect();

        let before = self.edges.len();
        self.edges.retain(|e| {
            e.predicate.mode != JoinMode::Cross || !inner_pairs.contains(&e.unordered_pair())
        });
        if self.edges.len() != before {
            trace!(removed = before - self.edges.len(), "removed redundant cross edges");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::{Comparator, ScalarValue};
    use crate::stats::{ColumnStatistics, Statistics};

    fn mock(arena: &mut PlanArena, name: &str, rows: f64, columns: usize) -> NodeId {
        let stats = (0..columns).fold(Statistics::new(rows), |s, _| {
            s.with_column(ColumnStatistics::new(rows, 0.0))
        });
        arena.add_mock(name, stats)
    }

    fn eq(left: ColumnId, right: ColumnId) -> Option<ColumnComparison> {
        Some(ColumnComparison::new(left, Comparator::Equals, right))
    }

    #[test]
    fn test_inner_join_resolves_local_columns() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 10.0, 2);
        let b = mock(&mut arena, "b", 10.0, 2);
        let join = arena.add_join(JoinMode::Inner, eq(1, 0), a, b);

        let graph = build_join_graph(&arena, join).unwrap();
        assert_eq!(graph.vertices().len(), 2);
        assert_eq!(graph.vertex(0).node, a);
        assert_eq!(graph.vertex(1).node, b);
        assert_eq!(graph.edges(), &[JoinEdge::inner(0, 1, ColumnComparison::new(1, Comparator::Equals, 0))]);
    }

    #[test]
    fn test_predicate_on_cross_product_becomes_edge() {
        // a has two columns, so column 2 of the cross product is b's column 0.
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 10.0, 2);
        let b = mock(&mut arena, "b", 10.0, 2);
        let cross = arena.add_join(JoinMode::Cross, None, a, b);
        let pred = arena.add_predicate(0, Comparator::Equals, PredicateValue::Column(2), cross);

        let graph = build_join_graph(&arena, pred).unwrap();
        assert_eq!(graph.vertices().len(), 2);
        // The cross edge is subsumed by the inner edge between the same pair.
        assert_eq!(graph.edges(), &[JoinEdge::inner(0, 1, ColumnComparison::new(0, Comparator::Equals, 0))]);
    }

    #[test]
    fn test_cross_join_links_first_vertices() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 10.0, 1);
        let b = mock(&mut arena, "b", 10.0, 1);
        let c = mock(&mut arena, "c", 10.0, 1);
        let d = mock(&mut arena, "d", 10.0, 1);
        let ab = arena.add_join(JoinMode::Inner, eq(0, 0), a, b);
        let cd = arena.add_join(JoinMode::Inner, eq(0, 0), c, d);
        let top = arena.add_join(JoinMode::Cross, None, ab, cd);

        let graph = build_join_graph(&arena, top).unwrap();
        assert_eq!(graph.vertices().len(), 4);
        assert_eq!(
            graph.edges(),
            &[
                JoinEdge::inner(0, 1, ColumnComparison::new(0, Comparator::Equals, 0)),
                JoinEdge::inner(2, 3, ColumnComparison::new(0, Comparator::Equals, 0)),
                JoinEdge::cross(0, 2),
            ]
        );

        // An inner join without a condition is a cross join.
        let e = mock(&mut arena, "e", 10.0, 1);
        let unconditioned = arena.add_join(JoinMode::Inner, None, top, e);
        let graph = build_join_graph(&arena, unconditioned).unwrap();
        assert_eq!(graph.edges().last(), Some(&JoinEdge::cross(0, 4)));
        assert_eq!(graph.edges().len(), 4);
    }

    #[test]
    fn test_single_vertex_predicates_stay_local() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 10.0, 2);
        let b = mock(&mut arena, "b", 10.0, 3);
        let join = arena.add_join(JoinMode::Inner, eq(0, 0), a, b);
        let literal = arena.add_predicate(
            3,
            Comparator::GreaterThan,
            PredicateValue::Literal(ScalarValue::Int64(7)),
            join,
        );
        let same_vertex = arena.add_predicate(2, Comparator::Equals, PredicateValue::Column(4), literal);

        let graph = build_join_graph(&arena, same_vertex).unwrap();
        assert_eq!(graph.edges().len(), 1);
        assert!(graph.vertex(0).predicates.is_empty());
        assert_eq!(
            graph.vertex(1).predicates,
            vec![
                VertexPredicate {
                    column_id: 1,
                    comparator: Comparator::GreaterThan,
                    value: PredicateValue::Literal(ScalarValue::Int64(7)),
                },
                VertexPredicate {
                    column_id: 0,
                    comparator: Comparator::Equals,
                    value: PredicateValue::Column(2),
                },
            ]
        );
    }

    #[test]
    fn test_barriers_become_vertices() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 10.0, 1);
        let b = mock(&mut arena, "b", 10.0, 1);
        let c = mock(&mut arena, "c", 10.0, 1);
        let outer = arena.add_join(JoinMode::Left, eq(0, 0), a, b);
        let limit = arena.add_unary(NodeKind::Limit { count: 5 }, c);
        let join = arena.add_join(JoinMode::Inner, eq(1, 0), outer, limit);

        let graph = build_join_graph(&arena, join).unwrap();
        assert_eq!(graph.vertices().len(), 2);
        assert_eq!(graph.vertex(0).node, outer);
        assert_eq!(graph.vertex(1).node, limit);
        assert_eq!(graph.edges(), &[JoinEdge::inner(0, 1, ColumnComparison::new(1, Comparator::Equals, 0))]);
    }

    #[test]
    fn test_shared_node_is_a_vertex() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 10.0, 1);
        let b = mock(&mut arena, "b", 10.0, 1);
        let c = mock(&mut arena, "c", 10.0, 1);
        let shared = arena.add_join(JoinMode::Inner, eq(0, 0), a, b);
        let top = arena.add_join(JoinMode::Inner, eq(1, 0), shared, c);
        let _other_parent = arena.add_unary(NodeKind::Limit { count: 1 }, shared);

        let graph = build_join_graph(&arena, top).unwrap();
        assert_eq!(graph.vertices().len(), 2);
        assert_eq!(graph.vertex(0).node, shared);

        // The starting node is dissolved even if it is shared.
        let graph = build_join_graph(&arena, shared).unwrap();
        assert_eq!(graph.vertices().len(), 2);
    }

    #[test]
    fn test_unresolved_column() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 10.0, 1);
        let b = mock(&mut arena, "b", 10.0, 1);
        let join = arena.add_join(JoinMode::Inner, eq(3, 0), a, b);

        let err = build_join_graph(&arena, join).unwrap_err();
        assert_eq!(
            err,
            OptimizeError::UnresolvedColumn {
                node: join,
                column_id: 3,
                range_begin: 0,
                range_end: 1,
            }
        );
    }

    #[test]
    fn test_build_all_join_graphs_descends_into_vertices() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 10.0, 1);
        let b = mock(&mut arena, "b", 10.0, 1);
        let c = mock(&mut arena, "c", 10.0, 1);
        let d = mock(&mut arena, "d", 10.0, 1);
        let ab = arena.add_join(JoinMode::Inner, eq(0, 0), a, b);
        let projection = arena.add_unary(NodeKind::Projection { column_ids: vec![0] }, ab);
        let cd = arena.add_join(JoinMode::Inner, eq(0, 0), c, d);
        let top = arena.add_join(JoinMode::Inner, eq(0, 0), projection, cd);
        let root = arena.add_unary(NodeKind::Root, top);

        let graphs = build_all_join_graphs(&arena, root).unwrap();
        assert_eq!(graphs.len(), 2);
        assert_eq!(graphs[0].vertices().len(), 3);
        assert_eq!(graphs[0].vertex(0).node, projection);
        assert_eq!(graphs[1].vertices().len(), 2);
        assert_eq!(graphs[1].vertex(0).node, a);
    }

    #[test]
    fn test_build_all_join_graphs_visits_shared_node_once() {
        let mut arena = PlanArena::new();
        let a = mock(&mut arena, "a", 10.0, 1);
        let b = mock(&mut arena, "b", 10.0, 1);
        let shared = arena.add_join(JoinMode::Inner, eq(0, 0), a, b);
        let cross = arena.add_join(JoinMode::Cross, None, shared, shared);
        let root = arena.add_unary(NodeKind::Root, cross);
        assert_eq!(arena.num_parents(shared), 2);

        let graphs = build_all_join_graphs(&arena, root).unwrap();
        assert_eq!(graphs.len(), 2);

        // Both inputs of the cross join are the same opaque vertex.
        let outer: Vec<NodeId> = graphs[0].vertices().iter().map(|v| v.node).collect();
        assert_eq!(outer, vec![shared, shared]);

        let shared_graphs = graphs
            .iter()
            .filter(|g| g.vertices().iter().map(|v| v.node).eq([a, b]))
            .count();
        assert_eq!(shared_graphs, 1);
    }
}
