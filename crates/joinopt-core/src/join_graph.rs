//! # Join Graph
//!
//! A `JoinGraph` is the unit of input to the join orderers: the base relations
//! of a join cluster ("vertices") and the join conditions connecting them
//! ("edges"), extracted from a plan subtree by the
//! [`JoinGraphBuilder`](crate::builder::JoinGraphBuilder).
//!
//! ## Column Ids
//!
//! Column ids stored in a graph are always *local* to the vertex they refer to.
//! An edge `(a, b)` with condition `#1 = #0` compares column 1 of vertex `a`
//! with column 0 of vertex `b`, no matter where `a` and `b` end up in the
//! reordered plan. The orderers translate local ids into ids of the join inputs
//! they create.
//!
//! ## Ownership of Vertex Subtrees
//!
//! A vertex references its subtree by `NodeId`. While the graph is being built
//! the subtree is still attached to the original plan; it is moved into the
//! reordered plan by [`JoinGraph::materialize_vertex`], which cuts the link the
//! builder reached it through before attaching it to its new parent.

use crate::error::{OptimizeError, Result};
use crate::expr::{ColumnComparison, ColumnId, Comparator, JoinMode, PredicateValue};
use crate::plan::{ChildSide, NodeId, PlanArena};
use crate::stats::Statistics;
use std::fmt::Write;
use std::sync::Arc;

/// Index of a vertex in `JoinGraph::vertices()`.
pub type JoinVertexId = usize;

/// A join condition between two vertices.
///
/// `condition` is `None` for cross edges. Otherwise `condition.left` is a column
/// of the edge's first vertex and `condition.right` a column of its second.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JoinPredicate {
    pub mode: JoinMode,
    pub condition: Option<ColumnComparison>,
}

/// An edge of the join graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JoinEdge {
    pub predicate: JoinPredicate,
    pub vertex_ids: (JoinVertexId, JoinVertexId),
}

impl JoinEdge {
    /// Inner edge `first.left <comparator> second.right`.
    pub fn inner(first: JoinVertexId, second: JoinVertexId, condition: ColumnComparison) -> Self {
        Self {
            predicate: JoinPredicate {
                mode: JoinMode::Inner,
                condition: Some(condition),
            },
            vertex_ids: (first, second),
        }
    }

    /// Unconditioned edge stating that the two vertices are paired by a cross product.
    pub fn cross(first: JoinVertexId, second: JoinVertexId) -> Self {
        Self {
            predicate: JoinPredicate {
                mode: JoinMode::Cross,
                condition: None,
            },
            vertex_ids: (first, second),
        }
    }

    pub fn touches(&self, vertex_id: JoinVertexId) -> bool {
        self.vertex_ids.0 == vertex_id || self.vertex_ids.1 == vertex_id
    }

    /// The endpoint opposite to `vertex_id`.
    pub fn other(&self, vertex_id: JoinVertexId) -> JoinVertexId {
        if self.vertex_ids.0 == vertex_id {
            self.vertex_ids.1
        } else {
            self.vertex_ids.0
        }
    }

    /// Vertex pair with the smaller id first, identifying the edge's endpoints
    /// regardless of orientation.
    pub fn unordered_pair(&self) -> (JoinVertexId, JoinVertexId) {
        let (a, b) = self.vertex_ids;
        (a.min(b), a.max(b))
    }

    /// The edge's condition oriented so that `left` addresses a column of
    /// `from` and `right` a column of the other endpoint.
    pub fn condition_from(&self, from: JoinVertexId) -> Option<ColumnComparison> {
        let condition = self.predicate.condition?;
        if self.vertex_ids.0 == from {
            Some(condition)
        } else {
            Some(condition.mirrored())
        }
    }
}

/// A single-relation filter recorded on a vertex. `column_id` (and a `Column`
/// value) are local to the vertex.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VertexPredicate {
    pub column_id: ColumnId,
    pub comparator: Comparator,
    pub value: PredicateValue,
}

/// One relation participating in join reordering.
#[derive(Debug, Clone, PartialEq)]
pub struct JoinVertex {
    pub node: NodeId,
    pub predicates: Vec<VertexPredicate>,
    /// The parent slot the builder reached `node` through, cut when the vertex
    /// is moved into a reordered plan.
    pub(crate) parent_link: Option<(NodeId, ChildSide)>,
}

impl JoinVertex {
    pub fn new(node: NodeId) -> Self {
        Self {
            node,
            predicates: Vec::new(),
            parent_link: None,
        }
    }

    pub fn with_predicate(
        mut self,
        column_id: ColumnId,
        comparator: Comparator,
        value: PredicateValue,
    ) -> Self {
        self.predicates.push(VertexPredicate {
            column_id,
            comparator,
            value,
        });
        self
    }
}

/// Vertices and edges of a join cluster.
///
/// Vertex ids are indices into `vertices` and stay stable for the lifetime of the
/// graph. Edges are kept in discovery order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JoinGraph {
    vertices: Vec<JoinVertex>,
    edges: Vec<JoinEdge>,
}

impl JoinGraph {
    pub fn new(vertices: Vec<JoinVertex>, edges: Vec<JoinEdge>) -> Self {
        debug_assert!(
            edges
                .iter()
                .all(|e| e.vertex_ids.0 < vertices.len() && e.vertex_ids.1 < vertices.len()),
            "join edge references a vertex outside the graph"
        );
        Self { vertices, edges }
    }

    pub fn vertices(&self) -> &[JoinVertex] {
        &self.vertices
    }

    pub fn edges(&self) -> &[JoinEdge] {
        &self.edges
    }

    pub fn vertex(&self, id: JoinVertexId) -> &JoinVertex {
        &self.vertices[id]
    }

    /// Output column count of every vertex, indexed by vertex id.
    pub fn column_counts(&self, arena: &PlanArena) -> Vec<usize> {
        self.vertices
            .iter()
            .map(|v| arena.output_column_count(v.node))
            .collect()
    }

    /// Statistics of a vertex with its local predicates applied.
    pub fn vertex_statistics(&self, arena: &PlanArena, id: JoinVertexId) -> Arc<Statistics> {
        let vertex = &self.vertices[id];
        vertex
            .predicates
            .iter()
            .fold(arena.statistics(vertex.node), |stats, p| {
                Arc::new(stats.estimate_predicate(p.column_id, p.comparator, &p.value))
            })
    }

    /// Move a vertex's subtree out of the plan it was found in and stack its local
    /// predicates on top of it. Returns the topmost node.
    pub fn materialize_vertex(&self, arena: &mut PlanArena, id: JoinVertexId) -> NodeId {
        let vertex = &self.vertices[id];
        if let Some((parent, side)) = vertex.parent_link {
            if arena.child(parent, side) == Some(vertex.node) {
                arena.set_child(parent, side, None);
            }
        }

        vertex.predicates.iter().fold(vertex.node, |child, p| {
            arena.add_predicate(p.column_id, p.comparator, p.value.clone(), child)
        })
    }

    /// Render the graph for logging.
    pub fn describe(&self, arena: &PlanArena) -> String {
        let mut out = String::from("==== Vertices ====\n");
        for (idx, vertex) in self.vertices.iter().enumerate() {
            let _ = write!(out, "{idx}: {}", arena.description(vertex.node));
            for p in &vertex.predicates {
                let _ = write!(out, " [#{} {} {}]", p.column_id, p.comparator, p.value);
            }
            out.push('\n');
        }
        out.push_str("==== Edges ====\n");
        for edge in &self.edges {
            let (a, b) = edge.vertex_ids;
            match edge.predicate.condition {
                Some(c) => {
                    let _ = writeln!(
                        out,
                        "{a} <-- #{} {} #{} --> {b}",
                        c.left, c.comparator, c.right
                    );
                }
                None => {
                    let _ = writeln!(out, "{a} <-- {} --> {b}", edge.predicate.mode);
                }
            }
        }
        out
    }
}

/// Sum of the column counts of the vertices preceding `vertex` in `layout`:
/// the position of the vertex's first column in a relation whose columns are
/// the concatenation of `layout`'s vertices.
pub(crate) fn column_offset(
    layout: &[JoinVertexId],
    column_counts: &[usize],
    vertex: JoinVertexId,
) -> Result<ColumnId> {
    let mut offset = 0;
    for &v in layout {
        if v == vertex {
            return Ok(offset);
        }
        offset += column_counts[v];
    }
    Err(OptimizeError::InvalidPlan(format!(
        "vertex {vertex} is not part of the join input"
    )))
}

/// `edge`'s condition translated from vertex-local column ids into ids of two
/// inputs laid out as `left_layout` and `right_layout`. `from` is the endpoint
/// found in `left_layout`. Returns `None` for cross edges.
///
/// Passing the same layout twice yields a predicate over a single input.
pub(crate) fn remap_condition(
    edge: &JoinEdge,
    from: JoinVertexId,
    left_layout: &[JoinVertexId],
    right_layout: &[JoinVertexId],
    column_counts: &[usize],
) -> Result<Option<ColumnComparison>> {
    let Some(condition) = edge.condition_from(from) else {
        return Ok(None);
    };
    let to = edge.other(from);
    Ok(Some(ColumnComparison::new(
        column_offset(left_layout, column_counts, from)? + condition.left,
        condition.comparator,
        column_offset(right_layout, column_counts, to)? + condition.right,
    )))
}
