//! # DPsize Join Enumeration
//!
//! Classic size-driven dynamic programming over subsets of join graph vertices.
//! Subsets are `u32` bitmaps, so a graph may have at most 32 vertices; the
//! enumeration is Θ(3^N) anyway, which limits practical use to far fewer.
//!
//! ## Algorithm
//!
//! `best[S]` is the cheapest plan found so far that joins exactly the vertices
//! in `S`. Singletons are seeded with the vertices themselves. Then, for every
//! plan size from 2 to N and every split of that size into a left and a right
//! size, each pair of disjoint planned subsets `(L, R)` that is connected by at
//! least one edge yields a candidate for `best[L ∪ R]`:
//!
//! - every connecting edge is tried as the join condition; the one with the
//!   lowest estimated row count wins (lowest edge index on ties),
//! - the remaining connecting edges become *pending* predicates, stacked above
//!   the join when the tree is built,
//! - the candidate replaces `best[L ∪ R]` only if it is strictly cheaper.
//!
//! Only subsets that already have a plan are combined. A subset without a plan
//! is not connected and cannot take part in any connected split.
//!
//! ## Column Layout
//!
//! Each plan node records the order in which its vertices' columns appear in its
//! output (`layout`). Join conditions and pending predicates are translated from
//! vertex-local column ids into ids of the actual join inputs with it.

use crate::error::{OptimizeError, Result};
use crate::expr::{ColumnComparison, PredicateValue};
use crate::join_graph::{remap_condition, JoinGraph, JoinVertexId};
use crate::ordering::{JoinOrderer, JoinOrderingStrategy, JoinTree};
use crate::plan::{NodeId, PlanArena};
use crate::stats::Statistics;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

/// Width of the subset bitmap.
pub const DPSIZE_MAX_VERTICES: usize = 32;

/// A set of vertex ids, one bit per vertex.
pub type VertexSet = u32;

/// A node of a DPsize plan.
#[derive(Debug)]
pub struct JoinPlanNode {
    pub vertices: VertexSet,
    /// Vertices in the order their columns appear in this node's output.
    pub layout: Vec<JoinVertexId>,
    pub statistics: Arc<Statistics>,
    pub kind: JoinPlanKind,
}

#[derive(Debug)]
pub enum JoinPlanKind {
    Leaf {
        vertex_id: JoinVertexId,
    },
    Join {
        left: Arc<JoinPlanNode>,
        right: Arc<JoinPlanNode>,
        /// Index of the edge used as the join condition.
        join_edge: usize,
        /// Indices of the other edges between `left` and `right`, ascending.
        pending_edges: Vec<usize>,
    },
}

impl JoinPlanNode {
    /// Indices of every edge used in this plan, as join condition or pending
    /// predicate, in no particular order.
    pub fn covered_edges(&self) -> Vec<usize> {
        let mut edges = Vec::new();
        self.collect_edges(&mut edges);
        edges
    }

    fn collect_edges(&self, edges: &mut Vec<usize>) {
        if let JoinPlanKind::Join {
            left,
            right,
            join_edge,
            pending_edges,
        } = &self.kind
        {
            left.collect_edges(edges);
            right.collect_edges(edges);
            edges.push(*join_edge);
            edges.extend_from_slice(pending_edges);
        }
    }
}

/// DPsize join orderer for one graph.
pub struct DpSize<'a> {
    graph: &'a JoinGraph,
}

impl<'a> DpSize<'a> {
    pub fn new(graph: &'a JoinGraph) -> Result<Self> {
        let vertices = graph.vertices().len();
        if vertices > DPSIZE_MAX_VERTICES {
            return Err(OptimizeError::TooManyVertices {
                vertices,
                max: DPSIZE_MAX_VERTICES,
            });
        }
        Ok(Self { graph })
    }

    /// Find the cheapest plan joining all vertices. Does not modify the arena.
    pub fn plan(&self, arena: &PlanArena) -> Result<Arc<JoinPlanNode>> {
        let n = self.graph.vertices().len();
        if n == 0 {
            return Err(OptimizeError::InvalidPlan("join graph has no vertices".into()));
        }
        let column_counts = self.graph.column_counts(arena);

        let mut best: HashMap<VertexSet, Arc<JoinPlanNode>> = HashMap::new();
        // Planned subsets by size, in the order they were first planned.
        let mut planned: Vec<Vec<VertexSet>> = vec![Vec::new(); n + 1];

        for vertex_id in 0..n {
            let set: VertexSet = 1 << vertex_id;
            best.insert(
                set,
                Arc::new(JoinPlanNode {
                    vertices: set,
                    layout: vec![vertex_id],
                    statistics: self.graph.vertex_statistics(arena, vertex_id),
                    kind: JoinPlanKind::Leaf { vertex_id },
                }),
            );
            planned[1].push(set);
        }

        for plan_size in 2..=n {
            // Inputs are strictly smaller than the subsets planned in this round.
            let (smaller, rest) = planned.split_at_mut(plan_size);
            let current = &mut rest[0];
            for left_size in 1..plan_size {
                let right_size = plan_size - left_size;

                for &left_set in &smaller[left_size] {
                    for &right_set in &smaller[right_size] {
                        if left_set & right_set != 0 {
                            continue;
                        }
                        let connecting = self.connecting_edges(left_set, right_set);
                        if connecting.is_empty() {
                            continue;
                        }

                        let candidate = self.join_candidate(
                            Arc::clone(&best[&left_set]),
                            Arc::clone(&best[&right_set]),
                            connecting,
                            &column_counts,
                        )?;

                        let union = left_set | right_set;
                        let is_cheaper = best.get(&union).map_or(true, |existing| {
                            candidate.statistics.row_count < existing.statistics.row_count
                        });
                        if is_cheaper {
                            trace!(
                                set = union,
                                rows = candidate.statistics.row_count,
                                "new best plan"
                            );
                            if best.insert(union, Arc::new(candidate)).is_none() {
                                current.push(union);
                            }
                        }
                    }
                }
            }
        }

        let full: VertexSet = VertexSet::MAX >> (DPSIZE_MAX_VERTICES - n);
        match best.remove(&full) {
            Some(plan) => {
                debug!(
                    vertices = n,
                    planned_subsets = best.len() + 1,
                    rows = plan.statistics.row_count,
                    "DPsize finished"
                );
                Ok(plan)
            }
            None => {
                let largest = planned.iter().rposition(|sets| !sets.is_empty()).unwrap_or(0);
                Err(OptimizeError::DisconnectedGraph {
                    planned: largest,
                    total: n,
                })
            }
        }
    }

    /// Indices of the edges with one endpoint in each set, ascending.
    fn connecting_edges(&self, left: VertexSet, right: VertexSet) -> Vec<usize> {
        let contains = |set: VertexSet, v: JoinVertexId| set & (1 << v) != 0;
        self.graph
            .edges()
            .iter()
            .enumerate()
            .filter(|(_, e)| {
                let (a, b) = e.vertex_ids;
                (contains(left, a) && contains(right, b)) || (contains(left, b) && contains(right, a))
            })
            .map(|(idx, _)| idx)
            .collect()
    }

    fn join_candidate(
        &self,
        left: Arc<JoinPlanNode>,
        right: Arc<JoinPlanNode>,
        connecting: Vec<usize>,
        column_counts: &[usize],
    ) -> Result<JoinPlanNode> {
        let mut cheapest: Option<(usize, Statistics)> = None;
        for &edge_idx in &connecting {
            let edge = &self.graph.edges()[edge_idx];
            let condition = self.join_condition(edge_idx, &left, &right, column_counts)?;
            let estimate = left.statistics.estimate_join(
                &right.statistics,
                edge.predicate.mode,
                condition.as_ref(),
            );
            if cheapest
                .as_ref()
                .map_or(true, |(_, best)| estimate.row_count < best.row_count)
            {
                cheapest = Some((edge_idx, estimate));
            }
        }
        let (join_edge, estimate) = cheapest
            .ok_or_else(|| OptimizeError::InvalidPlan("join split without connecting edge".into()))?;

        let layout: Vec<JoinVertexId> = left.layout.iter().chain(&right.layout).copied().collect();
        let pending_edges: Vec<usize> = connecting.into_iter().filter(|&e| e != join_edge).collect();

        let mut statistics = estimate;
        for &edge_idx in &pending_edges {
            let edge = &self.graph.edges()[edge_idx];
            if let Some(c) = remap_condition(edge, edge.vertex_ids.0, &layout, &layout, column_counts)? {
                statistics =
                    statistics.estimate_predicate(c.left, c.comparator, &PredicateValue::Column(c.right));
            }
        }

        Ok(JoinPlanNode {
            vertices: left.vertices | right.vertices,
            layout,
            statistics: Arc::new(statistics),
            kind: JoinPlanKind::Join {
                left,
                right,
                join_edge,
                pending_edges,
            },
        })
    }

    /// Condition of edge `edge_idx` for joining `left` with `right`.
    fn join_condition(
        &self,
        edge_idx: usize,
        left: &JoinPlanNode,
        right: &JoinPlanNode,
        column_counts: &[usize],
    ) -> Result<Option<ColumnComparison>> {
        let edge = &self.graph.edges()[edge_idx];
        let (a, b) = edge.vertex_ids;
        let from = if left.vertices & (1 << a) != 0 { a } else { b };
        remap_condition(edge, from, &left.layout, &right.layout, column_counts)
    }

    /// Turn a plan into plan nodes, moving the vertex subtrees into it.
    pub fn build_tree(
        &self,
        arena: &mut PlanArena,
        plan: &JoinPlanNode,
        column_counts: &[usize],
    ) -> Result<NodeId> {
        match &plan.kind {
            JoinPlanKind::Leaf { vertex_id } => Ok(self.graph.materialize_vertex(arena, *vertex_id)),
            JoinPlanKind::Join {
                left,
                right,
                join_edge,
                pending_edges,
            } => {
                let left_node = self.build_tree(arena, left, column_counts)?;
                let right_node = self.build_tree(arena, right, column_counts)?;

                let condition = self.join_condition(*join_edge, left, right, column_counts)?;
                let mode = self.graph.edges()[*join_edge].predicate.mode;
                let mut node = arena.add_join(mode, condition, left_node, right_node);

                for &edge_idx in pending_edges {
                    let edge = &self.graph.edges()[edge_idx];
                    let predicate = remap_condition(
                        edge,
                        edge.vertex_ids.0,
                        &plan.layout,
                        &plan.layout,
                        column_counts,
                    )?;
                    if let Some(c) = predicate {
                        node = arena.add_predicate(
                            c.left,
                            c.comparator,
                            PredicateValue::Column(c.right),
                            node,
                        );
                    }
                }
                Ok(node)
            }
        }
    }
}

impl JoinOrderer for DpSize<'_> {
    fn order(&self, arena: &mut PlanArena) -> Result<JoinTree> {
        let plan = self.plan(arena)?;
        let column_counts = self.graph.column_counts(arena);
        let root = self.build_tree(arena, &plan, &column_counts)?;
        Ok(JoinTree {
            root,
            vertex_order: plan.layout.clone(),
            strategy: JoinOrderingStrategy::DpSize,
        })
    }
}
