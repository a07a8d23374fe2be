//! # Join Ordering Strategies
//!
//! Two orderers turn a [`JoinGraph`] into a join tree:
//!
//! - [`DpSize`](crate::dpsize::DpSize): exhaustive dynamic programming over
//!   vertex subsets. Finds the plan with the lowest estimated cardinality but
//!   costs Θ(3^N), so it is only used for small graphs.
//! - [`GreedyJoinOrdering`](crate::greedy::GreedyJoinOrdering): grows a
//!   left-deep tree from the cheapest vertex, always taking the cheapest
//!   adjacent join. Polynomial, used for everything else.
//!
//! [`order_joins`] picks one according to a [`JoinOrderingConfig`].

use crate::dpsize::{DpSize, DPSIZE_MAX_VERTICES};
use crate::error::Result;
use crate::greedy::GreedyJoinOrdering;
use crate::join_graph::{JoinGraph, JoinVertexId};
use crate::plan::{NodeId, PlanArena};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Which orderer to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinOrderingStrategy {
    /// DPsize up to `dpsize_vertex_limit` vertices, Greedy beyond.
    Auto,
    DpSize,
    Greedy,
}

impl std::fmt::Display for JoinOrderingStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinOrderingStrategy::Auto => write!(f, "auto"),
            JoinOrderingStrategy::DpSize => write!(f, "dp_size"),
            JoinOrderingStrategy::Greedy => write!(f, "greedy"),
        }
    }
}

/// Configuration of join ordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinOrderingConfig {
    pub strategy: JoinOrderingStrategy,
    /// Largest graph `Auto` hands to DPsize. Values above the DPsize bitmap
    /// width are clamped.
    pub dpsize_vertex_limit: usize,
}

impl Default for JoinOrderingConfig {
    fn default() -> Self {
        Self {
            strategy: JoinOrderingStrategy::Auto,
            dpsize_vertex_limit: 12,
        }
    }
}

impl JoinOrderingConfig {
    /// The concrete orderer to use for a graph with `vertex_count` vertices.
    pub fn resolve(&self, vertex_count: usize) -> JoinOrderingStrategy {
        match self.strategy {
            JoinOrderingStrategy::Auto => {
                if vertex_count <= self.dpsize_vertex_limit.min(DPSIZE_MAX_VERTICES) {
                    JoinOrderingStrategy::DpSize
                } else {
                    JoinOrderingStrategy::Greedy
                }
            }
            strategy => strategy,
        }
    }
}

/// A join tree produced by an orderer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinTree {
    pub root: NodeId,
    /// Vertices in the order their columns appear in `root`'s output.
    pub vertex_order: Vec<JoinVertexId>,
    pub strategy: JoinOrderingStrategy,
}

/// An algorithm that builds a join tree out of a join graph.
///
/// Ordering moves the graph's vertex subtrees into the produced tree. On error
/// the plan the graph was extracted from is left untouched.
pub trait JoinOrderer {
    fn order(&self, arena: &mut PlanArena) -> Result<JoinTree>;

    /// Build the join tree and return its top node.
    fn run(&self, arena: &mut PlanArena) -> Result<NodeId> {
        Ok(self.order(arena)?.root)
    }
}

/// Order the joins of `graph` with the strategy `config` selects for its size.
pub fn order_joins(
    graph: &JoinGraph,
    arena: &mut PlanArena,
    config: &JoinOrderingConfig,
) -> Result<JoinTree> {
    let strategy = config.resolve(graph.vertices().len());
    debug!(
        vertices = graph.vertices().len(),
        edges = graph.edges().len(),
        %strategy,
        "ordering joins"
    );
    match strategy {
        JoinOrderingStrategy::Greedy => GreedyJoinOrdering::new(graph).order(arena),
        _ => DpSize::new(graph)?.order(arena),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_strategy() {
        let config = JoinOrderingConfig::default();
        assert_eq!(config.resolve(2), JoinOrderingStrategy::DpSize);
        assert_eq!(config.resolve(12), JoinOrderingStrategy::DpSize);
        assert_eq!(config.resolve(13), JoinOrderingStrategy::Greedy);

        let wide = JoinOrderingConfig {
            dpsize_vertex_limit: 100,
            ..Default::default()
        };
        assert_eq!(wide.resolve(32), JoinOrderingStrategy::DpSize);
        assert_eq!(wide.resolve(33), JoinOrderingStrategy::Greedy);

        let forced = JoinOrderingConfig {
            strategy: JoinOrderingStrategy::Greedy,
            ..Default::default()
        };
        assert_eq!(forced.resolve(2), JoinOrderingStrategy::Greedy);
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let config: JoinOrderingConfig = serde_json::from_str(r#"{"strategy":"dp_size"}"#).unwrap();
        assert_eq!(config.strategy, JoinOrderingStrategy::DpSize);
        assert_eq!(config.dpsize_vertex_limit, 12);
    }
}
