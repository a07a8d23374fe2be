//! # Optimizer Errors
//!
//! None of these errors are caused by user queries. They report broken
//! invariants between the plan translator, the join graph builder and the join
//! orderers, and abort the optimization pass instead of producing a wrong plan.

use crate::expr::ColumnId;
use crate::join_graph::JoinVertexId;
use crate::plan::NodeId;

/// Errors that can occur while extracting join graphs and ordering joins.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum OptimizeError {
    /// A join or predicate references a column that no vertex in the searched
    /// range produces. The plan handed to the builder was malformed.
    #[error("column {column_id} of node {node} does not belong to any vertex in [{range_begin}, {range_end})")]
    UnresolvedColumn {
        node: NodeId,
        column_id: ColumnId,
        range_begin: JoinVertexId,
        range_end: JoinVertexId,
    },
    /// The join orderer could not connect all vertices of the graph.
    #[error("join graph is not connected: planned {planned} of {total} vertices")]
    DisconnectedGraph { planned: usize, total: usize },
    /// DPsize was asked to order more vertices than its subset bitmap can hold.
    #[error("join graph has {vertices} vertices, DPsize supports at most {max}")]
    TooManyVertices { vertices: usize, max: usize },
    /// A stored table has no statistics in the catalog.
    #[error("unknown table: {0}")]
    UnknownTable(String),
    /// The plan does not have the shape an operation requires.
    #[error("invalid plan: {0}")]
    InvalidPlan(String),
}

pub type Result<T, E = OptimizeError> = std::result::Result<T, E>;
