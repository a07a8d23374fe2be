//! # Join-Graph Optimization Endpoint
//!
//! This module implements a compact protocol for join ordering: instead of a full
//! logical plan, the caller sends only what join ordering needs:
//!
//! - **Tables**: id, schema/name, row count, per-column statistics (NDV, null
//!   fraction, optional min/max) and optional single-table filters
//! - **Joins**: conditions between pairs of tables (`INNER` with a column
//!   comparison, or `CROSS`)
//!
//! Each table becomes a vertex of a join graph and each join an edge. The graph is
//! ordered with the configured strategy (or the one the request asks for) and the
//! resulting join tree is returned together with its estimated row count.
//!
//! ## Wire Protocol
//!
//! - Request: `POST /optimize/join-graph` with JSON body (`JoinGraphRequest`)
//! - Response: JSON body (`JoinGraphResponse`) with the ordered join tree
//!
//! ## Errors
//!
//! - 400 Bad Request: malformed JSON, unknown table or column ids, unsupported
//!   join types or comparators
//! - 422 Unprocessable Entity: the joins do not connect all tables, or the graph
//!   is too large for the requested strategy
//! - 500 Internal Server Error: the orderer produced an inconsistent plan

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

use joinopt_core::error::OptimizeError;
use joinopt_core::expr::{ColumnComparison, Comparator, JoinMode, PredicateValue, ScalarValue};
use joinopt_core::join_graph::{JoinEdge, JoinGraph, JoinVertex};
use joinopt_core::ordering::{order_joins, JoinOrderingConfig, JoinOrderingStrategy};
use joinopt_core::plan::{NodeId, NodeKind, PlanArena};
use joinopt_core::stats::{ColumnStatistics, Statistics};

use crate::state::AppState;

type ApiError = (StatusCode, String);

fn bad_request(message: impl Into<String>) -> ApiError {
    (StatusCode::BAD_REQUEST, message.into())
}

// ---------------------------------------------------------------------------
// JSON wire-protocol types
// ---------------------------------------------------------------------------

/// Request body for `POST /optimize/join-graph`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGraphRequest {
    /// Tables participating in the join graph.
    pub tables: Vec<TableInfo>,
    /// Join conditions connecting pairs of tables.
    #[serde(default)]
    pub joins: Vec<JoinInfo>,
    /// Overrides the server's join ordering strategy for this request.
    #[serde(default)]
    pub strategy: Option<JoinOrderingStrategy>,
}

/// A table in the join graph with its statistics.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableInfo {
    /// Unique identifier for this table within the request (e.g., "t0", "t1").
    pub id: String,
    /// Schema name (e.g., "tpch").
    pub schema: String,
    /// Table name (e.g., "customer").
    pub name: String,
    /// Estimated row count from table statistics.
    pub row_count: f64,
    /// Per-column statistics, in column order.
    #[serde(default)]
    pub columns: Vec<ColumnInfo>,
    /// Filters applied to this table before it is joined.
    #[serde(default)]
    pub filters: Vec<FilterInfo>,
}

/// Per-column statistics for cardinality estimation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnInfo {
    pub name: String,
    /// Number of distinct values (NDV).
    pub ndv: f64,
    /// Fraction of values that are NULL (0.0 to 1.0).
    #[serde(default)]
    pub null_fraction: f64,
    #[serde(default)]
    pub min: Option<f64>,
    #[serde(default)]
    pub max: Option<f64>,
}

/// A single-table filter: `column <comparator> value`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterInfo {
    pub column: String,
    #[serde(default = "default_comparator")]
    pub comparator: String,
    /// A JSON scalar (number, string, boolean or null).
    pub value: serde_json::Value,
}

/// A join condition between two tables.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinInfo {
    pub left_table_id: String,
    pub right_table_id: String,
    /// INNER or CROSS. Outer joins cannot be reordered and are rejected.
    #[serde(default = "default_join_type")]
    pub join_type: String,
    /// Column of the left table. Required for INNER joins.
    #[serde(default)]
    pub left_column: Option<String>,
    /// Column of the right table. Required for INNER joins.
    #[serde(default)]
    pub right_column: Option<String>,
    #[serde(default = "default_comparator")]
    pub comparator: String,
}

fn default_join_type() -> String {
    "INNER".to_string()
}

fn default_comparator() -> String {
    "=".to_string()
}

/// Response body from the join-graph optimization endpoint.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinGraphResponse {
    /// The ordered join tree.
    pub tree: JoinTreeNode,
    /// Estimated row count of the tree's output.
    pub estimated_row_count: f64,
    /// The orderer that produced the tree (`dp_size` or `greedy`).
    pub strategy: String,
}

/// A node in the ordered join tree. Columns are written as `tableId.column`.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum JoinTreeNode {
    /// A leaf node referencing a table by its ID.
    Leaf {
        #[serde(rename = "tableId")]
        table_id: String,
    },
    /// A join node combining two subtrees.
    Join {
        #[serde(rename = "joinType")]
        join_type: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        condition: Option<String>,
        left: Box<JoinTreeNode>,
        right: Box<JoinTreeNode>,
    },
    /// A filter: either a table filter or a join condition that was applied
    /// after its tables had been joined through other conditions.
    Filter {
        condition: String,
        input: Box<JoinTreeNode>,
    },
}

// ---------------------------------------------------------------------------
// Handler
// ---------------------------------------------------------------------------

/// POST /optimize/join-graph: order the joins of a join graph.
pub async fn optimize_join_graph(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<JoinGraphRequest>, JsonRejection>,
) -> Result<Json<JoinGraphResponse>, ApiError> {
    let Json(req) = payload.map_err(|rejection| bad_request(rejection.body_text()))?;
    optimize(&state.config.join_ordering, &req).map(Json)
}

fn optimize(
    config: &JoinOrderingConfig,
    req: &JoinGraphRequest,
) -> Result<JoinGraphResponse, ApiError> {
    if req.tables.is_empty() {
        return Err(bad_request("Request must contain at least one table"));
    }

    let mut arena = PlanArena::new();
    let (graph, table_of_node) = build_graph(&mut arena, req)?;

    let mut config = config.clone();
    if let Some(strategy) = req.strategy {
        config.strategy = strategy;
    }

    let tree = order_joins(&graph, &mut arena, &config).map_err(|err| {
        warn!(%err, "join ordering failed");
        error_response(err)
    })?;
    let estimated_row_count = arena.statistics(tree.root).row_count;
    debug!(
        tables = req.tables.len(),
        joins = req.joins.len(),
        strategy = %tree.strategy,
        estimated_row_count,
        "ordered join graph"
    );

    let (tree_node, _) = to_tree(&arena, tree.root, req, &table_of_node)?;
    Ok(JoinGraphResponse {
        tree: tree_node,
        estimated_row_count,
        strategy: tree.strategy.to_string(),
    })
}

fn error_response(err: OptimizeError) -> ApiError {
    let status = match err {
        OptimizeError::DisconnectedGraph { .. } | OptimizeError::TooManyVertices { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        OptimizeError::UnresolvedColumn { .. }
        | OptimizeError::UnknownTable(_)
        | OptimizeError::InvalidPlan(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, err.to_string())
}

// ---------------------------------------------------------------------------
// Join graph construction
// ---------------------------------------------------------------------------

/// Add a leaf per table to `arena` and describe the request as a join graph.
///
/// Returns the graph and the table index of every leaf node.
fn build_graph(
    arena: &mut PlanArena,
    req: &JoinGraphRequest,
) -> Result<(JoinGraph, HashMap<NodeId, usize>), ApiError> {
    let mut table_index: HashMap<&str, usize> = HashMap::new();
    let mut table_of_node = HashMap::new();
    let mut vertices = Vec::with_capacity(req.tables.len());

    for (idx, table) in req.tables.iter().enumerate() {
        if table_index.insert(table.id.as_str(), idx).is_some() {
            return Err(bad_request(format!("Duplicate table ID: {}", table.id)));
        }

        let stats = table.columns.iter().fold(Statistics::new(table.row_count), |stats, col| {
            let mut col_stats = ColumnStatistics::new(col.ndv, col.null_fraction);
            if let (Some(min), Some(max)) = (col.min, col.max) {
                col_stats = col_stats.with_range(min, max);
            }
            stats.with_column(col_stats)
        });
        let node = arena.add_mock(format!("{}.{}", table.schema, table.name), stats);
        table_of_node.insert(node, idx);

        let mut vertex = JoinVertex::new(node);
        for filter in &table.filters {
            vertex = vertex.with_predicate(
                column_index(table, &filter.column)?,
                parse_comparator(&filter.comparator)?,
                PredicateValue::Literal(parse_literal(&filter.value)?),
            );
        }
        vertices.push(vertex);
    }

    let mut edges = Vec::with_capacity(req.joins.len());
    for join in &req.joins {
        let lookup = |id: &str| {
            table_index
                .get(id)
                .copied()
                .ok_or_else(|| bad_request(format!("Unknown table ID: {id}")))
        };
        let left = lookup(&join.left_table_id)?;
        let right = lookup(&join.right_table_id)?;
        if left == right {
            return Err(bad_request(format!(
                "Join must connect two different tables, got {} twice",
                join.left_table_id
            )));
        }

        match parse_join_mode(&join.join_type)? {
            JoinMode::Cross => edges.push(JoinEdge::cross(left, right)),
            _ => {
                let (Some(left_column), Some(right_column)) = (&join.left_column, &join.right_column)
                else {
                    return Err(bad_request(format!(
                        "INNER join between {} and {} needs leftColumn and rightColumn",
                        join.left_table_id, join.right_table_id
                    )));
                };
                let condition = ColumnComparison::new(
                    column_index(&req.tables[left], left_column)?,
                    parse_comparator(&join.comparator)?,
                    column_index(&req.tables[right], right_column)?,
                );
                edges.push(JoinEdge::inner(left, right, condition));
            }
        }
    }

    Ok((JoinGraph::new(vertices, edges), table_of_node))
}

fn column_index(table: &TableInfo, column: &str) -> Result<usize, ApiError> {
    table
        .columns
        .iter()
        .position(|c| c.name == column)
        .ok_or_else(|| bad_request(format!("Unknown column {} of table {}", column, table.id)))
}

fn parse_join_mode(s: &str) -> Result<JoinMode, ApiError> {
    match s.to_uppercase().as_str() {
        "INNER" => Ok(JoinMode::Inner),
        "CROSS" => Ok(JoinMode::Cross),
        other => Err(bad_request(format!(
            "Join type {other} cannot be reordered, expected INNER or CROSS"
        ))),
    }
}

fn parse_comparator(s: &str) -> Result<Comparator, ApiError> {
    match s {
        "=" | "==" => Ok(Comparator::Equals),
        "<>" | "!=" => Ok(Comparator::NotEquals),
        "<" => Ok(Comparator::LessThan),
        "<=" => Ok(Comparator::LessThanEquals),
        ">" => Ok(Comparator::GreaterThan),
        ">=" => Ok(Comparator::GreaterThanEquals),
        other => Err(bad_request(format!("Unknown comparator: {other}"))),
    }
}

fn parse_literal(value: &serde_json::Value) -> Result<ScalarValue, ApiError> {
    use serde_json::Value;
    match value {
        Value::Null => Ok(ScalarValue::Null),
        Value::Bool(b) => Ok(ScalarValue::Bool(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(ScalarValue::Int64(i)),
            None => n
                .as_f64()
                .map(|f| ScalarValue::Float64(f.into()))
                .ok_or_else(|| bad_request(format!("Unsupported number: {n}"))),
        },
        Value::String(s) => Ok(ScalarValue::Utf8(s.clone())),
        Value::Array(_) | Value::Object(_) => {
            Err(bad_request(format!("Filter value must be a scalar, got {value}")))
        }
    }
}

// ---------------------------------------------------------------------------
// Response construction
// ---------------------------------------------------------------------------

/// Convert the ordered plan back to the wire format.
///
/// Returns the tree node and the labels (`tableId.column`) of its output columns,
/// which are needed to describe the conditions of the nodes above.
fn to_tree(
    arena: &PlanArena,
    node: NodeId,
    req: &JoinGraphRequest,
    table_of_node: &HashMap<NodeId, usize>,
) -> Result<(JoinTreeNode, Vec<String>), ApiError> {
    let label = |labels: &[String], column: usize| {
        labels.get(column).cloned().ok_or_else(|| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Column {column} out of range in {}", arena.description(node)),
            )
        })
    };

    match arena.kind(node) {
        NodeKind::Mock { .. } => {
            let table = table_of_node
                .get(&node)
                .map(|&idx| &req.tables[idx])
                .ok_or_else(|| {
                    (
                        StatusCode::INTERNAL_SERVER_ERROR,
                        format!("Leaf {node} is not a request table"),
                    )
                })?;
            let labels = table
                .columns
                .iter()
                .map(|c| format!("{}.{}", table.id, c.name))
                .collect();
            Ok((
                JoinTreeNode::Leaf {
                    table_id: table.id.clone(),
                },
                labels,
            ))
        }
        NodeKind::Join { mode, condition } => {
            let (left, left_labels) = to_tree(arena, input(arena, node, true)?, req, table_of_node)?;
            let (right, right_labels) =
                to_tree(arena, input(arena, node, false)?, req, table_of_node)?;
            let condition = match condition {
                Some(c) => Some(format!(
                    "{} {} {}",
                    label(&left_labels, c.left)?,
                    c.comparator,
                    label(&right_labels, c.right)?
                )),
                None => None,
            };
            let labels = left_labels.into_iter().chain(right_labels).collect();
            Ok((
                JoinTreeNode::Join {
                    join_type: mode.to_string(),
                    condition,
                    left: Box::new(left),
                    right: Box::new(right),
                },
                labels,
            ))
        }
        NodeKind::Predicate {
            column_id,
            comparator,
            value,
        } => {
            let (input_node, labels) = to_tree(arena, input(arena, node, true)?, req, table_of_node)?;
            let value = match value {
                PredicateValue::Column(other) => label(&labels, *other)?,
                PredicateValue::Literal(literal) => literal.to_string(),
            };
            let condition = format!("{} {} {}", label(&labels, *column_id)?, comparator, value);
            Ok((
                JoinTreeNode::Filter {
                    condition,
                    input: Box::new(input_node),
                },
                labels,
            ))
        }
        _ => Err((
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Unexpected node in join tree: {}", arena.description(node)),
        )),
    }
}

fn input(arena: &PlanArena, node: NodeId, left: bool) -> Result<NodeId, ApiError> {
    let child = if left {
        arena.left_child(node)
    } else {
        arena.right_child(node)
    };
    child.ok_or_else(|| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("{} is missing an input", arena.description(node)),
        )
    })
}
