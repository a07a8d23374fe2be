//! # Logical Plan Arena
//!
//! Logical plans are stored in a `PlanArena`: a flat vector of nodes addressed by
//! stable `NodeId`s. Each node records its (at most two) children and, explicitly,
//! the list of nodes that reference it as a child. A node referenced from more
//! than one place (a shared sub-result) therefore has `num_parents() > 1`.
//!
//! ## Ownership Transfer
//!
//! Rewrites never copy subtrees. Moving a subtree is done by detaching it from
//! its parents (`clear_parents`) and attaching it somewhere else (`set_child`);
//! both operations keep the child slots and the parent lists consistent, so a
//! node never appears under a parent that does not list it.
//!
//! Nodes that become unreachable after a rewrite stay in the arena. The arena
//! lives for one optimization pass, so there is no reclamation.
//!
//! ## Node Kinds
//!
//! `NodeKind` is a closed enum, matched exhaustively by the join graph builder:
//!
//! - **Root**: the explicit top of a plan during optimization (one child).
//! - **StoredTable / Mock**: leaves carrying their own statistics.
//! - **Join**: binary join with an optional column comparison (absent for cross joins).
//! - **Predicate**: filter comparing a column with another column or a literal.
//! - **Projection**: reorders/prunes columns; acts as a barrier for join reordering.
//! - **Limit**: keeps at most `count` rows.

use crate::catalog::Catalog;
use crate::error::{OptimizeError, Result};
use crate::expr::{ColumnComparison, ColumnId, Comparator, JoinMode, PredicateValue};
use crate::stats::Statistics;
use std::fmt::Write;
use std::sync::Arc;

/// Index of a node in a `PlanArena`.
pub type NodeId = usize;

/// Which input slot of a parent a child occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildSide {
    Left,
    Right,
}

/// Operator of a plan node, together with its operator-specific fields.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Root,
    StoredTable {
        name: String,
        statistics: Arc<Statistics>,
    },
    Mock {
        name: String,
        statistics: Arc<Statistics>,
    },
    Join {
        mode: JoinMode,
        condition: Option<ColumnComparison>,
    },
    Predicate {
        column_id: ColumnId,
        comparator: Comparator,
        value: PredicateValue,
    },
    Projection {
        column_ids: Vec<ColumnId>,
    },
    Limit {
        count: u64,
    },
}

/// A single node of the logical plan.
#[derive(Debug, Clone)]
pub struct PlanNode {
    pub kind: NodeKind,
    left: Option<NodeId>,
    right: Option<NodeId>,
    parents: Vec<NodeId>,
}

/// Arena holding every node of a logical plan.
#[derive(Debug, Clone, Default)]
pub struct PlanArena {
    nodes: Vec<PlanNode>,
}

impl PlanArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a detached node without children.
    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(PlanNode {
            kind,
            left: None,
            right: None,
            parents: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Add a stored table leaf whose statistics come from the catalog.
    pub fn add_stored_table(&mut self, catalog: &dyn Catalog, name: &str) -> Result<NodeId> {
        let statistics = catalog
            .get_table_stats(name)
            .ok_or_else(|| OptimizeError::UnknownTable(name.to_string()))?;
        Ok(self.add(NodeKind::StoredTable {
            name: name.to_string(),
            statistics: Arc::new(statistics),
        }))
    }

    /// Add a leaf with explicitly provided statistics.
    pub fn add_mock(&mut self, name: impl Into<String>, statistics: Statistics) -> NodeId {
        self.add(NodeKind::Mock {
            name: name.into(),
            statistics: Arc::new(statistics),
        })
    }

    pub fn add_join(
        &mut self,
        mode: JoinMode,
        condition: Option<ColumnComparison>,
        left: NodeId,
        right: NodeId,
    ) -> NodeId {
        let id = self.add(NodeKind::Join { mode, condition });
        self.set_left_child(id, left);
        self.set_right_child(id, right);
        id
    }

    pub fn add_predicate(
        &mut self,
        column_id: ColumnId,
        comparator: Comparator,
        value: PredicateValue,
        child: NodeId,
    ) -> NodeId {
        let id = self.add(NodeKind::Predicate {
            column_id,
            comparator,
            value,
        });
        self.set_left_child(id, child);
        id
    }

    /// Add a single-input node (Root, Projection, Limit) above `child`.
    pub fn add_unary(&mut self, kind: NodeKind, child: NodeId) -> NodeId {
        let id = self.add(kind);
        self.set_left_child(id, child);
        id
    }

    pub fn node(&self, id: NodeId) -> &PlanNode {
        &self.nodes[id]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id].kind
    }

    pub fn left_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].left
    }

    pub fn right_child(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id].right
    }

    pub fn child(&self, id: NodeId, side: ChildSide) -> Option<NodeId> {
        match side {
            ChildSide::Left => self.nodes[id].left,
            ChildSide::Right => self.nodes[id].right,
        }
    }

    pub fn parents(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id].parents
    }

    pub fn num_parents(&self, id: NodeId) -> usize {
        self.nodes[id].parents.len()
    }

    /// The slot of `parent` that holds `child`, if any.
    pub fn child_side(&self, parent: NodeId, child: NodeId) -> Option<ChildSide> {
        if self.nodes[parent].left == Some(child) {
            Some(ChildSide::Left)
        } else if self.nodes[parent].right == Some(child) {
            Some(ChildSide::Right)
        } else {
            None
        }
    }

    /// Put `child` into the `side` slot of `parent`, unlinking the previous
    /// occupant of that slot.
    pub fn set_child(&mut self, parent: NodeId, side: ChildSide, child: Option<NodeId>) {
        let old = self.child(parent, side);
        if old == child {
            return;
        }

        if let Some(old) = old {
            let parents = &mut self.nodes[old].parents;
            if let Some(pos) = parents.iter().position(|&p| p == parent) {
                parents.swap_remove(pos);
            }
        }

        match side {
            ChildSide::Left => self.nodes[parent].left = child,
            ChildSide::Right => self.nodes[parent].right = child,
        }

        if let Some(child) = child {
            self.nodes[child].parents.push(parent);
        }
    }

    pub fn set_left_child(&mut self, parent: NodeId, child: NodeId) {
        self.set_child(parent, ChildSide::Left, Some(child));
    }

    pub fn set_right_child(&mut self, parent: NodeId, child: NodeId) {
        self.set_child(parent, ChildSide::Right, Some(child));
    }

    /// Detach `id` from every parent. The slots that referenced it become empty.
    pub fn clear_parents(&mut self, id: NodeId) {
        let parents = std::mem::take(&mut self.nodes[id].parents);
        for parent in parents {
            let node = &mut self.nodes[parent];
            if node.left == Some(id) {
                node.left = None;
            } else if node.right == Some(id) {
                node.right = None;
            }
        }
    }

    /// Number of columns this node outputs.
    pub fn output_column_count(&self, id: NodeId) -> usize {
        let node = &self.nodes[id];
        let child_count = |child: Option<NodeId>| child.map_or(0, |c| self.output_column_count(c));
        match &node.kind {
            NodeKind::StoredTable { statistics, .. } | NodeKind::Mock { statistics, .. } => {
                statistics.column_count()
            }
            NodeKind::Join { .. } => child_count(node.left) + child_count(node.right),
            NodeKind::Projection { column_ids } => column_ids.len(),
            NodeKind::Root | NodeKind::Predicate { .. } | NodeKind::Limit { .. } => {
                child_count(node.left)
            }
        }
    }

    /// Estimated statistics of this node's output.
    ///
    /// Statistics are derived bottom-up on every call. A missing input is treated
    /// as an empty relation.
    pub fn statistics(&self, id: NodeId) -> Arc<Statistics> {
        let node = &self.nodes[id];
        let child_stats = |child: Option<NodeId>| {
            child
                .map(|c| self.statistics(c))
                .unwrap_or_else(|| Arc::new(Statistics::new(0.0)))
        };

        match &node.kind {
            NodeKind::StoredTable { statistics, .. } | NodeKind::Mock { statistics, .. } => {
                Arc::clone(statistics)
            }
            NodeKind::Root => child_stats(node.left),
            NodeKind::Join { mode, condition } => {
                let left = child_stats(node.left);
                let right = child_stats(node.right);
                Arc::new(left.estimate_join(&right, *mode, condition.as_ref()))
            }
            NodeKind::Predicate {
                column_id,
                comparator,
                value,
            } => Arc::new(
                child_stats(node.left).estimate_predicate(*column_id, *comparator, value),
            ),
            NodeKind::Projection { column_ids } => Arc::new(child_stats(node.left).project(column_ids)),
            NodeKind::Limit { count } => Arc::new(child_stats(node.left).limit(*count)),
        }
    }

    /// One-line description of a node, without its children.
    pub fn description(&self, id: NodeId) -> String {
        match &self.nodes[id].kind {
            NodeKind::Root => "Root".to_string(),
            NodeKind::StoredTable { name, .. } => format!("StoredTable [{name}]"),
            NodeKind::Mock { name, .. } => format!("Mock [{name}]"),
            NodeKind::Join {
                mode,
                condition: Some(c),
            } => format!("Join {mode} [{c}]"),
            NodeKind::Join {
                mode,
                condition: None,
            } => format!("Join {mode}"),
            NodeKind::Predicate {
                column_id,
                comparator,
                value,
            } => format!("Predicate [#{column_id} {comparator} {value}]"),
            NodeKind::Projection { column_ids } => {
                let cols: Vec<String> = column_ids.iter().map(|c| format!("#{c}")).collect();
                format!("Projection [{}]", cols.join(", "))
            }
            NodeKind::Limit { count } => format!("Limit [{count}]"),
        }
    }

    /// Render the subtree rooted at `id` as an indented tree.
    pub fn display(&self, id: NodeId) -> String {
        let mut out = String::new();
        self.display_into(id, 0, &mut out);
        out
    }

    fn display_into(&self, id: NodeId, indent: usize, out: &mut String) {
        let _ = writeln!(out, "{}{}", "  ".repeat(indent), self.description(id));
        if let Some(left) = self.left_child(id) {
            self.display_into(left, indent + 1, out);
        }
        if let Some(right) = self.right_child(id) {
            self.display_into(right, indent + 1, out);
        }
    }
}
