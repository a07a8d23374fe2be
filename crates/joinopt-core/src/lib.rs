//! # joinopt-core: Join Ordering Core
//!
//! This crate implements the join-ordering core of a relational query optimizer:
//! it extracts the clusters of reorderable joins from a logical plan as join
//! graphs and rebuilds them as join trees with a low estimated intermediate
//! cardinality.
//!
//! ## Module Overview
//!
//! - **`plan`**: The arena holding logical plan nodes with explicit parent links.
//! - **`expr`**: Scalar values, comparators, join modes and column comparisons.
//! - **`stats`**: Statistics structures and the cardinality estimation formulas.
//! - **`catalog`**: Catalog trait for accessing table statistics.
//! - **`join_graph`**: Vertices and edges of a join cluster.
//! - **`builder`**: Extraction of join graphs from a plan.
//! - **`dpsize`**: Exhaustive DPsize join enumeration for small graphs.
//! - **`greedy`**: Greedy left-deep join ordering for large graphs.
//! - **`ordering`**: Strategy selection between the two orderers.
//! - **`rule`**: The Rule trait and RuleRegistry for plan rewrites.
//! - **`optimizer`**: Applies the registered rules to a plan until it stops changing.
//! - **`error`**: The error type shared by all of the above.

pub mod builder;
pub mod catalog;
pub mod dpsize;
pub mod error;
pub mod expr;
pub mod greedy;
pub mod join_graph;
pub mod optimizer;
pub mod ordering;
pub mod plan;
pub mod rule;
pub mod stats;
