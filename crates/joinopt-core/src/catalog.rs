//! # Catalog Interface
//!
//! The catalog provides the optimizer with table-level statistics. Stored table
//! nodes look their statistics up once, when they are added to a plan arena, so
//! the join orderers never touch the catalog directly.
//!
//! The `Catalog` trait is behind a trait object (`dyn Catalog`) so that different
//! backends can provide metadata. For testing and for the HTTP service, the
//! `InMemoryCatalog` provides a simple HashMap-based implementation that can be
//! populated programmatically.

use crate::stats::Statistics;
use std::collections::HashMap;

/// Catalog provides statistics for named tables.
pub trait Catalog: Send + Sync {
    fn get_table_stats(&self, table: &str) -> Option<Statistics>;
}

/// In-memory catalog for testing and development.
///
/// Tables are keyed by their fully-qualified name (e.g. `tpch.orders`).
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    pub table_stats: HashMap<String, Statistics>,
}

impl InMemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_table(&mut self, table: impl Into<String>, stats: Statistics) {
        self.table_stats.insert(table.into(), stats);
    }
}

impl Catalog for InMemoryCatalog {
    fn get_table_stats(&self, table: &str) -> Option<Statistics> {
        self.table_stats.get(table).cloned()
    }
}
