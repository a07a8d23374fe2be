//! # Statistics for Join Ordering
//!
//! This module is the cardinality oracle consulted by the join orderers. The
//! orderers never compute selectivities themselves: they ask a `Statistics`
//! handle for the estimated result of joining it with another one, and compare
//! the resulting row counts.
//!
//! ## Statistics Hierarchy
//!
//! - **Relation-level**: row count.
//! - **Column-level**: number of distinct values (NDV), null fraction and an
//!   optional numeric min/max range. Column statistics are stored positionally,
//!   so `column_stats[i]` describes column id `i` of the relation.
//!
//! ## Derivation Formulas
//!
//! - **Join**: output_rows = |left| * |right| * selectivity, floored at 1. Outer
//!   joins never produce fewer rows than their preserved side(s).
//! - **Filter**: output_rows = input_rows * selectivity, floored at 1. Column
//!   NDVs are scaled proportionally to the row reduction.
//!
//! ## Selectivity Estimation
//!
//! - **Equality**: 1 / max(NDV) between two columns, 1 / NDV against a literal.
//! - **Inequality**: the complement of equality.
//! - **Range**: interpolated over the column's min/max when a numeric literal and
//!   a range are known, otherwise a fixed 1/3 heuristic.
//! - **Default**: 0.1 (10%) when the column has no statistics at all.

use crate::expr::{ColumnComparison, ColumnId, Comparator, JoinMode, PredicateValue, ScalarValue};
use serde::{Deserialize, Serialize};

/// Default filter selectivity when we can't determine it.
pub const DEFAULT_FILTER_SELECTIVITY: f64 = 0.1;

/// Selectivity of a range comparison when no min/max information is usable.
pub const DEFAULT_RANGE_SELECTIVITY: f64 = 1.0 / 3.0;

/// Statistics for a relation (a base table or any intermediate plan node).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub row_count: f64,
    pub column_stats: Vec<ColumnStatistics>,
}

/// Per-column statistics used for selectivity estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    /// Number of distinct values (NDV). Used for equality selectivity: sel = 1/NDV.
    pub distinct_count: f64,
    /// Fraction of rows that are NULL [0.0, 1.0].
    pub null_fraction: f64,
    /// Minimum numeric value in the column (if known).
    pub min_value: Option<f64>,
    /// Maximum numeric value in the column (if known).
    pub max_value: Option<f64>,
}

impl ColumnStatistics {
    pub fn new(distinct_count: f64, null_fraction: f64) -> Self {
        Self {
            distinct_count,
            null_fraction,
            min_value: None,
            max_value: None,
        }
    }

    pub fn with_range(mut self, min: f64, max: f64) -> Self {
        self.min_value = Some(min);
        self.max_value = Some(max);
        self
    }

    /// Fraction of the column's value range selected by `column <comparator> value`,
    /// or `None` if the range or the value is not numeric.
    fn range_fraction(&self, comparator: Comparator, value: f64) -> Option<f64> {
        let (min, max) = (self.min_value?, self.max_value?);
        if max <= min {
            return None;
        }
        let below = ((value - min) / (max - min)).clamp(0.0, 1.0);
        match comparator {
            Comparator::LessThan | Comparator::LessThanEquals => Some(below),
            Comparator::GreaterThan | Comparator::GreaterThanEquals => Some(1.0 - below),
            _ => None,
        }
    }
}

impl Statistics {
    pub fn new(row_count: f64) -> Self {
        Self {
            row_count,
            column_stats: Vec::new(),
        }
    }

    /// Append statistics for the next column id.
    pub fn with_column(mut self, stats: ColumnStatistics) -> Self {
        self.column_stats.push(stats);
        self
    }

    pub fn column_count(&self) -> usize {
        self.column_stats.len()
    }

    pub fn column(&self, column_id: ColumnId) -> Option<&ColumnStatistics> {
        self.column_stats.get(column_id)
    }

    /// NDV of a column. Without column statistics we conservatively assume all
    /// values are distinct.
    fn distinct_count(&self, column_id: ColumnId) -> f64 {
        self.column(column_id)
            .map(|c| c.distinct_count)
            .unwrap_or(self.row_count)
            .max(1.0)
    }

    /// Estimate the statistics of `self JOIN right`.
    ///
    /// `condition.left` addresses a column of `self`, `condition.right` a column of
    /// `right`. Cross joins (and joins without a condition) produce the Cartesian
    /// product. The output has the columns of `self` followed by those of `right`.
    pub fn estimate_join(
        &self,
        right: &Statistics,
        mode: JoinMode,
        condition: Option<&ColumnComparison>,
    ) -> Statistics {
        let cross_product = self.row_count * right.row_count;

        let condition = match mode {
            JoinMode::Cross => None,
            _ => condition,
        };
        let selectivity = condition
            .map(|c| {
                comparison_selectivity(
                    self.distinct_count(c.left),
                    right.distinct_count(c.right),
                    c.comparator,
                )
            })
            .unwrap_or(1.0);

        let mut row_count = cross_product * selectivity;
        match mode {
            JoinMode::Left => row_count = row_count.max(self.row_count),
            JoinMode::Right => row_count = row_count.max(right.row_count),
            JoinMode::Outer => row_count = row_count.max(self.row_count).max(right.row_count),
            JoinMode::Inner | JoinMode::Cross => {}
        }
        let row_count = row_count.max(1.0);

        // Propagate column-level statistics from both sides. NDV is capped by the
        // output row count.
        let mut column_stats: Vec<ColumnStatistics> = self
            .column_stats
            .iter()
            .chain(right.column_stats.iter())
            .cloned()
            .collect();

        if let Some(c) = condition {
            if c.comparator == Comparator::Equals {
                let joined_ndv = self.distinct_count(c.left).min(right.distinct_count(c.right));
                let right_idx = self.column_count() + c.right;
                for idx in [c.left, right_idx] {
                    if let Some(cs) = column_stats.get_mut(idx) {
                        cs.distinct_count = joined_ndv;
                    }
                }
            }
        }
        for cs in &mut column_stats {
            cs.distinct_count = cs.distinct_count.min(row_count);
        }

        Statistics {
            row_count,
            column_stats,
        }
    }

    /// Estimate the statistics after filtering on `column <comparator> value`.
    pub fn estimate_predicate(
        &self,
        column_id: ColumnId,
        comparator: Comparator,
        value: &PredicateValue,
    ) -> Statistics {
        let selectivity = match value {
            PredicateValue::Column(other) => comparison_selectivity(
                self.distinct_count(column_id),
                self.distinct_count(*other),
                comparator,
            ),
            PredicateValue::Literal(literal) => {
                self.literal_selectivity(column_id, comparator, literal)
            }
        };

        let mut stats = self.scaled(selectivity);
        if let (Comparator::Equals, PredicateValue::Literal(_)) = (comparator, value) {
            if let Some(cs) = stats.column_stats.get_mut(column_id) {
                cs.distinct_count = 1.0;
            }
        }
        stats
    }

    fn literal_selectivity(
        &self,
        column_id: ColumnId,
        comparator: Comparator,
        literal: &ScalarValue,
    ) -> f64 {
        let Some(column) = self.column(column_id) else {
            return DEFAULT_FILTER_SELECTIVITY;
        };
        let ndv = column.distinct_count.max(1.0);
        match comparator {
            Comparator::Equals => 1.0 / ndv,
            Comparator::NotEquals => 1.0 - 1.0 / ndv,
            _ => literal
                .as_f64()
                .and_then(|v| column.range_fraction(comparator, v))
                .unwrap_or(DEFAULT_RANGE_SELECTIVITY),
        }
    }

    /// Apply a selectivity: rows are floored at 1 and column NDVs are scaled by
    /// the row reduction ratio, clamped to [1, row_count].
    fn scaled(&self, selectivity: f64) -> Statistics {
        let row_count = (self.row_count * selectivity).max(1.0);
        let ratio = if self.row_count > 0.0 {
            row_count / self.row_count
        } else {
            1.0
        };

        let column_stats = self
            .column_stats
            .iter()
            .map(|cs| {
                let mut cs = cs.clone();
                cs.distinct_count = (cs.distinct_count * ratio).max(1.0).min(row_count);
                cs
            })
            .collect();

        Statistics {
            row_count,
            column_stats,
        }
    }

    /// Statistics of a projection onto `column_ids` (in output order).
    pub fn project(&self, column_ids: &[ColumnId]) -> Statistics {
        let column_stats = column_ids
            .iter()
            .map(|&id| {
                self.column(id)
                    .cloned()
                    .unwrap_or_else(|| ColumnStatistics::new(self.row_count, 0.0))
            })
            .collect();
        Statistics {
            row_count: self.row_count,
            column_stats,
        }
    }

    /// Statistics after keeping at most `count` rows.
    pub fn limit(&self, count: u64) -> Statistics {
        let row_count = self.row_count.min(count as f64);
        let column_stats = self
            .column_stats
            .iter()
            .map(|cs| {
                let mut cs = cs.clone();
                cs.distinct_count = cs.distinct_count.min(row_count);
                cs
            })
            .collect();
        Statistics {
            row_count,
            column_stats,
        }
    }
}

/// Selectivity of `a <comparator> b` for two columns with the given NDVs.
///
/// Uses max(NDV) as the denominator for equality. This is the standard
/// "containment" assumption: the smaller domain is fully contained in the larger
/// one.
pub fn comparison_selectivity(left_ndv: f64, right_ndv: f64, comparator: Comparator) -> f64 {
    let max_ndv = left_ndv.max(right_ndv).max(1.0);
    match comparator {
        Comparator::Equals => 1.0 / max_ndv,
        Comparator::NotEquals => 1.0 - 1.0 / max_ndv,
        _ => DEFAULT_RANGE_SELECTIVITY,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(rows: f64, ndvs: &[f64]) -> Statistics {
        ndvs.iter().fold(Statistics::new(rows), |s, &ndv| {
            s.with_column(ColumnStatistics::new(ndv, 0.0))
        })
    }

    #[test]
    fn test_equi_join_cardinality() {
        let orders = table(1000.0, &[1000.0, 100.0]);
        let customer = table(100.0, &[100.0]);
        let cond = ColumnComparison::new(1, Comparator::Equals, 0);

        let joined = orders.estimate_join(&customer, JoinMode::Inner, Some(&cond));
        assert_eq!(joined.row_count, 1000.0);
        assert_eq!(joined.column_count(), 3);
        assert_eq!(joined.column_stats[1].distinct_count, 100.0);
        assert_eq!(joined.column_stats[2].distinct_count, 100.0);
    }

    #[test]
    fn test_cross_join_ignores_condition() {
        let a = table(10.0, &[10.0]);
        let b = table(20.0, &[20.0]);
        let cond = ColumnComparison::new(0, Comparator::Equals, 0);

        assert_eq!(a.estimate_join(&b, JoinMode::Cross, None).row_count, 200.0);
        assert_eq!(a.estimate_join(&b, JoinMode::Cross, Some(&cond)).row_count, 200.0);
        assert_eq!(a.estimate_join(&b, JoinMode::Inner, None).row_count, 200.0);
    }

    #[test]
    fn test_outer_join_preserves_side() {
        let a = table(500.0, &[500.0]);
        let b = table(2.0, &[2.0]);
        let cond = ColumnComparison::new(0, Comparator::Equals, 0);

        // Inner estimate is 500 * 2 / 500 = 2; a left join keeps every left row.
        assert_eq!(a.estimate_join(&b, JoinMode::Inner, Some(&cond)).row_count, 2.0);
        assert_eq!(a.estimate_join(&b, JoinMode::Left, Some(&cond)).row_count, 500.0);
        assert_eq!(b.estimate_join(&a, JoinMode::Right, Some(&cond.mirrored())).row_count, 500.0);
    }

    #[test]
    fn test_range_join_selectivity() {
        let a = table(30.0, &[30.0]);
        let b = table(30.0, &[30.0]);
        let cond = ColumnComparison::new(0, Comparator::LessThan, 0);
        let joined = a.estimate_join(&b, JoinMode::Inner, Some(&cond));
        assert!((joined.row_count - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_literal_predicates() {
        let stats = Statistics::new(1000.0)
            .with_column(ColumnStatistics::new(50.0, 0.0).with_range(0.0, 100.0));

        let eq = stats.estimate_predicate(0, Comparator::Equals, &PredicateValue::Literal(ScalarValue::Int64(3)));
        assert_eq!(eq.row_count, 20.0);
        assert_eq!(eq.column_stats[0].distinct_count, 1.0);

        let lt = stats.estimate_predicate(
            0,
            Comparator::LessThan,
            &PredicateValue::Literal(ScalarValue::Int64(25)),
        );
        assert!((lt.row_count - 250.0).abs() < 1e-9);

        let gt = stats.estimate_predicate(
            0,
            Comparator::GreaterThan,
            &PredicateValue::Literal(ScalarValue::Utf8("x".into())),
        );
        assert!((gt.row_count - 1000.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_predicate_on_unknown_column_uses_default() {
        let stats = Statistics::new(1000.0);
        let filtered = stats.estimate_predicate(
            4,
            Comparator::Equals,
            &PredicateValue::Literal(ScalarValue::Int64(1)),
        );
        assert!((filtered.row_count - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_project_and_limit() {
        let stats = table(100.0, &[10.0, 100.0, 5.0]);
        let projected = stats.project(&[2, 0]);
        assert_eq!(projected.column_count(), 2);
        assert_eq!(projected.column_stats[0].distinct_count, 5.0);

        let limited = stats.limit(20);
        assert_eq!(limited.row_count, 20.0);
        assert_eq!(limited.column_stats[1].distinct_count, 20.0);
    }
}
