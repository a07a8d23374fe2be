//! # Scalar and Predicate Types
//!
//! This module defines the small vocabulary the join orderer speaks in:
//!
//! ## Column Identifiers (`ColumnId`)
//! A column is addressed by its ordinal position in the output of a single plan
//! node. Ids are *local*: column 3 of a join is column 3 of the concatenation of
//! its left input's columns followed by its right input's columns.
//!
//! ## Comparisons
//! `Comparator` is the comparison operator of a predicate. A `ColumnComparison`
//! compares a column of the left input with a column of the right input and is
//! used both as a join condition and as a column-to-column filter.
//!
//! ## Join Modes
//! Only `Inner` and `Cross` joins are freely reorderable. Outer joins are opaque
//! to the orderer because moving them changes which rows are NULL-extended.

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::hash::{Hash, Hasher};

/// Ordinal position of a column in the output of one plan node.
pub type ColumnId = usize;

/// Scalar value for literal predicate operands (e.g., `WHERE x = 42`).
///
/// Uses `OrderedFloat` for `f64` so that literal predicates can be compared and
/// hashed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScalarValue {
    /// SQL NULL value.
    Null,
    /// Boolean true/false.
    Bool(bool),
    /// 64-bit signed integer.
    Int64(i64),
    /// 64-bit floating point, wrapped in OrderedFloat for Eq/Hash support.
    Float64(OrderedFloat<f64>),
    /// UTF-8 string.
    Utf8(String),
}

impl ScalarValue {
    /// Numeric view of the value, used for range interpolation against
    /// min/max column statistics.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int64(v) => Some(*v as f64),
            Self::Float64(v) => Some(v.0),
            _ => None,
        }
    }
}

impl PartialEq for ScalarValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Null, Self::Null) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int64(a), Self::Int64(b)) => a == b,
            (Self::Float64(a), Self::Float64(b)) => a == b,
            (Self::Utf8(a), Self::Utf8(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for ScalarValue {}

impl Hash for ScalarValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(self).hash(state);
        match self {
            Self::Null => {}
            Self::Bool(v) => v.hash(state),
            Self::Int64(v) => v.hash(state),
            Self::Float64(v) => v.hash(state),
            Self::Utf8(v) => v.hash(state),
        }
    }
}

impl fmt::Display for ScalarValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(f, "NULL"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Int64(v) => write!(f, "{v}"),
            Self::Float64(v) => write!(f, "{}", v.0),
            Self::Utf8(v) => write!(f, "'{v}'"),
        }
    }
}

/// Comparison operator of a predicate or join condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Comparator {
    /// `=`
    Equals,
    /// `<>`
    NotEquals,
    /// `<`
    LessThan,
    /// `<=`
    LessThanEquals,
    /// `>`
    GreaterThan,
    /// `>=`
    GreaterThanEquals,
}

impl Comparator {
    /// The comparator that holds when both operands are swapped:
    /// `a < b` is `b > a`.
    pub fn mirrored(self) -> Self {
        match self {
            Self::Equals => Self::Equals,
            Self::NotEquals => Self::NotEquals,
            Self::LessThan => Self::GreaterThan,
            Self::LessThanEquals => Self::GreaterThanEquals,
            Self::GreaterThan => Self::LessThan,
            Self::GreaterThanEquals => Self::LessThanEquals,
        }
    }

    /// Whether this is one of the four ordering comparators.
    pub fn is_range(self) -> bool {
        matches!(
            self,
            Self::LessThan | Self::LessThanEquals | Self::GreaterThan | Self::GreaterThanEquals
        )
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Self::Equals => "=",
            Self::NotEquals => "<>",
            Self::LessThan => "<",
            Self::LessThanEquals => "<=",
            Self::GreaterThan => ">",
            Self::GreaterThanEquals => ">=",
        }
    }
}

impl fmt::Display for Comparator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// SQL join modes.
///
/// Only Inner and Cross joins are commutative and associative; Left, Right and
/// full Outer joins have fixed input roles and are treated as opaque subtrees by
/// the join graph builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JoinMode {
    /// Inner join: only matching rows from both sides.
    Inner,
    /// Cross join: Cartesian product of both sides (no condition).
    Cross,
    /// Left outer join: all rows from left, matching from right (or NULLs).
    Left,
    /// Right outer join: all rows from right, matching from left (or NULLs).
    Right,
    /// Full outer join: all rows from both sides, NULLs where no match.
    Outer,
}

impl JoinMode {
    /// Whether joins of this mode may be freely reordered.
    pub fn is_reorderable(self) -> bool {
        matches!(self, Self::Inner | Self::Cross)
    }
}

impl fmt::Display for JoinMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Inner => "INNER",
            Self::Cross => "CROSS",
            Self::Left => "LEFT",
            Self::Right => "RIGHT",
            Self::Outer => "FULL",
        };
        f.write_str(s)
    }
}

/// `left <comparator> right` where `left` and `right` are column ids of two
/// different inputs (for joins) or of the same input (for filters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnComparison {
    pub left: ColumnId,
    pub comparator: Comparator,
    pub right: ColumnId,
}

impl ColumnComparison {
    pub fn new(left: ColumnId, comparator: Comparator, right: ColumnId) -> Self {
        Self {
            left,
            comparator,
            right,
        }
    }

    /// The same comparison with its operands swapped: `a < b` becomes `b > a`.
    pub fn mirrored(&self) -> Self {
        Self {
            left: self.right,
            comparator: self.comparator.mirrored(),
            right: self.left,
        }
    }
}

impl fmt::Display for ColumnComparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} #{}", self.left, self.comparator, self.right)
    }
}

/// Right-hand operand of a single-input predicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PredicateValue {
    /// Another column of the same input.
    Column(ColumnId),
    /// A constant.
    Literal(ScalarValue),
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Column(c) => write!(f, "#{c}"),
            Self::Literal(v) => write!(f, "{v}"),
        }
    }
}
