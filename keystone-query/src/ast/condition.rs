//! Predicates over path fields.

use std::fmt;
use std::hash::{Hash, Hasher};

use keystone_model::FieldId;

use super::literal::Literal;

/// A comparison operator in a WHERE clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    NotEq,
    /// `<`
    Lt,
    /// `<=`
    LtEq,
    /// `>`
    Gt,
    /// `>=`
    GtEq,
}

impl Operator {
    /// Whether this operator keys a hash lookup.
    #[must_use]
    pub const fn is_equality(self) -> bool {
        matches!(self, Self::Eq)
    }

    /// Whether this operator describes a range over ordered keys.
    ///
    /// `!=` is neither equality nor range: it can only be applied as an
    /// in-memory filter.
    #[must_use]
    pub const fn is_range(self) -> bool {
        matches!(self, Self::Lt | Self::LtEq | Self::Gt | Self::GtEq)
    }

    /// The operator's source text.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::NotEq => "!=",
            Self::Lt => "<",
            Self::LtEq => "<=",
            Self::Gt => ">",
            Self::GtEq => ">=",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A predicate `<field> <op> <value>`.
///
/// Literal values are bound at execution time, so condition identity is the
/// pair (field, operator); two conditions with different literals compare
/// equal.
#[derive(Debug, Clone)]
pub struct Condition {
    /// The predicated field.
    pub field: FieldId,
    /// The comparison operator.
    pub op: Operator,
    /// The bound literal, or `None` for a `?` placeholder.
    pub value: Option<Literal>,
}

impl Condition {
    /// Creates a condition.
    #[must_use]
    pub const fn new(field: FieldId, op: Operator, value: Option<Literal>) -> Self {
        Self { field, op, value }
    }

    /// Whether this condition can key a hash lookup.
    #[must_use]
    pub const fn is_equality(&self) -> bool {
        self.op.is_equality()
    }

    /// Whether this condition is a range predicate.
    #[must_use]
    pub const fn is_range(&self) -> bool {
        self.op.is_range()
    }
}

impl PartialEq for Condition {
    fn eq(&self, other: &Self) -> bool {
        self.field == other.field && self.op == other.op
    }
}

impl Eq for Condition {}

impl Hash for Condition {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.field.hash(state);
        self.op.hash(state);
    }
}
