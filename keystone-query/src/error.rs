//! Error types for statement parsing and validation.

use thiserror::Error;

use keystone_model::ModelError;

/// Errors raised while tokenizing or parsing statement text.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    /// A character that no token starts with.
    #[error("parse error at byte {pos}: unexpected character {found:?}")]
    UnexpectedChar {
        /// Byte offset into the statement text.
        pos: usize,
        /// The offending character.
        found: char,
    },

    /// A token that does not fit the grammar at this position.
    #[error("parse error at byte {pos}: expected {expected}, found {found}")]
    UnexpectedToken {
        /// Byte offset into the statement text.
        pos: usize,
        /// What the grammar expected.
        expected: String,
        /// What was actually found.
        found: String,
    },

    /// The statement ended before the grammar was satisfied.
    #[error("unexpected end of statement, expected {expected}")]
    UnexpectedEnd {
        /// What the grammar expected.
        expected: String,
    },

    /// A numeric literal that does not fit its type.
    #[error("parse error at byte {pos}: invalid number: {reason}")]
    InvalidNumber {
        /// Byte offset into the statement text.
        pos: usize,
        /// Why the number is invalid.
        reason: String,
    },

    /// An unterminated string literal.
    #[error("parse error at byte {pos}: unterminated string literal")]
    UnterminatedString {
        /// Byte offset of the opening quote.
        pos: usize,
    },
}

/// Errors raised while binding and validating a parsed statement against the
/// model.
#[derive(Debug, Clone, Error)]
pub enum StatementError {
    /// Every query needs at least one equality predicate to key a lookup.
    #[error("statement has no equality predicate")]
    NoEqualityPredicate,

    /// At most one range predicate is supported.
    #[error("statement has more than one range predicate")]
    MultipleRangePredicates,

    /// Predicates may not reference foreign-key fields.
    #[error("predicate on foreign key {0}")]
    PredicateOnForeignKey(String),

    /// A referenced field's entity does not lie on the statement path.
    #[error("field {0} does not lie on the statement path")]
    FieldOffPath(String),

    /// An UPDATE/DELETE FROM clause must start at the target entity.
    #[error("FROM clause must start at {expected}, found {found}")]
    FromMismatch {
        /// The statement's target entity.
        expected: String,
        /// The first entity of the FROM path.
        found: String,
    },

    /// A SET field must belong to the target entity.
    #[error("setting field {0} does not belong to the target entity")]
    SettingOffTarget(String),

    /// UPDATE and INSERT need at least one setting.
    #[error("statement has no settings")]
    NoSettings,

    /// Statement weights must be positive.
    #[error("statement weight must be positive, got {0}")]
    NonPositiveWeight(f64),

    /// An entity or field lookup failed.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Any error a statement can produce on its way into a workload.
#[derive(Debug, Clone, Error)]
pub enum QueryError {
    /// The statement text did not parse.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The statement parsed but is invalid against the model.
    #[error(transparent)]
    Statement(#[from] StatementError),
}

impl From<ModelError> for QueryError {
    fn from(err: ModelError) -> Self {
        Self::Statement(StatementError::Model(err))
    }
}

/// Result type for statement operations.
pub type QueryResult<T> = Result<T, QueryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display() {
        let err = ParseError::UnexpectedToken {
            pos: 7,
            expected: "FROM".to_owned(),
            found: "WHERE".to_owned(),
        };
        assert!(err.to_string().contains("byte 7"));
        assert!(err.to_string().contains("expected FROM"));
    }

    #[test]
    fn statement_error_display() {
        let err = StatementError::NoEqualityPredicate;
        assert!(err.to_string().contains("equality"));
    }
}
