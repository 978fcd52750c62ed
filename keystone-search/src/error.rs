//! Error types for schema selection.

use std::fmt;

use thiserror::Error;

/// Why no schema could be selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoSolutionKind {
    /// The storage budget excludes every covering index set.
    Budget,
    /// Some query has no plan over the candidate set.
    Coverage,
    /// The deadline expired before any feasible selection was found.
    Timeout,
}

impl fmt::Display for NoSolutionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Budget => f.write_str("storage budget too small"),
            Self::Coverage => f.write_str("a query cannot be covered"),
            Self::Timeout => f.write_str("deadline expired"),
        }
    }
}

/// Errors raised by schema selection.
#[derive(Debug, Error)]
pub enum SearchError {
    /// The selection program is infeasible or timed out.
    #[error("no solution: {0}")]
    NoSolution(NoSolutionKind),

    /// A candidate plan references an index missing from the candidate set.
    #[error("plan references unknown index {0}")]
    UnknownIndex(String),
}

/// Result type for selection operations.
pub type SearchResult<T> = Result<T, SearchError>;
