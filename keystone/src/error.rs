//! Error types for the advisor facade.

use thiserror::Error;

use keystone_model::ModelError;
use keystone_plan::PlanError;
use keystone_query::QueryError;
use keystone_search::SearchError;

/// Errors that can occur while advising on a workload.
#[derive(Debug, Error)]
pub enum Error {
    /// A model construction or lookup error.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// A statement failed to parse or validate.
    #[error(transparent)]
    Query(#[from] QueryError),

    /// Enumeration or planning failed.
    #[error(transparent)]
    Plan(#[from] PlanError),

    /// Schema selection failed.
    #[error(transparent)]
    Search(#[from] SearchError),

    /// The workload recorded invalid statements.
    #[error("invalid workload: {0}")]
    InvalidWorkload(String),

    /// A workload file could not be parsed.
    #[error("workload file error at line {line}: {reason}")]
    Loader {
        /// One-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },
}

impl Error {
    /// The process exit code this error maps to: 2 for parse failures, 3
    /// when no solution exists, 4 for invalid models or workloads.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Query(QueryError::Parse(_)) | Self::Loader { .. } => 2,
            Self::Search(SearchError::NoSolution(_)) | Self::Plan(PlanError::NoPlan(_)) => 3,
            Self::Model(_)
            | Self::Query(QueryError::Statement(_))
            | Self::Plan(_)
            | Self::Search(_)
            | Self::InvalidWorkload(_) => 4,
        }
    }
}

/// Result type for advisor operations.
pub type Result<T> = std::result::Result<T, Error>;
