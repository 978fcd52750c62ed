//! Error types for enumeration and planning.

use thiserror::Error;

use keystone_model::ModelError;
use keystone_query::StatementError;

/// Errors describing an invalid index layout.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// Every index needs at least one hash field.
    #[error("index has no hash fields")]
    EmptyHashFields,

    /// Every index field's entity must lie on the index path.
    #[error("field {0} lies off the index path")]
    FieldOffPath(String),

    /// At least one hash field must live on the first path entity.
    #[error("no hash field lives on the first path entity")]
    HashNotOnFirstEntity,

    /// If extra fields exist, at least one must live on the last path entity.
    #[error("no extra field lives on the last path entity")]
    ExtraNotOnLastEntity,

    /// The first path entity's identifier must appear among the keys.
    #[error("identifier of the first path entity is missing from the index keys")]
    MissingIdentifier,
}

/// Errors raised while planning.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The planner exhausted its expansions without reaching a terminal
    /// state.
    #[error("no plan for query: {0}")]
    NoPlan(String),

    /// An index layout was invalid.
    #[error(transparent)]
    Index(#[from] IndexError),

    /// A derived support query was invalid.
    #[error(transparent)]
    Statement(#[from] StatementError),

    /// A model lookup failed.
    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Result type for planning operations.
pub type PlanResult<T> = Result<T, PlanError>;
