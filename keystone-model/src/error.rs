//! Error types for model construction and lookup.

use thiserror::Error;

/// Errors that can occur while building or querying a model.
#[derive(Debug, Clone, Error)]
pub enum ModelError {
    /// Lookup of an entity by name failed.
    #[error("entity not found: {0}")]
    EntityNotFound(String),

    /// Lookup of a field by name failed.
    #[error("field not found: {entity}.{field}")]
    FieldNotFound {
        /// The entity that was searched.
        entity: String,
        /// The field name that was not found.
        field: String,
    },

    /// The model definition itself is inconsistent.
    #[error("invalid model: {0}")]
    InvalidModel(String),

    /// A path references entities that are not connected by foreign keys.
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

/// Result type for model operations.
pub type ModelResult<T> = Result<T, ModelError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = ModelError::EntityNotFound("User".to_owned());
        assert!(err.to_string().contains("User"));

        let err = ModelError::FieldNotFound {
            entity: "User".to_owned(),
            field: "City".to_owned(),
        };
        assert_eq!(err.to_string(), "field not found: User.City");
    }
}
