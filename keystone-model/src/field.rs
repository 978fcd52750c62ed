//! Field types for model entities.

use serde::{Deserialize, Serialize};

use super::model::EntityId;

/// Cardinality of a foreign-key relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Cardinality {
    /// Each source row references exactly one target row.
    One,
    /// Each source row may reference many target rows.
    Many,
}

/// The scalar kinds a non-key field may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ScalarKind {
    /// 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Fixed-length string.
    String {
        /// Maximum length in bytes.
        length: u64,
    },
    /// Calendar date.
    Date,
}

impl ScalarKind {
    /// Default storage size in bytes for this kind.
    #[must_use]
    pub const fn default_size(self) -> u64 {
        match self {
            Self::Integer | Self::Float | Self::Date => 8,
            Self::String { length } => length,
        }
    }
}

/// What a field is: the entity identifier, a plain scalar, or a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldKind {
    /// The unique identifier of its entity. Exactly one per entity.
    Identifier,
    /// A scalar attribute.
    Scalar(ScalarKind),
    /// A reference to another entity.
    ForeignKey {
        /// The referenced entity.
        target: EntityId,
        /// How many target rows each source row references.
        cardinality: Cardinality,
    },
}

/// A typed attribute of an entity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// The field name, unique within its entity.
    pub name: String,
    /// What the field is.
    pub kind: FieldKind,
    /// Storage size in bytes, used by index sizing and the cost models.
    pub size: u64,
}

impl Field {
    /// Creates an identifier field.
    #[must_use]
    pub fn identifier(name: impl Into<String>) -> Self {
        Self { name: name.into(), kind: FieldKind::Identifier, size: 8 }
    }

    /// Creates a scalar field with the kind's default size.
    #[must_use]
    pub fn scalar(name: impl Into<String>, kind: ScalarKind) -> Self {
        Self { name: name.into(), kind: FieldKind::Scalar(kind), size: kind.default_size() }
    }

    /// Creates a foreign-key field.
    #[must_use]
    pub fn foreign_key(
        name: impl Into<String>,
        target: EntityId,
        cardinality: Cardinality,
    ) -> Self {
        Self { name: name.into(), kind: FieldKind::ForeignKey { target, cardinality }, size: 8 }
    }

    /// Whether this field is its entity's identifier.
    #[must_use]
    pub const fn is_identifier(&self) -> bool {
        matches!(self.kind, FieldKind::Identifier)
    }

    /// Whether this field is a foreign key.
    #[must_use]
    pub const fn is_foreign_key(&self) -> bool {
        matches!(self.kind, FieldKind::ForeignKey { .. })
    }

    /// Whether this field holds data rather than a relationship.
    ///
    /// Identifiers count as scalar here: they are stored inline like any
    /// other column.
    #[must_use]
    pub const fn is_scalar(&self) -> bool {
        !self.is_foreign_key()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_sizes() {
        assert_eq!(ScalarKind::Integer.default_size(), 8);
        assert_eq!(ScalarKind::String { length: 20 }.default_size(), 20);
    }

    #[test]
    fn field_predicates() {
        let id = Field::identifier("UserId");
        assert!(id.is_identifier());
        assert!(id.is_scalar());
        assert!(!id.is_foreign_key());

        let fk = Field::foreign_key("User", EntityId::new(0), Cardinality::One);
        assert!(fk.is_foreign_key());
        assert!(!fk.is_scalar());
    }
}
