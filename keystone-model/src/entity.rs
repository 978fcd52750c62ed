//! Entities: named record types with an expected cardinality.

use super::field::Field;

/// A named record type in the conceptual model.
///
/// Entities are built through [`crate::ModelBuilder`] and are immutable once
/// the model is frozen. The identifier ordinal is computed at build time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entity {
    /// The entity name, unique within the model.
    pub name: String,
    /// Expected number of rows. Always positive.
    pub count: u64,
    /// Ordered fields of this entity.
    pub fields: Vec<Field>,
    /// Ordinal of the identifier field within `fields`.
    pub identifier_ordinal: usize,
}

impl Entity {
    /// Returns the identifier field.
    #[must_use]
    pub fn identifier(&self) -> &Field {
        &self.fields[self.identifier_ordinal]
    }

    /// Looks up a field ordinal by name.
    #[must_use]
    pub fn field_ordinal(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Iterates over the ordinals of all scalar (non-foreign-key) fields.
    pub fn scalar_ordinals(&self) -> impl Iterator<Item = usize> + '_ {
        self.fields.iter().enumerate().filter(|(_, f)| f.is_scalar()).map(|(i, _)| i)
    }
}
