//! Paths: entity sequences linked by foreign keys.

use super::error::{ModelError, ModelResult};
use super::model::{EntityId, Model};

/// A non-empty ordered sequence of entities in which every adjacent pair is
/// connected by a foreign key (in either direction).
///
/// Paths are the backbone of every statement and every index: a statement
/// traverses its path from the target entity outward, and an index covers a
/// contiguous stretch of entities.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(Vec<EntityId>);

impl KeyPath {
    /// Validates adjacency and creates a path.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidPath`] if the sequence is empty or an
    /// adjacent pair is not connected by a foreign key.
    pub fn new(model: &Model, entities: Vec<EntityId>) -> ModelResult<Self> {
        if entities.is_empty() {
            return Err(ModelError::InvalidPath("path must not be empty".to_owned()));
        }
        for pair in entities.windows(2) {
            if !model.connected(pair[0], pair[1]) {
                return Err(ModelError::InvalidPath(format!(
                    "{} and {} are not connected by a foreign key",
                    model.entity(pair[0]).name,
                    model.entity(pair[1]).name
                )));
            }
        }
        Ok(Self(entities))
    }

    /// A single-entity path. Always valid.
    #[must_use]
    pub fn single(entity: EntityId) -> Self {
        Self(vec![entity])
    }

    /// The entities of the path, in order.
    #[must_use]
    pub fn entities(&self) -> &[EntityId] {
        &self.0
    }

    /// First entity of the path.
    #[must_use]
    pub fn first(&self) -> EntityId {
        self.0[0]
    }

    /// Last entity of the path.
    #[must_use]
    pub fn last(&self) -> EntityId {
        self.0[self.0.len() - 1]
    }

    /// Number of entities on the path.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Paths are non-empty; this always returns false.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Whether the path visits the given entity.
    #[must_use]
    pub fn contains(&self, entity: EntityId) -> bool {
        self.0.contains(&entity)
    }

    /// Position of an entity on the path.
    #[must_use]
    pub fn position(&self, entity: EntityId) -> Option<usize> {
        self.0.iter().position(|&e| e == entity)
    }

    /// The same path traversed in the opposite direction.
    ///
    /// Adjacency is symmetric, so the result needs no revalidation.
    #[must_use]
    pub fn reversed(&self) -> Self {
        let mut entities = self.0.clone();
        entities.reverse();
        Self(entities)
    }

    /// The contiguous subpath of `len` entities starting at `start`.
    ///
    /// Returns `None` when the slice would run off the path or be empty.
    #[must_use]
    pub fn segment(&self, start: usize, len: usize) -> Option<Self> {
        if len == 0 || start + len > self.0.len() {
            return None;
        }
        Some(Self(self.0[start..start + len].to_vec()))
    }

    /// Enumerates every contiguous subpath, shortest first.
    #[must_use]
    pub fn subpaths(&self) -> Vec<Self> {
        let mut out = Vec::new();
        for len in 1..=self.0.len() {
            for start in 0..=(self.0.len() - len) {
                out.push(Self(self.0[start..start + len].to_vec()));
            }
        }
        out
    }

    /// Whether `other` matches this path starting at offset `at`.
    #[must_use]
    pub fn matches_at(&self, other: &Self, at: usize) -> bool {
        let slice = &self.0[at.min(self.0.len())..];
        slice.len() >= other.0.len() && slice[..other.0.len()] == other.0[..]
    }

    /// Concatenates two paths that share a boundary entity.
    ///
    /// The first entity of `tail` must equal the last entity of `self`; the
    /// shared entity appears once in the result.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidPath`] if the boundary entities differ.
    pub fn splice(&self, model: &Model, tail: &Self) -> ModelResult<Self> {
        if self.last() != tail.first() {
            return Err(ModelError::InvalidPath(format!(
                "cannot splice: {} does not continue from {}",
                model.entity(tail.first()).name,
                model.entity(self.last()).name
            )));
        }
        let mut entities = self.0.clone();
        entities.extend_from_slice(&tail.0[1..]);
        Ok(Self(entities))
    }
}
