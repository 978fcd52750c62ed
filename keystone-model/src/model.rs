//! The frozen model arena and its integer handles.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::entity::Entity;
use super::error::{ModelError, ModelResult};
use super::field::{Cardinality, Field, FieldKind};

/// Handle to an entity within a [`Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(u32);

impl EntityId {
    /// Creates a handle from a raw index.
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    /// Returns the raw arena index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }
}

/// Handle to a field: an entity handle plus the field's ordinal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FieldId {
    /// The entity the field belongs to.
    pub entity: EntityId,
    /// Position of the field within the entity's field list.
    pub ordinal: u32,
}

impl FieldId {
    /// Creates a handle from an entity handle and a field ordinal.
    #[must_use]
    pub const fn new(entity: EntityId, ordinal: u32) -> Self {
        Self { entity, ordinal }
    }
}

/// A foreign-key connection between two entities.
///
/// Connections are directional: `from` holds the foreign-key field and
/// `to` is the referenced entity. Path traversal may follow a connection
/// in either direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connection {
    /// The foreign-key field.
    pub field: FieldId,
    /// The entity holding the foreign key.
    pub from: EntityId,
    /// The referenced entity.
    pub to: EntityId,
    /// Declared cardinality of the relationship.
    pub cardinality: Cardinality,
}

/// A frozen conceptual model: an arena of entities plus the foreign-key
/// graph between them.
///
/// Models are produced by [`crate::ModelBuilder`] and never mutated
/// afterwards; all derived structures (name lookups, adjacency) are computed
/// eagerly at build time.
#[derive(Debug, Clone)]
pub struct Model {
    pub(crate) entities: Vec<Entity>,
    pub(crate) by_name: HashMap<String, EntityId>,
    pub(crate) connections: Vec<Connection>,
    pub(crate) neighbors: Vec<Vec<EntityId>>,
}

impl Model {
    /// Returns the entity behind a handle.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> &Entity {
        &self.entities[id.index()]
    }

    /// Returns the field behind a handle.
    #[must_use]
    pub fn field(&self, id: FieldId) -> &Field {
        &self.entities[id.entity.index()].fields[id.ordinal as usize]
    }

    /// Number of entities in the model.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Whether the model has no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Iterates over all entities with their handles.
    pub fn entities(&self) -> impl Iterator<Item = (EntityId, &Entity)> {
        self.entities.iter().enumerate().map(|(i, e)| (EntityId::new(i as u32), e))
    }

    /// Looks up an entity handle by name.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::EntityNotFound`] if no entity has that name.
    pub fn lookup_entity(&self, name: &str) -> ModelResult<EntityId> {
        self.by_name
            .get(name)
            .copied()
            .ok_or_else(|| ModelError::EntityNotFound(name.to_owned()))
    }

    /// Looks up a field handle by entity handle and field name.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::FieldNotFound`] if the entity has no such field.
    pub fn lookup_field(&self, entity: EntityId, name: &str) -> ModelResult<FieldId> {
        let ent = self.entity(entity);
        ent.field_ordinal(name)
            .map(|ord| FieldId::new(entity, ord as u32))
            .ok_or_else(|| ModelError::FieldNotFound {
                entity: ent.name.clone(),
                field: name.to_owned(),
            })
    }

    /// Returns the identifier field handle of an entity.
    #[must_use]
    pub fn identifier(&self, entity: EntityId) -> FieldId {
        FieldId::new(entity, self.entity(entity).identifier_ordinal as u32)
    }

    /// Entities adjacent to `entity` in the foreign-key graph.
    #[must_use]
    pub fn neighbors(&self, entity: EntityId) -> &[EntityId] {
        &self.neighbors[entity.index()]
    }

    /// Whether two entities are connected by a foreign key in either
    /// direction.
    #[must_use]
    pub fn connected(&self, a: EntityId, b: EntityId) -> bool {
        self.neighbors(a).contains(&b)
    }

    /// The foreign-key connection between two entities, if any.
    ///
    /// Prefers the connection whose foreign key lives on `a`.
    #[must_use]
    pub fn connection_between(&self, a: EntityId, b: EntityId) -> Option<Connection> {
        self.connections
            .iter()
            .find(|c| c.from == a && c.to == b)
            .or_else(|| self.connections.iter().find(|c| c.from == b && c.to == a))
            .copied()
    }

    /// Average number of `to` rows reached per `from` row when traversing
    /// from `from` to `to` across their connection.
    ///
    /// Following a foreign key forward reaches a single row; following it
    /// backward fans out by the count ratio of the two entities.
    #[must_use]
    pub fn fanout(&self, from: EntityId, to: EntityId) -> f64 {
        match self.connection_between(from, to) {
            Some(c) if c.from == from => 1.0,
            Some(_) => {
                let to_count = self.entity(to).count as f64;
                let from_count = self.entity(from).count.max(1) as f64;
                to_count / from_count
            }
            None => 1.0,
        }
    }

    /// Renders a field handle as `Entity.Field`.
    #[must_use]
    pub fn field_name(&self, id: FieldId) -> String {
        format!("{}.{}", self.entity(id.entity).name, self.field(id).name)
    }

    pub(crate) fn validate(&self) -> ModelResult<()> {
        for entity in &self.entities {
            if entity.count == 0 {
                return Err(ModelError::InvalidModel(format!(
                    "entity {} has zero expected count",
                    entity.name
                )));
            }
            let identifiers =
                entity.fields.iter().filter(|f| f.is_identifier()).count();
            if identifiers != 1 {
                return Err(ModelError::InvalidModel(format!(
                    "entity {} has {identifiers} identifier fields, expected exactly 1",
                    entity.name
                )));
            }
            let mut seen = HashMap::new();
            for field in &entity.fields {
                if seen.insert(field.name.as_str(), ()).is_some() {
                    return Err(ModelError::InvalidModel(format!(
                        "entity {} declares field {} twice",
                        entity.name, field.name
                    )));
                }
                if let FieldKind::ForeignKey { target, .. } = field.kind {
                    if target.index() >= self.entities.len() {
                        return Err(ModelError::InvalidModel(format!(
                            "foreign key {}.{} targets an unknown entity",
                            entity.name, field.name
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::{Cardinality, EntityDef, ModelBuilder};

    fn two_entity_model() -> crate::Model {
        ModelBuilder::new()
            .entity(EntityDef::new("User", 100).id("UserId").string("City", 20))
            .entity(
                EntityDef::new("Tweet", 1000)
                    .id("TweetId")
                    .string("Body", 140)
                    .foreign_key("User", "User", Cardinality::One),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn lookups() {
        let model = two_entity_model();
        let user = model.lookup_entity("User").unwrap();
        let city = model.lookup_field(user, "City").unwrap();
        assert_eq!(model.field(city).name, "City");
        assert_eq!(model.field_name(city), "User.City");
        assert!(model.lookup_entity("Missing").is_err());
        assert!(model.lookup_field(user, "Missing").is_err());
    }

    #[test]
    fn connectivity() {
        let model = two_entity_model();
        let user = model.lookup_entity("User").unwrap();
        let tweet = model.lookup_entity("Tweet").unwrap();
        assert!(model.connected(user, tweet));
        assert!(model.connected(tweet, user));

        // Forward foreign key reaches one row, backward fans out.
        assert_eq!(model.fanout(tweet, user), 1.0);
        assert_eq!(model.fanout(user, tweet), 10.0);
    }

    #[test]
    fn identifier_handle() {
        let model = two_entity_model();
        let user = model.lookup_entity("User").unwrap();
        let id = model.identifier(user);
        assert!(model.field(id).is_identifier());
    }
}
