//! Builders that produce frozen models.

use std::collections::HashMap;

use super::entity::Entity;
use super::error::{ModelError, ModelResult};
use super::field::{Cardinality, Field, ScalarKind};
use super::model::{Connection, EntityId, FieldId, Model};

/// Declaration of one entity, collected before handles exist.
///
/// Foreign-key targets are declared by name and resolved when the whole
/// model is built, so entities may reference each other freely.
#[derive(Debug, Clone)]
pub struct EntityDef {
    name: String,
    count: u64,
    fields: Vec<FieldDef>,
}

#[derive(Debug, Clone)]
struct FieldDef {
    name: String,
    kind: FieldDefKind,
    size: Option<u64>,
}

#[derive(Debug, Clone)]
enum FieldDefKind {
    Identifier,
    Scalar(ScalarKind),
    ForeignKey { target: String, cardinality: Cardinality },
}

impl EntityDef {
    /// Starts an entity declaration with its expected row count.
    #[must_use]
    pub fn new(name: impl Into<String>, count: u64) -> Self {
        Self { name: name.into(), count, fields: Vec::new() }
    }

    /// Declares the identifier field.
    #[must_use]
    pub fn id(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldDefKind::Identifier,
            size: None,
        });
        self
    }

    /// Declares an integer field.
    #[must_use]
    pub fn integer(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldDefKind::Scalar(ScalarKind::Integer),
            size: None,
        });
        self
    }

    /// Declares a float field.
    #[must_use]
    pub fn float(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldDefKind::Scalar(ScalarKind::Float),
            size: None,
        });
        self
    }

    /// Declares a fixed-length string field.
    #[must_use]
    pub fn string(mut self, name: impl Into<String>, length: u64) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldDefKind::Scalar(ScalarKind::String { length }),
            size: None,
        });
        self
    }

    /// Declares a date field.
    #[must_use]
    pub fn date(mut self, name: impl Into<String>) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldDefKind::Scalar(ScalarKind::Date),
            size: None,
        });
        self
    }

    /// Declares a foreign key to another entity by name.
    #[must_use]
    pub fn foreign_key(
        mut self,
        name: impl Into<String>,
        target: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        self.fields.push(FieldDef {
            name: name.into(),
            kind: FieldDefKind::ForeignKey { target: target.into(), cardinality },
            size: None,
        });
        self
    }

    /// Overrides the storage size of the most recently declared field.
    #[must_use]
    pub fn sized(mut self, size: u64) -> Self {
        if let Some(last) = self.fields.last_mut() {
            last.size = Some(size);
        }
        self
    }
}

/// Collects entity declarations and freezes them into a [`Model`].
#[derive(Debug, Clone, Default)]
pub struct ModelBuilder {
    entities: Vec<EntityDef>,
}

impl ModelBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an entity declaration.
    #[must_use]
    pub fn entity(mut self, def: EntityDef) -> Self {
        self.entities.push(def);
        self
    }

    /// Resolves names to handles, validates, and freezes the model.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::InvalidModel`] for duplicate entities, missing
    /// or duplicated identifiers, zero counts, or unresolvable foreign-key
    /// targets.
    pub fn build(self) -> ModelResult<Model> {
        let mut by_name = HashMap::new();
        for (i, def) in self.entities.iter().enumerate() {
            if by_name.insert(def.name.clone(), EntityId::new(i as u32)).is_some() {
                return Err(ModelError::InvalidModel(format!(
                    "entity {} declared twice",
                    def.name
                )));
            }
        }

        let mut entities = Vec::with_capacity(self.entities.len());
        let mut connections = Vec::new();
        for (i, def) in self.entities.iter().enumerate() {
            let entity_id = EntityId::new(i as u32);
            let mut fields = Vec::with_capacity(def.fields.len());
            let mut identifier_ordinal = None;
            for (ord, fdef) in def.fields.iter().enumerate() {
                let field = match &fdef.kind {
                    FieldDefKind::Identifier => {
                        if identifier_ordinal.replace(ord).is_some() {
                            return Err(ModelError::InvalidModel(format!(
                                "entity {} has more than one identifier",
                                def.name
                            )));
                        }
                        Field::identifier(&fdef.name)
                    }
                    FieldDefKind::Scalar(kind) => Field::scalar(&fdef.name, *kind),
                    FieldDefKind::ForeignKey { target, cardinality } => {
                        let target_id =
                            by_name.get(target.as_str()).copied().ok_or_else(|| {
                                ModelError::InvalidModel(format!(
                                    "foreign key {}.{} targets unknown entity {target}",
                                    def.name, fdef.name
                                ))
                            })?;
                        connections.push(Connection {
                            field: FieldId::new(entity_id, ord as u32),
                            from: entity_id,
                            to: target_id,
                            cardinality: *cardinality,
                        });
                        Field::foreign_key(&fdef.name, target_id, *cardinality)
                    }
                };
                let field = match fdef.size {
                    Some(size) => Field { size, ..field },
                    None => field,
                };
                fields.push(field);
            }

            let identifier_ordinal = identifier_ordinal.ok_or_else(|| {
                ModelError::InvalidModel(format!("entity {} has no identifier", def.name))
            })?;
            entities.push(Entity {
                name: def.name.clone(),
                count: def.count,
                fields,
                identifier_ordinal,
            });
        }

        let mut neighbors = vec![Vec::new(); entities.len()];
        for conn in &connections {
            let (from, to) = (conn.from.index(), conn.to.index());
            if !neighbors[from].contains(&conn.to) {
                neighbors[from].push(conn.to);
            }
            if !neighbors[to].contains(&conn.from) {
                neighbors[to].push(conn.from);
            }
        }

        let model = Model { entities, by_name, connections, neighbors };
        model.validate()?;
        Ok(model)
    }
}
