//! Statement types: queries, updates, inserts, deletes.

use std::collections::BTreeSet;

use keystone_model::{EntityId, FieldId, KeyPath, Model};

use super::condition::Condition;
use super::literal::Literal;
use crate::error::StatementError;

/// A read query over a path.
///
/// Constructed through [`Query::new`], which enforces the statement
/// invariants; a `Query` value is always valid against its model.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    /// Fields returned by the query.
    pub select: BTreeSet<FieldId>,
    /// The traversed path. The target entity comes first.
    pub path: KeyPath,
    /// WHERE predicates, conjunctive.
    pub conditions: Vec<Condition>,
    /// ORDER BY fields, in order.
    pub order_by: Vec<FieldId>,
    /// LIMIT, if any.
    pub limit: Option<u64>,
    /// Whether this query was derived to support a mutation rather than
    /// parsed from workload text. Support queries may lack equality
    /// predicates (they then scan).
    pub support: bool,
}

impl Query {
    /// Validates and creates a query.
    ///
    /// # Errors
    ///
    /// Returns a [`StatementError`] if the query has no equality predicate,
    /// more than one range predicate, a predicate on a foreign key, or
    /// references a field whose entity is off the path.
    pub fn new(
        model: &Model,
        select: BTreeSet<FieldId>,
        path: KeyPath,
        conditions: Vec<Condition>,
        order_by: Vec<FieldId>,
        limit: Option<u64>,
    ) -> Result<Self, StatementError> {
        validate_conditions(model, &path, &conditions, true)?;
        for &field in select.iter().chain(order_by.iter()) {
            if !path.contains(field.entity) {
                return Err(StatementError::FieldOffPath(model.field_name(field)));
            }
        }
        Ok(Self { select, path, conditions, order_by, limit, support: false })
    }

    /// Creates a support query for a mutating statement.
    ///
    /// Support queries are derived internally (§update planning), never
    /// parsed, and are allowed to carry no equality predicate: with an empty
    /// WHERE clause they fetch every row on their path.
    ///
    /// # Errors
    ///
    /// Returns a [`StatementError`] if a field lies off the path or the
    /// conditions are otherwise invalid.
    pub fn support(
        model: &Model,
        select: BTreeSet<FieldId>,
        path: KeyPath,
        conditions: Vec<Condition>,
    ) -> Result<Self, StatementError> {
        validate_conditions(model, &path, &conditions, false)?;
        for &field in &select {
            if !path.contains(field.entity) {
                return Err(StatementError::FieldOffPath(model.field_name(field)));
            }
        }
        Ok(Self { select, path, conditions, order_by: Vec::new(), limit: None, support: true })
    }

    /// Fields predicated by equality.
    #[must_use]
    pub fn equality_fields(&self) -> BTreeSet<FieldId> {
        self.conditions.iter().filter(|c| c.is_equality()).map(|c| c.field).collect()
    }

    /// The single range condition, if any.
    #[must_use]
    pub fn range_condition(&self) -> Option<&Condition> {
        self.conditions.iter().find(|c| c.is_range())
    }

    /// Conditions that can only be applied as in-memory filters (`!=`).
    pub fn filter_conditions(&self) -> impl Iterator<Item = &Condition> {
        self.conditions.iter().filter(|c| !c.is_equality() && !c.is_range())
    }

    /// Every field the query touches: selected, predicated, or ordered by.
    #[must_use]
    pub fn referenced_fields(&self) -> BTreeSet<FieldId> {
        let mut fields = self.select.clone();
        fields.extend(self.conditions.iter().map(|c| c.field));
        fields.extend(self.order_by.iter().copied());
        fields
    }

    /// Renders the query back to statement text.
    #[must_use]
    pub fn display(&self, model: &Model) -> String {
        let select = if self.select.is_empty() {
            "*".to_owned()
        } else {
            self.select
                .iter()
                .map(|&f| model.field_name(f))
                .collect::<Vec<_>>()
                .join(", ")
        };
        let mut out = format!("SELECT {select} FROM {}", path_text(model, &self.path));
        push_where(&mut out, model, &self.conditions);
        if !self.order_by.is_empty() {
            let fields = self
                .order_by
                .iter()
                .map(|&f| model.field_name(f))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(" ORDER BY ");
            out.push_str(&fields);
        }
        if let Some(limit) = self.limit {
            out.push_str(&format!(" LIMIT {limit}"));
        }
        out
    }
}

/// A `SET` assignment in an UPDATE or INSERT.
#[derive(Debug, Clone, PartialEq)]
pub struct Setting {
    /// The assigned field. Always belongs to the target entity.
    pub field: FieldId,
    /// The assigned literal, or `None` for a `?` placeholder.
    pub value: Option<Literal>,
}

/// An UPDATE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    /// The entity whose rows are updated.
    pub entity: EntityId,
    /// The path the WHERE clause ranges over. Starts at the target entity.
    pub path: KeyPath,
    /// SET assignments.
    pub settings: Vec<Setting>,
    /// WHERE predicates.
    pub conditions: Vec<Condition>,
}

impl Update {
    /// Validates and creates an update.
    ///
    /// # Errors
    ///
    /// Returns a [`StatementError`] if the path does not start at the target
    /// entity, a setting field belongs to a different entity, settings are
    /// empty, or the conditions are invalid.
    pub fn new(
        model: &Model,
        entity: EntityId,
        path: KeyPath,
        settings: Vec<Setting>,
        conditions: Vec<Condition>,
    ) -> Result<Self, StatementError> {
        validate_target_path(model, entity, &path)?;
        validate_settings(model, entity, &settings)?;
        validate_conditions(model, &path, &conditions, false)?;
        Ok(Self { entity, path, settings, conditions })
    }

    /// Fields assigned by the SET clause.
    #[must_use]
    pub fn setting_fields(&self) -> BTreeSet<FieldId> {
        self.settings.iter().map(|s| s.field).collect()
    }

    /// Renders the update back to statement text.
    #[must_use]
    pub fn display(&self, model: &Model) -> String {
        let mut out = format!("UPDATE {}", model.entity(self.entity).name);
        if self.path.len() > 1 {
            out.push_str(&format!(" FROM {}", path_text(model, &self.path)));
        }
        push_set(&mut out, model, &self.settings);
        push_where(&mut out, model, &self.conditions);
        out
    }
}

/// An INSERT statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    /// The entity a row is inserted into.
    pub entity: EntityId,
    /// SET assignments, possibly including foreign-key values.
    pub settings: Vec<Setting>,
}

impl Insert {
    /// Validates and creates an insert.
    ///
    /// # Errors
    ///
    /// Returns a [`StatementError`] if settings are empty or reference a
    /// field of another entity.
    pub fn new(
        model: &Model,
        entity: EntityId,
        settings: Vec<Setting>,
    ) -> Result<Self, StatementError> {
        validate_settings(model, entity, &settings)?;
        Ok(Self { entity, settings })
    }

    /// Fields assigned by the SET clause.
    #[must_use]
    pub fn setting_fields(&self) -> BTreeSet<FieldId> {
        self.settings.iter().map(|s| s.field).collect()
    }

    /// Renders the insert back to statement text.
    #[must_use]
    pub fn display(&self, model: &Model) -> String {
        let mut out = format!("INSERT INTO {}", model.entity(self.entity).name);
        push_set(&mut out, model, &self.settings);
        out
    }
}

/// A DELETE statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    /// The entity whose rows are deleted.
    pub entity: EntityId,
    /// The path the WHERE clause ranges over. Starts at the target entity.
    pub path: KeyPath,
    /// WHERE predicates.
    pub conditions: Vec<Condition>,
}

impl Delete {
    /// Validates and creates a delete.
    ///
    /// # Errors
    ///
    /// Returns a [`StatementError`] if the path does not start at the target
    /// entity or the conditions are invalid.
    pub fn new(
        model: &Model,
        entity: EntityId,
        path: KeyPath,
        conditions: Vec<Condition>,
    ) -> Result<Self, StatementError> {
        validate_target_path(model, entity, &path)?;
        validate_conditions(model, &path, &conditions, false)?;
        Ok(Self { entity, path, conditions })
    }

    /// Renders the delete back to statement text.
    #[must_use]
    pub fn display(&self, model: &Model) -> String {
        let mut out = format!("DELETE {}", model.entity(self.entity).name);
        if self.path.len() > 1 {
            out.push_str(&format!(" FROM {}", path_text(model, &self.path)));
        }
        push_where(&mut out, model, &self.conditions);
        out
    }
}

/// A parsed, model-bound statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// A read query.
    Query(Query),
    /// An UPDATE.
    Update(Update),
    /// An INSERT.
    Insert(Insert),
    /// A DELETE.
    Delete(Delete),
}

impl Statement {
    /// The query, if this statement is one.
    #[must_use]
    pub const fn as_query(&self) -> Option<&Query> {
        match self {
            Self::Query(q) => Some(q),
            _ => None,
        }
    }

    /// Whether this statement modifies data.
    #[must_use]
    pub const fn is_mutation(&self) -> bool {
        !matches!(self, Self::Query(_))
    }

    /// The entity the statement operates on: a query's path target or a
    /// mutation's target entity.
    #[must_use]
    pub fn target(&self) -> EntityId {
        match self {
            Self::Query(q) => q.path.first(),
            Self::Update(u) => u.entity,
            Self::Insert(i) => i.entity,
            Self::Delete(d) => d.entity,
        }
    }

    /// The statement's WHERE predicates, if it has a WHERE clause.
    #[must_use]
    pub fn conditions(&self) -> &[Condition] {
        match self {
            Self::Query(q) => &q.conditions,
            Self::Update(u) => &u.conditions,
            Self::Delete(d) => &d.conditions,
            Self::Insert(_) => &[],
        }
    }

    /// The statement's path: a query's or mutation's traversal, or the
    /// single-entity path of an INSERT.
    #[must_use]
    pub fn path(&self) -> KeyPath {
        match self {
            Self::Query(q) => q.path.clone(),
            Self::Update(u) => u.path.clone(),
            Self::Delete(d) => d.path.clone(),
            Self::Insert(i) => KeyPath::single(i.entity),
        }
    }

    /// Renders the statement back to statement text.
    #[must_use]
    pub fn display(&self, model: &Model) -> String {
        match self {
            Self::Query(q) => q.display(model),
            Self::Update(u) => u.display(model),
            Self::Insert(i) => i.display(model),
            Self::Delete(d) => d.display(model),
        }
    }
}

fn path_text(model: &Model, path: &KeyPath) -> String {
    path.entities()
        .iter()
        .map(|&e| model.entity(e).name.as_str())
        .collect::<Vec<_>>()
        .join(".")
}

fn push_where(out: &mut String, model: &Model, conditions: &[Condition]) {
    if conditions.is_empty() {
        return;
    }
    let rendered = conditions
        .iter()
        .map(|c| {
            let value = c.value.as_ref().map_or_else(|| "?".to_owned(), ToString::to_string);
            format!("{} {} {value}", model.field_name(c.field), c.op)
        })
        .collect::<Vec<_>>()
        .join(" AND ");
    out.push_str(" WHERE ");
    out.push_str(&rendered);
}

fn push_set(out: &mut String, model: &Model, settings: &[Setting]) {
    let rendered = settings
        .iter()
        .map(|s| {
            let value = s.value.as_ref().map_or_else(|| "?".to_owned(), ToString::to_string);
            format!("{} = {value}", model.field(s.field).name)
        })
        .collect::<Vec<_>>()
        .join(", ");
    out.push_str(" SET ");
    out.push_str(&rendered);
}

fn validate_conditions(
    model: &Model,
    path: &KeyPath,
    conditions: &[Condition],
    require_equality: bool,
) -> Result<(), StatementError> {
    let mut ranges = 0;
    let mut equalities = 0;
    for cond in conditions {
        if model.field(cond.field).is_foreign_key() {
            return Err(StatementError::PredicateOnForeignKey(model.field_name(cond.field)));
        }
        if !path.contains(cond.field.entity) {
            return Err(StatementError::FieldOffPath(model.field_name(cond.field)));
        }
        if cond.is_range() {
            ranges += 1;
        }
        if cond.is_equality() {
            equalities += 1;
        }
    }
    if ranges > 1 {
        return Err(StatementError::MultipleRangePredicates);
    }
    if require_equality && equalities == 0 {
        return Err(StatementError::NoEqualityPredicate);
    }
    Ok(())
}

fn validate_target_path(
    model: &Model,
    entity: EntityId,
    path: &KeyPath,
) -> Result<(), StatementError> {
    if path.first() != entity {
        return Err(StatementError::FromMismatch {
            expected: model.entity(entity).name.clone(),
            found: model.entity(path.first()).name.clone(),
        });
    }
    Ok(())
}

fn validate_settings(
    model: &Model,
    entity: EntityId,
    settings: &[Setting],
) -> Result<(), StatementError> {
    if settings.is_empty() {
        return Err(StatementError::NoSettings);
    }
    for setting in settings {
        if setting.field.entity != entity {
            return Err(StatementError::SettingOffTarget(model.field_name(setting.field)));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Operator;
    use keystone_model::{Cardinality, EntityDef, ModelBuilder};

    fn model() -> Model {
        ModelBuilder::new()
            .entity(
                EntityDef::new("User", 100)
                    .id("UserId")
                    .string("City", 20)
                    .string("Username", 30),
            )
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
    fn query_requires_equality() {
        let model = model();
        let user = model.lookup_entity("User").unwrap();
        let username = model.lookup_field(user, "Username").unwrap();

        let err = Query::new(
            &model,
            [username].into_iter().collect(),
            KeyPath::single(user),
            vec![],
            vec![],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, StatementError::NoEqualityPredicate));
    }

    #[test]
    fn query_rejects_multi_range() {
        let model = model();
        let user = model.lookup_entity("User").unwrap();
        let id = model.identifier(user);

        let err = Query::new(
            &model,
            [id].into_iter().collect(),
            KeyPath::single(user),
            vec![
                Condition::new(id, Operator::Gt, Some(Literal::Integer(1))),
                Condition::new(id, Operator::Lt, Some(Literal::Integer(3))),
            ],
            vec![],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, StatementError::MultipleRangePredicates));
    }

    #[test]
    fn query_rejects_foreign_key_predicate() {
        let model = model();
        let tweet = model.lookup_entity("Tweet").unwrap();
        let fk = model.lookup_field(tweet, "User").unwrap();
        let body = model.lookup_field(tweet, "Body").unwrap();

        let err = Query::new(
            &model,
            [body].into_iter().collect(),
            KeyPath::single(tweet),
            vec![Condition::new(fk, Operator::Eq, None)],
            vec![],
            None,
        )
        .unwrap_err();
        assert!(matches!(err, StatementError::PredicateOnForeignKey(_)));
    }

    #[test]
    fn support_query_may_scan() {
        let model = model();
        let user = model.lookup_entity("User").unwrap();
        let id = model.identifier(user);

        let query =
            Query::support(&model, [id].into_iter().collect(), KeyPath::single(user), vec![])
                .unwrap();
        assert!(query.support);
        assert!(query.equality_fields().is_empty());
    }

    #[test]
    fn update_checks_target_path() {
        let model = model();
        let user = model.lookup_entity("User").unwrap();
        let tweet = model.lookup_entity("Tweet").unwrap();
        let username = model.lookup_field(user, "Username").unwrap();

        let err = Update::new(
            &model,
            user,
            KeyPath::single(tweet),
            vec![Setting { field: username, value: None }],
            vec![],
        )
        .unwrap_err();
        assert!(matches!(err, StatementError::FromMismatch { .. }));
    }

    #[test]
    fn display_round_trips_text() {
        let model = model();
        let user = model.lookup_entity("User").unwrap();
        let city = model.lookup_field(user, "City").unwrap();
        let username = model.lookup_field(user, "Username").unwrap();

        let query = Query::new(
            &model,
            [username].into_iter().collect(),
            KeyPath::single(user),
            vec![Condition::new(city, Operator::Eq, None)],
            vec![],
            Some(10),
        )
        .unwrap();
        assert_eq!(
            query.display(&model),
            "SELECT User.Username FROM User WHERE User.City = ? LIMIT 10"
        );
    }
}
