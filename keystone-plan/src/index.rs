//! Materialized indexes (column families).

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use sha2::{Digest, Sha256};

use keystone_model::{EntityId, FieldId, KeyPath, Model};
use keystone_query::Query;

use crate::error::IndexError;

/// A materialized view over a path: hash keys, ordered cluster keys, and
/// extra columns.
///
/// Construction validates the layout invariants and eagerly computes the
/// derived properties (entry size, expected entry count, total size, and the
/// stable key); an `Index` value is immutable and always valid.
///
/// Identity is the stable [`Index::key`]: two indexes with equal hash,
/// order, extra, and path layouts compare equal even if built separately.
#[derive(Debug, Clone)]
pub struct Index {
    /// Hash (partition) key fields.
    pub hash_fields: BTreeSet<FieldId>,
    /// Ordered cluster key fields.
    pub order_fields: Vec<FieldId>,
    /// Extra stored columns.
    pub extra: BTreeSet<FieldId>,
    /// The path the index spans.
    pub path: KeyPath,
    /// Bytes per entry: the sum of all field sizes.
    pub entry_size: u64,
    /// Expected number of entries.
    pub entries: f64,
    /// Expected total size in bytes.
    pub size: f64,
    key: String,
}

impl Index {
    /// Validates the layout and creates an index.
    ///
    /// Overlaps are normalized before validation: hash fields are removed
    /// from the order list, and key fields are removed from the extras.
    ///
    /// # Errors
    ///
    /// Returns an [`IndexError`] if the hash fields are empty, a field lies
    /// off the path, no hash field lives on the first path entity, extras
    /// exist but none lives on the last path entity, or the first entity's
    /// identifier is missing from the keys.
    pub fn new(
        model: &Model,
        hash_fields: BTreeSet<FieldId>,
        order_fields: Vec<FieldId>,
        extra: BTreeSet<FieldId>,
        path: KeyPath,
    ) -> Result<Self, IndexError> {
        let mut order: Vec<FieldId> = Vec::new();
        for field in order_fields {
            if !hash_fields.contains(&field) && !order.contains(&field) {
                order.push(field);
            }
        }
        let extra: BTreeSet<FieldId> = extra
            .into_iter()
            .filter(|f| !hash_fields.contains(f) && !order.contains(f))
            .collect();

        if hash_fields.is_empty() {
            return Err(IndexError::EmptyHashFields);
        }
        for &field in hash_fields.iter().chain(order.iter()).chain(extra.iter()) {
            if !path.contains(field.entity) {
                return Err(IndexError::FieldOffPath(model.field_name(field)));
            }
        }
        if !hash_fields.iter().any(|f| f.entity == path.first()) {
            return Err(IndexError::HashNotOnFirstEntity);
        }
        if !extra.is_empty() && !extra.iter().any(|f| f.entity == path.last()) {
            return Err(IndexError::ExtraNotOnLastEntity);
        }
        let identifier = model.identifier(path.first());
        if !hash_fields.contains(&identifier) && !order.contains(&identifier) {
            return Err(IndexError::MissingIdentifier);
        }

        let entry_size: u64 = hash_fields
            .iter()
            .chain(order.iter())
            .chain(extra.iter())
            .map(|&f| model.field(f).size)
            .sum();
        let entries = path_cardinality(model, &path);
        let size = entries * entry_size as f64;
        let key = stable_key(model, &hash_fields, &order, &extra, &path);

        Ok(Self {
            hash_fields,
            order_fields: order,
            extra,
            path,
            entry_size,
            entries,
            size,
            key,
        })
    }

    /// The canonical index that answers `query` with a single lookup.
    ///
    /// The index path runs from the predicated end of the query path toward
    /// the target; identifiers of every path entity are appended to the
    /// cluster keys so each joined row keys a distinct entry.
    ///
    /// # Errors
    ///
    /// Returns an [`IndexError`] if no orientation of the query path admits
    /// a valid layout.
    pub fn materialized_view(model: &Model, query: &Query) -> Result<Self, IndexError> {
        let reversed = query.path.reversed();
        let mut last_err = None;
        for path in [reversed, query.path.clone()] {
            match Self::view_over(model, query, path) {
                Ok(index) => return Ok(index),
                Err(err) => last_err = Some(err),
            }
        }
        // A query path always has at least one orientation attempted.
        Err(last_err.unwrap_or(IndexError::EmptyHashFields))
    }

    fn view_over(model: &Model, query: &Query, path: KeyPath) -> Result<Self, IndexError> {
        let eq = query.equality_fields();
        let mut hash: BTreeSet<FieldId> =
            eq.iter().copied().filter(|f| f.entity == path.first()).collect();
        if hash.is_empty() {
            hash.insert(model.identifier(path.first()));
        }

        let mut order: Vec<FieldId> = Vec::new();
        if let Some(range) = query.range_condition() {
            order.push(range.field);
        }
        order.extend(query.order_by.iter().copied());
        append_path_identifiers(model, &path, &hash, &mut order);

        let extra: BTreeSet<FieldId> = query
            .referenced_fields()
            .into_iter()
            .filter(|f| !hash.contains(f) && !order.contains(f))
            .collect();

        Self::new(model, hash, order, extra, path)
    }

    /// The identity index of an entity: keyed by its identifier, storing
    /// its scalar fields.
    ///
    /// # Errors
    ///
    /// Never fails for a well-formed model; the `Result` mirrors
    /// [`Index::new`].
    pub fn simple(model: &Model, entity: EntityId) -> Result<Self, IndexError> {
        let identifier = model.identifier(entity);
        let extra: BTreeSet<FieldId> = model
            .entity(entity)
            .scalar_ordinals()
            .map(|ord| FieldId::new(entity, ord as u32))
            .filter(|&f| f != identifier)
            .collect();
        Self::new(
            model,
            [identifier].into_iter().collect(),
            Vec::new(),
            extra,
            KeyPath::single(entity),
        )
    }

    /// The stable identity of this index layout.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Iterates over every field the index stores.
    pub fn all_fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.hash_fields
            .iter()
            .chain(self.order_fields.iter())
            .chain(self.extra.iter())
            .copied()
    }

    /// Whether the index stores the given field.
    #[must_use]
    pub fn contains(&self, field: FieldId) -> bool {
        self.hash_fields.contains(&field)
            || self.order_fields.contains(&field)
            || self.extra.contains(&field)
    }

    /// Key fields: hash fields plus cluster keys.
    pub fn key_fields(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.hash_fields.iter().chain(self.order_fields.iter()).copied()
    }

    /// Bytes per entry spent on key fields.
    #[must_use]
    pub fn key_size(&self, model: &Model) -> u64 {
        self.key_fields().map(|f| model.field(f).size).sum()
    }

    /// Renders the layout as `[hash][order] -> [extra] over path`.
    #[must_use]
    pub fn describe(&self, model: &Model) -> String {
        let names = |fields: &mut dyn Iterator<Item = FieldId>| {
            fields.map(|f| model.field_name(f)).collect::<Vec<_>>().join(", ")
        };
        format!(
            "[{}][{}] -> [{}] over {}",
            names(&mut self.hash_fields.iter().copied()),
            names(&mut self.order_fields.iter().copied()),
            names(&mut self.extra.iter().copied()),
            self.path
                .entities()
                .iter()
                .map(|&e| model.entity(e).name.as_str())
                .collect::<Vec<_>>()
                .join(".")
        )
    }
}

impl PartialEq for Index {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for Index {}

impl Hash for Index {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl PartialOrd for Index {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Index {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key.cmp(&other.key)
    }
}

/// Appends the identifiers of every path entity not already among the keys,
/// in path order.
pub(crate) fn append_path_identifiers(
    model: &Model,
    path: &KeyPath,
    hash: &BTreeSet<FieldId>,
    order: &mut Vec<FieldId>,
) {
    for &entity in path.entities() {
        let id = model.identifier(entity);
        if !hash.contains(&id) && !order.contains(&id) {
            order.push(id);
        }
    }
}

/// Expected number of joined rows along a path.
///
/// Starts at the first entity's count; each hop multiplies by the traversal
/// fanout, which collapses to 1 when following a foreign key forward.
pub(crate) fn path_cardinality(model: &Model, path: &KeyPath) -> f64 {
    let mut cardinality = model.entity(path.first()).count as f64;
    for pair in path.entities().windows(2) {
        cardinality *= model.fanout(pair[0], pair[1]);
    }
    cardinality
}

fn stable_key(
    model: &Model,
    hash: &BTreeSet<FieldId>,
    order: &[FieldId],
    extra: &BTreeSet<FieldId>,
    path: &KeyPath,
) -> String {
    let mut digest = Sha256::new();
    for &field in hash {
        digest.update(model.field_name(field));
        digest.update(";");
    }
    digest.update("|");
    for &field in order {
        digest.update(model.field_name(field));
        digest.update(";");
    }
    digest.update("|");
    for &field in extra {
        digest.update(model.field_name(field));
        digest.update(";");
    }
    digest.update("|");
    for &entity in path.entities() {
        digest.update(&model.entity(entity).name);
        digest.update(".");
    }
    let bytes = digest.finalize();
    let mut key = String::with_capacity(20);
    key.push_str("idx_");
    for byte in bytes.iter().take(8) {
        key.push_str(&format!("{byte:02x}"));
    }
    key
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_model::{Cardinality, EntityDef, ModelBuilder};
    use keystone_query::parse_statement;

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

    fn field(model: &Model, entity: &str, name: &str) -> FieldId {
        let e = model.lookup_entity(entity).unwrap();
        model.lookup_field(e, name).unwrap()
    }

    #[test]
    fn rejects_empty_hash() {
        let model = model();
        let user = model.lookup_entity("User").unwrap();
        let err = Index::new(
            &model,
            BTreeSet::new(),
            vec![model.identifier(user)],
            BTreeSet::new(),
            KeyPath::single(user),
        )
        .unwrap_err();
        assert_eq!(err, IndexError::EmptyHashFields);
    }

    #[test]
    fn rejects_missing_identifier() {
        let model = model();
        let user = model.lookup_entity("User").unwrap();
        let city = field(&model, "User", "City");
        let username = field(&model, "User", "Username");
        let err = Index::new(
            &model,
            [city].into_iter().collect(),
            vec![],
            [username].into_iter().collect(),
            KeyPath::single(user),
        )
        .unwrap_err();
        assert_eq!(err, IndexError::MissingIdentifier);
    }

    #[test]
    fn rejects_field_off_path() {
        let model = model();
        let user = model.lookup_entity("User").unwrap();
        let body = field(&model, "Tweet", "Body");
        let err = Index::new(
            &model,
            [field(&model, "User", "City")].into_iter().collect(),
            vec![model.identifier(user)],
            [body].into_iter().collect(),
            KeyPath::single(user),
        )
        .unwrap_err();
        assert!(matches!(err, IndexError::FieldOffPath(_)));
    }

    #[test]
    fn sizes_a_single_entity_index() {
        let model = model();
        let user = model.lookup_entity("User").unwrap();
        let index = Index::new(
            &model,
            [field(&model, "User", "City")].into_iter().collect(),
            vec![model.identifier(user)],
            [field(&model, "User", "Username")].into_iter().collect(),
            KeyPath::single(user),
        )
        .unwrap();
        // City (20) + UserId (8) + Username (30) per entry, 100 entries.
        assert_eq!(index.entry_size, 58);
        assert_eq!(index.entries, 100.0);
        assert_eq!(index.size, 5800.0);
    }

    #[test]
    fn sizes_follow_path_fanout() {
        let model = model();
        let user = model.lookup_entity("User").unwrap();
        let tweet = model.lookup_entity("Tweet").unwrap();
        let path = KeyPath::new(&model, vec![user, tweet]).unwrap();
        let index = Index::new(
            &model,
            [field(&model, "User", "City")].into_iter().collect(),
            vec![model.identifier(user), model.identifier(tweet)],
            [field(&model, "Tweet", "Body")].into_iter().collect(),
            path,
        )
        .unwrap();
        // One entry per joined (User, Tweet) row.
        assert_eq!(index.entries, 1000.0);
    }

    #[test]
    fn equal_layouts_share_a_key() {
        let model = model();
        let user = model.lookup_entity("User").unwrap();
        let build = || {
            Index::new(
                &model,
                [field(&model, "User", "City")].into_iter().collect(),
                vec![model.identifier(user)],
                [field(&model, "User", "Username")].into_iter().collect(),
                KeyPath::single(user),
            )
            .unwrap()
        };
        let a = build();
        let b = build();
        assert_eq!(a.key(), b.key());
        assert_eq!(a, b);

        let different = Index::simple(&model, user).unwrap();
        assert_ne!(a.key(), different.key());
    }

    #[test]
    fn materialized_view_of_a_simple_query() {
        let model = model();
        let stmt =
            parse_statement(&model, "SELECT Username FROM User WHERE User.City = ?").unwrap();
        let view = Index::materialized_view(&model, stmt.as_query().unwrap()).unwrap();

        let city = field(&model, "User", "City");
        let user_id = field(&model, "User", "UserId");
        let username = field(&model, "User", "Username");
        assert_eq!(view.hash_fields, [city].into_iter().collect());
        assert_eq!(view.order_fields, vec![user_id]);
        assert_eq!(view.extra, [username].into_iter().collect());
    }

    #[test]
    fn materialized_view_reverses_the_query_path() {
        let model = model();
        let stmt =
            parse_statement(&model, "SELECT Body FROM Tweet.User WHERE User.City = ?").unwrap();
        let view = Index::materialized_view(&model, stmt.as_query().unwrap()).unwrap();

        let user = model.lookup_entity("User").unwrap();
        let tweet = model.lookup_entity("Tweet").unwrap();
        assert_eq!(view.path.entities(), &[user, tweet]);
        assert_eq!(
            view.order_fields,
            vec![field(&model, "User", "UserId"), field(&model, "Tweet", "TweetId")]
        );
        assert_eq!(view.extra, [field(&model, "Tweet", "Body")].into_iter().collect());
    }

    #[test]
    fn simple_index_layout() {
        let model = model();
        let user = model.lookup_entity("User").unwrap();
        let index = Index::simple(&model, user).unwrap();
        assert_eq!(index.hash_fields, [model.identifier(user)].into_iter().collect());
        assert!(index.order_fields.is_empty());
        assert_eq!(index.extra.len(), 2);
    }
}
