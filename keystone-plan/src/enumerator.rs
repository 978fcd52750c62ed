//! Candidate index enumeration.

use std::collections::{BTreeSet, HashSet};

use itertools::Itertools;
use tracing::debug;

use keystone_model::{FieldId, KeyPath, Model};
use keystone_query::{Query, Workload};

use crate::error::PlanResult;
use crate::index::{append_path_identifiers, Index};
use crate::update::UpdatePlanner;

/// Generates the candidate indexes a query or workload could use.
#[derive(Debug, Clone, Copy)]
pub struct IndexEnumerator<'a> {
    model: &'a Model,
}

impl<'a> IndexEnumerator<'a> {
    /// Creates an enumerator over a model.
    #[must_use]
    pub const fn new(model: &'a Model) -> Self {
        Self { model }
    }

    /// Enumerates candidate indexes for one query.
    ///
    /// Candidates are generated from every contiguous subpath of the query
    /// path (in both orientations) and every admissible partition of the
    /// query's fields into hash, order, and extra columns. The query's
    /// materialized view and the simple index of every path entity are
    /// always included. The result is deduplicated by key and sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if the materialized view cannot be laid out.
    pub fn indexes_for_query(&self, query: &Query) -> PlanResult<Vec<Index>> {
        let mut out: BTreeSet<Index> = BTreeSet::new();

        let reversed = query.path.reversed();
        let mut seen_paths: HashSet<KeyPath> = HashSet::new();
        for orientation in [&reversed, &query.path] {
            for sub in orientation.subpaths() {
                if seen_paths.insert(sub.clone()) {
                    self.candidates_for_subpath(query, &sub, &mut out);
                }
            }
        }

        out.insert(Index::materialized_view(self.model, query)?);
        for &entity in query.path.entities() {
            out.insert(Index::simple(self.model, entity)?);
        }

        debug!(candidates = out.len(), "enumerated query candidates");
        Ok(out.into_iter().collect())
    }

    /// Enumerates candidate indexes for a whole workload.
    ///
    /// Takes the union of per-query candidates, then derives the support
    /// queries every mutating statement needs against those candidates and
    /// unions in their candidates as well. The result is sorted by key.
    ///
    /// # Errors
    ///
    /// Returns an error if candidate layout or support-query derivation
    /// fails.
    pub fn indexes_for_workload(&self, workload: &Workload) -> PlanResult<Vec<Index>> {
        let mut out: BTreeSet<Index> = BTreeSet::new();
        for (_, query, _) in workload.queries() {
            out.extend(self.indexes_for_query(query)?);
        }

        // Mutations maintain whatever indexes the read side wants, so their
        // support queries enumerate against the read-side candidates.
        let read_candidates: Vec<Index> = out.iter().cloned().collect();
        let updates = UpdatePlanner::new(self.model);
        for (_, statement, _) in workload.mutations() {
            for index in &read_candidates {
                if !updates.modifies(statement, index) {
                    continue;
                }
                for support in updates.support_queries(statement, index)? {
                    out.extend(self.indexes_for_query(&support)?);
                }
            }
        }

        debug!(candidates = out.len(), "enumerated workload candidates");
        Ok(out.into_iter().collect())
    }

    /// Generates the (hash, order, extra) partitions of the query fields
    /// that live on one subpath.
    fn candidates_for_subpath(&self, query: &Query, sub: &KeyPath, out: &mut BTreeSet<Index>) {
        let eq: Vec<FieldId> = query
            .equality_fields()
            .into_iter()
            .filter(|f| sub.contains(f.entity))
            .collect();
        let range: Option<FieldId> = query
            .range_condition()
            .map(|c| c.field)
            .filter(|f| sub.contains(f.entity));
        let order_by: Vec<FieldId> = query
            .order_by
            .iter()
            .copied()
            .filter(|f| sub.contains(f.entity))
            .collect();
        let referenced: BTreeSet<FieldId> = query
            .referenced_fields()
            .into_iter()
            .filter(|f| sub.contains(f.entity))
            .collect();
        let first_id = self.model.identifier(sub.first());

        for subset in eq.iter().powerset() {
            for id_flag in [false, true] {
                if subset.is_empty() && !id_flag {
                    continue;
                }
                let mut hash: BTreeSet<FieldId> = subset.iter().copied().copied().collect();
                if id_flag {
                    hash.insert(first_id);
                }

                let mut order: Vec<FieldId> = Vec::new();
                for field in range.iter().chain(order_by.iter()) {
                    if !hash.contains(field) && !order.contains(field) {
                        order.push(*field);
                    }
                }
                let extra: BTreeSet<FieldId> = referenced
                    .iter()
                    .copied()
                    .filter(|f| !hash.contains(f) && !order.contains(f))
                    .collect();

                // Key-only candidates carry no payload beyond what the
                // query already supplies; skip them.
                if order.is_empty() && extra.is_empty() {
                    continue;
                }

                append_path_identifiers(self.model, sub, &hash, &mut order);
                if let Ok(index) =
                    Index::new(self.model, hash, order, extra, sub.clone())
                {
                    out.insert(index);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_model::{Cardinality, EntityDef, ModelBuilder};
    use keystone_query::{parse_statement, Statement};

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

    fn query(model: &Model, text: &str) -> Query {
        match parse_statement(model, text).unwrap() {
            Statement::Query(q) => q,
            other => panic!("expected query, got {other:?}"),
        }
    }

    fn field(model: &Model, entity: &str, name: &str) -> FieldId {
        let e = model.lookup_entity(entity).unwrap();
        model.lookup_field(e, name).unwrap()
    }

    #[test]
    fn includes_view_and_simple_index() {
        let model = model();
        let q = query(&model, "SELECT Username FROM User WHERE User.City = ?");
        let candidates = IndexEnumerator::new(&model).indexes_for_query(&q).unwrap();

        let view = Index::materialized_view(&model, &q).unwrap();
        let user = model.lookup_entity("User").unwrap();
        let simple = Index::simple(&model, user).unwrap();
        assert!(candidates.contains(&view));
        assert!(candidates.contains(&simple));
    }

    #[test]
    fn path_query_candidates_start_at_the_predicated_entity() {
        let model = model();
        let q = query(&model, "SELECT Body FROM Tweet.User WHERE User.City = ?");
        let candidates = IndexEnumerator::new(&model).indexes_for_query(&q).unwrap();

        let user = model.lookup_entity("User").unwrap();
        let tweet = model.lookup_entity("Tweet").unwrap();
        let path = KeyPath::new(&model, vec![user, tweet]).unwrap();
        let expected = Index::new(
            &model,
            [field(&model, "User", "City")].into_iter().collect(),
            vec![field(&model, "User", "UserId"), field(&model, "Tweet", "TweetId")],
            [field(&model, "Tweet", "Body")].into_iter().collect(),
            path,
        )
        .unwrap();
        assert!(candidates.contains(&expected));
    }

    #[test]
    fn no_candidate_violates_layout_invariants() {
        let model = model();
        let q = query(&model, "SELECT Body FROM Tweet.User WHERE User.City = ?");
        let candidates = IndexEnumerator::new(&model).indexes_for_query(&q).unwrap();

        for index in &candidates {
            assert!(!index.hash_fields.is_empty());
            let first_id = model.identifier(index.path.first());
            assert!(
                index.hash_fields.contains(&first_id) || index.order_fields.contains(&first_id),
                "identifier-prefix invariant violated by {}",
                index.describe(&model)
            );
        }
    }

    #[test]
    fn update_only_workload_has_no_candidates() {
        let model = model();
        let mut workload = Workload::new(model.clone());
        workload.add("UPDATE User SET Username = ? WHERE User.City = ?", 1.0);
        assert!(workload.is_valid());

        let candidates =
            IndexEnumerator::new(&model).indexes_for_workload(&workload).unwrap();
        assert!(candidates.is_empty());
    }

    #[test]
    fn support_queries_contribute_candidates() {
        let model = model();
        let mut workload = Workload::new(model.clone());
        workload.add("UPDATE User SET Username = ? WHERE User.City = ?", 1.0);
        workload.add("SELECT Body FROM Tweet.User WHERE User.Username = ?", 1.0);
        assert!(workload.is_valid());

        let candidates =
            IndexEnumerator::new(&model).indexes_for_workload(&workload).unwrap();

        // The update needs Username keys looked up by City, whose
        // materialized view is City -> [UserId] storing Username.
        let user = model.lookup_entity("User").unwrap();
        let expected = Index::new(
            &model,
            [field(&model, "User", "City")].into_iter().collect(),
            vec![field(&model, "User", "UserId")],
            [field(&model, "User", "Username")].into_iter().collect(),
            KeyPath::single(user),
        )
        .unwrap();
        assert!(candidates.contains(&expected));
    }

    #[test]
    fn candidates_are_sorted_and_unique() {
        let model = model();
        let q = query(&model, "SELECT Body FROM Tweet.User WHERE User.City = ?");
        let candidates = IndexEnumerator::new(&model).indexes_for_query(&q).unwrap();

        let keys: Vec<&str> = candidates.iter().map(Index::key).collect();
        let mut sorted = keys.clone();
        sorted.sort_unstable();
        sorted.dedup();
        assert_eq!(keys, sorted);
    }
}
