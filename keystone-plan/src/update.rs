//! Update planning: support queries and index maintenance steps.

use std::collections::BTreeSet;

use keystone_model::{FieldId, KeyPath, Model};
use keystone_query::{Condition, Operator, Query, Statement};

use crate::cost::{EQUALITY_SELECTIVITY, INEQUALITY_SELECTIVITY, RANGE_SELECTIVITY};
use crate::error::PlanResult;
use crate::index::{path_cardinality, Index};

/// A maintenance step applied to one index for one mutating statement.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateStep {
    /// Write entries into the index.
    Insert {
        /// The maintained index.
        index_key: String,
        /// Estimated entries written.
        entries: f64,
    },
    /// Remove entries from the index.
    Delete {
        /// The maintained index.
        index_key: String,
        /// Estimated entries removed.
        entries: f64,
    },
}

/// How one mutating statement maintains one affected index: the support
/// queries that fetch the needed key values, then insert/delete steps.
#[derive(Debug, Clone)]
pub struct UpdatePlan {
    /// The maintained index.
    pub index_key: String,
    /// Queries fetching key fields the statement does not supply itself.
    pub support_queries: Vec<Query>,
    /// The maintenance steps, in order.
    pub steps: Vec<UpdateStep>,
}

/// Derives update plans for mutating statements.
#[derive(Debug, Clone, Copy)]
pub struct UpdatePlanner<'a> {
    model: &'a Model,
}

impl<'a> UpdatePlanner<'a> {
    /// Creates an update planner over a model.
    #[must_use]
    pub const fn new(model: &'a Model) -> Self {
        Self { model }
    }

    /// Whether `statement` modifies entries of `index`.
    ///
    /// A statement modifies an index when the fields it writes (its settings
    /// for updates; every target-entity field for inserts and deletes)
    /// intersect the index's stored fields.
    #[must_use]
    pub fn modifies(&self, statement: &Statement, index: &Index) -> bool {
        match statement {
            Statement::Query(_) => false,
            Statement::Update(u) => {
                u.setting_fields().iter().any(|&f| index.contains(f))
            }
            Statement::Insert(i) => {
                let entity = self.model.entity(i.entity);
                i.setting_fields().iter().any(|&f| index.contains(f))
                    || (0..entity.fields.len())
                        .any(|ord| index.contains(FieldId::new(i.entity, ord as u32)))
            }
            Statement::Delete(d) => {
                let entity = self.model.entity(d.entity);
                (0..entity.fields.len())
                    .any(|ord| index.contains(FieldId::new(d.entity, ord as u32)))
            }
        }
    }

    /// The support queries `statement` needs to maintain `index`.
    ///
    /// One query per entity of the index path whose key fields are not
    /// already supplied by the statement; each runs over a path spliced from
    /// the index path (oriented from that entity to the statement target)
    /// and the statement's own path, under the statement's WHERE clause.
    ///
    /// # Errors
    ///
    /// Returns an error if a spliced path or derived query is invalid.
    pub fn support_queries(
        &self,
        statement: &Statement,
        index: &Index,
    ) -> PlanResult<Vec<Query>> {
        let (target, statement_path, conditions, given) = match statement {
            Statement::Query(_) => return Ok(Vec::new()),
            Statement::Update(u) => (
                u.entity,
                u.path.clone(),
                u.conditions.clone(),
                equality_fields(&u.conditions),
            ),
            Statement::Delete(d) => (
                d.entity,
                d.path.clone(),
                d.conditions.clone(),
                equality_fields(&d.conditions),
            ),
            Statement::Insert(i) => (
                i.entity,
                KeyPath::single(i.entity),
                Vec::new(),
                i.setting_fields(),
            ),
        };

        let Some(target_pos) = index.path.position(target) else {
            return Ok(Vec::new());
        };

        let mut queries = Vec::new();
        for (pos, &group) in index.path.entities().iter().enumerate() {
            // Inserts know no existing rows; they key parent groups by the
            // parent identifier carried in their foreign-key settings.
            let mut conditions = conditions.clone();
            if matches!(statement, Statement::Insert(_)) {
                if group == target {
                    // Every key value of the new row comes from the insert
                    // itself.
                } else {
                    conditions
                        .push(Condition::new(self.model.identifier(group), Operator::Eq, None));
                }
            }

            let supplied: BTreeSet<FieldId> = given
                .iter()
                .copied()
                .chain(equality_fields(&conditions))
                .collect();
            let required: BTreeSet<FieldId> = index
                .key_fields()
                .filter(|f| f.entity == group)
                .filter(|f| !supplied.contains(f))
                .collect();
            if required.is_empty() {
                continue;
            }

            let portion = if pos <= target_pos {
                index.path.segment(pos, target_pos - pos + 1)
            } else {
                index.path.segment(target_pos, pos - target_pos + 1).map(|p| p.reversed())
            };
            // Positions come from the path itself, so the segment exists.
            let Some(portion) = portion else { continue };
            let path = portion.splice(self.model, &statement_path)?;

            queries.push(Query::support(self.model, required, path, conditions)?);
        }
        Ok(queries)
    }

    /// The full maintenance plan of `statement` against `index`, or `None`
    /// when the statement does not modify it.
    ///
    /// Updates that rewrite any key field must remove the old entries before
    /// inserting; updates touching only extra columns upsert in place.
    ///
    /// # Errors
    ///
    /// Returns an error if support-query derivation fails.
    pub fn plan(
        &self,
        statement: &Statement,
        index: &Index,
    ) -> PlanResult<Option<UpdatePlan>> {
        if !self.modifies(statement, index) {
            return Ok(None);
        }
        let support_queries = self.support_queries(statement, index)?;
        let key = index.key().to_owned();

        let steps = match statement {
            Statement::Query(_) => return Ok(None),
            Statement::Insert(_) => {
                vec![UpdateStep::Insert { index_key: key.clone(), entries: 1.0 }]
            }
            Statement::Delete(d) => {
                let entries = self.affected_entries(index, &d.conditions);
                vec![UpdateStep::Delete { index_key: key.clone(), entries }]
            }
            Statement::Update(u) => {
                let entries = self.affected_entries(index, &u.conditions);
                let rewrites_keys =
                    u.setting_fields().iter().any(|f| index.key_fields().any(|k| k == *f));
                if rewrites_keys {
                    vec![
                        UpdateStep::Delete { index_key: key.clone(), entries },
                        UpdateStep::Insert { index_key: key.clone(), entries },
                    ]
                } else {
                    vec![UpdateStep::Insert { index_key: key.clone(), entries }]
                }
            }
        };

        Ok(Some(UpdatePlan { index_key: key, support_queries, steps }))
    }

    /// Estimated index entries touched by a mutation with these predicates.
    fn affected_entries(&self, index: &Index, conditions: &[Condition]) -> f64 {
        let mut entries = path_cardinality(self.model, &index.path);
        for cond in conditions {
            entries *= if cond.is_equality() {
                EQUALITY_SELECTIVITY
            } else if cond.is_range() {
                RANGE_SELECTIVITY
            } else {
                INEQUALITY_SELECTIVITY
            };
        }
        entries.max(1.0)
    }
}

fn equality_fields(conditions: &[Condition]) -> BTreeSet<FieldId> {
    conditions.iter().filter(|c| c.is_equality()).map(|c| c.field).collect()
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

    fn statement(model: &Model, text: &str) -> Statement {
        parse_statement(model, text).unwrap()
    }

    fn city_index(model: &Model) -> Index {
        let user = model.lookup_entity("User").unwrap();
        let city = model.lookup_field(user, "City").unwrap();
        let username = model.lookup_field(user, "Username").unwrap();
        Index::new(
            model,
            [city].into_iter().collect(),
            vec![model.identifier(user)],
            [username].into_iter().collect(),
            KeyPath::single(user),
        )
        .unwrap()
    }

    #[test]
    fn untouched_indexes_are_not_modified() {
        let model = model();
        let update = statement(&model, "UPDATE User SET City = ? WHERE User.UserId = ?");
        let tweet = model.lookup_entity("Tweet").unwrap();
        let tweet_simple = Index::simple(&model, tweet).unwrap();

        let planner = UpdatePlanner::new(&model);
        assert!(!planner.modifies(&update, &tweet_simple));
        assert!(planner.plan(&update, &tweet_simple).unwrap().is_none());
    }

    #[test]
    fn update_touching_extra_columns_upserts() {
        let model = model();
        let update = statement(&model, "UPDATE User SET Username = ? WHERE User.City = ?");
        let index = city_index(&model);

        let planner = UpdatePlanner::new(&model);
        let plan = planner.plan(&update, &index).unwrap().unwrap();
        assert!(matches!(plan.steps.as_slice(), [UpdateStep::Insert { .. }]));
    }

    #[test]
    fn update_rewriting_keys_deletes_then_inserts() {
        let model = model();
        let update = statement(&model, "UPDATE User SET City = ? WHERE User.Username = ?");
        let index = city_index(&model);

        let planner = UpdatePlanner::new(&model);
        let plan = planner.plan(&update, &index).unwrap().unwrap();
        assert!(matches!(
            plan.steps.as_slice(),
            [UpdateStep::Delete { .. }, UpdateStep::Insert { .. }]
        ));
    }

    #[test]
    fn support_query_fetches_missing_keys() {
        let model = model();
        let update = statement(&model, "UPDATE User SET Username = ? WHERE User.City = ?");
        let index = city_index(&model);

        let planner = UpdatePlanner::new(&model);
        let queries = planner.support_queries(&update, &index).unwrap();
        assert_eq!(queries.len(), 1);

        let user = model.lookup_entity("User").unwrap();
        let id = model.identifier(user);
        // The update supplies City; the support query must fetch the
        // remaining key, UserId.
        assert!(queries[0].select.contains(&id));
        assert_eq!(queries[0].conditions.len(), 1);
    }

    #[test]
    fn support_query_spans_the_index_path() {
        let model = model();
        let update = statement(&model, "UPDATE User SET Username = ? WHERE User.City = ?");

        let user = model.lookup_entity("User").unwrap();
        let tweet = model.lookup_entity("Tweet").unwrap();
        let username = model.lookup_field(user, "Username").unwrap();
        let body = model.lookup_field(tweet, "Body").unwrap();
        let path = KeyPath::new(&model, vec![user, tweet]).unwrap();
        let wide = Index::new(
            &model,
            [username].into_iter().collect(),
            vec![model.identifier(user), model.identifier(tweet)],
            [body].into_iter().collect(),
            path,
        )
        .unwrap();

        let planner = UpdatePlanner::new(&model);
        let queries = planner.support_queries(&update, &wide).unwrap();
        // One per entity group: User keys and Tweet keys.
        assert_eq!(queries.len(), 2);
        let tweet_group = queries
            .iter()
            .find(|q| q.select.contains(&model.identifier(tweet)))
            .unwrap();
        assert_eq!(tweet_group.path.entities(), &[tweet, user]);
    }

    #[test]
    fn insert_with_all_keys_needs_no_support_query() {
        let model = model();
        let insert =
            statement(&model, "INSERT INTO Tweet SET TweetId = ?, Body = ?, User = ?");
        let tweet = model.lookup_entity("Tweet").unwrap();
        let simple = Index::simple(&model, tweet).unwrap();

        let planner = UpdatePlanner::new(&model);
        let queries = planner.support_queries(&insert, &simple).unwrap();
        assert!(queries.is_empty());
    }

    #[test]
    fn insert_into_a_path_index_queries_the_parent() {
        let model = model();
        let insert =
            statement(&model, "INSERT INTO Tweet SET TweetId = ?, Body = ?, User = ?");

        let user = model.lookup_entity("User").unwrap();
        let tweet = model.lookup_entity("Tweet").unwrap();
        let city = model.lookup_field(user, "City").unwrap();
        let body = model.lookup_field(tweet, "Body").unwrap();
        let path = KeyPath::new(&model, vec![user, tweet]).unwrap();
        let wide = Index::new(
            &model,
            [city].into_iter().collect(),
            vec![model.identifier(user), model.identifier(tweet)],
            [body].into_iter().collect(),
            path,
        )
        .unwrap();

        let planner = UpdatePlanner::new(&model);
        let queries = planner.support_queries(&insert, &wide).unwrap();
        // The User group's City and UserId are not in the insert; they are
        // fetched by the parent's identifier.
        assert_eq!(queries.len(), 1);
        assert!(queries[0].select.contains(&city));
        assert_eq!(queries[0].conditions.len(), 1);
        assert_eq!(queries[0].conditions[0].field, model.identifier(user));
    }
}
