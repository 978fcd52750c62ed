//! Property-based tests for enumeration and planning invariants.

#![allow(clippy::expect_used)]

use std::collections::BTreeSet;

use proptest::prelude::*;

use keystone_model::{Cardinality, EntityDef, FieldId, KeyPath, Model, ModelBuilder};
use keystone_query::{Condition, Operator, Query};

use crate::cost::EntryCountCost;
use crate::enumerator::IndexEnumerator;
use crate::index::Index;
use crate::planner::QueryPlanner;

fn model() -> Model {
    ModelBuilder::new()
        .entity(
            EntityDef::new("User", 100)
                .id("UserId")
                .string("City", 20)
                .string("Username", 30)
                .integer("Karma"),
        )
        .entity(
            EntityDef::new("Tweet", 1000)
                .id("TweetId")
                .string("Body", 140)
                .integer("Likes")
                .foreign_key("User", "User", Cardinality::One),
        )
        .build()
        .expect("model builds")
}

/// Non-key scalar fields of an entity, by name.
fn fields(model: &Model, entity: &str, names: &[&str]) -> Vec<FieldId> {
    let e = model.lookup_entity(entity).expect("entity");
    names
        .iter()
        .map(|n| model.lookup_field(e, n).expect("field"))
        .collect()
}

/// Strategy producing a valid query over the fixed model.
///
/// Queries select at least one non-key field, predicate at least one other
/// field by equality, and optionally add a range predicate and ORDER BY.
fn arb_query(model: Model) -> impl Strategy<Value = Query> {
    let user_path = {
        let user = model.lookup_entity("User").expect("entity");
        KeyPath::single(user)
    };
    let tweet_user_path = {
        let user = model.lookup_entity("User").expect("entity");
        let tweet = model.lookup_entity("Tweet").expect("entity");
        KeyPath::new(&model, vec![tweet, user]).expect("path")
    };

    (any::<bool>(), any::<bool>(), any::<bool>(), 0usize..3)
        .prop_map(move |(long_path, with_range, with_order, eq_choice)| {
            let (path, select_pool, eq_pool) = if long_path {
                (
                    tweet_user_path.clone(),
                    fields(&model, "Tweet", &["Body", "Likes"]),
                    fields(&model, "User", &["City", "Username", "Karma"]),
                )
            } else {
                (
                    user_path.clone(),
                    fields(&model, "User", &["Username"]),
                    fields(&model, "User", &["City", "Karma"]),
                )
            };

            let eq_field = eq_pool[eq_choice % eq_pool.len()];
            let mut conditions = vec![Condition::new(eq_field, Operator::Eq, None)];
            let range_field = fields(&model, "User", &["Karma"])[0];
            if with_range && range_field != eq_field {
                conditions.push(Condition::new(range_field, Operator::Gt, None));
            }

            let select: BTreeSet<FieldId> = select_pool.into_iter().collect();
            let order_by = if with_order {
                fields(&model, "User", &["Username"])
                    .into_iter()
                    .filter(|f| *f != eq_field)
                    .collect()
            } else {
                Vec::new()
            };

            Query::new(&model, select, path, conditions, order_by, None)
                .expect("generated query is valid")
        })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Equality fields on a candidate's path are answerable from its hash
    /// fields or stored columns.
    #[test]
    fn equality_fields_are_covered(query in arb_query(model())) {
        let model = model();
        let candidates = IndexEnumerator::new(&model)
            .indexes_for_query(&query)
            .expect("enumeration succeeds");

        for index in &candidates {
            for field in query.equality_fields() {
                if !index.path.contains(field.entity) {
                    continue;
                }
                prop_assert!(
                    index.hash_fields.contains(&field)
                        || index.order_fields.contains(&field)
                        || index.extra.contains(&field),
                    "equality field not covered by {}",
                    index.describe(&model)
                );
            }
        }
    }

    /// No candidate has empty hash fields, and none is all keys with no
    /// payload.
    #[test]
    fn candidates_are_never_degenerate(query in arb_query(model())) {
        let model = model();
        let candidates = IndexEnumerator::new(&model)
            .indexes_for_query(&query)
            .expect("enumeration succeeds");

        for index in &candidates {
            prop_assert!(!index.hash_fields.is_empty());
            prop_assert!(
                !index.order_fields.is_empty() || !index.extra.is_empty(),
                "degenerate candidate {}",
                index.describe(&model)
            );
        }
    }

    /// The materialized view is always among a query's candidates.
    #[test]
    fn view_is_always_enumerated(query in arb_query(model())) {
        let model = model();
        let candidates = IndexEnumerator::new(&model)
            .indexes_for_query(&query)
            .expect("enumeration succeeds");
        let view = Index::materialized_view(&model, &query).expect("view exists");
        prop_assert!(candidates.contains(&view));
    }

    /// Any index set containing the materialized view admits a plan.
    #[test]
    fn view_guarantees_a_plan(query in arb_query(model())) {
        let model = model();
        let view = Index::materialized_view(&model, &query).expect("view exists");
        let cost_model = EntryCountCost;
        let planner = QueryPlanner::new(&model, &cost_model);
        let plans = planner.best_plans(&query, &[view]).expect("view admits a plan");
        prop_assert!(!plans.is_empty());
    }

    /// Removing an index never improves the chosen plan.
    #[test]
    fn more_indexes_never_cost_more(query in arb_query(model())) {
        let model = model();
        let candidates = IndexEnumerator::new(&model)
            .indexes_for_query(&query)
            .expect("enumeration succeeds");
        let cost_model = EntryCountCost;
        let planner = QueryPlanner::new(&model, &cost_model);
        let full = planner.best_plans(&query, &candidates).expect("full set plans");

        for skip in 0..candidates.len() {
            let reduced: Vec<Index> = candidates
                .iter()
                .enumerate()
                .filter(|(i, _)| *i != skip)
                .map(|(_, index)| index.clone())
                .collect();
            if let Ok(plans) = planner.best_plans(&query, &reduced) {
                prop_assert!(full[0].cost <= plans[0].cost + 1e-9);
            }
        }
    }
}
