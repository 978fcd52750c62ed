//! Abstract execution states for the plan search.

use std::collections::BTreeSet;

use keystone_model::{FieldId, KeyPath, Model};
use keystone_query::Query;

/// The planner's progress toward satisfying a query.
///
/// States are expanded by plan steps during the best-first search. Identity
/// for the closed set is structural over everything except the cardinality
/// estimate (see [`ExecutionState::fingerprint`]).
#[derive(Debug, Clone)]
pub struct ExecutionState {
    /// Fields of equality-class predicates (`=` and `!=`) satisfied so far.
    pub eq_satisfied: BTreeSet<FieldId>,
    /// Whether the range predicate is satisfied (vacuously true without one).
    pub range_satisfied: bool,
    /// Whether the required order holds (vacuously true without ORDER BY).
    pub order_satisfied: bool,
    /// Whether a LIMIT step has been applied (vacuously true without LIMIT).
    pub limit_applied: bool,
    /// Fields fetched by the lookups so far.
    pub fields_available: BTreeSet<FieldId>,
    /// Entities of the planning path covered so far.
    pub path_covered: usize,
    /// Estimated number of rows in hand.
    pub cardinality: f64,
}

/// Structural identity of a state, excluding the cardinality estimate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StateKey {
    eq_satisfied: BTreeSet<FieldId>,
    range_satisfied: bool,
    order_satisfied: bool,
    limit_applied: bool,
    fields_available: BTreeSet<FieldId>,
    path_covered: usize,
}

impl ExecutionState {
    /// The initial state for a query planned along `path`.
    #[must_use]
    pub fn initial(model: &Model, query: &Query, path: &KeyPath) -> Self {
        Self {
            eq_satisfied: BTreeSet::new(),
            range_satisfied: query.range_condition().is_none(),
            order_satisfied: query.order_by.is_empty(),
            limit_applied: query.limit.is_none(),
            fields_available: BTreeSet::new(),
            path_covered: 0,
            cardinality: model.entity(path.first()).count as f64,
        }
    }

    /// Whether every goal of the query is met.
    #[must_use]
    pub fn is_terminal(&self, query: &Query) -> bool {
        self.range_satisfied
            && self.order_satisfied
            && self.limit_applied
            && query
                .conditions
                .iter()
                .filter(|c| !c.is_range())
                .all(|c| self.eq_satisfied.contains(&c.field))
            && query.select.iter().all(|f| self.fields_available.contains(f))
    }

    /// Whether everything except the limit is met.
    #[must_use]
    pub fn is_pre_terminal(&self, query: &Query) -> bool {
        self.range_satisfied
            && self.order_satisfied
            && query
                .conditions
                .iter()
                .filter(|c| !c.is_range())
                .all(|c| self.eq_satisfied.contains(&c.field))
            && query.select.iter().all(|f| self.fields_available.contains(f))
    }

    /// The structural identity used by the search's closed set.
    #[must_use]
    pub fn fingerprint(&self) -> StateKey {
        StateKey {
            eq_satisfied: self.eq_satisfied.clone(),
            range_satisfied: self.range_satisfied,
            order_satisfied: self.order_satisfied,
            limit_applied: self.limit_applied,
            fields_available: self.fields_available.clone(),
            path_covered: self.path_covered,
        }
    }
}
