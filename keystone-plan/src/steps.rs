//! Plan steps and complete query plans.

use std::collections::BTreeSet;

use keystone_model::{FieldId, Model};

use crate::index::Index;

/// One step of a query execution plan.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanStep {
    /// Fetch rows from an index, keyed by equality fields and optionally
    /// bounded by a range predicate on a cluster key.
    IndexLookup {
        /// The index looked up.
        index: Index,
        /// Equality fields binding the hash key.
        eq_fields: BTreeSet<FieldId>,
        /// Range-bounded cluster key, if the lookup applies the range.
        range_field: Option<FieldId>,
        /// Cluster keys whose order the lookup yields, when it satisfies
        /// the query's ORDER BY.
        order_fields: Vec<FieldId>,
    },
    /// Apply remaining predicates in memory.
    Filter {
        /// Equality-class fields filtered here.
        equality: BTreeSet<FieldId>,
        /// Range field filtered here, if any.
        range: Option<FieldId>,
    },
    /// Sort rows in memory.
    Sort {
        /// Sort fields, in order.
        fields: Vec<FieldId>,
    },
    /// Truncate to the query limit.
    Limit {
        /// Row limit.
        count: u64,
    },
}

impl PlanStep {
    /// The index this step reads, if it is a lookup.
    #[must_use]
    pub const fn index(&self) -> Option<&Index> {
        match self {
            Self::IndexLookup { index, .. } => Some(index),
            _ => None,
        }
    }

    /// Renders the step for logs and descriptors.
    #[must_use]
    pub fn describe(&self, model: &Model) -> String {
        let names = |fields: &[FieldId]| {
            fields.iter().map(|&f| model.field_name(f)).collect::<Vec<_>>().join(", ")
        };
        match self {
            Self::IndexLookup { index, eq_fields, range_field, .. } => {
                let eq: Vec<FieldId> = eq_fields.iter().copied().collect();
                let mut text = format!("lookup {} by [{}]", index.key(), names(&eq));
                if let Some(range) = range_field {
                    text.push_str(&format!(" range {}", model.field_name(*range)));
                }
                text
            }
            Self::Filter { equality, range } => {
                let eq: Vec<FieldId> = equality.iter().copied().collect();
                let mut text = format!("filter [{}]", names(&eq));
                if let Some(range) = range {
                    text.push_str(&format!(" range {}", model.field_name(*range)));
                }
                text
            }
            Self::Sort { fields } => format!("sort [{}]", names(fields)),
            Self::Limit { count } => format!("limit {count}"),
        }
    }
}

/// A complete plan for one query: an ordered step list and its total cost.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryPlan {
    /// The steps, in execution order.
    pub steps: Vec<PlanStep>,
    /// Total cost under the planning cost model.
    pub cost: f64,
}

impl QueryPlan {
    /// Keys of the indexes this plan reads, in step order.
    #[must_use]
    pub fn index_keys(&self) -> Vec<String> {
        self.steps
            .iter()
            .filter_map(|s| s.index().map(|i| i.key().to_owned()))
            .collect()
    }

    /// Renders the plan as one line per step.
    #[must_use]
    pub fn describe(&self, model: &Model) -> String {
        self.steps.iter().map(|s| s.describe(model)).collect::<Vec<_>>().join(" | ")
    }

    /// A stable key for deterministic ordering among equal-cost plans.
    #[must_use]
    pub fn ordering_key(&self, model: &Model) -> (usize, String) {
        (self.steps.len(), self.describe(model))
    }
}
