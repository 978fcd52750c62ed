//! Recommendation descriptors: the advisor's serializable output.

use serde::{Deserialize, Serialize};

use keystone_model::Model;
use keystone_plan::{Index, QueryPlan, UpdatePlan, UpdateStep};

/// A chosen index, described by names rather than handles.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexDescriptor {
    /// The index's stable key.
    pub key: String,
    /// Hash (partition) key fields, as `Entity.Field`.
    pub hash: Vec<String>,
    /// Ordered cluster key fields.
    pub order: Vec<String>,
    /// Extra stored columns.
    pub extra: Vec<String>,
    /// The path's entity names.
    pub path: Vec<String>,
    /// Expected entries.
    pub entries: f64,
    /// Expected size in bytes.
    pub size: f64,
}

impl IndexDescriptor {
    /// Describes an index against its model.
    #[must_use]
    pub fn new(model: &Model, index: &Index) -> Self {
        Self {
            key: index.key().to_owned(),
            hash: index.hash_fields.iter().map(|&f| model.field_name(f)).collect(),
            order: index.order_fields.iter().map(|&f| model.field_name(f)).collect(),
            extra: index.extra.iter().map(|&f| model.field_name(f)).collect(),
            path: index
                .path
                .entities()
                .iter()
                .map(|&e| model.entity(e).name.clone())
                .collect(),
            entries: index.entries,
            size: index.size,
        }
    }
}

/// The chosen plan for one query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRecommendation {
    /// The statement text.
    pub statement: String,
    /// The statement's weight under the active mix (step 0 for
    /// time-dependent workloads).
    pub weight: f64,
    /// Cost of the chosen plan.
    pub cost: f64,
    /// The plan's steps, rendered.
    pub steps: Vec<String>,
    /// Keys of the indexes the plan reads.
    pub index_keys: Vec<String>,
}

impl QueryRecommendation {
    /// Describes a chosen plan.
    #[must_use]
    pub fn new(model: &Model, statement: String, weight: f64, plan: &QueryPlan) -> Self {
        Self {
            statement,
            weight,
            cost: plan.cost,
            steps: plan.steps.iter().map(|s| s.describe(model)).collect(),
            index_keys: plan.index_keys(),
        }
    }
}

/// How one mutating statement maintains one chosen index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRecommendation {
    /// The statement text.
    pub statement: String,
    /// The maintained index.
    pub index_key: String,
    /// Maintenance cost (support queries plus steps).
    pub cost: f64,
    /// Support queries, rendered.
    pub support_queries: Vec<String>,
    /// Insert/delete steps, rendered.
    pub steps: Vec<String>,
}

impl UpdateRecommendation {
    /// Describes an update plan.
    #[must_use]
    pub fn new(model: &Model, statement: String, plan: &UpdatePlan, cost: f64) -> Self {
        Self {
            statement,
            index_key: plan.index_key.clone(),
            cost,
            support_queries: plan
                .support_queries
                .iter()
                .map(|q| q.display(model))
                .collect(),
            steps: plan
                .steps
                .iter()
                .map(|s| match s {
                    UpdateStep::Insert { index_key, entries } => {
                        format!("insert {entries:.0} entries into {index_key}")
                    }
                    UpdateStep::Delete { index_key, entries } => {
                        format!("delete {entries:.0} entries from {index_key}")
                    }
                })
                .collect(),
        }
    }
}

/// The advisor's result: chosen indexes and per-statement plans.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Objective value of the selection.
    pub objective: f64,
    /// Total size of the chosen indexes in bytes.
    pub total_size: f64,
    /// The chosen indexes, in key order.
    pub indexes: Vec<IndexDescriptor>,
    /// The chosen plan per query, in workload order.
    pub queries: Vec<QueryRecommendation>,
    /// Maintenance plans per (mutation, chosen index) pair.
    pub updates: Vec<UpdateRecommendation>,
    /// Chosen index keys per time step, present only for time-dependent
    /// workloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Vec<Vec<String>>>,
    /// Whether a deadline cut the search short of proving optimality.
    pub timed_out: bool,
}
