//! Pluggable step cost models.

use serde::{Deserialize, Serialize};

use keystone_model::Model;

use crate::index::Index;

/// Assumed fraction of rows surviving an equality predicate.
pub const EQUALITY_SELECTIVITY: f64 = 0.01;
/// Assumed fraction of rows surviving a range predicate.
pub const RANGE_SELECTIVITY: f64 = 0.3;
/// Assumed fraction of rows surviving an inequality predicate.
pub const INEQUALITY_SELECTIVITY: f64 = 0.5;

/// Prices individual plan steps.
///
/// Costs are non-negative and additive across the steps of a plan; statement
/// weights are applied later, when plan costs are aggregated into the
/// selection problem.
pub trait CostModel: Send + Sync {
    /// Cost of probing `index` once per input row and reading the output
    /// rows.
    fn lookup_cost(&self, model: &Model, index: &Index, input_rows: f64, output_rows: f64)
        -> f64;

    /// Cost of filtering rows in memory.
    fn filter_cost(&self, rows: f64) -> f64;

    /// Cost of sorting rows in memory.
    fn sort_cost(&self, rows: f64) -> f64;

    /// Cost of truncating to a limit. Free by default.
    fn limit_cost(&self) -> f64 {
        0.0
    }

    /// Cost of writing `entries` new entries into `index`.
    fn insert_cost(&self, model: &Model, index: &Index, entries: f64) -> f64;

    /// Cost of removing `entries` entries from `index`.
    fn delete_cost(&self, model: &Model, index: &Index, entries: f64) -> f64;

    /// The model's name, used in logs and output.
    fn name(&self) -> &'static str;
}

/// Reference cost model: cost is proportional to rows touched.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryCountCost;

impl CostModel for EntryCountCost {
    fn lookup_cost(
        &self,
        _model: &Model,
        _index: &Index,
        input_rows: f64,
        output_rows: f64,
    ) -> f64 {
        input_rows.max(1.0) + output_rows
    }

    fn filter_cost(&self, rows: f64) -> f64 {
        rows * 0.1
    }

    fn sort_cost(&self, rows: f64) -> f64 {
        if rows <= 1.0 {
            return 0.0;
        }
        rows * rows.log2()
    }

    fn insert_cost(&self, _model: &Model, _index: &Index, entries: f64) -> f64 {
        entries.max(1.0)
    }

    fn delete_cost(&self, _model: &Model, _index: &Index, entries: f64) -> f64 {
        entries.max(1.0)
    }

    fn name(&self) -> &'static str {
        "entry_count"
    }
}

/// Reference cost model: cost is proportional to bytes read and written.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldSizeCost;

impl CostModel for FieldSizeCost {
    fn lookup_cost(
        &self,
        _model: &Model,
        index: &Index,
        input_rows: f64,
        output_rows: f64,
    ) -> f64 {
        input_rows.max(1.0) + output_rows * index.entry_size as f64
    }

    fn filter_cost(&self, rows: f64) -> f64 {
        rows * 0.1
    }

    fn sort_cost(&self, rows: f64) -> f64 {
        if rows <= 1.0 {
            return 0.0;
        }
        rows * rows.log2()
    }

    fn insert_cost(&self, _model: &Model, index: &Index, entries: f64) -> f64 {
        entries.max(1.0) * index.entry_size as f64
    }

    fn delete_cost(&self, model: &Model, index: &Index, entries: f64) -> f64 {
        // Deletes only move key bytes.
        entries.max(1.0) * index.key_size(model) as f64
    }

    fn name(&self) -> &'static str {
        "field_size"
    }
}

/// Which reference cost model to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CostModelKind {
    /// Rows touched.
    #[default]
    EntryCount,
    /// Bytes moved.
    FieldSize,
}

impl CostModelKind {
    /// Instantiates the chosen model.
    #[must_use]
    pub fn instantiate(self) -> Box<dyn CostModel> {
        match self {
            Self::EntryCount => Box::new(EntryCountCost),
            Self::FieldSize => Box::new(FieldSizeCost),
        }
    }
}
