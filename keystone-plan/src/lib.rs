//! Keystone Plan
//!
//! Candidate index enumeration and statement planning for the Keystone
//! schema advisor.
//!
//! # Overview
//!
//! The planning layer sits between the workload and the schema search:
//!
//! - [`Index`] describes a materialized column family: hash keys, ordered
//!   cluster keys, and extra columns over a foreign-key path.
//! - [`IndexEnumerator`] generates the candidate indexes a query (or a whole
//!   workload, including the support queries of its mutations) could use.
//! - [`QueryPlanner`] searches for the cheapest sequences of plan steps that
//!   answer a query from a given index set.
//! - [`UpdatePlanner`] pairs each mutating statement with the support
//!   queries and insert/delete steps needed to maintain each affected index.
//! - [`CostModel`] prices individual plan steps; two reference models are
//!   provided.
//!
//! All planning inputs are immutable; planners borrow them and return new
//! values.

pub mod cost;
pub mod enumerator;
pub mod error;
pub mod index;
pub mod planner;
pub mod state;
pub mod steps;
pub mod update;

#[cfg(test)]
mod proptest_tests;

pub use cost::{CostModel, CostModelKind, EntryCountCost, FieldSizeCost};
pub use enumerator::IndexEnumerator;
pub use error::{IndexError, PlanError, PlanResult};
pub use index::Index;
pub use planner::QueryPlanner;
pub use state::ExecutionState;
pub use steps::{PlanStep, QueryPlan};
pub use update::{UpdatePlan, UpdatePlanner, UpdateStep};
