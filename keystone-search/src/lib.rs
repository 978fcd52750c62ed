//! Keystone Search
//!
//! Schema selection for the Keystone advisor: given candidate indexes with
//! sizes, candidate plans with costs, and update maintenance costs, choose
//! which indexes to materialize and which plan each query runs, minimizing
//! weighted cost under a storage budget.
//!
//! # Overview
//!
//! The selection is a 0/1 mixed-integer linear program:
//!
//! - `x_i`: index `i` is materialized
//! - `y_{q,p}`: query `q` runs plan `p`
//! - `u_{m,i}`: mutation `m` pays maintenance on index `i`
//!
//! subject to: exactly one plan per query; a plan only over materialized
//! indexes; maintenance paid for every materialized index a mutation
//! touches; and total size within the budget. Time-dependent workloads
//! replicate the program per time step.
//!
//! The program speaks to its solver through the small [`Solver`] trait;
//! [`BranchBound`] is the bundled exact engine. Construction is
//! deterministic: candidates are ordered by key and ties are broken by
//! smallest total size, then lexicographically by chosen keys.

pub mod bb;
pub mod error;
pub mod problem;
pub mod solver;

pub use bb::BranchBound;
pub use error::{NoSolutionKind, SearchError, SearchResult};
pub use problem::{
    CandidateIndex, CandidatePlan, QueryPlanSet, SchemaProblem, Selection, UpdateCost,
};
pub use solver::{Constraint, ConstraintSense, LinearExpr, Solution, SolveError, Solver, VarId};
