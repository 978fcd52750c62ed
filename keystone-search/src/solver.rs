//! The thin interface between the selection program and a MILP engine.

use std::cmp::Ordering;
use std::time::Instant;

use thiserror::Error;

/// Handle to a binary decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VarId(usize);

impl VarId {
    /// Creates a handle from a raw index.
    #[must_use]
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    /// The raw variable index.
    #[must_use]
    pub const fn index(self) -> usize {
        self.0
    }
}

/// A linear combination of variables.
#[derive(Debug, Clone, Default)]
pub struct LinearExpr {
    /// The (variable, coefficient) terms.
    pub terms: Vec<(VarId, f64)>,
}

impl LinearExpr {
    /// Creates an empty expression.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a term.
    #[must_use]
    pub fn term(mut self, var: VarId, coefficient: f64) -> Self {
        self.terms.push((var, coefficient));
        self
    }

    /// Adds a term in place.
    pub fn push(&mut self, var: VarId, coefficient: f64) {
        self.terms.push((var, coefficient));
    }
}

/// Direction of a linear constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstraintSense {
    /// `expr <= rhs`
    Le,
    /// `expr >= rhs`
    Ge,
    /// `expr = rhs`
    Eq,
}

/// A linear constraint over binary variables.
#[derive(Debug, Clone)]
pub struct Constraint {
    /// Left-hand side.
    pub expr: LinearExpr,
    /// Comparison direction.
    pub sense: ConstraintSense,
    /// Right-hand side.
    pub rhs: f64,
}

impl Constraint {
    /// `expr <= rhs`
    #[must_use]
    pub const fn le(expr: LinearExpr, rhs: f64) -> Self {
        Self { expr, sense: ConstraintSense::Le, rhs }
    }

    /// `expr >= rhs`
    #[must_use]
    pub const fn ge(expr: LinearExpr, rhs: f64) -> Self {
        Self { expr, sense: ConstraintSense::Ge, rhs }
    }

    /// `expr = rhs`
    #[must_use]
    pub const fn eq(expr: LinearExpr, rhs: f64) -> Self {
        Self { expr, sense: ConstraintSense::Eq, rhs }
    }
}

/// A feasible assignment with its objective value.
#[derive(Debug, Clone)]
pub struct Solution {
    /// Value of each variable, in [`VarId`] order.
    pub values: Vec<f64>,
    /// Objective value of the assignment.
    pub objective: f64,
    /// Whether the search stopped at the deadline with this incumbent.
    pub timed_out: bool,
}

impl Solution {
    /// The value of one variable.
    #[must_use]
    pub fn value(&self, var: VarId) -> f64 {
        self.values[var.index()]
    }
}

/// Errors a solver can return.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum SolveError {
    /// No assignment satisfies the constraints.
    #[error("infeasible")]
    Infeasible,

    /// The deadline expired before any feasible assignment was found.
    #[error("timed out")]
    Timeout,
}

/// Comparator preferring one equal-objective solution over another.
pub type TieBreak = Box<dyn Fn(&[f64], &[f64]) -> Ordering + Send + Sync>;

/// A 0/1 MILP engine.
///
/// The selection program drives any implementation through this interface:
/// declare variables, add constraints, set the minimization objective, and
/// solve. Variable order is the order of [`Solver::add_var`] calls, which
/// makes construction deterministic.
pub trait Solver {
    /// Declares a binary variable and returns its handle.
    fn add_var(&mut self, name: &str) -> VarId;

    /// Adds a constraint.
    fn add_constraint(&mut self, constraint: Constraint);

    /// Sets the minimization objective.
    fn set_objective(&mut self, objective: LinearExpr);

    /// Installs a comparator that orders solutions with equal objectives.
    fn set_tie_break(&mut self, compare: TieBreak);

    /// Solves the program, optionally bounded by a wall-clock deadline.
    ///
    /// On deadline expiry the best incumbent is returned with
    /// [`Solution::timed_out`] set, or [`SolveError::Timeout`] if none was
    /// found.
    ///
    /// # Errors
    ///
    /// [`SolveError::Infeasible`] when no assignment satisfies the
    /// constraints.
    fn solve(&mut self, deadline: Option<Instant>) -> Result<Solution, SolveError>;
}
