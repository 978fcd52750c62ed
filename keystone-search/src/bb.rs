//! An exact 0/1 branch-and-bound engine.

use std::time::Instant;

use tracing::debug;

use crate::solver::{
    Constraint, ConstraintSense, LinearExpr, Solution, SolveError, Solver, TieBreak, VarId,
};

const FEAS_EPSILON: f64 = 1e-6;
const TIE_EPSILON: f64 = 1e-6;
const DEADLINE_CHECK_INTERVAL: u64 = 4096;

/// Depth-first branch-and-bound over binary variables.
///
/// Each constraint keeps an interval of achievable left-hand-side values
/// given the fixed prefix; a branch is pruned as soon as any interval
/// excludes the right-hand side, or its objective lower bound exceeds the
/// incumbent. Equal-objective incumbents are ordered by the installed
/// tie-break comparator, so results are deterministic.
#[derive(Default)]
pub struct BranchBound {
    names: Vec<String>,
    constraints: Vec<Constraint>,
    objective: LinearExpr,
    tie_break: Option<TieBreak>,
}

impl BranchBound {
    /// Creates an empty program.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Solver for BranchBound {
    fn add_var(&mut self, name: &str) -> VarId {
        self.names.push(name.to_owned());
        VarId::new(self.names.len() - 1)
    }

    fn add_constraint(&mut self, constraint: Constraint) {
        self.constraints.push(constraint);
    }

    fn set_objective(&mut self, objective: LinearExpr) {
        self.objective = objective;
    }

    fn set_tie_break(&mut self, compare: TieBreak) {
        self.tie_break = Some(compare);
    }

    fn solve(&mut self, deadline: Option<Instant>) -> Result<Solution, SolveError> {
        let n = self.names.len();
        let mut objective = vec![0.0; n];
        for &(var, coefficient) in &self.objective.terms {
            objective[var.index()] += coefficient;
        }

        let mut rows: Vec<Row> = Vec::with_capacity(self.constraints.len());
        let mut var_rows: Vec<Vec<(usize, f64)>> = vec![Vec::new(); n];
        for constraint in &self.constraints {
            let mut row = Row {
                sense: constraint.sense,
                rhs: constraint.rhs,
                fixed: 0.0,
                free_neg: 0.0,
                free_pos: 0.0,
            };
            let index = rows.len();
            for &(var, coefficient) in &constraint.expr.terms {
                row.free_neg += coefficient.min(0.0);
                row.free_pos += coefficient.max(0.0);
                var_rows[var.index()].push((index, coefficient));
            }
            rows.push(row);
        }

        let obj_free_neg = objective.iter().map(|c| c.min(0.0)).sum();
        let mut search = Search {
            rows,
            var_rows,
            objective,
            assignment: vec![0.0; n],
            obj_fixed: 0.0,
            obj_free_neg,
            best: None,
            tie_break: self.tie_break.as_ref(),
            deadline,
            nodes: 0,
            timed_out: false,
        };
        search.dfs(0);

        debug!(nodes = search.nodes, timed_out = search.timed_out, "branch-and-bound done");
        match (search.best, search.timed_out) {
            (Some((objective, values)), timed_out) => {
                Ok(Solution { values, objective, timed_out })
            }
            (None, true) => Err(SolveError::Timeout),
            (None, false) => Err(SolveError::Infeasible),
        }
    }
}

struct Row {
    sense: ConstraintSense,
    rhs: f64,
    fixed: f64,
    free_neg: f64,
    free_pos: f64,
}

impl Row {
    fn feasible(&self) -> bool {
        let lo = self.fixed + self.free_neg;
        let hi = self.fixed + self.free_pos;
        match self.sense {
            ConstraintSense::Le => lo <= self.rhs + FEAS_EPSILON,
            ConstraintSense::Ge => hi >= self.rhs - FEAS_EPSILON,
            ConstraintSense::Eq => {
                lo <= self.rhs + FEAS_EPSILON && hi >= self.rhs - FEAS_EPSILON
            }
        }
    }
}

struct Search<'a> {
    rows: Vec<Row>,
    var_rows: Vec<Vec<(usize, f64)>>,
    objective: Vec<f64>,
    assignment: Vec<f64>,
    obj_fixed: f64,
    obj_free_neg: f64,
    best: Option<(f64, Vec<f64>)>,
    tie_break: Option<&'a TieBreak>,
    deadline: Option<Instant>,
    nodes: u64,
    timed_out: bool,
}

impl Search<'_> {
    fn dfs(&mut self, depth: usize) {
        if self.timed_out {
            return;
        }
        self.nodes += 1;
        if self.nodes % DEADLINE_CHECK_INTERVAL == 0
            && self.deadline.is_some_and(|d| Instant::now() >= d)
        {
            self.timed_out = true;
            return;
        }

        // Lower bound on any completion of this prefix. Without a tie-break
        // only strict improvements matter, so equal-cost branches are cut;
        // with one installed, ties must be visited to be compared.
        if let Some((best, _)) = &self.best {
            let bound = self.obj_fixed + self.obj_free_neg;
            let prune = if self.tie_break.is_some() {
                bound > best + TIE_EPSILON
            } else {
                bound > best - TIE_EPSILON
            };
            if prune {
                return;
            }
        }

        if depth == self.assignment.len() {
            self.record();
            return;
        }

        for value in [0.0, 1.0] {
            if self.assign(depth, value) {
                self.dfs(depth + 1);
            }
            self.unassign(depth, value);
        }
    }

    fn record(&mut self) {
        let objective = self.obj_fixed;
        let replace = match &self.best {
            None => true,
            Some((best, values)) => {
                if objective < best - TIE_EPSILON {
                    true
                } else if (objective - best).abs() <= TIE_EPSILON {
                    self.tie_break.is_some_and(|compare| {
                        compare(&self.assignment, values) == std::cmp::Ordering::Less
                    })
                } else {
                    false
                }
            }
        };
        if replace {
            self.best = Some((objective, self.assignment.clone()));
        }
    }

    fn assign(&mut self, var: usize, value: f64) -> bool {
        self.assignment[var] = value;
        let coefficient = self.objective[var];
        self.obj_fixed += coefficient * value;
        self.obj_free_neg -= coefficient.min(0.0);

        let mut feasible = true;
        for k in 0..self.var_rows[var].len() {
            let (row, coefficient) = self.var_rows[var][k];
            let entry = &mut self.rows[row];
            entry.fixed += coefficient * value;
            entry.free_neg -= coefficient.min(0.0);
            entry.free_pos -= coefficient.max(0.0);
            if !entry.feasible() {
                feasible = false;
            }
        }
        feasible
    }

    fn unassign(&mut self, var: usize, value: f64) {
        let coefficient = self.objective[var];
        self.obj_fixed -= coefficient * value;
        self.obj_free_neg += coefficient.min(0.0);

        for k in 0..self.var_rows[var].len() {
            let (row, coefficient) = self.var_rows[var][k];
            let entry = &mut self.rows[row];
            entry.fixed -= coefficient * value;
            entry.free_neg += coefficient.min(0.0);
            entry.free_pos += coefficient.max(0.0);
        }
    }
}
