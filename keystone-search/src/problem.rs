//! The schema-selection program.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;

use tracing::{debug, info};

use crate::error::{NoSolutionKind, SearchError, SearchResult};
use crate::solver::{Constraint, LinearExpr, Solver, VarId};

/// A candidate index as the selection sees it: its stable key and size.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateIndex {
    /// The index's stable key.
    pub key: String,
    /// Expected size in bytes.
    pub size: f64,
}

/// One candidate plan for a query: its cost and the indexes it reads.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidatePlan {
    /// Plan cost under the planning cost model.
    pub cost: f64,
    /// Keys of the indexes the plan reads.
    pub index_keys: Vec<String>,
}

/// All candidate plans of one query, with its per-step weights.
#[derive(Debug, Clone)]
pub struct QueryPlanSet {
    /// Position of the query's statement in the workload.
    pub statement_index: usize,
    /// Weight per time step (a single entry when not time-dependent).
    pub weights: Vec<f64>,
    /// The candidate plans, in deterministic order.
    pub plans: Vec<CandidatePlan>,
}

/// Maintenance cost of one mutating statement against one index.
#[derive(Debug, Clone)]
pub struct UpdateCost {
    /// Position of the mutating statement in the workload.
    pub statement_index: usize,
    /// The maintained index.
    pub index_key: String,
    /// Weight per time step.
    pub weights: Vec<f64>,
    /// Cost of support queries plus maintenance steps.
    pub cost: f64,
}

/// The chosen schema and plan assignment.
#[derive(Debug, Clone)]
pub struct Selection {
    /// Chosen index keys per time step, in key order.
    pub chosen: Vec<Vec<String>>,
    /// Chosen plan position per query, per time step.
    pub plan_choice: Vec<Vec<usize>>,
    /// Objective value of the selection.
    pub objective: f64,
    /// Total chosen size per time step.
    pub total_size: Vec<f64>,
    /// Whether the deadline cut the search short of proving optimality.
    pub timed_out: bool,
}

/// Builds and solves the index-selection MILP.
///
/// Construction is deterministic: candidates must arrive sorted by key, and
/// ties between equal-objective selections are broken by smallest total size
/// and then lexicographically by the chosen key list.
#[derive(Debug, Clone)]
pub struct SchemaProblem {
    /// Candidate indexes, sorted and unique by key.
    pub candidates: Vec<CandidateIndex>,
    /// Candidate plans per query.
    pub queries: Vec<QueryPlanSet>,
    /// Maintenance costs per (mutation, index) pair.
    pub updates: Vec<UpdateCost>,
    /// Storage budget in bytes, if any.
    pub budget: Option<f64>,
    /// Number of time steps (1 when not time-dependent).
    pub time_steps: usize,
}

impl SchemaProblem {
    /// Solves the selection with a fresh solver from `make_solver`.
    ///
    /// Infeasibility is attributed by re-solving without the storage
    /// constraint: still infeasible means a query cannot be covered,
    /// otherwise the budget is the problem.
    ///
    /// # Errors
    ///
    /// [`SearchError::NoSolution`] with the violated constraint class, or
    /// [`SearchError::UnknownIndex`] if a plan references a key missing from
    /// the candidates.
    pub fn solve<S, F>(&self, make_solver: F, deadline: Option<Instant>) -> SearchResult<Selection>
    where
        S: Solver,
        F: Fn() -> S,
    {
        self.validate()?;
        for query in &self.queries {
            if query.plans.is_empty() {
                return Err(SearchError::NoSolution(NoSolutionKind::Coverage));
            }
        }

        match self.attempt(&make_solver, true, deadline) {
            Ok(selection) => Ok(selection),
            Err(crate::solver::SolveError::Timeout) => {
                Err(SearchError::NoSolution(NoSolutionKind::Timeout))
            }
            Err(crate::solver::SolveError::Infeasible) => {
                let kind = if self.budget.is_some()
                    && self.attempt(&make_solver, false, deadline).is_ok()
                {
                    NoSolutionKind::Budget
                } else {
                    NoSolutionKind::Coverage
                };
                Err(SearchError::NoSolution(kind))
            }
        }
    }

    /// Solves in two phases: first for the minimum weighted cost, then,
    /// among cost-optimal selections, for the smallest total size with a
    /// lexicographic key tie-break.
    fn attempt<S, F>(
        &self,
        make_solver: &F,
        with_budget: bool,
        deadline: Option<Instant>,
    ) -> Result<Selection, crate::solver::SolveError>
    where
        S: Solver,
        F: Fn() -> S,
    {
        let mut cost_solver = make_solver();
        let layout = self.build(&mut cost_solver, with_budget);
        cost_solver.set_objective(layout.cost_expr.clone());
        let primary = cost_solver.solve(deadline)?;
        let optimum = primary.objective;
        debug!(objective = optimum, "cost phase solved");

        let mut size_solver = make_solver();
        let refine_layout = self.build(&mut size_solver, with_budget);
        let slack = optimum.abs().max(1.0) * 1e-9 + 1e-9;
        size_solver.add_constraint(Constraint::le(refine_layout.cost_expr.clone(), optimum + slack));
        size_solver.set_objective(refine_layout.size_expr.clone());

        let tie_keys: Vec<String> =
            refine_layout.unique.iter().map(|c| c.key.clone()).collect();
        let tie_x: Vec<Vec<usize>> = refine_layout
            .x
            .iter()
            .map(|x_t| x_t.iter().map(|v| v.index()).collect())
            .collect();
        size_solver.set_tie_break(Box::new(move |candidate, incumbent| {
            let keys = |values: &[f64]| -> Vec<&str> {
                tie_x
                    .iter()
                    .flat_map(|x_t| x_t.iter().enumerate())
                    .filter(|(_, &v)| values[v] > 0.5)
                    .map(|(i, _)| tie_keys[i].as_str())
                    .collect()
            };
            keys(candidate).cmp(&keys(incumbent))
        }));

        // The cost-phase incumbent stays valid if refinement runs out of
        // time.
        let (solution, layout) = match size_solver.solve(deadline) {
            Ok(refined) => (refined, refine_layout),
            Err(_) => (primary.clone(), layout),
        };

        let steps = self.time_steps.max(1);
        let mut chosen = Vec::with_capacity(steps);
        let mut plan_choice = Vec::with_capacity(steps);
        let mut total_size = Vec::with_capacity(steps);
        for t in 0..steps {
            let mut keys = Vec::new();
            let mut size = 0.0;
            for (i, candidate) in layout.unique.iter().enumerate() {
                if solution.value(layout.x[t][i]) > 0.5 {
                    keys.push(candidate.key.clone());
                    size += candidate.size;
                }
            }
            let choices: Vec<usize> = layout.y[t]
                .iter()
                .map(|y_q| {
                    y_q.iter().position(|&v| solution.value(v) > 0.5).unwrap_or(0)
                })
                .collect();
            chosen.push(keys);
            plan_choice.push(choices);
            total_size.push(size);
        }

        let timed_out = primary.timed_out || solution.timed_out;
        info!(
            objective = optimum,
            chosen = chosen[0].len(),
            timed_out,
            "schema selected"
        );
        Ok(Selection { chosen, plan_choice, objective: optimum, total_size, timed_out })
    }

    /// Adds the selection variables and constraints C1-C4 to a solver.
    fn build<S: Solver>(&self, solver: &mut S, with_budget: bool) -> Layout {
        // Duplicate layouts share one variable (deduplicated by key).
        let mut position: HashMap<&str, usize> = HashMap::new();
        let mut unique: Vec<CandidateIndex> = Vec::new();
        for candidate in &self.candidates {
            if !position.contains_key(candidate.key.as_str()) {
                position.insert(candidate.key.as_str(), unique.len());
                unique.push(candidate.clone());
            }
        }

        let steps = self.time_steps.max(1);
        let mut cost_expr = LinearExpr::new();
        let mut size_expr = LinearExpr::new();
        let mut y: Vec<Vec<Vec<VarId>>> = Vec::with_capacity(steps);
        let mut x: Vec<Vec<VarId>> = Vec::with_capacity(steps);

        for t in 0..steps {
            // Plan-choice variables come first so a depth-first solver
            // reaches a covering incumbent quickly.
            let mut y_t: Vec<Vec<VarId>> = Vec::with_capacity(self.queries.len());
            for (q, query) in self.queries.iter().enumerate() {
                let weight = query.weights.get(t).copied().unwrap_or(0.0);
                let mut y_q = Vec::with_capacity(query.plans.len());
                for (p, plan) in query.plans.iter().enumerate() {
                    let var = solver.add_var(&format!("y_{t}_{q}_{p}"));
                    cost_expr.push(var, weight * plan.cost);
                    y_q.push(var);
                }
                y_t.push(y_q);
            }

            let mut x_t = Vec::with_capacity(unique.len());
            for candidate in &unique {
                let var = solver.add_var(&format!("x_{t}_{}", candidate.key));
                size_expr.push(var, candidate.size);
                x_t.push(var);
            }

            // C1: exactly one plan per query.
            for y_q in &y_t {
                let mut expr = LinearExpr::new();
                for &var in y_q {
                    expr.push(var, 1.0);
                }
                solver.add_constraint(Constraint::eq(expr, 1.0));
            }

            // C2: a plan needs every index it reads.
            for (q, query) in self.queries.iter().enumerate() {
                for (p, plan) in query.plans.iter().enumerate() {
                    for key in &plan.index_keys {
                        let Some(&i) = position.get(key.as_str()) else {
                            // Rejected by validate() before solving.
                            continue;
                        };
                        solver.add_constraint(Constraint::le(
                            LinearExpr::new().term(y_t[q][p], 1.0).term(x_t[i], -1.0),
                            0.0,
                        ));
                    }
                }
            }

            // C3: maintenance is paid on every materialized index.
            for (m, update) in self.updates.iter().enumerate() {
                let Some(&i) = position.get(update.index_key.as_str()) else {
                    continue;
                };
                let weight = update.weights.get(t).copied().unwrap_or(0.0);
                let var = solver.add_var(&format!("u_{t}_{m}"));
                cost_expr.push(var, weight * update.cost);
                solver.add_constraint(Constraint::eq(
                    LinearExpr::new().term(var, 1.0).term(x_t[i], -1.0),
                    0.0,
                ));
            }

            // C4: the chosen indexes must fit the budget, per step.
            if with_budget {
                if let Some(budget) = self.budget {
                    let mut expr = LinearExpr::new();
                    for (i, candidate) in unique.iter().enumerate() {
                        expr.push(x_t[i], candidate.size);
                    }
                    solver.add_constraint(Constraint::le(expr, budget));
                }
            }

            y.push(y_t);
            x.push(x_t);
        }

        Layout { unique, y, x, cost_expr, size_expr }
    }

    /// Checks that every plan references known candidates.
    ///
    /// # Errors
    ///
    /// [`SearchError::UnknownIndex`] naming the first missing key.
    pub fn validate(&self) -> SearchResult<()> {
        let known: HashMap<&str, ()> =
            self.candidates.iter().map(|c| (c.key.as_str(), ())).collect();
        for query in &self.queries {
            for plan in &query.plans {
                for key in &plan.index_keys {
                    if !known.contains_key(key.as_str()) {
                        return Err(SearchError::UnknownIndex(key.clone()));
                    }
                }
            }
        }
        Ok(())
    }
}

/// Variable layout of one built program.
struct Layout {
    unique: Vec<CandidateIndex>,
    y: Vec<Vec<Vec<VarId>>>,
    x: Vec<Vec<VarId>>,
    cost_expr: LinearExpr,
    size_expr: LinearExpr,
}

/// Convenience ordering for candidate lists: by key.
pub fn sort_candidates(candidates: &mut [CandidateIndex]) {
    candidates.sort_by(|a, b| match a.key.cmp(&b.key) {
        Ordering::Equal => a.size.total_cmp(&b.size),
        other => other,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bb::BranchBound;

    fn candidate(key: &str, size: f64) -> CandidateIndex {
        CandidateIndex { key: key.to_owned(), size }
    }

    fn plan(cost: f64, keys: &[&str]) -> CandidatePlan {
        CandidatePlan { cost, index_keys: keys.iter().map(|k| (*k).to_owned()).collect() }
    }

    fn single_query(plans: Vec<CandidatePlan>) -> QueryPlanSet {
        QueryPlanSet { statement_index: 0, weights: vec![1.0], plans }
    }

    #[test]
    fn picks_the_cheapest_covering_plan() {
        let problem = SchemaProblem {
            candidates: vec![candidate("idx_a", 100.0), candidate("idx_b", 100.0)],
            queries: vec![single_query(vec![plan(10.0, &["idx_a"]), plan(2.0, &["idx_b"])])],
            updates: vec![],
            budget: None,
            time_steps: 1,
        };

        let selection = problem.solve(BranchBound::new, None).unwrap();
        assert_eq!(selection.chosen[0], vec!["idx_b".to_owned()]);
        assert_eq!(selection.plan_choice[0], vec![1]);
        assert!((selection.objective - 2.0).abs() < 1e-6);
    }

    #[test]
    fn budget_forces_the_smaller_index() {
        let problem = SchemaProblem {
            candidates: vec![candidate("idx_a", 50.0), candidate("idx_b", 500.0)],
            queries: vec![single_query(vec![plan(10.0, &["idx_a"]), plan(2.0, &["idx_b"])])],
            updates: vec![],
            budget: Some(100.0),
            time_steps: 1,
        };

        let selection = problem.solve(BranchBound::new, None).unwrap();
        assert_eq!(selection.chosen[0], vec!["idx_a".to_owned()]);
        assert!(selection.total_size[0] <= 100.0);
    }

    #[test]
    fn impossible_budget_is_attributed() {
        let problem = SchemaProblem {
            candidates: vec![candidate("idx_a", 500.0)],
            queries: vec![single_query(vec![plan(10.0, &["idx_a"])])],
            updates: vec![],
            budget: Some(100.0),
            time_steps: 1,
        };

        let err = problem.solve(BranchBound::new, None).unwrap_err();
        assert!(matches!(
            err,
            SearchError::NoSolution(NoSolutionKind::Budget)
        ));
    }

    #[test]
    fn uncoverable_query_is_attributed() {
        let problem = SchemaProblem {
            candidates: vec![candidate("idx_a", 500.0)],
            queries: vec![single_query(vec![])],
            updates: vec![],
            budget: None,
            time_steps: 1,
        };

        let err = problem.solve(BranchBound::new, None).unwrap_err();
        assert!(matches!(
            err,
            SearchError::NoSolution(NoSolutionKind::Coverage)
        ));
    }

    #[test]
    fn update_costs_are_paid_for_materialized_indexes() {
        // idx_b is cheaper to read but expensive to maintain.
        let problem = SchemaProblem {
            candidates: vec![candidate("idx_a", 100.0), candidate("idx_b", 100.0)],
            queries: vec![single_query(vec![plan(10.0, &["idx_a"]), plan(2.0, &["idx_b"])])],
            updates: vec![UpdateCost {
                statement_index: 1,
                index_key: "idx_b".to_owned(),
                weights: vec![1.0],
                cost: 100.0,
            }],
            budget: None,
            time_steps: 1,
        };

        let selection = problem.solve(BranchBound::new, None).unwrap();
        assert_eq!(selection.chosen[0], vec!["idx_a".to_owned()]);
    }

    #[test]
    fn duplicate_keys_share_a_variable() {
        let problem = SchemaProblem {
            candidates: vec![candidate("idx_a", 100.0), candidate("idx_a", 100.0)],
            queries: vec![single_query(vec![plan(2.0, &["idx_a"])])],
            updates: vec![],
            budget: Some(150.0),
            time_steps: 1,
        };

        let selection = problem.solve(BranchBound::new, None).unwrap();
        // One variable, counted once against the budget.
        assert_eq!(selection.chosen[0].len(), 1);
        assert!((selection.total_size[0] - 100.0).abs() < 1e-6);
    }

    #[test]
    fn equal_costs_prefer_the_smaller_schema() {
        let problem = SchemaProblem {
            candidates: vec![candidate("idx_a", 500.0), candidate("idx_b", 100.0)],
            queries: vec![single_query(vec![plan(2.0, &["idx_a"]), plan(2.0, &["idx_b"])])],
            updates: vec![],
            budget: None,
            time_steps: 1,
        };

        let selection = problem.solve(BranchBound::new, None).unwrap();
        assert_eq!(selection.chosen[0], vec!["idx_b".to_owned()]);
    }

    #[test]
    fn time_steps_replicate_the_selection() {
        let problem = SchemaProblem {
            candidates: vec![candidate("idx_a", 100.0), candidate("idx_b", 100.0)],
            queries: vec![QueryPlanSet {
                statement_index: 0,
                // idx_a is cheap in step 0, idx_b in step 1.
                weights: vec![1.0, 1.0],
                plans: vec![plan(2.0, &["idx_a"]), plan(2.0, &["idx_b"])],
            }],
            updates: vec![],
            budget: Some(150.0),
            time_steps: 2,
        };

        let selection = problem.solve(BranchBound::new, None).unwrap();
        assert_eq!(selection.chosen.len(), 2);
        assert_eq!(selection.plan_choice.len(), 2);
        for t in 0..2 {
            assert!(selection.total_size[t] <= 150.0);
            assert_eq!(selection.chosen[t].len(), 1);
        }
    }

    #[test]
    fn removing_updates_never_worsens_the_objective() {
        let with_updates = SchemaProblem {
            candidates: vec![candidate("idx_a", 100.0), candidate("idx_b", 100.0)],
            queries: vec![single_query(vec![plan(10.0, &["idx_a"]), plan(2.0, &["idx_b"])])],
            updates: vec![UpdateCost {
                statement_index: 1,
                index_key: "idx_b".to_owned(),
                weights: vec![1.0],
                cost: 100.0,
            }],
            budget: None,
            time_steps: 1,
        };
        let without_updates = SchemaProblem { updates: vec![], ..with_updates.clone() };

        let a = with_updates.solve(BranchBound::new, None).unwrap();
        let b = without_updates.solve(BranchBound::new, None).unwrap();
        assert!(b.objective <= a.objective + 1e-6);
    }

    #[test]
    fn validate_rejects_unknown_keys() {
        let problem = SchemaProblem {
            candidates: vec![candidate("idx_a", 100.0)],
            queries: vec![single_query(vec![plan(2.0, &["idx_missing"])])],
            updates: vec![],
            budget: None,
            time_steps: 1,
        };
        assert!(matches!(problem.validate(), Err(SearchError::UnknownIndex(_))));
    }
}
