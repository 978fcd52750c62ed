//! The advisor pipeline: enumerate, plan, select.

use std::collections::BTreeMap;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info};

use keystone_plan::{
    Index, IndexEnumerator, QueryPlan, QueryPlanner, UpdatePlan, UpdatePlanner, UpdateStep,
};
use keystone_query::Workload;
use keystone_search::{
    BranchBound, CandidateIndex, CandidatePlan, QueryPlanSet, SchemaProblem, UpdateCost,
};

use crate::config::AdvisorConfig;
use crate::error::{Error, Result};
use crate::schema::{
    IndexDescriptor, QueryRecommendation, Recommendation, UpdateRecommendation,
};

/// Runs the whole pipeline over a workload and produces a
/// [`Recommendation`].
///
/// Planning per query is embarrassingly parallel and fans out over a thread
/// pool; everything it reads (model, candidates, cost model) is immutable.
/// Selection input order is deterministic, so identical workloads produce
/// identical recommendations.
pub struct Advisor {
    config: AdvisorConfig,
}

impl Advisor {
    /// Creates an advisor with the given configuration.
    #[must_use]
    pub const fn new(config: AdvisorConfig) -> Self {
        Self { config }
    }

    /// Recommends a schema and per-statement plans for a workload.
    ///
    /// # Errors
    ///
    /// Fails fast with the most specific error: an invalid workload, a
    /// query no candidate set can answer, or an infeasible selection.
    pub fn advise(&self, workload: &Workload) -> Result<Recommendation> {
        if !workload.is_valid() {
            let summary = workload
                .problems()
                .iter()
                .map(|(text, err)| format!("{text}: {err}"))
                .collect::<Vec<_>>()
                .join("; ");
            return Err(Error::InvalidWorkload(summary));
        }

        // The config's mix takes precedence over the workload's, like the
        // budget below; every weight lookup goes through the rebound
        // workload.
        let overridden;
        let workload = if let Some(mix) = &self.config.mix {
            overridden = workload.clone().with_mix(mix.clone());
            &overridden
        } else {
            workload
        };

        let started = Instant::now();
        let deadline = self.config.deadline.map(|d| started + d);
        let model = workload.model();
        let cost_model = self.config.cost_model.instantiate();
        let time_steps = workload.time_steps().unwrap_or(1);

        // Candidate enumeration, including support-query candidates.
        let candidates = IndexEnumerator::new(model).indexes_for_workload(workload)?;
        info!(candidates = candidates.len(), "candidates enumerated");

        let mut planner = QueryPlanner::new(model, cost_model.as_ref());
        if let Some(deadline) = deadline {
            planner = planner.with_deadline(deadline);
        }

        // Per-query planning fans out over the thread pool.
        let queries: Vec<_> = workload.queries().collect();
        let planned: Vec<(usize, Vec<QueryPlan>)> = queries
            .par_iter()
            .map(|(index, query, _)| {
                planner.best_plans(query, &candidates).map(|plans| (*index, plans))
            })
            .collect::<std::result::Result<_, _>>()?;
        debug!(queries = planned.len(), "queries planned");

        // Update planning: support queries and maintenance steps per
        // (mutation, candidate) pair, priced against the full candidate set.
        let update_planner = UpdatePlanner::new(model);
        let mut update_plans: Vec<(usize, UpdatePlan, f64)> = Vec::new();
        for (index, statement, _) in workload.mutations() {
            for candidate in &candidates {
                let Some(plan) = update_planner.plan(statement, candidate)? else {
                    continue;
                };
                let mut cost = 0.0;
                for support in &plan.support_queries {
                    let plans = planner.best_plans(support, &candidates)?;
                    cost += plans[0].cost;
                }
                for step in &plan.steps {
                    cost += match step {
                        UpdateStep::Insert { entries, .. } => {
                            cost_model.insert_cost(model, candidate, *entries)
                        }
                        UpdateStep::Delete { entries, .. } => {
                            cost_model.delete_cost(model, candidate, *entries)
                        }
                    };
                }
                update_plans.push((index, plan, cost));
            }
        }
        debug!(update_plans = update_plans.len(), "mutations planned");

        let weights_of = |statement_index: usize| -> Vec<f64> {
            (0..time_steps).map(|t| workload.weight_at(statement_index, t)).collect()
        };

        let problem = SchemaProblem {
            candidates: candidates
                .iter()
                .map(|i| CandidateIndex { key: i.key().to_owned(), size: i.size })
                .collect(),
            queries: planned
                .iter()
                .map(|(index, plans)| QueryPlanSet {
                    statement_index: *index,
                    weights: weights_of(*index),
                    plans: plans
                        .iter()
                        .map(|p| {
                            let mut keys = p.index_keys();
                            keys.sort_unstable();
                            keys.dedup();
                            CandidatePlan { cost: p.cost, index_keys: keys }
                        })
                        .collect(),
                })
                .collect(),
            updates: update_plans
                .iter()
                .map(|(index, plan, cost)| UpdateCost {
                    statement_index: *index,
                    index_key: plan.index_key.clone(),
                    weights: weights_of(*index),
                    cost: *cost,
                })
                .collect(),
            budget: self.config.budget.or(workload.budget()).map(|b| b as f64),
            time_steps,
        };

        let selection = problem.solve(BranchBound::new, deadline)?;
        info!(
            objective = selection.objective,
            chosen = selection.chosen[0].len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "recommendation ready"
        );

        // Assemble the output descriptors from the chosen step-0 schema.
        let by_key: BTreeMap<&str, &Index> =
            candidates.iter().map(|i| (i.key(), i)).collect();
        let chosen = &selection.chosen[0];
        let indexes: Vec<IndexDescriptor> = chosen
            .iter()
            .filter_map(|key| by_key.get(key.as_str()))
            .map(|index| IndexDescriptor::new(model, index))
            .collect();

        let statements = workload.statements();
        let query_recommendations: Vec<QueryRecommendation> = planned
            .iter()
            .enumerate()
            .map(|(position, (index, plans))| {
                let plan = &plans[selection.plan_choice[0][position]];
                QueryRecommendation::new(
                    model,
                    statements[*index].text.clone(),
                    workload.weight_at(*index, 0),
                    plan,
                )
            })
            .collect();

        let update_recommendations: Vec<UpdateRecommendation> = update_plans
            .iter()
            .filter(|(_, plan, _)| chosen.contains(&plan.index_key))
            .map(|(index, plan, cost)| {
                UpdateRecommendation::new(model, statements[*index].text.clone(), plan, *cost)
            })
            .collect();

        Ok(Recommendation {
            objective: selection.objective,
            total_size: selection.total_size[0],
            indexes,
            queries: query_recommendations,
            updates: update_recommendations,
            schedule: (time_steps > 1).then(|| selection.chosen.clone()),
            timed_out: selection.timed_out,
        })
    }

    /// The configuration this advisor runs with.
    #[must_use]
    pub const fn config(&self) -> &AdvisorConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_model::{EntityDef, ModelBuilder};

    fn workload_with(statements: &[(&str, f64)]) -> Workload {
        let model = ModelBuilder::new()
            .entity(
                EntityDef::new("User", 100)
                    .id("UserId")
                    .string("City", 20)
                    .string("Username", 30),
            )
            .build()
            .unwrap();
        let mut workload = Workload::new(model);
        for (text, weight) in statements {
            workload.add(text, *weight);
        }
        workload
    }

    #[test]
    fn advises_a_single_query() {
        let workload =
            workload_with(&[("SELECT Username FROM User WHERE User.City = ?", 1.0)]);
        let recommendation = Advisor::new(AdvisorConfig::default()).advise(&workload).unwrap();

        assert_eq!(recommendation.queries.len(), 1);
        assert!(!recommendation.indexes.is_empty());
        assert!(recommendation.objective > 0.0);
    }

    #[test]
    fn rejects_invalid_workloads() {
        let workload = workload_with(&[("SELECT Nope FROM User WHERE User.City = ?", 1.0)]);
        let err = Advisor::new(AdvisorConfig::default()).advise(&workload).unwrap_err();
        assert!(matches!(err, Error::InvalidWorkload(_)));
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn config_mix_overrides_the_workload_mix() {
        let model = ModelBuilder::new()
            .entity(
                EntityDef::new("User", 100)
                    .id("UserId")
                    .string("City", 20)
                    .string("Username", 30),
            )
            .build()
            .unwrap();
        let mut workload = Workload::new(model).with_mix("morning");
        let mut weights = std::collections::BTreeMap::new();
        weights.insert("morning".to_owned(), 1.0);
        weights.insert("evening".to_owned(), 5.0);
        workload.add_weighted(
            "SELECT Username FROM User WHERE User.City = ?",
            keystone_query::Weights::PerMix(weights),
        );

        let by_workload_mix =
            Advisor::new(AdvisorConfig::default()).advise(&workload).unwrap();
        assert_eq!(by_workload_mix.queries[0].weight, 1.0);

        let by_config_mix = Advisor::new(AdvisorConfig::default().with_mix("evening"))
            .advise(&workload)
            .unwrap();
        assert_eq!(by_config_mix.queries[0].weight, 5.0);
        assert!(by_config_mix.objective > by_workload_mix.objective);
    }

    #[test]
    fn update_only_workload_chooses_nothing() {
        let workload =
            workload_with(&[("UPDATE User SET Username = ? WHERE User.City = ?", 1.0)]);
        let recommendation = Advisor::new(AdvisorConfig::default()).advise(&workload).unwrap();
        assert!(recommendation.indexes.is_empty());
        assert_eq!(recommendation.objective, 0.0);
    }
}
