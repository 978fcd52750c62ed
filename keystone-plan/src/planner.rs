//! Best-first plan search.

use std::cmp::{Ordering, Reverse};
use std::collections::{BTreeSet, BinaryHeap, HashMap};
use std::time::Instant;

use tracing::debug;

use keystone_model::{FieldId, KeyPath, Model};
use keystone_query::Query;

use crate::cost::{
    CostModel, EQUALITY_SELECTIVITY, INEQUALITY_SELECTIVITY, RANGE_SELECTIVITY,
};
use crate::error::{PlanError, PlanResult};
use crate::index::Index;
use crate::state::ExecutionState;
use crate::steps::{PlanStep, QueryPlan};

const COST_EPSILON: f64 = 1e-9;

/// Safety valve against degenerate searches; deep plans finish far below
/// this.
const MAX_EXPANSIONS: usize = 200_000;

/// Searches for the cheapest plans answering a query from an index set.
///
/// The search is best-first over [`ExecutionState`] with priority equal to
/// the accumulated step cost, a closed set keyed by structural state
/// identity, and pruning of any partial plan costlier than the best complete
/// plan found. All plans tied for the minimum cost are returned.
pub struct QueryPlanner<'a> {
    model: &'a Model,
    cost_model: &'a dyn CostModel,
    deadline: Option<Instant>,
}

impl<'a> QueryPlanner<'a> {
    /// Creates a planner.
    #[must_use]
    pub fn new(model: &'a Model, cost_model: &'a dyn CostModel) -> Self {
        Self { model, cost_model, deadline: None }
    }

    /// Sets a wall-clock deadline. On expiry the planner returns the best
    /// plans found so far, or [`PlanError::NoPlan`] if none were complete.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Returns every minimum-cost plan for `query` over `indexes`.
    ///
    /// Plans are deterministic: ties are ordered by step count and rendered
    /// form. The query path is searched in both orientations and results
    /// are merged.
    ///
    /// # Errors
    ///
    /// Returns [`PlanError::NoPlan`] when no terminal state is reachable.
    pub fn best_plans(&self, query: &Query, indexes: &[Index]) -> PlanResult<Vec<QueryPlan>> {
        let reversed = query.path.reversed();
        let mut orientations = vec![reversed];
        if query.path != orientations[0] {
            orientations.push(query.path.clone());
        }

        let mut plans: Vec<QueryPlan> = Vec::new();
        for orientation in &orientations {
            plans.extend(self.search(query, orientation, indexes));
        }
        if plans.is_empty() {
            return Err(PlanError::NoPlan(query.display(self.model)));
        }

        let best = plans.iter().map(|p| p.cost).fold(f64::INFINITY, f64::min);
        let mut plans: Vec<QueryPlan> =
            plans.into_iter().filter(|p| p.cost <= best + COST_EPSILON).collect();
        plans.sort_by(|a, b| {
            a.cost
                .total_cmp(&b.cost)
                .then_with(|| a.ordering_key(self.model).cmp(&b.ordering_key(self.model)))
        });
        plans.dedup();
        Ok(plans)
    }

    fn search(&self, query: &Query, orientation: &KeyPath, indexes: &[Index]) -> Vec<QueryPlan> {
        let mut frontier: BinaryHeap<Reverse<Node>> = BinaryHeap::new();
        let mut closed: HashMap<crate::state::StateKey, f64> = HashMap::new();
        let mut plans: Vec<QueryPlan> = Vec::new();
        let mut best: Option<f64> = None;
        let mut seq: u64 = 0;

        let initial = ExecutionState::initial(self.model, query, orientation);
        closed.insert(initial.fingerprint(), 0.0);
        frontier.push(Reverse(Node { cost: 0.0, seq, state: initial, steps: Vec::new() }));

        let mut expansions = 0usize;
        while let Some(Reverse(node)) = frontier.pop() {
            if self.deadline.is_some_and(|d| Instant::now() >= d) {
                break;
            }
            expansions += 1;
            if expansions > MAX_EXPANSIONS {
                break;
            }
            if best.is_some_and(|b| node.cost > b + COST_EPSILON) {
                break;
            }

            if node.state.is_terminal(query) {
                best = Some(best.map_or(node.cost, |b| b.min(node.cost)));
                plans.push(QueryPlan { steps: node.steps, cost: node.cost });
                continue;
            }

            let mut successors: Vec<(ExecutionState, PlanStep, f64)> = Vec::new();
            for index in indexes {
                if let Some(succ) = self.try_lookup(query, orientation, &node.state, index) {
                    successors.push(succ);
                }
            }
            if let Some(succ) = self.try_filter(query, &node.state) {
                successors.push(succ);
            }
            if let Some(succ) = self.try_sort(query, &node.state) {
                successors.push(succ);
            }
            if let Some(succ) = self.try_limit(query, &node.state) {
                successors.push(succ);
            }

            for (state, step, step_cost) in successors {
                let cost = node.cost + step_cost;
                if best.is_some_and(|b| cost > b + COST_EPSILON) {
                    continue;
                }
                let fingerprint = state.fingerprint();
                if closed.get(&fingerprint).is_some_and(|&c| cost > c + COST_EPSILON) {
                    continue;
                }
                let entry = closed.entry(fingerprint).or_insert(cost);
                if cost < *entry {
                    *entry = cost;
                }
                let mut steps = node.steps.clone();
                steps.push(step);
                seq += 1;
                frontier.push(Reverse(Node { cost, seq, state, steps }));
            }
        }

        debug!(
            expansions,
            plans = plans.len(),
            "plan search finished for one orientation"
        );
        let best = best.unwrap_or(f64::INFINITY);
        plans.retain(|p| p.cost <= best + COST_EPSILON);
        plans
    }

    fn try_lookup(
        &self,
        query: &Query,
        orientation: &KeyPath,
        state: &ExecutionState,
        index: &Index,
    ) -> Option<(ExecutionState, PlanStep, f64)> {
        // The index must continue the planning path from the last covered
        // entity (consecutive segments overlap at the join entity).
        let at = state.path_covered.saturating_sub(1);
        if !orientation.matches_at(&index.path, at) {
            return None;
        }
        let new_covered = (at + index.path.len()).max(state.path_covered);

        // Hash keys must be bound: by the query's equality predicates or by
        // values fetched earlier. Support queries without equality
        // predicates scan from a cold start instead.
        let query_eq = query.equality_fields();
        let scan = query.support && query_eq.is_empty() && state.path_covered == 0;
        if !scan
            && !index
                .hash_fields
                .iter()
                .all(|f| query_eq.contains(f) || state.fields_available.contains(f))
        {
            return None;
        }

        let mut next = state.clone();
        next.path_covered = new_covered;
        next.fields_available.extend(index.all_fields());

        let mut selectivity = 1.0;
        if !scan {
            for cond in query.conditions.iter().filter(|c| c.is_equality()) {
                if index.hash_fields.contains(&cond.field)
                    && !state.eq_satisfied.contains(&cond.field)
                {
                    next.eq_satisfied.insert(cond.field);
                    selectivity *= EQUALITY_SELECTIVITY;
                }
            }
        }

        let mut range_field = None;
        if !state.range_satisfied {
            if let Some(cond) = query.range_condition() {
                if index.order_fields.contains(&cond.field) {
                    next.range_satisfied = true;
                    range_field = Some(cond.field);
                    selectivity *= RANGE_SELECTIVITY;
                }
            }
        }

        let mut order_fields = Vec::new();
        if !query.order_by.is_empty() {
            // A lookup yields the query order only when ORDER BY is a
            // prefix of the cluster keys; any later lookup destroys it.
            let satisfies = index.order_fields.len() >= query.order_by.len()
                && index.order_fields[..query.order_by.len()] == query.order_by[..];
            next.order_satisfied = satisfies;
            if satisfies {
                order_fields = query.order_by.clone();
            }
        }

        let mut fanout = 1.0;
        for j in at..new_covered.saturating_sub(1) {
            fanout *= self
                .model
                .fanout(orientation.entities()[j], orientation.entities()[j + 1]);
        }

        // A lookup that changes nothing would only add cost.
        if next.fingerprint() == state.fingerprint() {
            return None;
        }

        let requests = if state.path_covered == 0 { 1.0 } else { state.cardinality };
        let output = state.cardinality * selectivity * fanout;
        next.cardinality = output;
        let cost = self.cost_model.lookup_cost(self.model, index, requests, output);

        let step = PlanStep::IndexLookup {
            index: index.clone(),
            eq_fields: if scan { BTreeSet::new() } else { index.hash_fields.clone() },
            range_field,
            order_fields,
        };
        Some((next, step, cost))
    }

    fn try_filter(
        &self,
        query: &Query,
        state: &ExecutionState,
    ) -> Option<(ExecutionState, PlanStep, f64)> {
        let equality: BTreeSet<FieldId> = query
            .conditions
            .iter()
            .filter(|c| !c.is_range())
            .filter(|c| {
                !state.eq_satisfied.contains(&c.field)
                    && state.fields_available.contains(&c.field)
            })
            .map(|c| c.field)
            .collect();
        let range: Option<FieldId> = if state.range_satisfied {
            None
        } else {
            query
                .range_condition()
                .filter(|c| state.fields_available.contains(&c.field))
                .map(|c| c.field)
        };
        if equality.is_empty() && range.is_none() {
            return None;
        }

        let mut next = state.clone();
        let mut selectivity = 1.0;
        for cond in query.conditions.iter().filter(|c| !c.is_range()) {
            if equality.contains(&cond.field) && next.eq_satisfied.insert(cond.field) {
                selectivity *= if cond.is_equality() {
                    EQUALITY_SELECTIVITY
                } else {
                    INEQUALITY_SELECTIVITY
                };
            }
        }
        if range.is_some() {
            next.range_satisfied = true;
            selectivity *= RANGE_SELECTIVITY;
        }
        next.cardinality = state.cardinality * selectivity;

        let cost = self.cost_model.filter_cost(state.cardinality);
        Some((next, PlanStep::Filter { equality, range }, cost))
    }

    fn try_sort(
        &self,
        query: &Query,
        state: &ExecutionState,
    ) -> Option<(ExecutionState, PlanStep, f64)> {
        if state.order_satisfied
            || !query.order_by.iter().all(|f| state.fields_available.contains(f))
        {
            return None;
        }
        let mut next = state.clone();
        next.order_satisfied = true;
        let cost = self.cost_model.sort_cost(state.cardinality);
        Some((next, PlanStep::Sort { fields: query.order_by.clone() }, cost))
    }

    fn try_limit(
        &self,
        query: &Query,
        state: &ExecutionState,
    ) -> Option<(ExecutionState, PlanStep, f64)> {
        let limit = query.limit?;
        if state.limit_applied || !state.is_pre_terminal(query) {
            return None;
        }
        let mut next = state.clone();
        next.limit_applied = true;
        next.cardinality = state.cardinality.min(limit as f64);
        Some((next, PlanStep::Limit { count: limit }, self.cost_model.limit_cost()))
    }
}

struct Node {
    cost: f64,
    seq: u64,
    state: ExecutionState,
    steps: Vec<PlanStep>,
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        self.cost.total_cmp(&other.cost) == Ordering::Equal && self.seq == other.seq
    }
}

impl Eq for Node {}

impl PartialOrd for Node {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Node {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cost.total_cmp(&other.cost).then_with(|| self.seq.cmp(&other.seq))
    }
}
