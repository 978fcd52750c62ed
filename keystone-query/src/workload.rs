//! Weighted statement workloads.

use std::collections::BTreeMap;

use keystone_model::Model;

use crate::ast::{Query, Statement};
use crate::error::{QueryError, StatementError};
use crate::parser::parse_statement;

/// How often a statement runs, possibly varying by mix or time step.
#[derive(Debug, Clone, PartialEq)]
pub enum Weights {
    /// A single weight used regardless of mix.
    Fixed(f64),
    /// One weight per named mix.
    PerMix(BTreeMap<String, f64>),
    /// One weight per time step.
    PerStep(Vec<f64>),
}

impl Weights {
    /// The weight under the given mix.
    ///
    /// Statements without a weight for the active mix do not run in it.
    #[must_use]
    pub fn for_mix(&self, mix: Option<&str>) -> f64 {
        match self {
            Self::Fixed(w) => *w,
            Self::PerMix(map) => mix.and_then(|m| map.get(m)).copied().unwrap_or(0.0),
            Self::PerStep(steps) => steps.first().copied().unwrap_or(0.0),
        }
    }

    /// The weight at a time step.
    #[must_use]
    pub fn for_step(&self, step: usize) -> f64 {
        match self {
            Self::Fixed(w) => *w,
            Self::PerMix(_) => 0.0,
            Self::PerStep(steps) => steps.get(step).copied().unwrap_or(0.0),
        }
    }

    /// Number of time steps this weight spans, if time-dependent.
    #[must_use]
    pub fn steps(&self) -> Option<usize> {
        match self {
            Self::PerStep(steps) => Some(steps.len()),
            _ => None,
        }
    }

    fn validate(&self) -> Result<(), StatementError> {
        // Declared weights must be positive; a per-step weight of zero is
        // allowed (the statement simply does not run in that step).
        let (ws, allow_zero): (Vec<f64>, bool) = match self {
            Self::Fixed(w) => (vec![*w], false),
            Self::PerMix(map) => (map.values().copied().collect(), false),
            Self::PerStep(steps) => (steps.clone(), true),
        };
        for w in ws {
            if !w.is_finite() || w < 0.0 || (w == 0.0 && !allow_zero) {
                return Err(StatementError::NonPositiveWeight(w));
            }
        }
        Ok(())
    }
}

/// A statement together with its weight and original text.
#[derive(Debug, Clone)]
pub struct WeightedStatement {
    /// The bound statement.
    pub statement: Statement,
    /// Its weight.
    pub weights: Weights,
    /// The statement text it was parsed from.
    pub text: String,
}

/// A model plus a weighted list of statements.
///
/// Invalid statements are recorded rather than aborting further adds, so
/// [`Workload::problems`] can report every problem at once. A workload with
/// recorded problems is not valid and should not be advised on.
#[derive(Debug, Clone)]
pub struct Workload {
    model: Model,
    statements: Vec<WeightedStatement>,
    problems: Vec<(String, QueryError)>,
    mix: Option<String>,
    budget: Option<u64>,
    time_steps: Option<usize>,
}

impl Workload {
    /// Creates an empty workload over a model.
    #[must_use]
    pub fn new(model: Model) -> Self {
        Self {
            model,
            statements: Vec::new(),
            problems: Vec::new(),
            mix: None,
            budget: None,
            time_steps: None,
        }
    }

    /// Sets the storage budget in bytes.
    #[must_use]
    pub const fn with_budget(mut self, budget: u64) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Selects the active mix label.
    #[must_use]
    pub fn with_mix(mut self, mix: impl Into<String>) -> Self {
        self.mix = Some(mix.into());
        self
    }

    /// Declares the number of time steps for time-dependent weights.
    #[must_use]
    pub const fn with_time_steps(mut self, steps: usize) -> Self {
        self.time_steps = Some(steps);
        self
    }

    /// Parses and adds a statement with a fixed weight.
    ///
    /// On error the problem is recorded and the workload keeps accepting
    /// statements.
    pub fn add(&mut self, text: &str, weight: f64) {
        self.add_weighted(text, Weights::Fixed(weight));
    }

    /// Parses and adds a statement with explicit weights.
    pub fn add_weighted(&mut self, text: &str, weights: Weights) {
        if let Err(err) = weights.validate() {
            self.problems.push((text.to_owned(), err.into()));
            return;
        }
        match parse_statement(&self.model, text) {
            Ok(statement) => self.statements.push(WeightedStatement {
                statement,
                weights,
                text: text.to_owned(),
            }),
            Err(err) => self.problems.push((text.to_owned(), err)),
        }
    }

    /// Adds an already-bound statement.
    pub fn add_statement(&mut self, statement: Statement, weights: Weights) {
        let text = statement.display(&self.model);
        self.statements.push(WeightedStatement { statement, weights, text });
    }

    /// The model this workload runs against.
    #[must_use]
    pub const fn model(&self) -> &Model {
        &self.model
    }

    /// The storage budget, if set.
    #[must_use]
    pub const fn budget(&self) -> Option<u64> {
        self.budget
    }

    /// The active mix label, if set.
    #[must_use]
    pub fn mix(&self) -> Option<&str> {
        self.mix.as_deref()
    }

    /// The declared number of time steps, if any.
    #[must_use]
    pub const fn time_steps(&self) -> Option<usize> {
        self.time_steps
    }

    /// All statements with their weights.
    #[must_use]
    pub fn statements(&self) -> &[WeightedStatement] {
        &self.statements
    }

    /// Whether every added statement parsed and validated.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.problems.is_empty()
    }

    /// Every recorded problem, in the order statements were added.
    #[must_use]
    pub fn problems(&self) -> &[(String, QueryError)] {
        &self.problems
    }

    /// Read queries with their index and active-mix weight.
    pub fn queries(&self) -> impl Iterator<Item = (usize, &Query, f64)> {
        let mix = self.mix.as_deref();
        self.statements.iter().enumerate().filter_map(move |(i, ws)| {
            ws.statement.as_query().map(|q| (i, q, ws.weights.for_mix(mix)))
        })
    }

    /// Mutating statements with their index and active-mix weight.
    pub fn mutations(&self) -> impl Iterator<Item = (usize, &Statement, f64)> {
        let mix = self.mix.as_deref();
        self.statements.iter().enumerate().filter_map(move |(i, ws)| {
            ws.statement
                .is_mutation()
                .then(|| (i, &ws.statement, ws.weights.for_mix(mix)))
        })
    }

    /// The weight of a statement at a time step (or its mix weight when the
    /// workload is not time-dependent).
    #[must_use]
    pub fn weight_at(&self, index: usize, step: usize) -> f64 {
        let ws = &self.statements[index];
        if self.time_steps.is_some() {
            ws.weights.for_step(step)
        } else {
            ws.weights.for_mix(self.mix.as_deref())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keystone_model::{EntityDef, ModelBuilder};

    fn model() -> Model {
        ModelBuilder::new()
            .entity(
                EntityDef::new("User", 100)
                    .id("UserId")
                    .string("City", 20)
                    .string("Username", 30),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn records_problems_without_aborting() {
        let mut workload = Workload::new(model());
        workload.add("SELECT Username FROM User WHERE User.City = ?", 1.0);
        workload.add("SELECT Nope FROM User WHERE User.City = ?", 1.0);
        workload.add("SELECT UserId FROM User WHERE User.Username = ?", 2.0);

        assert!(!workload.is_valid());
        assert_eq!(workload.problems().len(), 1);
        assert_eq!(workload.statements().len(), 2);
    }

    #[test]
    fn mix_weights() {
        let mut workload = Workload::new(model()).with_mix("evening");
        let mut weights = BTreeMap::new();
        weights.insert("morning".to_owned(), 1.0);
        weights.insert("evening".to_owned(), 5.0);
        workload.add_weighted(
            "SELECT Username FROM User WHERE User.City = ?",
            Weights::PerMix(weights),
        );

        let (_, _, weight) = workload.queries().next().unwrap();
        assert_eq!(weight, 5.0);
    }

    #[test]
    fn rejects_negative_weight() {
        let mut workload = Workload::new(model());
        workload.add("SELECT Username FROM User WHERE User.City = ?", -1.0);
        assert!(!workload.is_valid());
    }

    #[test]
    fn splits_queries_and_mutations() {
        let mut workload = Workload::new(model());
        workload.add("SELECT Username FROM User WHERE User.City = ?", 1.0);
        workload.add("UPDATE User SET Username = ? WHERE User.City = ?", 1.0);

        assert_eq!(workload.queries().count(), 1);
        assert_eq!(workload.mutations().count(), 1);
    }

    #[test]
    fn time_step_weights() {
        let mut workload = Workload::new(model()).with_time_steps(2);
        workload.add_weighted(
            "SELECT Username FROM User WHERE User.City = ?",
            Weights::PerStep(vec![1.0, 3.0]),
        );
        assert_eq!(workload.weight_at(0, 0), 1.0);
        assert_eq!(workload.weight_at(0, 1), 3.0);
    }
}
