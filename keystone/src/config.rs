//! Advisor configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use keystone_plan::CostModelKind;

/// How a backend should treat an unbound `?` placeholder for one field
/// kind.
///
/// The core never executes statements; this policy is carried through the
/// configuration so backends can decide without global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaceholderAction {
    /// Bind the value supplied at execution time.
    #[default]
    Bind,
    /// Generate a fresh value (used for identifiers on insert).
    Generate,
}

/// Placeholder treatment per field kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceholderPolicy {
    /// Identifier fields.
    pub identifier: PlaceholderAction,
    /// Integer fields.
    pub integer: PlaceholderAction,
    /// Float fields.
    pub float: PlaceholderAction,
    /// String fields.
    pub string: PlaceholderAction,
    /// Date fields.
    pub date: PlaceholderAction,
}

impl Default for PlaceholderPolicy {
    fn default() -> Self {
        Self {
            // Identifiers left unbound on insert are generated downstream.
            identifier: PlaceholderAction::Generate,
            integer: PlaceholderAction::Bind,
            float: PlaceholderAction::Bind,
            string: PlaceholderAction::Bind,
            date: PlaceholderAction::Bind,
        }
    }
}

/// Configuration for one advisor run.
#[derive(Debug, Clone, Default)]
pub struct AdvisorConfig {
    /// Storage budget in bytes. Overrides the workload's own budget.
    pub budget: Option<u64>,
    /// Active mix label. Overrides the workload's own mix.
    pub mix: Option<String>,
    /// Wall-clock limit for planning and selection together.
    pub deadline: Option<Duration>,
    /// Which reference cost model prices plan steps.
    pub cost_model: CostModelKind,
    /// Placeholder treatment handed to backends.
    pub placeholder: PlaceholderPolicy,
}

impl AdvisorConfig {
    /// Creates the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the storage budget.
    #[must_use]
    pub const fn with_budget(mut self, budget: u64) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Sets the active mix.
    #[must_use]
    pub fn with_mix(mut self, mix: impl Into<String>) -> Self {
        self.mix = Some(mix.into());
        self
    }

    /// Sets the deadline.
    #[must_use]
    pub const fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Sets the cost model.
    #[must_use]
    pub const fn with_cost_model(mut self, kind: CostModelKind) -> Self {
        self.cost_model = kind;
        self
    }
}
