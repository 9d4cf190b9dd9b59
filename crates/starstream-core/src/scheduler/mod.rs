//! Constrained target selection
//!
//! Given a workload SLO and context, the scheduler estimates latency, cost
//! and energy for every execution target, drops targets outside the relaxed
//! safety bounds, and picks the best-scoring survivor. The adaptive variant
//! mixes in exploration and a running reward average per target.

mod best_score;
mod cost_model;
mod epsilon_greedy;
mod scoring;

pub use best_score::ConstrainedBestScore;
pub use cost_model::{
    BaselineCostModel, CostModel, Sensitivity, TargetProfile, WorkloadContext, DEFAULT_BATCH_SIZE,
    DEFAULT_CONCURRENCY, DEFAULT_TOKENS,
};
pub use epsilon_greedy::{
    ConstrainedEpsilonGreedy, TargetPreference, DEFAULT_CANARY, DEFAULT_EPSILON,
};
pub use scoring::{is_safe, score, ENERGY_SAFETY_FACTOR, LATENCY_SAFETY_FACTOR};

use crate::error::SchedulerError;
use serde::{Deserialize, Serialize};

/// Floor applied to observed cost when computing rewards
pub const MIN_OBSERVED_COST: f64 = 1e-4;

/// Service level objective for one decision
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slo {
    pub latency_p95_ms: f64,
    pub cost_per_1k: f64,
    pub energy_j_max: f64,
}

/// Estimated or observed latency, cost and energy for one target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Estimate {
    pub lat_ms: f64,
    pub cost: f64,
    pub energy: f64,
}

impl Estimate {
    /// Stand-in for a target the cost model cannot estimate: never safe, scores zero
    pub const UNBOUNDED: Estimate = Estimate {
        lat_ms: f64::INFINITY,
        cost: f64::INFINITY,
        energy: f64::INFINITY,
    };
}

/// How a decision was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionMode {
    BestScore,
    Explore,
    Exploit,
}

impl DecisionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DecisionMode::BestScore => "best_score",
            DecisionMode::Explore => "explore",
            DecisionMode::Exploit => "exploit",
        }
    }
}

/// Selected target plus the metadata behind the choice
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub target: String,
    pub expected: Estimate,
    /// SLO score of the selected target's estimate
    pub score: f64,
    pub mode: DecisionMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub canary_fraction: Option<f64>,
    /// True when no candidate was safe and the filter was ignored;
    /// callers relying on safety must check `expected` themselves
    pub fallback: bool,
    pub safe_candidates: Vec<String>,
}

/// Measured outcome of running a workload on a target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ObservedOutcome {
    #[serde(default)]
    pub lat_ms: f64,
    #[serde(default = "default_observed_cost")]
    pub cost: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub energy: Option<f64>,
}

fn default_observed_cost() -> f64 {
    MIN_OBSERVED_COST
}

impl ObservedOutcome {
    pub fn new(lat_ms: f64, cost: f64) -> Self {
        Self {
            lat_ms,
            cost,
            energy: None,
        }
    }

    /// Cheaper and faster is better
    pub fn reward(&self) -> f64 {
        1.0 / self.cost.max(MIN_OBSERVED_COST) - 0.5 * self.lat_ms.max(0.0)
    }
}

impl From<Estimate> for ObservedOutcome {
    fn from(estimate: Estimate) -> Self {
        Self {
            lat_ms: estimate.lat_ms,
            cost: estimate.cost,
            energy: Some(estimate.energy),
        }
    }
}

/// Trait for scheduling policies
///
/// `decide` never fails: with no safe candidate it falls back to all of
/// them and flags the decision.
pub trait TargetSelector: Send + Sync {
    fn decide(&self, slo: &Slo, context: &WorkloadContext) -> Decision;

    /// Feed back an observed outcome; returns the reward it was worth
    fn observe(&self, target: &str, outcome: &ObservedOutcome) -> Result<f64, SchedulerError>;

    fn name(&self) -> &'static str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reward_floors_cost_and_latency() {
        let cheap = ObservedOutcome::new(2.0, 0.0);
        assert_eq!(cheap.reward(), 1.0 / MIN_OBSERVED_COST - 1.0);

        let negative_latency = ObservedOutcome::new(-5.0, 0.001);
        assert!((negative_latency.reward() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_outcome_defaults_when_fields_missing() {
        let outcome: ObservedOutcome = serde_json::from_str("{}").unwrap();
        assert_eq!(outcome.lat_ms, 0.0);
        assert_eq!(outcome.cost, MIN_OBSERVED_COST);
        assert_eq!(outcome.reward(), 1.0 / MIN_OBSERVED_COST);
    }
}
