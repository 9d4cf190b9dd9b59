//! Deterministic best-score policy

use super::scoring::{score, CandidateSet};
use super::{
    BaselineCostModel, CostModel, Decision, DecisionMode, ObservedOutcome, Slo, TargetSelector,
    WorkloadContext,
};
use crate::error::SchedulerError;
use std::sync::Arc;
use tracing::{debug, warn};

/// Picks the highest-scoring safe target
///
/// Stateless: identical inputs always give the identical decision.
/// Ties go to the lexically smallest target name.
#[derive(Clone)]
pub struct ConstrainedBestScore {
    model: Arc<dyn CostModel>,
    /// Never empty
    targets: Vec<String>,
}

impl Default for ConstrainedBestScore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstrainedBestScore {
    /// Best-score policy over the reference photonic/GPU/CPU model
    pub fn new() -> Self {
        let model = BaselineCostModel::reference();
        Self {
            targets: model.targets(),
            model: Arc::new(model),
        }
    }

    pub fn with_model(model: Arc<dyn CostModel>) -> Result<Self, SchedulerError> {
        let targets = model.targets();
        if targets.is_empty() {
            return Err(SchedulerError::NoTargets);
        }
        Ok(Self { model, targets })
    }
}

impl TargetSelector for ConstrainedBestScore {
    fn decide(&self, slo: &Slo, context: &WorkloadContext) -> Decision {
        let set = CandidateSet::evaluate(self.model.as_ref(), &self.targets, slo, context);
        if set.fallback {
            warn!(
                latency_p95_ms = slo.latency_p95_ms,
                energy_j_max = slo.energy_j_max,
                "No safe candidate, ignoring safety filter"
            );
        }

        let best = set
            .argmax_by(|c| score(&c.estimate, slo))
            .cloned()
            .expect("target list is never empty");
        let best_score = score(&best.estimate, slo);

        debug!(target = %best.target, score = best_score, "Best-score decision");

        Decision {
            target: best.target,
            expected: best.estimate,
            score: best_score,
            mode: DecisionMode::BestScore,
            canary_fraction: None,
            fallback: set.fallback,
            safe_candidates: set.names(),
        }
    }

    /// Validates the target; this policy keeps no preference state
    fn observe(&self, target: &str, outcome: &ObservedOutcome) -> Result<f64, SchedulerError> {
        if !self.targets.iter().any(|t| t == target) {
            return Err(SchedulerError::UnknownTarget(target.to_string()));
        }
        Ok(outcome.reward())
    }

    fn name(&self) -> &'static str {
        "best_score"
    }
}
