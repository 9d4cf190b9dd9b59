//! Adaptive epsilon-greedy policy with per-target reward statistics

use super::scoring::{score, CandidateSet};
use super::{
    BaselineCostModel, CostModel, Decision, DecisionMode, ObservedOutcome, Slo, TargetSelector,
    WorkloadContext,
};
use crate::error::SchedulerError;
use dashmap::DashMap;
use rand::{rngs::StdRng, Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

pub const DEFAULT_EPSILON: f64 = 0.1;
pub const DEFAULT_CANARY: f64 = 0.05;

/// Running reward sum and observation count for one target
///
/// `n` starts at 1 so the mean is defined before any observation.
#[derive(Debug, Clone, Copy)]
struct TargetStats {
    mu: f64,
    n: u64,
}

impl TargetStats {
    fn prior() -> Self {
        Self { mu: 0.0, n: 1 }
    }

    fn mean(&self) -> f64 {
        self.mu / self.n as f64
    }
}

/// Learned preference for one target, as exposed over the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetPreference {
    pub target: String,
    pub mu: f64,
    pub n: u64,
    pub mean_reward: f64,
}

/// Explores a random safe target with probability `eps`, otherwise exploits
/// the best `score + mean_reward`
pub struct ConstrainedEpsilonGreedy {
    model: Arc<dyn CostModel>,
    /// Never empty
    targets: Vec<String>,
    eps: f64,
    canary: f64,
    stats: DashMap<String, TargetStats>,
    rng: Mutex<StdRng>,
}

fn check_unit(name: &'static str, value: f64) -> Result<f64, SchedulerError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(SchedulerError::InvalidParameter { name, value })
    }
}

impl ConstrainedEpsilonGreedy {
    /// Epsilon-greedy over the reference model, seeded from the OS
    pub fn new(eps: f64, canary: f64) -> Result<Self, SchedulerError> {
        Self::build(
            Arc::new(BaselineCostModel::reference()),
            eps,
            canary,
            StdRng::from_os_rng(),
        )
    }

    pub fn with_model(
        model: Arc<dyn CostModel>,
        eps: f64,
        canary: f64,
    ) -> Result<Self, SchedulerError> {
        Self::build(model, eps, canary, StdRng::from_os_rng())
    }

    /// Reproducible exploration for tests and replays
    pub fn with_seed(
        model: Arc<dyn CostModel>,
        eps: f64,
        canary: f64,
        seed: u64,
    ) -> Result<Self, SchedulerError> {
        Self::build(model, eps, canary, StdRng::seed_from_u64(seed))
    }

    fn build(
        model: Arc<dyn CostModel>,
        eps: f64,
        canary: f64,
        rng: StdRng,
    ) -> Result<Self, SchedulerError> {
        let eps = check_unit("eps", eps)?;
        let canary = check_unit("canary", canary)?;

        let targets = model.targets();
        if targets.is_empty() {
            return Err(SchedulerError::NoTargets);
        }

        let stats = DashMap::new();
        for target in &targets {
            stats.insert(target.clone(), TargetStats::prior());
        }

        Ok(Self {
            model,
            targets,
            eps,
            canary,
            stats,
            rng: Mutex::new(rng),
        })
    }

    pub fn eps(&self) -> f64 {
        self.eps
    }

    pub fn canary(&self) -> f64 {
        self.canary
    }

    /// Current statistics for every target, in lexical order
    pub fn preferences(&self) -> Vec<TargetPreference> {
        self.targets
            .iter()
            .filter_map(|target| {
                self.stats.get(target).map(|s| TargetPreference {
                    target: target.clone(),
                    mu: s.mu,
                    n: s.n,
                    mean_reward: s.mean(),
                })
            })
            .collect()
    }

    fn mean_reward(&self, target: &str) -> f64 {
        self.stats.get(target).map(|s| s.mean()).unwrap_or(0.0)
    }
}

impl TargetSelector for ConstrainedEpsilonGreedy {
    fn decide(&self, slo: &Slo, context: &WorkloadContext) -> Decision {
        let set = CandidateSet::evaluate(self.model.as_ref(), &self.targets, slo, context);
        if set.fallback {
            warn!(
                latency_p95_ms = slo.latency_p95_ms,
                energy_j_max = slo.energy_j_max,
                "No safe candidate, ignoring safety filter"
            );
        }

        // Draw both values under one lock so a seeded policy stays reproducible
        let (roll, pick) = {
            let mut rng = self.rng.lock().unwrap_or_else(|e| e.into_inner());
            let roll = rng.random::<f64>();
            let pick = rng.random_range(0..set.candidates.len());
            (roll, pick)
        };

        let (chosen, mode) = if roll < self.eps {
            (set.candidates[pick].clone(), DecisionMode::Explore)
        } else {
            let best = set
                .argmax_by(|c| score(&c.estimate, slo) + self.mean_reward(&c.target))
                .cloned()
                .expect("target list is never empty");
            (best, DecisionMode::Exploit)
        };

        let chosen_score = score(&chosen.estimate, slo);
        debug!(
            target = %chosen.target,
            mode = mode.as_str(),
            score = chosen_score,
            "Epsilon-greedy decision"
        );

        Decision {
            target: chosen.target,
            expected: chosen.estimate,
            score: chosen_score,
            mode,
            canary_fraction: Some(self.canary),
            fallback: set.fallback,
            safe_candidates: set.names(),
        }
    }

    fn observe(&self, target: &str, outcome: &ObservedOutcome) -> Result<f64, SchedulerError> {
        let mut stats = self
            .stats
            .get_mut(target)
            .ok_or_else(|| SchedulerError::UnknownTarget(target.to_string()))?;

        let reward = outcome.reward();
        stats.mu += reward;
        stats.n += 1;
        Ok(reward)
    }

    fn name(&self) -> &'static str {
        "epsilon_greedy"
    }
}
