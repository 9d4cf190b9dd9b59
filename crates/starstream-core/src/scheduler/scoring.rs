//! Safety filter and SLO score shared by all scheduling policies

use super::{CostModel, Estimate, Slo, WorkloadContext};

/// Latency may exceed the SLO p95 by this factor and still count as safe
pub const LATENCY_SAFETY_FACTOR: f64 = 1.05;

/// Energy may exceed the SLO cap by this factor and still count as safe
pub const ENERGY_SAFETY_FACTOR: f64 = 1.10;

const LATENCY_WEIGHT: f64 = 0.55;
const COST_WEIGHT: f64 = 0.30;
const ENERGY_WEIGHT: f64 = 0.15;

pub fn is_safe(estimate: &Estimate, slo: &Slo) -> bool {
    estimate.lat_ms <= slo.latency_p95_ms * LATENCY_SAFETY_FACTOR
        && estimate.energy <= slo.energy_j_max * ENERGY_SAFETY_FACTOR
}

/// Higher is better: inverse of the weighted SLO-relative penalties
pub fn score(estimate: &Estimate, slo: &Slo) -> f64 {
    let lat_pen = estimate.lat_ms / slo.latency_p95_ms.max(1e-6);
    let cost_pen = estimate.cost / slo.cost_per_1k.max(1e-9);
    let energy_pen = estimate.energy / slo.energy_j_max.max(1e-9);
    1.0 / (LATENCY_WEIGHT * lat_pen + COST_WEIGHT * cost_pen + ENERGY_WEIGHT * energy_pen)
}

/// One target with its estimate for the current context
#[derive(Debug, Clone)]
pub(crate) struct Candidate {
    pub target: String,
    pub estimate: Estimate,
}

/// Candidates considered for a decision, in lexical target order
pub(crate) struct CandidateSet {
    pub candidates: Vec<Candidate>,
    /// True when nothing passed the safety filter
    pub fallback: bool,
}

impl CandidateSet {
    /// Estimate every target and keep the safe ones, or all of them if none is safe
    ///
    /// A target the model cannot estimate gets [`Estimate::UNBOUNDED`].
    pub fn evaluate(
        model: &dyn CostModel,
        targets: &[String],
        slo: &Slo,
        context: &WorkloadContext,
    ) -> Self {
        let all: Vec<Candidate> = targets
            .iter()
            .map(|target| Candidate {
                target: target.clone(),
                estimate: model
                    .estimate(target, context)
                    .unwrap_or(Estimate::UNBOUNDED),
            })
            .collect();

        let safe: Vec<Candidate> = all
            .iter()
            .filter(|c| is_safe(&c.estimate, slo))
            .cloned()
            .collect();

        if safe.is_empty() {
            Self {
                candidates: all,
                fallback: true,
            }
        } else {
            Self {
                candidates: safe,
                fallback: false,
            }
        }
    }

    pub fn names(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.target.clone()).collect()
    }

    /// First candidate with the highest value; earlier (lexically smaller) wins ties
    pub fn argmax_by<F>(&self, mut value: F) -> Option<&Candidate>
    where
        F: FnMut(&Candidate) -> f64,
    {
        let mut best: Option<(&Candidate, f64)> = None;
        for candidate in &self.candidates {
            let v = value(candidate);
            match best {
                Some((_, current)) if v <= current => {}
                _ => best = Some((candidate, v)),
            }
        }
        best.map(|(c, _)| c)
    }
}
