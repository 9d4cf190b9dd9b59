//! Cost models estimate latency, cost and energy per target

use super::Estimate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const DEFAULT_BATCH_SIZE: f64 = 1.0;
pub const DEFAULT_TOKENS: f64 = 512.0;
pub const DEFAULT_CONCURRENCY: f64 = 1.0;

/// Workload shape used to scale estimates
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkloadContext {
    pub batch_size: f64,
    pub tokens: f64,
    pub concurrency: f64,
}

impl Default for WorkloadContext {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            tokens: DEFAULT_TOKENS,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }
}

impl WorkloadContext {
    pub fn new(batch_size: f64, tokens: f64, concurrency: f64) -> Self {
        Self {
            batch_size,
            tokens,
            concurrency,
        }
    }

    /// Composite load factor `(tokens/512) * batch^0.5 * concurrency^0.6`
    ///
    /// Negative inputs count as zero.
    pub fn load(&self) -> f64 {
        (self.tokens.max(0.0) / DEFAULT_TOKENS)
            * self.batch_size.max(0.0).powf(0.5)
            * self.concurrency.max(0.0).powf(0.6)
    }
}

/// Trait for cost model implementations
///
/// Estimates must be pure and non-decreasing in the context load.
pub trait CostModel: Send + Sync {
    /// Known targets in lexical order
    fn targets(&self) -> Vec<String>;

    /// Estimate for `target`, or None if the model does not know it
    fn estimate(&self, target: &str, context: &WorkloadContext) -> Option<Estimate>;
}

/// Per-metric multipliers applied to the load factor
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sensitivity {
    pub lat_ms: f64,
    pub cost: f64,
    pub energy: f64,
}

impl Default for Sensitivity {
    fn default() -> Self {
        Self {
            lat_ms: 0.25,
            cost: 0.20,
            energy: 0.35,
        }
    }
}

/// Unloaded metrics and load sensitivity of one target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TargetProfile {
    pub base: Estimate,
    #[serde(default)]
    pub sensitivity: Sensitivity,
}

impl TargetProfile {
    pub fn new(lat_ms: f64, cost: f64, energy: f64) -> Self {
        Self {
            base: Estimate {
                lat_ms,
                cost,
                energy,
            },
            sensitivity: Sensitivity::default(),
        }
    }
}

/// Static base metrics scaled linearly by load
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BaselineCostModel {
    profiles: BTreeMap<String, TargetProfile>,
}

impl BaselineCostModel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Photonic, GPU and CPU paths with their reference base metrics
    pub fn reference() -> Self {
        Self::new()
            .with_target("photonic", TargetProfile::new(0.4, 0.0002, 1.0))
            .with_target("gpu", TargetProfile::new(1.2, 0.0005, 5.0))
            .with_target("cpu", TargetProfile::new(4.0, 0.0001, 2.0))
    }

    pub fn with_target(mut self, name: impl Into<String>, profile: TargetProfile) -> Self {
        self.profiles.insert(name.into(), profile);
        self
    }
}

impl CostModel for BaselineCostModel {
    fn targets(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }

    fn estimate(&self, target: &str, context: &WorkloadContext) -> Option<Estimate> {
        let profile = self.profiles.get(target)?;
        let load = context.load();
        let s = profile.sensitivity;

        Some(Estimate {
            lat_ms: profile.base.lat_ms * (1.0 + s.lat_ms * load),
            cost: profile.base.cost * (1.0 + s.cost * load),
            energy: profile.base.energy * (1.0 + s.energy * load),
        })
    }
}
