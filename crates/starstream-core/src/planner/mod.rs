//! Planning strategies
//!
//! A planner turns an intent into a plan of concrete actions given the
//! topology, the current snapshot and the policy. Strategies are pure:
//! identical inputs give identical actions; only plan ids and timestamps
//! differ between calls.

mod path;
mod stub;

pub use path::{LeastCongestedPlanner, ShortestPathPlanner, MAX_PATH_HOPS};
pub use stub::StubPlanner;

use crate::error::PlanError;
use crate::models::{
    Action, BandwidthIntent, FlowAllocation, Intent, IntentSpec, Plan, Policy, ResourceSnapshot,
};
use crate::topology::Topology;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trait for planning strategy implementations
pub trait PlanningStrategy: Send + Sync {
    /// Compute a plan for `intent`; must not mutate any input
    fn plan(
        &self,
        topology: &Topology,
        snapshot: &ResourceSnapshot,
        intent: &Intent,
        policy: &Policy,
    ) -> Result<Plan, PlanError>;

    /// Strategy name recorded in plan metadata
    fn name(&self) -> &'static str;
}

/// Strategy selection from configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlannerKind {
    #[default]
    Stub,
    ShortestPath,
    LeastCongested,
}

impl PlannerKind {
    pub fn build(self) -> Box<dyn PlanningStrategy> {
        match self {
            PlannerKind::Stub => Box::new(StubPlanner),
            PlannerKind::ShortestPath => Box::new(ShortestPathPlanner),
            PlannerKind::LeastCongested => Box::new(LeastCongestedPlanner::default()),
        }
    }
}

impl fmt::Display for PlannerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlannerKind::Stub => "stub",
            PlannerKind::ShortestPath => "shortest_path",
            PlannerKind::LeastCongested => "least_congested",
        };
        f.write_str(name)
    }
}

/// Extract the bandwidth payload, rejecting every other kind
pub(crate) fn bandwidth_request(intent: &Intent) -> Result<&BandwidthIntent, PlanError> {
    match &intent.spec {
        IntentSpec::Bandwidth(bw) => Ok(bw),
        IntentSpec::Other { kind, .. } => Err(PlanError::UnsupportedIntentKind(kind.clone())),
    }
}

/// `allocate_flow` action restating the request and the policy thresholds
pub(crate) fn allocate_flow(
    request: &BandwidthIntent,
    policy: &Policy,
    path: Option<Vec<String>>,
) -> Action {
    Action::AllocateFlow(FlowAllocation {
        source: request.source.clone(),
        destination: request.destination.clone(),
        bandwidth_gbps: request.bandwidth_gbps,
        max_latency_ms: request.max_latency_ms,
        priority: request.priority,
        path,
        policy_max_util: policy.max_link_utilization,
        policy_max_loss: policy.max_packet_loss,
    })
}
