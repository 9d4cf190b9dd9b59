//! Reference planner that emits a single unrouted flow allocation

use super::{allocate_flow, bandwidth_request, PlanningStrategy};
use crate::error::PlanError;
use crate::models::{ExpectedImpact, Intent, Plan, Policy, ResourceSnapshot};
use crate::topology::Topology;

/// Emits one `allocate_flow` and leaves path selection to the executor
#[derive(Debug, Clone, Copy, Default)]
pub struct StubPlanner;

impl PlanningStrategy for StubPlanner {
    fn plan(
        &self,
        _topology: &Topology,
        _snapshot: &ResourceSnapshot,
        intent: &Intent,
        policy: &Policy,
    ) -> Result<Plan, PlanError> {
        let request = bandwidth_request(intent)?;

        Ok(Plan::new(
            &intent.intent_id,
            vec![allocate_flow(request, policy, None)],
            ExpectedImpact {
                goal: "satisfy_bandwidth_intent".to_string(),
                strategy: self.name().to_string(),
                notes: "single allocate_flow, path chosen by executor".to_string(),
                path_latency_ms: None,
            },
        ))
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
