//! Path-aware planners
//!
//! Both planners route over links that can carry the requested bandwidth
//! and whose measured utilization and loss are inside the policy envelope.
//! Links without measurements are treated as healthy.

use super::{allocate_flow, bandwidth_request, PlanningStrategy};
use crate::error::PlanError;
use crate::models::{BandwidthIntent, ExpectedImpact, Intent, Plan, Policy, ResourceSnapshot};
use crate::topology::{Link, Topology};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

/// Hop limit for path enumeration
pub const MAX_PATH_HOPS: usize = 6;

/// Enumeration stops once this many candidate paths are collected
pub const MAX_CANDIDATE_PATHS: usize = 256;

/// Link usable for this request under this policy
fn eligible(
    link: &Link,
    request: &BandwidthIntent,
    snapshot: &ResourceSnapshot,
    policy: &Policy,
) -> bool {
    if link.capacity_gbps < request.bandwidth_gbps {
        return false;
    }
    let util_ok = snapshot
        .utilization(&link.source, &link.destination)
        .map_or(true, |u| u <= policy.max_link_utilization);
    let loss_ok = snapshot
        .loss(&link.source, &link.destination)
        .map_or(true, |l| l <= policy.max_packet_loss);
    util_ok && loss_ok
}

/// Measured latency, falling back to the static base latency
fn link_latency(link: &Link, snapshot: &ResourceSnapshot) -> f64 {
    snapshot
        .latency_ms(&link.source, &link.destination)
        .unwrap_or(link.base_latency_ms)
}

fn check_endpoints(topology: &Topology, request: &BandwidthIntent) -> Result<(), PlanError> {
    for node in [&request.source, &request.destination] {
        if !topology.contains(node) {
            return Err(PlanError::UnknownNode(node.clone()));
        }
    }
    Ok(())
}

fn check_latency_bound(request: &BandwidthIntent, path_latency_ms: f64) -> Result<(), PlanError> {
    match request.max_latency_ms {
        Some(max) if path_latency_ms > max => Err(PlanError::LatencyBoundExceeded {
            path_latency_ms,
            max_latency_ms: max,
        }),
        _ => Ok(()),
    }
}

fn routed_plan(
    strategy: &'static str,
    intent: &Intent,
    request: &BandwidthIntent,
    policy: &Policy,
    path: Vec<String>,
    path_latency_ms: f64,
    notes: String,
) -> Plan {
    Plan::new(
        &intent.intent_id,
        vec![allocate_flow(request, policy, Some(path))],
        ExpectedImpact {
            goal: "satisfy_bandwidth_intent".to_string(),
            strategy: strategy.to_string(),
            notes,
            path_latency_ms: Some(path_latency_ms),
        },
    )
}

/// Dijkstra queue entry, ordered as a min-heap on cost then node name
#[derive(Debug, PartialEq)]
struct Frontier {
    cost: f64,
    node: String,
}

impl Eq for Frontier {}

impl Ord for Frontier {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .total_cmp(&self.cost)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for Frontier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lowest-latency path over eligible links
#[derive(Debug, Clone, Copy, Default)]
pub struct ShortestPathPlanner;

impl ShortestPathPlanner {
    fn shortest(
        topology: &Topology,
        snapshot: &ResourceSnapshot,
        request: &BandwidthIntent,
        policy: &Policy,
    ) -> Option<(Vec<String>, f64)> {
        let mut dist: HashMap<&str, f64> = HashMap::new();
        let mut prev: HashMap<&str, &str> = HashMap::new();
        let mut heap = BinaryHeap::new();

        dist.insert(request.source.as_str(), 0.0);
        heap.push(Frontier {
            cost: 0.0,
            node: request.source.clone(),
        });

        while let Some(Frontier { cost, node }) = heap.pop() {
            if node == request.destination {
                break;
            }
            if dist.get(node.as_str()).is_some_and(|d| cost > *d) {
                continue;
            }

            for link in topology.links_from(&node) {
                if !eligible(link, request, snapshot, policy) {
                    continue;
                }
                let Some(next) = link.other_end(&node) else {
                    continue;
                };
                let next_cost = cost + link_latency(link, snapshot);
                if dist.get(next).map_or(true, |d| next_cost < *d) {
                    dist.insert(next, next_cost);
                    let here = if link.source == node {
                        link.source.as_str()
                    } else {
                        link.destination.as_str()
                    };
                    prev.insert(next, here);
                    heap.push(Frontier {
                        cost: next_cost,
                        node: next.to_string(),
                    });
                }
            }
        }

        let total = *dist.get(request.destination.as_str())?;
        let mut path = vec![request.destination.clone()];
        let mut cursor = request.destination.as_str();
        while let Some(&p) = prev.get(cursor) {
            path.push(p.to_string());
            cursor = p;
        }
        path.reverse();
        Some((path, total))
    }
}

impl PlanningStrategy for ShortestPathPlanner {
    fn plan(
        &self,
        topology: &Topology,
        snapshot: &ResourceSnapshot,
        intent: &Intent,
        policy: &Policy,
    ) -> Result<Plan, PlanError> {
        let request = bandwidth_request(intent)?;
        check_endpoints(topology, request)?;

        let (path, latency) = Self::shortest(topology, snapshot, request, policy).ok_or_else(|| {
            PlanError::NoFeasiblePath {
                from: request.source.clone(),
                to: request.destination.clone(),
            }
        })?;
        check_latency_bound(request, latency)?;

        let notes = format!("lowest-latency path over {} hops", path.len() - 1);
        Ok(routed_plan(self.name(), intent, request, policy, path, latency, notes))
    }

    fn name(&self) -> &'static str {
        "shortest_path"
    }
}

/// Candidate path with its bottleneck utilization
#[derive(Debug, Clone)]
struct ScoredPath {
    nodes: Vec<String>,
    latency_ms: f64,
    bottleneck_util: f64,
}

/// Path minimising the most-utilized link within the latency bound
///
/// The lowest-latency path is always a candidate. Further candidates come
/// from a depth-first walk bounded by `max_hops`, the intent's latency bound
/// and `max_candidates`, so dense fabrics stay tractable.
#[derive(Debug, Clone, Copy)]
pub struct LeastCongestedPlanner {
    pub max_hops: usize,
    pub max_candidates: usize,
}

impl Default for LeastCongestedPlanner {
    fn default() -> Self {
        Self {
            max_hops: MAX_PATH_HOPS,
            max_candidates: MAX_CANDIDATE_PATHS,
        }
    }
}

impl LeastCongestedPlanner {
    fn enumerate(
        &self,
        topology: &Topology,
        snapshot: &ResourceSnapshot,
        request: &BandwidthIntent,
        policy: &Policy,
    ) -> Vec<ScoredPath> {
        let mut found = Vec::new();
        let mut current = ScoredPath {
            nodes: vec![request.source.clone()],
            latency_ms: 0.0,
            bottleneck_util: 0.0,
        };
        self.walk(topology, snapshot, request, policy, &mut current, &mut found);
        found
    }

    fn walk(
        &self,
        topology: &Topology,
        snapshot: &ResourceSnapshot,
        request: &BandwidthIntent,
        policy: &Policy,
        current: &mut ScoredPath,
        found: &mut Vec<ScoredPath>,
    ) {
        let Some(here) = current.nodes.last().cloned() else {
            return;
        };
        if here == request.destination {
            found.push(current.clone());
            return;
        }
        if current.nodes.len() > self.max_hops {
            return;
        }

        for link in topology.links_from(&here) {
            if found.len() >= self.max_candidates {
                return;
            }
            if !eligible(link, request, snapshot, policy) {
                continue;
            }
            let Some(next) = link.other_end(&here) else {
                continue;
            };
            if current.nodes.iter().any(|n| n == next) {
                continue;
            }

            let latency_ms = current.latency_ms + link_latency(link, snapshot);
            if request.max_latency_ms.is_some_and(|max| latency_ms > max) {
                continue;
            }

            let saved = (current.latency_ms, current.bottleneck_util);
            let util = snapshot.utilization(&link.source, &link.destination).unwrap_or(0.0);
            current.latency_ms = latency_ms;
            current.bottleneck_util = current.bottleneck_util.max(util);
            current.nodes.push(next.to_string());

            self.walk(topology, snapshot, request, policy, current, found);

            current.nodes.pop();
            (current.latency_ms, current.bottleneck_util) = saved;
        }
    }
}

impl PlanningStrategy for LeastCongestedPlanner {
    fn plan(
        &self,
        topology: &Topology,
        snapshot: &ResourceSnapshot,
        intent: &Intent,
        policy: &Policy,
    ) -> Result<Plan, PlanError> {
        let request = bandwidth_request(intent)?;
        check_endpoints(topology, request)?;

        let no_path = || PlanError::NoFeasiblePath {
            from: request.source.clone(),
            to: request.destination.clone(),
        };
        let (_, fastest) =
            ShortestPathPlanner::shortest(topology, snapshot, request, policy).ok_or_else(no_path)?;
        check_latency_bound(request, fastest)?;

        let best = self
            .enumerate(topology, snapshot, request, policy)
            .into_iter()
            .min_by(|a, b| {
                a.bottleneck_util
                    .total_cmp(&b.bottleneck_util)
                    .then_with(|| a.latency_ms.total_cmp(&b.latency_ms))
                    .then_with(|| a.nodes.cmp(&b.nodes))
            })
            .ok_or_else(no_path)?;

        let notes = format!(
            "bottleneck utilization {:.2} over {} hops",
            best.bottleneck_util,
            best.nodes.len() - 1
        );
        Ok(routed_plan(
            self.name(),
            intent,
            request,
            policy,
            best.nodes,
            best.latency_ms,
            notes,
        ))
    }

    fn name(&self) -> &'static str {
        "least_congested"
    }
}
