//! Core data models for the control plane

use crate::error::PlanError;
use crate::topology::LinkKey;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

/// Default intent priority when none is given
pub const DEFAULT_PRIORITY: i32 = 3;

/// Point-in-time measured state of the topology links
///
/// A link missing from a map is unknown and never counts as a violation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceSnapshot {
    pub timestamp: DateTime<Utc>,
    /// Utilization in 0..=1
    pub link_utilization: BTreeMap<LinkKey, f64>,
    /// Packet loss in 0..=1
    pub link_loss: BTreeMap<LinkKey, f64>,
    pub link_latency_ms: BTreeMap<LinkKey, f64>,
    #[serde(default)]
    pub notes: Map<String, Value>,
}

impl ResourceSnapshot {
    /// Empty snapshot taken now
    pub fn empty() -> Self {
        Self {
            timestamp: Utc::now(),
            link_utilization: BTreeMap::new(),
            link_loss: BTreeMap::new(),
            link_latency_ms: BTreeMap::new(),
            notes: Map::new(),
        }
    }

    /// Record one link measurement
    pub fn with_link(mut self, key: LinkKey, utilization: f64, loss: f64, latency_ms: f64) -> Self {
        self.link_utilization.insert(key.clone(), utilization);
        self.link_loss.insert(key.clone(), loss);
        self.link_latency_ms.insert(key, latency_ms);
        self
    }

    pub fn utilization(&self, a: &str, b: &str) -> Option<f64> {
        lookup(&self.link_utilization, a, b)
    }

    pub fn loss(&self, a: &str, b: &str) -> Option<f64> {
        lookup(&self.link_loss, a, b)
    }

    pub fn latency_ms(&self, a: &str, b: &str) -> Option<f64> {
        lookup(&self.link_latency_ms, a, b)
    }
}

/// Measurements answer for either direction of a link
fn lookup(map: &BTreeMap<LinkKey, f64>, a: &str, b: &str) -> Option<f64> {
    let key = LinkKey::new(a, b);
    map.get(&key).or_else(|| map.get(&key.reversed())).copied()
}

/// Guardrail thresholds applied to plans and verification
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    pub max_link_utilization: f64,
    pub max_packet_loss: f64,
    pub require_verification: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_link_utilization: 0.85,
            max_packet_loss: 0.02,
            require_verification: true,
        }
    }
}

/// Request for a bandwidth guarantee between two nodes
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandwidthIntent {
    pub source: String,
    pub destination: String,
    pub bandwidth_gbps: f64,
    /// None means unconstrained
    pub max_latency_ms: Option<f64>,
    /// Scheduling hint carried through to actions
    pub priority: i32,
}

/// Kind-specific intent payload
#[derive(Debug, Clone, PartialEq)]
pub enum IntentSpec {
    Bandwidth(BandwidthIntent),
    /// A kind this build does not understand; planners reject it
    Other { kind: String, payload: Map<String, Value> },
}

impl IntentSpec {
    pub fn kind(&self) -> &str {
        match self {
            IntentSpec::Bandwidth(_) => "bandwidth",
            IntentSpec::Other { kind, .. } => kind,
        }
    }

    /// Parse a payload received from outside the process
    pub fn from_payload(kind: &str, payload: Map<String, Value>) -> Result<Self, PlanError> {
        match kind {
            "bandwidth" => {
                let source = required_str(&payload, "source")?;
                let destination = required_str(&payload, "destination")?;
                let bandwidth_gbps = payload
                    .get("bandwidth_gbps")
                    .and_then(Value::as_f64)
                    .filter(|bw| bw.is_finite() && *bw >= 0.0)
                    .ok_or_else(|| PlanError::MissingPayloadField("bandwidth_gbps".into()))?;
                let max_latency_ms = match payload.get("max_latency_ms") {
                    None | Some(Value::Null) => None,
                    Some(v) => Some(v.as_f64().filter(|l| l.is_finite()).ok_or_else(|| {
                        PlanError::MissingPayloadField("max_latency_ms".into())
                    })?),
                };
                let priority = match payload.get("priority") {
                    None | Some(Value::Null) => DEFAULT_PRIORITY,
                    Some(v) => v
                        .as_i64()
                        .and_then(|p| i32::try_from(p).ok())
                        .ok_or_else(|| PlanError::MissingPayloadField("priority".into()))?,
                };

                Ok(IntentSpec::Bandwidth(BandwidthIntent {
                    source,
                    destination,
                    bandwidth_gbps,
                    max_latency_ms,
                    priority,
                }))
            }
            other => Ok(IntentSpec::Other {
                kind: other.to_string(),
                payload,
            }),
        }
    }
}

fn required_str(payload: &Map<String, Value>, field: &str) -> Result<String, PlanError> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or_else(|| PlanError::MissingPayloadField(field.to_string()))
}

/// Declarative request for a resource outcome; never mutated after creation
#[derive(Debug, Clone, PartialEq)]
pub struct Intent {
    pub intent_id: String,
    pub created_at: DateTime<Utc>,
    pub spec: IntentSpec,
}

impl Intent {
    pub fn new(spec: IntentSpec) -> Self {
        Self {
            intent_id: uuid::Uuid::new_v4().to_string(),
            created_at: Utc::now(),
            spec,
        }
    }

    /// Build a bandwidth intent with a fresh id
    pub fn bandwidth(
        source: impl Into<String>,
        destination: impl Into<String>,
        bandwidth_gbps: f64,
        max_latency_ms: Option<f64>,
        priority: i32,
    ) -> Self {
        Self::new(IntentSpec::Bandwidth(BandwidthIntent {
            source: source.into(),
            destination: destination.into(),
            bandwidth_gbps,
            max_latency_ms,
            priority,
        }))
    }

    pub fn kind(&self) -> &str {
        self.spec.kind()
    }
}

/// Parameters of an `allocate_flow` action
///
/// Restates the intent and policy so an executor can check guardrails itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowAllocation {
    pub source: String,
    pub destination: String,
    pub bandwidth_gbps: f64,
    pub max_latency_ms: Option<f64>,
    pub priority: i32,
    /// Hop-by-hop path when the strategy selected one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<String>>,
    pub policy_max_util: f64,
    pub policy_max_loss: f64,
}

/// Atomic change an executor applies as a whole or rejects as a whole
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action_type", content = "params", rename_all = "snake_case")]
pub enum Action {
    AllocateFlow(FlowAllocation),
}

impl Action {
    pub fn action_type(&self) -> &'static str {
        match self {
            Action::AllocateFlow(_) => "allocate_flow",
        }
    }
}

/// Planner's expectation of what a plan achieves
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpectedImpact {
    pub goal: String,
    pub strategy: String,
    pub notes: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_latency_ms: Option<f64>,
}

/// Ordered actions computed for one intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub plan_id: String,
    pub intent_id: String,
    pub created_at: DateTime<Utc>,
    pub actions: Vec<Action>,
    pub expected_impact: ExpectedImpact,
}

impl Plan {
    pub fn new(
        intent_id: impl Into<String>,
        actions: Vec<Action>,
        expected_impact: ExpectedImpact,
    ) -> Self {
        Self {
            plan_id: uuid::Uuid::new_v4().to_string(),
            intent_id: intent_id.into(),
            created_at: Utc::now(),
            actions,
            expected_impact,
        }
    }
}

/// Why a control-loop cycle ended in failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    TelemetryUnavailable,
    TelemetryTimeout,
    ApplyFailed,
    ApplyTimeout,
    VerificationFailed,
    Cancelled,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::TelemetryUnavailable => "telemetry_unavailable",
            FailureReason::TelemetryTimeout => "telemetry_timeout",
            FailureReason::ApplyFailed => "apply_failed",
            FailureReason::ApplyTimeout => "apply_timeout",
            FailureReason::VerificationFailed => "verification_failed",
            FailureReason::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Permanent record of one control-loop cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub plan_id: String,
    pub intent_id: String,
    pub ok: bool,
    pub applied_actions: Vec<Action>,
    pub before: ResourceSnapshot,
    pub after: ResourceSnapshot,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureReason>,
}

/// One line of the engine's audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub intent_id: String,
    pub plan_id: String,
    pub ok: bool,
    pub message: String,
    pub timestamp: DateTime<Utc>,
}
