//! Error types for the control plane and scheduler

use std::time::Duration;
use thiserror::Error;

/// Errors raised by a planning strategy
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlanError {
    #[error("unsupported intent kind: {0}")]
    UnsupportedIntentKind(String),

    #[error("missing or invalid payload field: {0}")]
    MissingPayloadField(String),

    #[error("node {0} is not part of the topology")]
    UnknownNode(String),

    #[error("no feasible path from {from} to {to}")]
    NoFeasiblePath { from: String, to: String },

    #[error("best path latency {path_latency_ms:.3}ms exceeds bound {max_latency_ms:.3}ms")]
    LatencyBoundExceeded {
        path_latency_ms: f64,
        max_latency_ms: f64,
    },
}

/// Errors raised by a telemetry provider
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TelemetryError {
    #[error("telemetry unavailable: {0}")]
    Unavailable(String),

    #[error("telemetry snapshot timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors raised by an executor
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExecutorError {
    #[error("executor rejected actions: {0}")]
    Rejected(String),

    #[error("apply timed out after {0:?}")]
    Timeout(Duration),
}

/// Errors that abort an intent submission before anything is audited
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error(transparent)]
    Plan(#[from] PlanError),

    #[error(transparent)]
    Telemetry(#[from] TelemetryError),

    #[error("intent {0} was already submitted")]
    DuplicateIntent(String),
}

/// Errors raised by the scheduler
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchedulerError {
    #[error("unknown scheduling target: {0}")]
    UnknownTarget(String),

    #[error("cost model has no targets")]
    NoTargets,

    #[error("invalid scheduler parameter {name}: {value} (expected 0.0..=1.0)")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// Topology consistency errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TopologyError {
    #[error("link {from}->{to} references undeclared node {node}")]
    UnknownEndpoint {
        from: String,
        to: String,
        node: String,
    },
}
