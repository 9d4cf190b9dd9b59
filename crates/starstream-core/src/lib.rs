//! Intent-based control plane and constrained workload scheduler
//!
//! This crate provides:
//! - Topology, snapshot, policy and intent models
//! - Pluggable planning strategies that turn intents into plans
//! - The engine running snapshot, plan, apply, verify and audit per intent
//! - Telemetry and executor traits with simulation implementations
//! - Constrained best-score and epsilon-greedy target selection
//! - Health checks and observability

pub mod engine;
pub mod error;
pub mod executor;
pub mod health;
pub mod models;
pub mod observability;
pub mod planner;
pub mod scheduler;
pub mod telemetry;
pub mod topology;

pub use engine::{AuditLog, CycleStage, Engine, EngineConfig, SubmitOptions};
pub use error::{
    ExecutorError, PlanError, SchedulerError, SubmitError, TelemetryError, TopologyError,
};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ControlPlaneMetrics, StructuredLogger};
pub use planner::{PlannerKind, PlanningStrategy};
pub use scheduler::{
    ConstrainedBestScore, ConstrainedEpsilonGreedy, Decision, DecisionMode, ObservedOutcome, Slo,
    TargetSelector, WorkloadContext,
};
pub use topology::{Link, LinkKey, Topology};
