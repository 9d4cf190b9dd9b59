//! Intent control loop
//!
//! Each submitted intent runs one cycle: snapshot, plan, apply, snapshot,
//! verify, audit. Planner and before-snapshot errors abort the submission
//! with no audit entry. Anything that goes wrong once a plan exists is
//! encoded in the `ExecutionResult` and audited.

mod audit;

pub use audit::AuditLog;

use crate::error::{ExecutorError, SubmitError, TelemetryError};
use crate::executor::Executor;
use crate::health::{components, HealthRegistry};
use crate::models::{
    Action, AuditEntry, ExecutionResult, FailureReason, Intent, Policy, ResourceSnapshot,
};
use crate::observability::{ControlPlaneMetrics, StructuredLogger};
use crate::planner::{PlanningStrategy, StubPlanner};
use crate::telemetry::TelemetryProvider;
use crate::topology::Topology;
use chrono::Utc;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{debug, warn};

pub const DEFAULT_TELEMETRY_TIMEOUT: Duration = Duration::from_millis(2000);
pub const DEFAULT_APPLY_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Message recorded for a cycle that applied and verified cleanly
pub const APPLIED_MESSAGE: &str = "applied";

/// Default per-call timeouts for collaborator I/O
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    pub telemetry_timeout: Duration,
    pub apply_timeout: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            telemetry_timeout: DEFAULT_TELEMETRY_TIMEOUT,
            apply_timeout: DEFAULT_APPLY_TIMEOUT,
        }
    }
}

/// Per-submission overrides
#[derive(Debug, Clone, Default)]
pub struct SubmitOptions {
    pub telemetry_timeout: Option<Duration>,
    pub apply_timeout: Option<Duration>,
    /// When the value is `true` before verification starts, the cycle fails as cancelled
    pub cancel: Option<watch::Receiver<bool>>,
}

impl SubmitOptions {
    pub fn with_telemetry_timeout(mut self, timeout: Duration) -> Self {
        self.telemetry_timeout = Some(timeout);
        self
    }

    pub fn with_apply_timeout(mut self, timeout: Duration) -> Self {
        self.apply_timeout = Some(timeout);
        self
    }

    pub fn with_cancel(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }
}

/// Position of a submission in the control loop
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CycleStage {
    Received,
    SnapshottingBefore,
    Planned,
    Applying,
    SnapshottingAfter,
    Verifying,
    Succeeded,
    Failed,
}

impl CycleStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CycleStage::Received => "received",
            CycleStage::SnapshottingBefore => "snapshotting_before",
            CycleStage::Planned => "planned",
            CycleStage::Applying => "applying",
            CycleStage::SnapshottingAfter => "snapshotting_after",
            CycleStage::Verifying => "verifying",
            CycleStage::Succeeded => "succeeded",
            CycleStage::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, CycleStage::Succeeded | CycleStage::Failed)
    }
}

impl fmt::Display for CycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal state of a cycle that produced a plan
struct Verdict {
    ok: bool,
    message: String,
    failure: Option<FailureReason>,
}

impl Verdict {
    fn succeeded() -> Self {
        Self {
            ok: true,
            message: APPLIED_MESSAGE.to_string(),
            failure: None,
        }
    }

    fn failed(reason: FailureReason, message: String) -> Self {
        Self {
            ok: false,
            message,
            failure: Some(reason),
        }
    }
}

/// Orchestrates the plan, apply, verify loop and owns the audit log
///
/// `Send + Sync`; share it behind an `Arc`. Submissions for different
/// intents may run concurrently. An intent id is accepted once.
pub struct Engine {
    topology: Topology,
    policy: Policy,
    planner: Box<dyn PlanningStrategy>,
    telemetry: Arc<dyn TelemetryProvider>,
    executor: Arc<dyn Executor>,
    config: EngineConfig,
    audit: AuditLog,
    submitted: DashSet<String>,
    health: Option<HealthRegistry>,
    metrics: ControlPlaneMetrics,
    logger: StructuredLogger,
}

impl Engine {
    /// Engine with the stub planner and default timeouts
    pub fn new(
        topology: Topology,
        telemetry: Arc<dyn TelemetryProvider>,
        executor: Arc<dyn Executor>,
        policy: Policy,
    ) -> Self {
        Self {
            topology,
            policy,
            planner: Box::new(StubPlanner),
            telemetry,
            executor,
            config: EngineConfig::default(),
            audit: AuditLog::new(),
            submitted: DashSet::new(),
            health: None,
            metrics: ControlPlaneMetrics::new(),
            logger: StructuredLogger::new("engine"),
        }
    }

    pub fn with_planner(mut self, planner: Box<dyn PlanningStrategy>) -> Self {
        self.planner = planner;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Report telemetry and executor health here after each cycle
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn topology(&self) -> &Topology {
        &self.topology
    }

    pub fn policy(&self) -> &Policy {
        &self.policy
    }

    pub fn planner_name(&self) -> &'static str {
        self.planner.name()
    }

    /// Shared handle to the audit log
    pub fn audit(&self) -> &AuditLog {
        &self.audit
    }

    pub async fn submit_intent(&self, intent: Intent) -> Result<ExecutionResult, SubmitError> {
        self.submit_intent_with(intent, SubmitOptions::default())
            .await
    }

    /// Run one cycle for `intent`
    ///
    /// Returns `Err` only when no plan was produced or the id was already
    /// submitted; in that case the audit log is untouched and the id may be
    /// submitted again unless it was a duplicate.
    pub async fn submit_intent_with(
        &self,
        intent: Intent,
        options: SubmitOptions,
    ) -> Result<ExecutionResult, SubmitError> {
        let started = Instant::now();
        self.metrics.inc_intents_submitted();
        self.logger
            .log_intent_submitted(&intent.intent_id, intent.kind());

        if !self.submitted.insert(intent.intent_id.clone()) {
            let err = SubmitError::DuplicateIntent(intent.intent_id.clone());
            self.reject(&intent, "duplicate_intent", &err);
            return Err(err);
        }

        match self.run_cycle(&intent, &options).await {
            Ok(result) => {
                let elapsed = started.elapsed();
                self.metrics.observe_cycle_latency(elapsed.as_secs_f64());
                self.metrics.inc_cycle_outcome(
                    result
                        .failure
                        .map(|r| r.as_str())
                        .unwrap_or(CycleStage::Succeeded.as_str()),
                );
                self.logger
                    .log_cycle_completed(&result, elapsed.as_millis());
                Ok(result)
            }
            Err(err) => {
                self.submitted.remove(&intent.intent_id);
                let reason = match &err {
                    SubmitError::Plan(_) => "plan_error",
                    SubmitError::Telemetry(TelemetryError::Timeout(_)) => "telemetry_timeout",
                    SubmitError::Telemetry(_) => "telemetry_unavailable",
                    SubmitError::DuplicateIntent(_) => "duplicate_intent",
                };
                self.reject(&intent, reason, &err);
                Err(err)
            }
        }
    }

    async fn run_cycle(
        &self,
        intent: &Intent,
        options: &SubmitOptions,
    ) -> Result<ExecutionResult, SubmitError> {
        let id = intent.intent_id.as_str();
        let telemetry_timeout = options
            .telemetry_timeout
            .unwrap_or(self.config.telemetry_timeout);
        let apply_timeout = options.apply_timeout.unwrap_or(self.config.apply_timeout);

        self.enter(id, CycleStage::Received);
        self.enter(id, CycleStage::SnapshottingBefore);
        let before = self.snapshot(telemetry_timeout).await?;

        let plan_started = Instant::now();
        let plan = self
            .planner
            .plan(&self.topology, &before, intent, &self.policy)?;
        self.metrics
            .observe_plan_latency(plan_started.elapsed().as_secs_f64());
        self.enter(id, CycleStage::Planned);

        self.enter(id, CycleStage::Applying);
        let apply_started = Instant::now();
        let applied = self.apply(&plan.actions, apply_timeout).await;
        self.metrics
            .observe_apply_latency(apply_started.elapsed().as_secs_f64());

        self.enter(id, CycleStage::SnapshottingAfter);
        let after = self.snapshot(telemetry_timeout).await;

        let (verdict, after) = match (applied, after) {
            (Err(err), after) => {
                let after = after.unwrap_or_else(|_| before.clone());
                (apply_verdict(&err), after)
            }
            (Ok(()), Err(err)) => (telemetry_verdict(&err), before.clone()),
            (Ok(()), Ok(after)) if options.is_cancelled() => (
                Verdict::failed(
                    FailureReason::Cancelled,
                    "cancelled: verification not started".to_string(),
                ),
                after,
            ),
            (Ok(()), Ok(after)) => {
                self.enter(id, CycleStage::Verifying);
                (self.verify(id, &after), after)
            }
        };

        self.enter(
            id,
            if verdict.ok {
                CycleStage::Succeeded
            } else {
                CycleStage::Failed
            },
        );

        let count = self
            .audit
            .append(AuditEntry {
                intent_id: intent.intent_id.clone(),
                plan_id: plan.plan_id.clone(),
                ok: verdict.ok,
                message: verdict.message.clone(),
                timestamp: Utc::now(),
            })
            .await;
        self.metrics.set_audit_entries(count as i64);

        // Nothing counts as applied unless the executor confirmed it
        let applied_actions = match verdict.failure {
            Some(FailureReason::ApplyFailed) | Some(FailureReason::ApplyTimeout) => Vec::new(),
            _ => plan.actions,
        };

        Ok(ExecutionResult {
            plan_id: plan.plan_id,
            intent_id: intent.intent_id.clone(),
            ok: verdict.ok,
            applied_actions,
            before,
            after,
            message: verdict.message,
            failure: verdict.failure,
        })
    }

    fn enter(&self, intent_id: &str, stage: CycleStage) {
        debug!(intent_id = %intent_id, stage = %stage, "Cycle stage");
    }

    fn reject(&self, intent: &Intent, reason: &str, err: &SubmitError) {
        self.metrics.inc_submission_rejected(reason);
        self.logger
            .log_submission_rejected(&intent.intent_id, reason, &err.to_string());
    }

    async fn snapshot(&self, timeout: Duration) -> Result<ResourceSnapshot, TelemetryError> {
        let result = match tokio::time::timeout(timeout, self.telemetry.snapshot()).await {
            Ok(result) => result,
            Err(_) => Err(TelemetryError::Timeout(timeout)),
        };

        if let Some(health) = &self.health {
            match &result {
                Ok(_) => health.set_healthy(components::TELEMETRY).await,
                Err(err) => health.set_degraded(components::TELEMETRY, err.to_string()).await,
            }
        }
        result
    }

    async fn apply(
        &self,
        actions: &[Action],
        timeout: Duration,
    ) -> Result<(), ExecutorError> {
        let result = match tokio::time::timeout(timeout, self.executor.apply(actions)).await {
            Ok(result) => result,
            Err(_) => Err(ExecutorError::Timeout(timeout)),
        };

        if let Some(health) = &self.health {
            match &result {
                Ok(()) => health.set_healthy(components::EXECUTOR).await,
                Err(err) => health.set_degraded(components::EXECUTOR, err.to_string()).await,
            }
        }
        result
    }

    /// Check the after-snapshot against policy
    ///
    /// Loss above the limit fails the cycle; the first offending link in key
    /// order is reported. Utilization above the limit is only logged.
    fn verify(&self, intent_id: &str, after: &ResourceSnapshot) -> Verdict {
        if !self.policy.require_verification {
            return Verdict::succeeded();
        }

        for (link, utilization) in &after.link_utilization {
            if *utilization > self.policy.max_link_utilization {
                warn!(
                    intent_id = %intent_id,
                    link = %link,
                    utilization = *utilization,
                    limit = self.policy.max_link_utilization,
                    "Link utilization above policy after apply"
                );
            }
        }

        match after
            .link_loss
            .iter()
            .find(|(_, loss)| **loss > self.policy.max_packet_loss)
        {
            Some((link, loss)) => {
                debug!(intent_id = %intent_id, link = %link, loss = *loss, "Loss check failed");
                Verdict::failed(
                    FailureReason::VerificationFailed,
                    format!(
                        "verification_failed: loss {:.3} > {:.3}",
                        loss, self.policy.max_packet_loss
                    ),
                )
            }
            None => Verdict::succeeded(),
        }
    }
}

fn apply_verdict(err: &ExecutorError) -> Verdict {
    match err {
        ExecutorError::Rejected(detail) => Verdict::failed(
            FailureReason::ApplyFailed,
            format!("apply_failed: {}", detail),
        ),
        ExecutorError::Timeout(after) => Verdict::failed(
            FailureReason::ApplyTimeout,
            format!("apply_timeout: no response after {}ms", after.as_millis()),
        ),
    }
}

fn telemetry_verdict(err: &TelemetryError) -> Verdict {
    match err {
        TelemetryError::Timeout(after) => Verdict::failed(
            FailureReason::TelemetryTimeout,
            format!(
                "telemetry_timeout: after-snapshot took longer than {}ms",
                after.as_millis()
            ),
        ),
        TelemetryError::Unavailable(detail) => Verdict::failed(
            FailureReason::TelemetryUnavailable,
            format!("telemetry_unavailable: {}", detail),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::SimExecutor;
    use crate::telemetry::{SimTelemetry, StaticTelemetry};
    use crate::topology::LinkKey;

    fn clean_snapshot() -> ResourceSnapshot {
        ResourceSnapshot::empty()
            .with_link(LinkKey::new("A", "B"), 0.50, 0.005, 8.0)
            .with_link(LinkKey::new("B", "C"), 0.60, 0.010, 12.0)
    }

    fn engine_with(telemetry: Arc<dyn TelemetryProvider>) -> Engine {
        Engine::new(
            Topology::reference(),
            telemetry,
            Arc::new(SimExecutor::new()),
            Policy::default(),
        )
    }

    #[test]
    fn test_cycle_stage_names() {
        assert_eq!(CycleStage::SnapshottingAfter.as_str(), "snapshotting_after");
        assert!(CycleStage::Failed.is_terminal());
        assert!(!CycleStage::Verifying.is_terminal());
    }

    #[tokio::test]
    async fn test_clean_cycle_succeeds() {
        let engine = engine_with(Arc::new(StaticTelemetry::new(clean_snapshot())));
        let result = engine
            .submit_intent(Intent::bandwidth("A", "C", 50.0, Some(25.0), 5))
            .await
            .unwrap();

        assert!(result.ok);
        assert_eq!(result.message, APPLIED_MESSAGE);
        assert_eq!(result.failure, None);
        assert_eq!(result.applied_actions.len(), 1);
        assert_eq!(engine.audit().len().await, 1);
    }

    #[tokio::test]
    async fn test_first_loss_violation_in_key_order() {
        let after = ResourceSnapshot::empty()
            .with_link(LinkKey::new("B", "C"), 0.1, 0.050, 12.0)
            .with_link(LinkKey::new("A", "C"), 0.1, 0.030, 30.0);
        let engine = engine_with(Arc::new(StaticTelemetry::sequence(vec![
            clean_snapshot(),
            after,
        ])));

        let result = engine
            .submit_intent(Intent::bandwidth("A", "C", 10.0, None, 3))
            .await
            .unwrap();

        // "A->C" sorts before "B->C"
        assert_eq!(result.message, "verification_failed: loss 0.030 > 0.020");
        assert_eq!(result.failure, Some(FailureReason::VerificationFailed));
    }

    #[tokio::test]
    async fn test_verification_can_be_disabled() {
        let policy = Policy {
            require_verification: false,
            ..Policy::default()
        };
        let engine = Engine::new(
            Topology::reference(),
            Arc::new(SimTelemetry),
            Arc::new(SimExecutor::new()),
            policy,
        );

        let result = engine
            .submit_intent(Intent::bandwidth("A", "C", 50.0, Some(25.0), 5))
            .await
            .unwrap();
        assert!(result.ok);
    }

    #[tokio::test]
    async fn test_high_utilization_only_warns() {
        let after = ResourceSnapshot::empty().with_link(LinkKey::new("A", "B"), 0.99, 0.0, 8.0);
        let engine = engine_with(Arc::new(StaticTelemetry::new(after)));

        let result = engine
            .submit_intent(Intent::bandwidth("A", "B", 1.0, None, 3))
            .await
            .unwrap();
        assert!(result.ok);
    }

    #[tokio::test]
    async fn test_health_reflects_apply_timeout() {
        let health = HealthRegistry::new();
        health.register_all().await;
        let engine = Engine::new(
            Topology::reference(),
            Arc::new(StaticTelemetry::new(clean_snapshot())),
            Arc::new(SimExecutor::new().with_delay(Duration::from_millis(200))),
            Policy::default(),
        )
        .with_health(health.clone())
        .with_config(EngineConfig {
            telemetry_timeout: DEFAULT_TELEMETRY_TIMEOUT,
            apply_timeout: Duration::from_millis(20),
        });

        let result = engine
            .submit_intent(Intent::bandwidth("A", "C", 5.0, None, 3))
            .await
            .unwrap();

        assert_eq!(result.failure, Some(FailureReason::ApplyTimeout));
        assert!(result.message.starts_with("apply_timeout"));
        assert!(result.applied_actions.is_empty());

        let report = health.health().await;
        assert_eq!(
            report.components[components::EXECUTOR].status,
            crate::health::ComponentStatus::Degraded
        );
        assert_eq!(
            report.components[components::TELEMETRY].status,
            crate::health::ComponentStatus::Healthy
        );
    }
}
