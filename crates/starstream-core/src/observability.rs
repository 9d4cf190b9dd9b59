//! Observability infrastructure for the control plane
//!
//! Provides:
//! - Prometheus metrics (cycle/plan/apply latency, outcomes, audit size, scheduler decisions)
//! - Structured JSON logging with tracing

use crate::models::ExecutionResult;
use crate::scheduler::Decision;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Default histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ControlPlaneMetricsInner> = OnceLock::new();

struct ControlPlaneMetricsInner {
    cycle_latency_seconds: Histogram,
    plan_latency_seconds: Histogram,
    apply_latency_seconds: Histogram,
    intents_submitted: IntCounter,
    cycle_outcomes: IntCounterVec,
    submissions_rejected: IntCounterVec,
    audit_entries: IntGauge,
    scheduler_decisions: IntCounterVec,
    scheduler_fallbacks: IntCounter,
    scheduler_observations: IntCounterVec,
}

impl ControlPlaneMetricsInner {
    fn new() -> Self {
        Self {
            cycle_latency_seconds: register_histogram!(
                "starstream_cycle_latency_seconds",
                "Time spent on one snapshot-plan-apply-verify cycle",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register cycle_latency_seconds"),

            plan_latency_seconds: register_histogram!(
                "starstream_plan_latency_seconds",
                "Time spent computing a plan",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register plan_latency_seconds"),

            apply_latency_seconds: register_histogram!(
                "starstream_apply_latency_seconds",
                "Time spent in executor apply calls",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register apply_latency_seconds"),

            intents_submitted: register_int_counter!(
                "starstream_intents_submitted_total",
                "Total number of intents submitted"
            )
            .expect("Failed to register intents_submitted"),

            cycle_outcomes: register_int_counter_vec!(
                "starstream_cycle_outcomes_total",
                "Completed control-loop cycles by outcome",
                &["outcome"]
            )
            .expect("Failed to register cycle_outcomes"),

            submissions_rejected: register_int_counter_vec!(
                "starstream_submissions_rejected_total",
                "Submissions aborted before anything was applied",
                &["reason"]
            )
            .expect("Failed to register submissions_rejected"),

            audit_entries: register_int_gauge!(
                "starstream_audit_entries",
                "Number of entries in the in-memory audit log"
            )
            .expect("Failed to register audit_entries"),

            scheduler_decisions: register_int_counter_vec!(
                "starstream_scheduler_decisions_total",
                "Scheduler decisions by policy, mode and target",
                &["policy", "mode", "target"]
            )
            .expect("Failed to register scheduler_decisions"),

            scheduler_fallbacks: register_int_counter!(
                "starstream_scheduler_fallbacks_total",
                "Decisions taken with no safe candidate available"
            )
            .expect("Failed to register scheduler_fallbacks"),

            scheduler_observations: register_int_counter_vec!(
                "starstream_scheduler_observations_total",
                "Outcome observations fed back to the scheduler",
                &["target"]
            )
            .expect("Failed to register scheduler_observations"),
        }
    }
}

/// Control plane metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share it.
#[derive(Clone)]
pub struct ControlPlaneMetrics {
    _private: (),
}

impl Default for ControlPlaneMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ControlPlaneMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ControlPlaneMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ControlPlaneMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_cycle_latency(&self, duration_secs: f64) {
        self.inner().cycle_latency_seconds.observe(duration_secs);
    }

    pub fn observe_plan_latency(&self, duration_secs: f64) {
        self.inner().plan_latency_seconds.observe(duration_secs);
    }

    pub fn observe_apply_latency(&self, duration_secs: f64) {
        self.inner().apply_latency_seconds.observe(duration_secs);
    }

    pub fn inc_intents_submitted(&self) {
        self.inner().intents_submitted.inc();
    }

    /// Count a finished cycle; `outcome` is "succeeded" or a failure reason
    pub fn inc_cycle_outcome(&self, outcome: &str) {
        self.inner().cycle_outcomes.with_label_values(&[outcome]).inc();
    }

    pub fn inc_submission_rejected(&self, reason: &str) {
        self.inner()
            .submissions_rejected
            .with_label_values(&[reason])
            .inc();
    }

    pub fn set_audit_entries(&self, count: i64) {
        self.inner().audit_entries.set(count);
    }

    pub fn record_decision(&self, policy: &str, decision: &Decision) {
        self.inner()
            .scheduler_decisions
            .with_label_values(&[policy, decision.mode.as_str(), &decision.target])
            .inc();
        if decision.fallback {
            self.inner().scheduler_fallbacks.inc();
        }
    }

    pub fn inc_observations(&self, target: &str) {
        self.inner()
            .scheduler_observations
            .with_label_values(&[target])
            .inc();
    }
}

/// Structured logger for control plane events
///
/// Provides consistent JSON-formatted logging for cycles, rejections and
/// scheduler activity.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_intent_submitted(&self, intent_id: &str, kind: &str) {
        info!(
            event = "intent_submitted",
            instance = %self.instance,
            intent_id = %intent_id,
            kind = %kind,
            "Intent submitted"
        );
    }

    /// Log the terminal state of a control-loop cycle
    pub fn log_cycle_completed(&self, result: &ExecutionResult, elapsed_ms: u128) {
        if result.ok {
            info!(
                event = "plan_applied",
                instance = %self.instance,
                intent_id = %result.intent_id,
                plan_id = %result.plan_id,
                actions = result.applied_actions.len(),
                elapsed_ms = elapsed_ms,
                "Plan applied and verified"
            );
        } else {
            warn!(
                event = result.failure.map(|r| r.as_str()).unwrap_or("plan_failed"),
                instance = %self.instance,
                intent_id = %result.intent_id,
                plan_id = %result.plan_id,
                reason = result.failure.map(|r| r.as_str()).unwrap_or("unknown"),
                message = %result.message,
                elapsed_ms = elapsed_ms,
                "Plan cycle failed"
            );
        }
    }

    pub fn log_submission_rejected(&self, intent_id: &str, reason: &str, details: &str) {
        warn!(
            event = "intent_rejected",
            instance = %self.instance,
            intent_id = %intent_id,
            reason = %reason,
            details = %details,
            "Intent rejected before apply"
        );
    }

    pub fn log_decision(&self, policy: &str, decision: &Decision) {
        info!(
            event = "scheduler_decision",
            instance = %self.instance,
            policy = %policy,
            target = %decision.target,
            mode = decision.mode.as_str(),
            score = decision.score,
            expected_lat_ms = decision.expected.lat_ms,
            expected_cost = decision.expected.cost,
            expected_energy = decision.expected.energy,
            fallback = decision.fallback,
            "Scheduling target selected"
        );
    }

    pub fn log_observation(&self, target: &str, reward: f64) {
        info!(
            event = "scheduler_observation",
            instance = %self.instance,
            target = %target,
            reward = reward,
            "Scheduler outcome observed"
        );
    }

    pub fn log_startup(&self, version: &str, planner: &str) {
        info!(
            event = "control_plane_started",
            instance = %self.instance,
            version = %version,
            planner = %planner,
            "Control plane started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "control_plane_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Control plane shutting down"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_plane_metrics_creation() {
        // Registration happens once per process; further handles share it
        let metrics = ControlPlaneMetrics::new();
        let again = ControlPlaneMetrics::new();

        metrics.observe_cycle_latency(0.001);
        metrics.observe_plan_latency(0.0001);
        again.observe_apply_latency(0.002);
        metrics.inc_intents_submitted();
        metrics.inc_cycle_outcome("succeeded");
        metrics.inc_submission_rejected("plan_error");
        metrics.set_audit_entries(3);
        again.inc_observations("gpu");
    }

    #[test]
    fn test_structured_logger_creation() {
        let logger = StructuredLogger::new("test-instance");
        assert_eq!(logger.instance, "test-instance");
    }
}
