//! HTTP API: intents, audit, scheduling decisions, health and metrics

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use prometheus::{Encoder, TextEncoder};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use starstream_core::{
    health::{ComponentStatus, HealthRegistry},
    observability::{ControlPlaneMetrics, StructuredLogger},
    scheduler::{ConstrainedBestScore, ConstrainedEpsilonGreedy},
    Engine, Intent, IntentSpec, ObservedOutcome, PlanError, SchedulerError, Slo, SubmitError,
    TargetSelector, WorkloadContext,
};
use std::sync::Arc;
use tracing::{error, info};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<Engine>,
    pub best_score: Arc<ConstrainedBestScore>,
    pub selector: Arc<ConstrainedEpsilonGreedy>,
    pub health_registry: HealthRegistry,
    pub metrics: ControlPlaneMetrics,
    pub logger: StructuredLogger,
}

impl AppState {
    pub fn new(
        engine: Arc<Engine>,
        selector: Arc<ConstrainedEpsilonGreedy>,
        health_registry: HealthRegistry,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            engine,
            best_score: Arc::new(ConstrainedBestScore::new()),
            selector,
            health_registry,
            metrics: ControlPlaneMetrics::new(),
            logger,
        }
    }
}

/// JSON error body with a stable machine-readable code
#[derive(Debug, Serialize)]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    pub error: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, error: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            error,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        let code = match &err {
            PlanError::UnsupportedIntentKind(_) => "unsupported_intent_kind",
            PlanError::MissingPayloadField(_) => "missing_payload_field",
            PlanError::UnknownNode(_) => "unknown_node",
            PlanError::NoFeasiblePath { .. } => "no_feasible_path",
            PlanError::LatencyBoundExceeded { .. } => "latency_bound_exceeded",
        };
        ApiError::new(StatusCode::BAD_REQUEST, code, err.to_string())
    }
}

impl From<SubmitError> for ApiError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Plan(plan) => plan.into(),
            SubmitError::Telemetry(telemetry) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                "telemetry_unavailable",
                telemetry.to_string(),
            ),
            SubmitError::DuplicateIntent(_) => {
                ApiError::new(StatusCode::CONFLICT, "duplicate_intent", err.to_string())
            }
        }
    }
}

impl From<SchedulerError> for ApiError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::UnknownTarget(_) => {
                ApiError::new(StatusCode::NOT_FOUND, "unknown_target", err.to_string())
            }
            _ => ApiError::new(StatusCode::BAD_REQUEST, "invalid_request", err.to_string()),
        }
    }
}

/// Body of `POST /v1/intents`; fields other than `kind` and `intent_id` form the payload
#[derive(Debug, Deserialize)]
pub struct IntentRequest {
    pub kind: String,
    /// Client-chosen id, making retries idempotent; generated when absent
    #[serde(default)]
    pub intent_id: Option<String>,
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

/// Which scheduling policy answers a decision request
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectorKind {
    BestScore,
    #[default]
    EpsilonGreedy,
}

#[derive(Debug, Deserialize)]
pub struct DecisionRequest {
    pub slo: Slo,
    #[serde(default)]
    pub context: WorkloadContext,
    #[serde(default)]
    pub policy: SelectorKind,
}

#[derive(Debug, Deserialize)]
pub struct ObservationRequest {
    pub target: String,
    #[serde(default = "default_outcome")]
    pub outcome: ObservedOutcome,
}

fn default_outcome() -> ObservedOutcome {
    ObservedOutcome::new(0.0, starstream_core::scheduler::MIN_OBSERVED_COST)
}

/// Health check response - returns 200 if healthy, 503 if unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

/// Prometheus metrics endpoint
async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

async fn submit_intent(
    State(state): State<Arc<AppState>>,
    Json(request): Json<IntentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let spec = IntentSpec::from_payload(&request.kind, request.payload)?;
    let mut intent = Intent::new(spec);
    if let Some(id) = request.intent_id {
        intent.intent_id = id;
    }

    let result = state.engine.submit_intent(intent).await?;
    Ok(Json(result))
}

async fn audit(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.engine.audit().entries().await)
}

async fn decide(
    State(state): State<Arc<AppState>>,
    Json(request): Json<DecisionRequest>,
) -> impl IntoResponse {
    let selector: &dyn TargetSelector = match request.policy {
        SelectorKind::BestScore => state.best_score.as_ref(),
        SelectorKind::EpsilonGreedy => state.selector.as_ref(),
    };

    let decision = selector.decide(&request.slo, &request.context);
    state.metrics.record_decision(selector.name(), &decision);
    state.logger.log_decision(selector.name(), &decision);

    Json(decision)
}

async fn observe(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ObservationRequest>,
) -> Result<StatusCode, ApiError> {
    let reward = state.selector.observe(&request.target, &request.outcome)?;

    state.metrics.inc_observations(&request.target);
    state.logger.log_observation(&request.target, reward);

    Ok(StatusCode::NO_CONTENT)
}

async fn preferences(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.selector.preferences())
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/v1/intents", post(submit_intent))
        .route("/v1/audit", get(audit))
        .route("/v1/decisions", post(decide))
        .route("/v1/observations", post(observe))
        .route("/v1/scheduler/preferences", get(preferences))
        .with_state(state)
}

/// Start the API server and run until `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
