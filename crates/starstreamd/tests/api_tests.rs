//! Integration tests for the control plane API endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use starstream_core::{
    executor::SimExecutor,
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    scheduler::{BaselineCostModel, ConstrainedEpsilonGreedy},
    telemetry::{SimTelemetry, StaticTelemetry, TelemetryProvider},
    Engine, Policy, Topology,
};
use starstreamd::api::{create_router, AppState};
use std::sync::Arc;
use tower::ServiceExt;

async fn setup_app_with(telemetry: Arc<dyn TelemetryProvider>) -> (Router, Arc<AppState>) {
    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let engine = Engine::new(
        Topology::reference(),
        telemetry,
        Arc::new(SimExecutor::new()),
        Policy::default(),
    )
    .with_health(health_registry.clone());

    let selector =
        ConstrainedEpsilonGreedy::with_seed(Arc::new(BaselineCostModel::reference()), 0.0, 0.05, 11)
            .unwrap();

    let state = Arc::new(AppState::new(
        Arc::new(engine),
        Arc::new(selector),
        health_registry,
        StructuredLogger::new("test-instance"),
    ));
    let router = create_router(state.clone());

    (router, state)
}

async fn setup_test_app() -> (Router, Arc<AppState>) {
    setup_app_with(Arc::new(SimTelemetry)).await
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    read(response).await
}

async fn post(app: &Router, uri: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    read(response).await
}

async fn read(response: axum::response::Response) -> (StatusCode, Value) {
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn reference_intent() -> Value {
    json!({
        "kind": "bandwidth",
        "source": "A",
        "destination": "C",
        "bandwidth_gbps": 50,
        "max_latency_ms": 25,
        "priority": 5
    })
}

#[tokio::test]
async fn test_healthz_returns_ok_when_healthy() {
    let (app, _state) = setup_test_app().await;

    let (status, health) = get(&app, "/healthz").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(health["status"], "healthy");
    assert!(health["components"]["engine"].is_object());
    assert!(health["components"]["scheduler"].is_object());
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state) = setup_test_app().await;
    state
        .health_registry
        .set_unhealthy(components::EXECUTOR, "controller unreachable")
        .await;

    let (status, health) = get(&app, "/healthz").await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(health["status"], "unhealthy");
}

#[tokio::test]
async fn test_readyz_follows_registry() {
    let (app, state) = setup_test_app().await;

    let (status, readiness) = get(&app, "/readyz").await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(readiness["ready"], false);

    state.health_registry.set_ready(true).await;
    let (status, readiness) = get(&app, "/readyz").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(readiness["ready"], true);
}

#[tokio::test]
async fn test_submit_reference_intent() {
    let (app, _state) = setup_test_app().await;

    let (status, result) = post(&app, "/v1/intents", reference_intent()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["ok"], false);
    assert_eq!(result["message"], "verification_failed: loss 0.030 > 0.020");
    assert_eq!(result["failure"], "verification_failed");
    assert_eq!(result["applied_actions"][0]["action_type"], "allocate_flow");
    assert_eq!(result["applied_actions"][0]["params"]["bandwidth_gbps"], 50.0);
    assert_eq!(result["applied_actions"][0]["params"]["policy_max_loss"], 0.02);

    let (status, audit) = get(&app, "/v1/audit").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(audit.as_array().unwrap().len(), 1);
    assert_eq!(audit[0]["plan_id"], result["plan_id"]);
}

#[tokio::test]
async fn test_bad_intents_are_400_and_not_audited() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = post(
        &app,
        "/v1/intents",
        json!({"kind": "latency", "source": "A", "destination": "C"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unsupported_intent_kind");

    let (status, body) = post(
        &app,
        "/v1/intents",
        json!({"kind": "bandwidth", "source": "A", "bandwidth_gbps": 10}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "missing_payload_field");

    let (_, audit) = get(&app, "/v1/audit").await;
    assert!(audit.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_duplicate_intent_id_conflicts() {
    let (app, _state) = setup_test_app().await;
    let mut body = reference_intent();
    body["intent_id"] = json!("intent-fixed-1");

    let (status, result) = post(&app, "/v1/intents", body.clone()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(result["intent_id"], "intent-fixed-1");

    let (status, error) = post(&app, "/v1/intents", body).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(error["error"], "duplicate_intent");
}

#[tokio::test]
async fn test_telemetry_outage_is_503() {
    let (app, state) = setup_app_with(Arc::new(StaticTelemetry::sequence(Vec::new()))).await;

    let (status, body) = post(&app, "/v1/intents", reference_intent()).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"], "telemetry_unavailable");
    assert!(state.engine.audit().is_empty().await);

    let health = state.health_registry.health().await;
    assert_eq!(health.status, starstream_core::ComponentStatus::Degraded);
}

#[tokio::test]
async fn test_best_score_decision() {
    let (app, _state) = setup_test_app().await;

    let (status, decision) = post(
        &app,
        "/v1/decisions",
        json!({
            "slo": {"latency_p95_ms": 2.0, "cost_per_1k": 0.0005, "energy_j_max": 6.0},
            "context": {"batch_size": 2, "tokens": 1024, "concurrency": 3},
            "policy": "best_score"
        }),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["target"], "photonic");
    assert_eq!(decision["mode"], "best_score");
    assert_eq!(decision["fallback"], false);
}

#[tokio::test]
async fn test_epsilon_greedy_decision_carries_canary() {
    let (app, _state) = setup_test_app().await;

    let (status, decision) = post(
        &app,
        "/v1/decisions",
        json!({"slo": {"latency_p95_ms": 50.0, "cost_per_1k": 0.001, "energy_j_max": 50.0}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(decision["mode"], "exploit");
    assert_eq!(decision["canary_fraction"], 0.05);
    assert_eq!(decision["safe_candidates"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn test_observations_update_preferences() {
    let (app, _state) = setup_test_app().await;

    let (status, _) = post(
        &app,
        "/v1/observations",
        json!({"target": "gpu", "outcome": {"lat_ms": 2.0, "cost": 0.001}}),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, prefs) = get(&app, "/v1/scheduler/preferences").await;
    assert_eq!(status, StatusCode::OK);

    let gpu = prefs
        .as_array()
        .unwrap()
        .iter()
        .find(|p| p["target"] == "gpu")
        .cloned()
        .unwrap();
    assert_eq!(gpu["n"], 2);
    assert_eq!(gpu["mu"], 999.0);
}

#[tokio::test]
async fn test_unknown_observation_target_is_404() {
    let (app, _state) = setup_test_app().await;

    let (status, body) = post(
        &app,
        "/v1/observations",
        json!({"target": "tpu", "outcome": {"lat_ms": 1.0, "cost": 0.001}}),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "unknown_target");
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state) = setup_test_app().await;
    post(&app, "/v1/intents", reference_intent()).await;

    let response = app
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let metrics_text = String::from_utf8(body.to_vec()).unwrap();

    assert!(metrics_text.contains("starstream_intents_submitted_total"));
    assert!(metrics_text.contains("starstream_cycle_latency_seconds_bucket"));
    assert!(metrics_text.contains("starstream_cycle_outcomes_total"));
    assert!(metrics_text.contains("starstream_audit_entries"));
}
