//! Starstream control plane daemon
//!
//! Serves the intent control loop and the workload scheduler over HTTP.
//! Telemetry and execution are simulated against the reference fabric.

use anyhow::{Context, Result};
use starstream_core::{
    executor::SimExecutor,
    health::{components, HealthRegistry},
    observability::StructuredLogger,
    scheduler::ConstrainedEpsilonGreedy,
    telemetry::SimTelemetry,
    Engine, Topology,
};
use starstreamd::{api, config::ServiceConfig};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = ServiceConfig::load()?;
    info!(
        node_name = %config.node_name,
        planner = %config.planner,
        api_port = config.api_port,
        "Service configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register_all().await;

    let logger = StructuredLogger::new(&config.node_name);

    let topology = Topology::reference();
    topology
        .validate()
        .context("reference topology is inconsistent")?;

    let engine = Engine::new(
        topology,
        Arc::new(SimTelemetry),
        Arc::new(SimExecutor::new()),
        config.policy.clone(),
    )
    .with_planner(config.planner.build())
    .with_config(config.engine_config())
    .with_health(health_registry.clone())
    .with_logger(logger.clone());

    let selector = ConstrainedEpsilonGreedy::new(config.scheduler.epsilon, config.scheduler.canary)
        .context("invalid scheduler configuration")?;

    logger.log_startup(SERVICE_VERSION, engine.planner_name());

    let app_state = Arc::new(api::AppState::new(
        Arc::new(engine),
        Arc::new(selector),
        health_registry.clone(),
        logger.clone(),
    ));

    health_registry.set_ready(true).await;

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to listen for shutdown signal");
        }
    };

    if let Err(e) = api::serve(config.api_port, app_state, shutdown).await {
        health_registry
            .set_unhealthy(components::ENGINE, e.to_string())
            .await;
        logger.log_shutdown("API server failed");
        return Err(e);
    }

    logger.log_shutdown("SIGINT received");
    info!("Shutting down");

    Ok(())
}
