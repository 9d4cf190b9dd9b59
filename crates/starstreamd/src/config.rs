//! Service configuration
//!
//! Read from an optional file named by `STARSTREAM_CONFIG`, then from
//! environment variables: `STARSTREAM_API_PORT`, `STARSTREAM_PLANNER`,
//! nested keys with `__` such as `STARSTREAM_POLICY__MAX_PACKET_LOSS`.

use anyhow::{ensure, Context, Result};
use serde::Deserialize;
use starstream_core::engine::EngineConfig;
use starstream_core::scheduler::{DEFAULT_CANARY, DEFAULT_EPSILON};
use starstream_core::{PlannerKind, Policy};
use std::collections::HashMap;
use std::time::Duration;

pub const ENV_PREFIX: &str = "STARSTREAM";
pub const CONFIG_FILE_ENV: &str = "STARSTREAM_CONFIG";

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Instance name used in structured logs
    #[serde(default = "default_node_name")]
    pub node_name: String,

    /// Port for the HTTP API, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    #[serde(default)]
    pub policy: Policy,

    #[serde(default)]
    pub planner: PlannerKind,

    #[serde(default = "default_telemetry_timeout_ms")]
    pub telemetry_timeout_ms: u64,

    #[serde(default = "default_apply_timeout_ms")]
    pub apply_timeout_ms: u64,

    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Epsilon-greedy tuning
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,

    #[serde(default = "default_canary")]
    pub canary: f64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            epsilon: default_epsilon(),
            canary: default_canary(),
        }
    }
}

fn default_node_name() -> String {
    std::env::var("NODE_NAME").unwrap_or_else(|_| "starstream".to_string())
}

fn default_api_port() -> u16 {
    8080
}

fn default_telemetry_timeout_ms() -> u64 {
    2000
}

fn default_apply_timeout_ms() -> u64 {
    10_000
}

fn default_epsilon() -> f64 {
    DEFAULT_EPSILON
}

fn default_canary() -> f64 {
    DEFAULT_CANARY
}

impl ServiceConfig {
    /// Load from the process environment and optional config file
    pub fn load() -> Result<Self> {
        let file = std::env::var(CONFIG_FILE_ENV).ok();
        Self::load_from(file.as_deref(), None)
    }

    /// Load with an explicit file and, when given, a replacement for the process environment
    pub fn load_from(file: Option<&str>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = config::Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(config::File::with_name(path));
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true)
                    .source(env),
            )
            .build()
            .context("failed to read configuration")?;

        let service: Self = config
            .try_deserialize()
            .context("invalid configuration")?;
        service.validate()?;
        Ok(service)
    }

    /// Thresholds and fractions must be finite and within [0, 1]
    pub fn validate(&self) -> Result<()> {
        let fractions = [
            ("policy.max_link_utilization", self.policy.max_link_utilization),
            ("policy.max_packet_loss", self.policy.max_packet_loss),
            ("scheduler.epsilon", self.scheduler.epsilon),
            ("scheduler.canary", self.scheduler.canary),
        ];
        for (name, value) in fractions {
            ensure!(
                value.is_finite() && (0.0..=1.0).contains(&value),
                "{name} must be within [0, 1], got {value}"
            );
        }
        ensure!(
            self.telemetry_timeout_ms > 0 && self.apply_timeout_ms > 0,
            "timeouts must be positive"
        );
        Ok(())
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            telemetry_timeout: Duration::from_millis(self.telemetry_timeout_ms),
            apply_timeout: Duration::from_millis(self.apply_timeout_ms),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> Option<HashMap<String, String>> {
        Some(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults_when_environment_empty() {
        let config = ServiceConfig::load_from(None, env(&[])).unwrap();

        assert_eq!(config.api_port, 8080);
        assert_eq!(config.planner, PlannerKind::Stub);
        assert_eq!(config.policy, Policy::default());
        assert_eq!(config.scheduler.epsilon, DEFAULT_EPSILON);
        assert_eq!(config.engine_config(), EngineConfig::default());
    }

    #[test]
    fn test_environment_overrides() {
        let config = ServiceConfig::load_from(
            None,
            env(&[
                ("STARSTREAM_API_PORT", "9191"),
                ("STARSTREAM_PLANNER", "shortest_path"),
                ("STARSTREAM_POLICY__MAX_PACKET_LOSS", "0.05"),
                ("STARSTREAM_SCHEDULER__EPSILON", "0.25"),
                ("STARSTREAM_APPLY_TIMEOUT_MS", "1500"),
            ]),
        )
        .unwrap();

        assert_eq!(config.api_port, 9191);
        assert_eq!(config.planner, PlannerKind::ShortestPath);
        assert_eq!(config.policy.max_packet_loss, 0.05);
        assert_eq!(config.policy.max_link_utilization, 0.85);
        assert_eq!(config.scheduler.epsilon, 0.25);
        assert_eq!(config.scheduler.canary, DEFAULT_CANARY);
        assert_eq!(
            config.engine_config().apply_timeout,
            Duration::from_millis(1500)
        );
    }

    #[test]
    fn test_non_finite_policy_is_rejected() {
        let result =
            ServiceConfig::load_from(None, env(&[("STARSTREAM_POLICY__MAX_PACKET_LOSS", "nan")]));
        assert!(result.is_err());

        let result = ServiceConfig::load_from(
            None,
            env(&[("STARSTREAM_POLICY__MAX_LINK_UTILIZATION", "1.5")]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_out_of_range_scheduler_is_rejected() {
        let result =
            ServiceConfig::load_from(None, env(&[("STARSTREAM_SCHEDULER__EPSILON", "-0.1")]));
        assert!(result.is_err());

        let result =
            ServiceConfig::load_from(None, env(&[("STARSTREAM_TELEMETRY_TIMEOUT_MS", "0")]));
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_planner_is_an_error() {
        let result = ServiceConfig::load_from(None, env(&[("STARSTREAM_PLANNER", "ilp")]));
        assert!(result.is_err());
    }
}
