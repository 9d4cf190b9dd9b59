//! Simulated telemetry

use super::{async_trait, TelemetryProvider};
use crate::error::TelemetryError;
use crate::models::ResourceSnapshot;
use crate::topology::LinkKey;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// Reference three-node measurements: A-C is congested and lossy
pub fn reference_snapshot() -> ResourceSnapshot {
    ResourceSnapshot::empty()
        .with_link(LinkKey::new("A", "B"), 0.50, 0.005, 8.0)
        .with_link(LinkKey::new("B", "C"), 0.60, 0.010, 12.0)
        .with_link(LinkKey::new("A", "C"), 0.90, 0.030, 30.0)
}

/// Returns the reference measurements stamped with the read time
#[derive(Debug, Default, Clone, Copy)]
pub struct SimTelemetry;

#[async_trait]
impl TelemetryProvider for SimTelemetry {
    async fn snapshot(&self) -> Result<ResourceSnapshot, TelemetryError> {
        let mut snapshot = reference_snapshot();
        snapshot.timestamp = Utc::now();
        debug!(links = snapshot.link_loss.len(), "Simulated telemetry read");
        Ok(snapshot)
    }
}

/// Replays a fixed sequence of snapshots, repeating the last one
pub struct StaticTelemetry {
    queue: Mutex<VecDeque<ResourceSnapshot>>,
    last: Mutex<Option<ResourceSnapshot>>,
}

impl StaticTelemetry {
    /// Always return the same snapshot
    pub fn new(snapshot: ResourceSnapshot) -> Self {
        Self::sequence(vec![snapshot])
    }

    /// Return `snapshots` in order, then keep returning the final one
    pub fn sequence(snapshots: Vec<ResourceSnapshot>) -> Self {
        Self {
            queue: Mutex::new(snapshots.into()),
            last: Mutex::new(None),
        }
    }
}

#[async_trait]
impl TelemetryProvider for StaticTelemetry {
    async fn snapshot(&self) -> Result<ResourceSnapshot, TelemetryError> {
        let next = self
            .queue
            .lock()
            .map_err(|_| TelemetryError::Unavailable("telemetry queue poisoned".into()))?
            .pop_front();

        let mut last = self
            .last
            .lock()
            .map_err(|_| TelemetryError::Unavailable("telemetry queue poisoned".into()))?;

        if let Some(snapshot) = next {
            *last = Some(snapshot.clone());
            return Ok(snapshot);
        }

        last.clone()
            .ok_or_else(|| TelemetryError::Unavailable("no snapshots configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sim_telemetry_reference_values() {
        let snap = SimTelemetry.snapshot().await.unwrap();
        assert_eq!(snap.loss("A", "C"), Some(0.030));
        assert_eq!(snap.utilization("B", "C"), Some(0.60));
        assert_eq!(snap.latency_ms("A", "B"), Some(8.0));
    }

    #[tokio::test]
    async fn test_static_sequence_repeats_last() {
        let first = ResourceSnapshot::empty().with_link(LinkKey::new("A", "B"), 0.1, 0.0, 1.0);
        let second = ResourceSnapshot::empty().with_link(LinkKey::new("A", "B"), 0.2, 0.0, 1.0);
        let telemetry = StaticTelemetry::sequence(vec![first.clone(), second.clone()]);

        assert_eq!(telemetry.snapshot().await.unwrap(), first);
        assert_eq!(telemetry.snapshot().await.unwrap(), second);
        assert_eq!(telemetry.snapshot().await.unwrap(), second);
    }

    #[tokio::test]
    async fn test_empty_sequence_is_unavailable() {
        let telemetry = StaticTelemetry::sequence(vec![]);
        let err = telemetry.snapshot().await.unwrap_err();
        assert!(matches!(err, TelemetryError::Unavailable(_)));
    }
}
