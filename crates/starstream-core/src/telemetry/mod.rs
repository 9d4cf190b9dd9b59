//! Telemetry providers
//!
//! The engine reads one snapshot before planning and one after applying.
//! Real deployments back this with switch counters or a metrics pipeline;
//! the providers here replay fixed measurements for simulation and tests.

mod sim;

pub use sim::{reference_snapshot, SimTelemetry, StaticTelemetry};

use crate::error::TelemetryError;
use crate::models::ResourceSnapshot;

pub use async_trait::async_trait;

/// Trait for telemetry implementations
///
/// Every topology link should have an entry; a missing entry is read as
/// unknown and never fails verification.
#[async_trait]
pub trait TelemetryProvider: Send + Sync {
    /// Take one point-in-time reading of all links
    async fn snapshot(&self) -> Result<ResourceSnapshot, TelemetryError>;
}
