//! Executors apply plan actions to infrastructure
//!
//! An executor receives the ordered actions of one plan and either applies
//! all of them in order or fails as a unit. Partial application and rollback
//! below that granularity belong to the executor, not to the engine.

mod sim;

pub use sim::SimExecutor;

use crate::error::ExecutorError;
use crate::models::Action;

pub use async_trait::async_trait;

/// Trait for executor implementations
#[async_trait]
pub trait Executor: Send + Sync {
    /// Apply `actions` in sequence order
    async fn apply(&self, actions: &[Action]) -> Result<(), ExecutorError>;
}
