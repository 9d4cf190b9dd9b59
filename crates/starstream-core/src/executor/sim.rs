//! Simulated executor that logs and records actions

use super::{async_trait, Executor};
use crate::error::ExecutorError;
use crate::models::Action;
use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;
use tracing::info;

/// Number of applied actions kept for inspection
pub const DEFAULT_HISTORY: usize = 1024;

/// Executor that pretends to program the fabric
///
/// The most recent applied actions are kept in order so callers can
/// inspect what ran; older ones are dropped once `history` is reached.
#[derive(Debug)]
pub struct SimExecutor {
    applied: Mutex<VecDeque<Action>>,
    history: usize,
    apply_delay: Duration,
}

impl Default for SimExecutor {
    fn default() -> Self {
        Self {
            applied: Mutex::new(VecDeque::new()),
            history: DEFAULT_HISTORY,
            apply_delay: Duration::ZERO,
        }
    }
}

impl SimExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep at most `history` applied actions; zero keeps none
    pub fn with_history(mut self, history: usize) -> Self {
        self.history = history;
        self
    }

    /// Sleep this long per apply call, to exercise apply timeouts
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.apply_delay = delay;
        self
    }

    /// Retained applied actions, oldest first
    pub fn applied(&self) -> Vec<Action> {
        self.applied
            .lock()
            .map(|a| a.iter().cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Executor for SimExecutor {
    async fn apply(&self, actions: &[Action]) -> Result<(), ExecutorError> {
        if !self.apply_delay.is_zero() {
            tokio::time::sleep(self.apply_delay).await;
        }

        for action in actions {
            match action {
                Action::AllocateFlow(flow) => {
                    info!(
                        action = action.action_type(),
                        source = %flow.source,
                        destination = %flow.destination,
                        bandwidth_gbps = flow.bandwidth_gbps,
                        max_latency_ms = ?flow.max_latency_ms,
                        path = ?flow.path,
                        "[sim] applying action"
                    );
                }
            }
        }

        let mut applied = self
            .applied
            .lock()
            .map_err(|_| ExecutorError::Rejected("executor state poisoned".into()))?;
        applied.extend(actions.iter().cloned());
        let excess = applied.len().saturating_sub(self.history);
        applied.drain(..excess);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FlowAllocation;

    fn flow(dst: &str) -> Action {
        Action::AllocateFlow(FlowAllocation {
            source: "A".into(),
            destination: dst.into(),
            bandwidth_gbps: 1.0,
            max_latency_ms: None,
            priority: 3,
            path: None,
            policy_max_util: 0.85,
            policy_max_loss: 0.02,
        })
    }

    #[tokio::test]
    async fn test_records_in_order() {
        let executor = SimExecutor::new();
        executor.apply(&[flow("B"), flow("C")]).await.unwrap();
        executor.apply(&[flow("D")]).await.unwrap();

        let applied = executor.applied();
        assert_eq!(applied, vec![flow("B"), flow("C"), flow("D")]);
    }

    #[tokio::test]
    async fn test_history_is_bounded() {
        let executor = SimExecutor::new().with_history(2);
        executor.apply(&[flow("B"), flow("C")]).await.unwrap();
        executor.apply(&[flow("D")]).await.unwrap();

        assert_eq!(executor.applied(), vec![flow("C"), flow("D")]);

        let silent = SimExecutor::new().with_history(0);
        silent.apply(&[flow("B")]).await.unwrap();
        assert!(silent.applied().is_empty());
    }
}
