//! In-memory audit log of control-loop cycles

use crate::models::AuditEntry;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Append-only record of every completed cycle, in submission order
///
/// Appends take the write lock; readers get a cloned snapshot and never
/// observe a half-written entry. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct AuditLog {
    entries: Arc<RwLock<Vec<AuditEntry>>>,
}

impl AuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry and return the new length
    pub(crate) async fn append(&self, entry: AuditEntry) -> usize {
        let mut entries = self.entries.write().await;
        entries.push(entry);
        entries.len()
    }

    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.read().await.clone()
    }

    pub async fn entries_for(&self, intent_id: &str) -> Vec<AuditEntry> {
        self.entries
            .read()
            .await
            .iter()
            .filter(|e| e.intent_id == intent_id)
            .cloned()
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn entry(intent_id: &str, ok: bool) -> AuditEntry {
        AuditEntry {
            intent_id: intent_id.to_string(),
            plan_id: format!("plan-{}", intent_id),
            ok,
            message: if ok { "applied".into() } else { "apply_failed: x".into() },
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_append_preserves_order() {
        let log = AuditLog::new();
        assert!(log.is_empty().await);

        assert_eq!(log.append(entry("i1", true)).await, 1);
        assert_eq!(log.append(entry("i2", false)).await, 2);
        assert_eq!(log.append(entry("i1", true)).await, 3);

        let ids: Vec<String> = log.entries().await.into_iter().map(|e| e.intent_id).collect();
        assert_eq!(ids, vec!["i1", "i2", "i1"]);
        assert_eq!(log.entries_for("i1").await.len(), 2);
        assert!(log.entries_for("missing").await.is_empty());
    }

    #[tokio::test]
    async fn test_snapshot_unaffected_by_later_appends() {
        let log = AuditLog::new();
        log.append(entry("i1", true)).await;

        let snapshot = log.entries().await;
        log.append(entry("i2", true)).await;

        assert_eq!(snapshot.len(), 1);
        assert_eq!(log.len().await, 2);
    }

    #[tokio::test]
    async fn test_concurrent_appends_all_recorded() {
        let log = AuditLog::new();
        let mut handles = Vec::new();

        for i in 0..32 {
            let log = log.clone();
            handles.push(tokio::spawn(async move {
                log.append(entry(&format!("i{}", i), true)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(log.len().await, 32);
    }
}
