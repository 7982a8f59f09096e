use alarmsight_common::{AuditEntry, StatusSnapshot};
use async_trait::async_trait;
use parking_lot::RwLock;

use super::{AuditStore, StatusStore};
use crate::error::PersistenceError;

/// In-process store. History lives only as long as the bridge.
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: RwLock<Vec<StatusSnapshot>>,
    entries: RwLock<Vec<AuditEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of snapshots recorded so far.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.read().len()
    }

    /// Number of audit entries recorded so far.
    pub fn entry_count(&self) -> usize {
        self.entries.read().len()
    }
}

#[async_trait]
impl StatusStore for MemoryStore {
    async fn append(&self, snapshot: StatusSnapshot) -> Result<StatusSnapshot, PersistenceError> {
        let mut snapshots = self.snapshots.write();
        let stored = snapshot.sequenced(snapshots.len() as u64 + 1);
        snapshots.push(stored.clone());
        Ok(stored)
    }

    async fn latest(&self) -> Result<Option<StatusSnapshot>, PersistenceError> {
        // Appends are sequenced under the write lock, so the last one is current.
        Ok(self.snapshots.read().last().cloned())
    }
}

#[async_trait]
impl AuditStore for MemoryStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), PersistenceError> {
        self.entries.write().push(entry);
        Ok(())
    }

    async fn all(&self) -> Result<Vec<AuditEntry>, PersistenceError> {
        let entries = self.entries.read();
        let mut all: Vec<(usize, AuditEntry)> = entries.iter().cloned().enumerate().collect();
        // Newest first; insertion order breaks timestamp ties.
        all.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));
        Ok(all.into_iter().map(|(_, e)| e).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alarmsight_common::StatusDelta;
    use chrono::{Duration, Utc};

    #[tokio::test]
    async fn test_latest_is_last_appended() {
        let store = MemoryStore::new();
        assert!(store.latest().await.unwrap().is_none());

        for n in 1..=3 {
            let snapshot = StatusSnapshot::new(StatusDelta::new().with("n", n));
            StatusStore::append(&store, snapshot).await.unwrap();
        }

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.fields.get("n"), Some(&serde_json::json!(3)));
        assert_eq!(latest.sequence, 3);
    }

    #[tokio::test]
    async fn test_sequence_breaks_timestamp_tie() {
        let store = MemoryStore::new();
        let at = Utc::now();

        for n in 1..=2 {
            let mut snapshot = StatusSnapshot::new(StatusDelta::new().with("n", n));
            snapshot.timestamp = at;
            StatusStore::append(&store, snapshot).await.unwrap();
        }

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.fields.get("n"), Some(&serde_json::json!(2)));
    }

    #[tokio::test]
    async fn test_latest_follows_insertion_order_when_clock_steps_back() {
        let store = MemoryStore::new();
        let now = Utc::now();

        let mut first = StatusSnapshot::new(StatusDelta::new().with("n", 1));
        first.timestamp = now;
        StatusStore::append(&store, first).await.unwrap();

        let mut second = StatusSnapshot::new(StatusDelta::new().with("n", 2));
        second.timestamp = now - Duration::seconds(2);
        StatusStore::append(&store, second).await.unwrap();

        let latest = store.latest().await.unwrap().unwrap();
        assert_eq!(latest.fields.get("n"), Some(&serde_json::json!(2)));
        assert_eq!(latest.sequence, 2);
    }

    #[tokio::test]
    async fn test_audit_newest_first() {
        let store = MemoryStore::new();
        let now = Utc::now();

        AuditStore::append(&store, AuditEntry::at("older", now - Duration::seconds(5)))
            .await
            .unwrap();
        AuditStore::append(&store, AuditEntry::at("first at now", now))
            .await
            .unwrap();
        AuditStore::append(&store, AuditEntry::at("second at now", now))
            .await
            .unwrap();

        let all = store.all().await.unwrap();
        let messages: Vec<&str> = all.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["second at now", "first at now", "older"]);
        assert_eq!(store.entry_count(), 3);
    }
}
