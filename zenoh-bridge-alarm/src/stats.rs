//! Pipeline counters.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::broadcaster::BroadcastReport;

/// Counters updated by the coordinator as events flow through the pipeline.
#[derive(Debug)]
pub struct BridgeStats {
    start_time: Instant,
    events_handled: AtomicU64,
    messages_received: AtomicU64,
    decode_failures: AtomicU64,
    snapshots_persisted: AtomicU64,
    audit_entries_persisted: AtomicU64,
    persistence_failures: AtomicU64,
    broadcasts: AtomicU64,
    deliveries: AtomicU64,
    subscribers_dropped: AtomicU64,
    commands_accepted: AtomicU64,
    commands_published: AtomicU64,
    publish_failures: AtomicU64,
}

/// Point-in-time copy of [`BridgeStats`] for serialization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub events_handled: u64,
    pub messages_received: u64,
    pub decode_failures: u64,
    pub snapshots_persisted: u64,
    pub audit_entries_persisted: u64,
    pub persistence_failures: u64,
    pub broadcasts: u64,
    pub deliveries: u64,
    pub subscribers_dropped: u64,
    pub commands_accepted: u64,
    pub commands_published: u64,
    pub publish_failures: u64,
}

impl Default for BridgeStats {
    fn default() -> Self {
        Self::new()
    }
}

impl BridgeStats {
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            events_handled: AtomicU64::new(0),
            messages_received: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            snapshots_persisted: AtomicU64::new(0),
            audit_entries_persisted: AtomicU64::new(0),
            persistence_failures: AtomicU64::new(0),
            broadcasts: AtomicU64::new(0),
            deliveries: AtomicU64::new(0),
            subscribers_dropped: AtomicU64::new(0),
            commands_accepted: AtomicU64::new(0),
            commands_published: AtomicU64::new(0),
            publish_failures: AtomicU64::new(0),
        }
    }

    /// An inbox event ran to completion.
    pub fn record_event(&self) {
        self.events_handled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_decode_failure(&self) {
        self.decode_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_snapshot(&self) {
        self.snapshots_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_audit_entry(&self) {
        self.audit_entries_persisted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_persistence_failure(&self) {
        self.persistence_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_broadcast(&self, report: BroadcastReport) {
        self.broadcasts.fetch_add(1, Ordering::Relaxed);
        self.deliveries
            .fetch_add(report.delivered as u64, Ordering::Relaxed);
        self.subscribers_dropped
            .fetch_add(report.dropped as u64, Ordering::Relaxed);
    }

    pub fn record_command(&self) {
        self.commands_accepted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_publish(&self, ok: bool) {
        if ok {
            self.commands_published.fetch_add(1, Ordering::Relaxed);
        } else {
            self.publish_failures.fetch_add(1, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            events_handled: self.events_handled.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            snapshots_persisted: self.snapshots_persisted.load(Ordering::Relaxed),
            audit_entries_persisted: self.audit_entries_persisted.load(Ordering::Relaxed),
            persistence_failures: self.persistence_failures.load(Ordering::Relaxed),
            broadcasts: self.broadcasts.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            subscribers_dropped: self.subscribers_dropped.load(Ordering::Relaxed),
            commands_accepted: self.commands_accepted.load(Ordering::Relaxed),
            commands_published: self.commands_published.load(Ordering::Relaxed),
            publish_failures: self.publish_failures.load(Ordering::Relaxed),
        }
    }
}
