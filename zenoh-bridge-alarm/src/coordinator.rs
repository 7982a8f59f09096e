//! The bridge coordinator.
//!
//! Adapters never call into the pipeline directly: the device bus adapter and
//! the HTTP surface post [`BridgeEvent`]s to one inbox, and the coordinator
//! handles them one at a time. Each event runs to completion before the next
//! is taken, which keeps snapshots in bus arrival order.
//!
//! ```text
//!              BusConnected            BusSubscribed
//! Disconnected ────────────► Connected ─────────────► Subscribed
//!      ▲                         │                        │
//!      └──── BusDisconnected ────┴────────────────────────┘
//! ```

use std::fmt;
use std::sync::Arc;

use alarmsight_common::{AuditEntry, FieldSchema, StatusDelta, StatusSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

use crate::auditor::ChangeAuditor;
use crate::broadcaster::Broadcaster;
use crate::decoder::TelemetryDecoder;
use crate::error::{BridgeError, BusConnectionError, Result};
use crate::event::LiveEvent;
use crate::stats::BridgeStats;
use crate::store::Stores;

/// Default number of events the coordinator inbox buffers.
pub const DEFAULT_INBOX_CAPACITY: usize = 1024;

/// Connection state of the device bus, as seen by the coordinator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusState {
    #[default]
    Disconnected,
    Connected,
    Subscribed,
}

impl fmt::Display for BusState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BusState::Disconnected => write!(f, "disconnected"),
            BusState::Connected => write!(f, "connected"),
            BusState::Subscribed => write!(f, "subscribed"),
        }
    }
}

/// Outbound link to the device.
#[async_trait]
pub trait CommandPublisher: Send + Sync {
    /// Publish a command payload exactly as given.
    async fn publish(&self, payload: &[u8]) -> std::result::Result<(), BusConnectionError>;
}

/// Everything the coordinator reacts to.
pub enum BridgeEvent {
    /// The bus session is open; commands go through `link`.
    BusConnected(Arc<dyn CommandPublisher>),
    /// The status subscription is active.
    BusSubscribed,
    /// The bus went away.
    BusDisconnected(BusConnectionError),
    /// A raw status payload from the device.
    Message(Vec<u8>),
    /// An operator command, already validated.
    Command { payload: Vec<u8>, delta: StatusDelta },
}

impl fmt::Debug for BridgeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeEvent::BusConnected(_) => f.write_str("BusConnected"),
            BridgeEvent::BusSubscribed => f.write_str("BusSubscribed"),
            BridgeEvent::BusDisconnected(reason) => {
                f.debug_tuple("BusDisconnected").field(reason).finish()
            }
            BridgeEvent::Message(payload) => f
                .debug_struct("Message")
                .field("len", &payload.len())
                .finish(),
            BridgeEvent::Command { delta, .. } => {
                f.debug_struct("Command").field("delta", delta).finish()
            }
        }
    }
}

/// Cloneable sender side of the coordinator inbox.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<BridgeEvent>,
    decoder: TelemetryDecoder,
    state: watch::Receiver<BusState>,
}

impl CoordinatorHandle {
    /// Post an event to the coordinator.
    pub async fn send(&self, event: BridgeEvent) -> Result<()> {
        self.tx
            .send(event)
            .await
            .map_err(|_| BridgeError::CoordinatorStopped)
    }

    /// Validate an operator command and queue it for publishing.
    ///
    /// Returns the decoded fields. Acceptance does not mean the device got
    /// the command; publish failures are only logged.
    pub async fn submit_command(&self, payload: Vec<u8>) -> Result<StatusDelta> {
        let delta = self.decoder.decode(&payload)?;
        self.send(BridgeEvent::Command {
            payload,
            delta: delta.clone(),
        })
        .await?;
        Ok(delta)
    }

    /// Current bus state.
    pub fn bus_state(&self) -> BusState {
        *self.state.borrow()
    }

    /// Watch bus state changes.
    pub fn watch_state(&self) -> watch::Receiver<BusState> {
        self.state.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Drives decode, persistence, audit and fan-out for each event.
pub struct BridgeCoordinator {
    decoder: TelemetryDecoder,
    auditor: ChangeAuditor,
    stores: Stores,
    broadcaster: Broadcaster,
    stats: Arc<BridgeStats>,
    state: watch::Sender<BusState>,
    link: Option<Arc<dyn CommandPublisher>>,
}

impl BridgeCoordinator {
    pub fn new(
        schema: Arc<FieldSchema>,
        stores: Stores,
        broadcaster: Broadcaster,
        stats: Arc<BridgeStats>,
    ) -> Self {
        let (state, _) = watch::channel(BusState::Disconnected);
        Self {
            decoder: TelemetryDecoder::new(schema.clone()),
            auditor: ChangeAuditor::new(schema),
            stores,
            broadcaster,
            stats,
            state,
            link: None,
        }
    }

    /// Create the inbox and a handle that posts to it.
    pub fn channel(&self, capacity: usize) -> (CoordinatorHandle, mpsc::Receiver<BridgeEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let handle = CoordinatorHandle {
            tx,
            decoder: self.decoder.clone(),
            state: self.state.subscribe(),
        };
        (handle, rx)
    }

    pub fn state(&self) -> BusState {
        *self.state.borrow()
    }

    pub fn stats(&self) -> &Arc<BridgeStats> {
        &self.stats
    }

    /// Process events until the inbox closes or shutdown is signalled.
    pub async fn run(
        mut self,
        mut inbox: mpsc::Receiver<BridgeEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!("Bridge coordinator started");

        loop {
            tokio::select! {
                event = inbox.recv() => match event {
                    Some(event) => self.handle(event).await,
                    None => break,
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        self.transition(BusState::Disconnected);
        info!("Bridge coordinator stopped");
    }

    /// Handle one event to completion.
    pub async fn handle(&mut self, event: BridgeEvent) {
        match event {
            BridgeEvent::BusConnected(link) => {
                self.link = Some(link);
                self.transition(BusState::Connected);
            }
            BridgeEvent::BusSubscribed => {
                if self.state() == BusState::Connected {
                    self.transition(BusState::Subscribed);
                } else {
                    warn!(state = %self.state(), "Subscription reported while not connected");
                }
            }
            BridgeEvent::BusDisconnected(reason) => {
                self.link = None;
                if self.state() != BusState::Disconnected {
                    warn!(reason = %reason, "Device bus disconnected");
                }
                self.transition(BusState::Disconnected);
            }
            BridgeEvent::Message(payload) => {
                self.stats.record_message();
                if self.state() == BusState::Subscribed {
                    self.process_message(&payload).await;
                } else {
                    debug!(state = %self.state(), "Dropping message received outside subscription");
                }
            }
            BridgeEvent::Command { payload, delta } => {
                self.process_command(&payload, delta).await;
            }
        }
        self.stats.record_event();
    }

    fn transition(&self, next: BusState) {
        let previous = self.state.send_replace(next);
        if previous != next {
            info!(from = %previous, to = %next, "Bus state changed");
        }
    }

    async fn process_message(&self, payload: &[u8]) {
        let delta = match self.decoder.decode(payload) {
            Ok(delta) => delta,
            Err(e) => {
                self.stats.record_decode_failure();
                warn!(error = %e, "Dropping undecodable status message");
                return;
            }
        };
        debug!(fields = delta.len(), "Status message decoded");

        let entries = self.auditor.describe(&delta);
        let event = LiveEvent::status(delta.clone());

        // The stages are independent; none can suppress another.
        tokio::join!(
            self.persist_snapshot(StatusSnapshot::new(delta)),
            self.persist_entries(entries),
            async {
                let report = self.broadcaster.broadcast(&event);
                self.stats.record_broadcast(report);
            },
        );
    }

    async fn process_command(&self, payload: &[u8], delta: StatusDelta) {
        self.stats.record_command();

        let published = match &self.link {
            Some(link) => link.publish(payload).await,
            None => Err(BusConnectionError::NotConnected),
        };
        match published {
            Ok(()) => {
                self.stats.record_publish(true);
                info!(fields = delta.len(), "Command published to device");
            }
            Err(e) => {
                self.stats.record_publish(false);
                warn!(error = %e, "Command not delivered to device");
            }
        }

        self.persist_entries(self.auditor.describe(&delta)).await;
    }

    async fn persist_snapshot(&self, snapshot: StatusSnapshot) {
        match self.stores.status.append(snapshot).await {
            Ok(stored) => {
                self.stats.record_snapshot();
                debug!(sequence = stored.sequence, "Status snapshot persisted");
            }
            Err(e) => {
                self.stats.record_persistence_failure();
                error!(error = %e, "Failed to persist status snapshot");
            }
        }
    }

    /// Entries are written in order; a failed one is logged and skipped.
    async fn persist_entries(&self, entries: Vec<AuditEntry>) {
        for entry in entries {
            match self.stores.audit.append(entry).await {
                Ok(()) => self.stats.record_audit_entry(),
                Err(e) => {
                    self.stats.record_persistence_failure();
                    warn!(error = %e, "Failed to persist audit entry");
                }
            }
        }
    }
}
