//! Registry of live subscribers.
//!
//! Every subscriber owns a bounded queue drained by its connection's writer
//! task. The registry holds the only sending half, so removing a subscriber
//! ends its writer once the queue is drained.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::error::DeliveryError;
use crate::event::{Frame, LiveEvent};

/// Identifier of one live connection.
pub type SubscriberId = u64;

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Liveness of a subscriber connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscriberState {
    Open,
    Closing,
    Closed,
}

impl SubscriberState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => SubscriberState::Open,
            1 => SubscriberState::Closing,
            _ => SubscriberState::Closed,
        }
    }
}

#[derive(Debug)]
struct Liveness(AtomicU8);

impl Liveness {
    fn new() -> Self {
        Self(AtomicU8::new(SubscriberState::Open as u8))
    }

    fn get(&self) -> SubscriberState {
        SubscriberState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn begin_close(&self) {
        let _ = self.0.compare_exchange(
            SubscriberState::Open as u8,
            SubscriberState::Closing as u8,
            Ordering::AcqRel,
            Ordering::Acquire,
        );
    }

    fn close(&self) {
        self.0.store(SubscriberState::Closed as u8, Ordering::Release);
    }
}

/// Sending half of a live connection, owned by the registry.
#[derive(Debug)]
pub struct Subscriber {
    id: SubscriberId,
    tx: mpsc::Sender<Frame>,
    liveness: Arc<Liveness>,
}

/// Receiving half of a live connection, owned by its writer task.
#[derive(Debug)]
pub struct Outbox {
    id: SubscriberId,
    rx: mpsc::Receiver<Frame>,
    liveness: Arc<Liveness>,
}

impl Subscriber {
    /// Create a subscriber whose queue holds at most `capacity` frames.
    pub fn channel(capacity: usize) -> (Subscriber, Outbox) {
        let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let liveness = Arc::new(Liveness::new());
        (
            Subscriber {
                id,
                tx,
                liveness: liveness.clone(),
            },
            Outbox { id, rx, liveness },
        )
    }

    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn state(&self) -> SubscriberState {
        self.liveness.get()
    }

    pub fn is_open(&self) -> bool {
        self.state() == SubscriberState::Open
    }

    /// Mark the subscriber closed. Idempotent.
    pub fn close(&self) {
        self.liveness.close();
    }

    /// Queue a frame without waiting.
    ///
    /// A full queue means the observer cannot keep up and is reported as
    /// [`DeliveryError::Lagging`] rather than waited on.
    pub fn deliver(&self, frame: &Frame) -> Result<(), DeliveryError> {
        if !self.is_open() {
            return Err(DeliveryError::Closed);
        }
        match self.tx.try_send(frame.clone()) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(DeliveryError::Lagging),
            Err(TrySendError::Closed(_)) => Err(DeliveryError::Disconnected),
        }
    }
}

impl Outbox {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    pub fn state(&self) -> SubscriberState {
        self.liveness.get()
    }

    /// Next queued frame; `None` once the subscriber was removed and the
    /// queue is drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.rx.recv().await
    }
}

/// Live set of connected observers.
///
/// Mutation takes the write lock; the broadcaster iterates under the read
/// lock, so it never sees a half-applied change. Once [`unregister`]
/// returns, the subscriber receives nothing more.
///
/// [`unregister`]: SubscriberRegistry::unregister
#[derive(Debug)]
pub struct SubscriberRegistry {
    subscribers: RwLock<HashMap<SubscriberId, Subscriber>>,
    welcome: LiveEvent,
}

impl SubscriberRegistry {
    /// Create an empty registry greeting newcomers with `welcome_message`.
    pub fn new(welcome_message: impl Into<String>) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            welcome: LiveEvent::welcome(welcome_message),
        }
    }

    /// Admit a subscriber and send it the welcome event.
    ///
    /// The welcome is queued before the subscriber becomes visible to the
    /// broadcaster, so it is always the first frame the observer sees.
    pub fn register(&self, subscriber: Subscriber) -> Result<SubscriberId, DeliveryError> {
        let frame = self.welcome.to_frame().map_err(|_| DeliveryError::Encode)?;
        let id = subscriber.id();

        let mut subscribers = self.subscribers.write();
        if let Err(e) = subscriber.deliver(&frame) {
            subscriber.close();
            return Err(e);
        }
        subscribers.insert(id, subscriber);
        let total = subscribers.len();
        drop(subscribers);

        debug!(subscriber = id, total, "Subscriber registered");
        Ok(id)
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unregister(&self, id: SubscriberId) -> bool {
        let removed = self.subscribers.write().remove(&id);
        match removed {
            Some(subscriber) => {
                subscriber.close();
                debug!(subscriber = id, "Subscriber unregistered");
                true
            }
            None => false,
        }
    }

    /// The observer asked to close: stop delivering to it until it is
    /// unregistered. Returns `false` if the subscriber is unknown.
    pub fn begin_close(&self, id: SubscriberId) -> bool {
        match self.subscribers.read().get(&id) {
            Some(subscriber) => {
                subscriber.liveness.begin_close();
                true
            }
            None => false,
        }
    }

    /// Ids of the subscribers currently open.
    pub fn active_subscribers(&self) -> Vec<SubscriberId> {
        let mut ids: Vec<SubscriberId> = self
            .subscribers
            .read()
            .values()
            .filter(|s| s.is_open())
            .map(Subscriber::id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.subscribers.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.read().is_empty()
    }

    /// Visit every open subscriber while holding the read lock.
    ///
    /// `visit` must not block and must not call back into the registry.
    pub(crate) fn for_each_open(&self, mut visit: impl FnMut(&Subscriber)) {
        let subscribers = self.subscribers.read();
        for subscriber in subscribers.values().filter(|s| s.is_open()) {
            visit(subscriber);
        }
    }

    /// Close and remove every subscriber (used on shutdown).
    pub fn close_all(&self) -> usize {
        let drained: Vec<Subscriber> = self.subscribers.write().drain().map(|(_, s)| s).collect();
        for subscriber in &drained {
            subscriber.close();
        }
        drained.len()
    }
}
