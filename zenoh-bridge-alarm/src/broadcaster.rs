//! Fan-out of live events to every open subscriber.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::event::LiveEvent;
use crate::registry::{SubscriberId, SubscriberRegistry};

/// Outcome of one broadcast.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Subscribers the event was queued for.
    pub delivered: usize,
    /// Subscribers closed and removed because delivery failed.
    pub dropped: usize,
}

/// Delivers events to the registry's open subscribers.
///
/// Delivery never waits on an observer: each subscriber gets a non-blocking
/// enqueue, and a failure only affects that subscriber.
#[derive(Debug, Clone)]
pub struct Broadcaster {
    registry: Arc<SubscriberRegistry>,
}

impl Broadcaster {
    pub fn new(registry: Arc<SubscriberRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<SubscriberRegistry> {
        &self.registry
    }

    /// Deliver `event` to every open subscriber.
    ///
    /// Errors never reach the caller; failed subscribers are closed and
    /// unregistered after the pass over the set is complete.
    pub fn broadcast(&self, event: &LiveEvent) -> BroadcastReport {
        let frame = match event.to_frame() {
            Ok(frame) => frame,
            Err(e) => {
                warn!(error = %e, "Failed to encode live event");
                return BroadcastReport::default();
            }
        };

        let mut report = BroadcastReport::default();
        let mut failed: Vec<SubscriberId> = Vec::new();

        self.registry.for_each_open(|subscriber| match subscriber.deliver(&frame) {
            Ok(()) => report.delivered += 1,
            Err(e) => {
                subscriber.close();
                debug!(subscriber = subscriber.id(), error = %e, "Delivery failed");
                failed.push(subscriber.id());
            }
        });

        for id in failed {
            if self.registry.unregister(id) {
                warn!(subscriber = id, "Dropped subscriber after failed delivery");
                report.dropped += 1;
            }
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{Outbox, Subscriber, SubscriberState};
    use alarmsight_common::StatusDelta;
    use futures::FutureExt;

    fn setup() -> Broadcaster {
        Broadcaster::new(Arc::new(SubscriberRegistry::new("welcome")))
    }

    fn connect(broadcaster: &Broadcaster, capacity: usize) -> Outbox {
        let (subscriber, outbox) = Subscriber::channel(capacity);
        broadcaster.registry().register(subscriber).unwrap();
        outbox
    }

    /// Drain the queue without waiting; the welcome frame is skipped.
    fn drain_status(outbox: &mut Outbox) -> Vec<LiveEvent> {
        let mut events = Vec::new();
        while let Some(Some(frame)) = outbox.recv().now_or_never() {
            let event: LiveEvent = serde_json::from_str(&frame).unwrap();
            if matches!(event, LiveEvent::Status { .. }) {
                events.push(event);
            }
        }
        events
    }

    fn status(n: u64) -> LiveEvent {
        LiveEvent::status(StatusDelta::new().with("n", n))
    }

    #[test]
    fn test_every_open_subscriber_gets_every_event() {
        let broadcaster = setup();
        let mut outboxes: Vec<Outbox> = (0..3).map(|_| connect(&broadcaster, 16)).collect();

        for n in 0..5 {
            let report = broadcaster.broadcast(&status(n));
            assert_eq!(report, BroadcastReport { delivered: 3, dropped: 0 });
        }

        for outbox in &mut outboxes {
            let events = drain_status(outbox);
            assert_eq!(events, (0..5).map(status).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_failed_subscriber_does_not_block_others() {
        let broadcaster = setup();
        let mut healthy = connect(&broadcaster, 16);
        let dead = connect(&broadcaster, 16);
        drop(dead);

        let report = broadcaster.broadcast(&status(1));
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert_eq!(broadcaster.registry().len(), 1);
        assert_eq!(drain_status(&mut healthy), vec![status(1)]);
    }

    #[test]
    fn test_lagging_subscriber_is_dropped() {
        let broadcaster = setup();
        // Room for the welcome frame and one event.
        let mut slow = connect(&broadcaster, 2);
        let mut fast = connect(&broadcaster, 16);

        broadcaster.broadcast(&status(1));
        let report = broadcaster.broadcast(&status(2));
        assert_eq!(report, BroadcastReport { delivered: 1, dropped: 1 });
        assert_eq!(slow.state(), SubscriberState::Closed);

        broadcaster.broadcast(&status(3));
        assert_eq!(drain_status(&mut slow), vec![status(1)]);
        assert_eq!(drain_status(&mut fast), vec![status(1), status(2), status(3)]);
    }

    #[test]
    fn test_closed_subscriber_gets_nothing_after_close() {
        let broadcaster = setup();
        let mut outbox = connect(&broadcaster, 16);

        broadcaster.broadcast(&status(1));
        broadcaster.registry().unregister(outbox.id());
        broadcaster.broadcast(&status(2));
        broadcaster.broadcast(&status(3));

        assert_eq!(drain_status(&mut outbox), vec![status(1)]);
    }

    #[test]
    fn test_closing_subscriber_skipped() {
        let broadcaster = setup();
        let mut outbox = connect(&broadcaster, 16);
        broadcaster.registry().begin_close(outbox.id());

        let report = broadcaster.broadcast(&status(1));
        assert_eq!(report, BroadcastReport::default());
        assert!(drain_status(&mut outbox).is_empty());
    }

    #[test]
    fn test_broadcast_without_subscribers() {
        let broadcaster = setup();
        assert_eq!(broadcaster.broadcast(&status(1)), BroadcastReport::default());
    }
}
