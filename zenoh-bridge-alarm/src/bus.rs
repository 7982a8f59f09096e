//! Zenoh device bus adapter.
//!
//! Owns the Zenoh session and turns its lifecycle into coordinator events.
//! Reconnecting after a failure is handled here, not by the coordinator.

use std::sync::Arc;
use std::time::Duration;

use alarmsight_common::{DeviceTopics, ZenohConfig};
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use zenoh::Session;
use zenoh::sample::SampleKind;

use crate::coordinator::{BridgeEvent, CommandPublisher, CoordinatorHandle};
use crate::error::BusConnectionError;

/// Publishes operator commands on the device command topic.
#[derive(Clone)]
pub struct ZenohLink {
    session: Session,
    topic: String,
}

impl ZenohLink {
    pub fn new(session: Session, topic: impl Into<String>) -> Self {
        Self {
            session,
            topic: topic.into(),
        }
    }
}

#[async_trait]
impl CommandPublisher for ZenohLink {
    async fn publish(&self, payload: &[u8]) -> Result<(), BusConnectionError> {
        self.session
            .put(&self.topic, payload.to_vec())
            .await
            .map_err(|e| BusConnectionError::Publish {
                topic: self.topic.clone(),
                message: e.to_string(),
            })
    }
}

/// Why a bus session ended without an error.
enum SessionEnd {
    Shutdown,
    CoordinatorGone,
}

/// Connects to the device bus and feeds status samples to the coordinator.
pub struct DeviceBus {
    zenoh: ZenohConfig,
    topics: DeviceTopics,
    reconnect_interval: Duration,
    coordinator: CoordinatorHandle,
}

impl DeviceBus {
    pub fn new(
        zenoh: ZenohConfig,
        topics: DeviceTopics,
        reconnect_interval: Duration,
        coordinator: CoordinatorHandle,
    ) -> Self {
        Self {
            zenoh,
            topics,
            reconnect_interval,
            coordinator,
        }
    }

    /// Keep a bus session alive until shutdown.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        info!(
            status = %self.topics.status,
            command = %self.topics.command,
            "Device bus adapter started"
        );

        while !*shutdown.borrow() {
            match self.run_session(&mut shutdown).await {
                Ok(SessionEnd::Shutdown) => break,
                Ok(SessionEnd::CoordinatorGone) => {
                    warn!("Coordinator stopped, closing device bus");
                    break;
                }
                Err(e) => {
                    error!(
                        error = %e,
                        retry_in_secs = self.reconnect_interval.as_secs(),
                        "Device bus unavailable"
                    );
                    if self
                        .coordinator
                        .send(BridgeEvent::BusDisconnected(e))
                        .await
                        .is_err()
                    {
                        break;
                    }
                    tokio::select! {
                        _ = tokio::time::sleep(self.reconnect_interval) => {}
                        _ = shutdown.changed() => break,
                    }
                }
            }
        }

        info!("Device bus adapter stopped");
    }

    async fn run_session(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<SessionEnd, BusConnectionError> {
        let session = tokio::select! {
            result = alarmsight_common::connect(&self.zenoh) => {
                result.map_err(|e| BusConnectionError::Connect(e.to_string()))?
            }
            _ = shutdown.changed() => return Ok(SessionEnd::Shutdown),
        };

        let link = ZenohLink::new(session.clone(), self.topics.command.clone());
        if self
            .coordinator
            .send(BridgeEvent::BusConnected(Arc::new(link)))
            .await
            .is_err()
        {
            close_session(session).await;
            return Ok(SessionEnd::CoordinatorGone);
        }

        let subscriber = match session.declare_subscriber(&self.topics.status).await {
            Ok(subscriber) => subscriber,
            Err(e) => {
                close_session(session).await;
                return Err(BusConnectionError::Subscribe {
                    topic: self.topics.status.clone(),
                    message: e.to_string(),
                });
            }
        };
        info!(topic = %self.topics.status, "Subscribed to device status");

        let outcome = if self.coordinator.send(BridgeEvent::BusSubscribed).await.is_err() {
            Ok(SessionEnd::CoordinatorGone)
        } else {
            loop {
                tokio::select! {
                    sample = subscriber.recv_async() => match sample {
                        Ok(sample) => {
                            if sample.kind() == SampleKind::Delete {
                                debug!(key = %sample.key_expr(), "Ignoring delete sample");
                                continue;
                            }
                            let payload = sample.payload().to_bytes().into_owned();
                            if self.coordinator.send(BridgeEvent::Message(payload)).await.is_err() {
                                break Ok(SessionEnd::CoordinatorGone);
                            }
                        }
                        Err(e) => break Err(BusConnectionError::Lost(e.to_string())),
                    },
                    _ = shutdown.changed() => break Ok(SessionEnd::Shutdown),
                }
            }
        };

        if let Err(e) = subscriber.undeclare().await {
            debug!(error = %e, "Failed to undeclare status subscriber");
        }
        close_session(session).await;
        outcome
    }
}

async fn close_session(session: Session) {
    if let Err(e) = session.close().await {
        warn!(error = %e, "Error closing Zenoh session");
    }
}
