//! WebSocket live channel.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::http::AppState;
use crate::registry::{Subscriber, SubscriberRegistry};

/// How long a closing connection may spend flushing queued frames.
const WRITER_DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Upgrade the request and serve the socket as a live subscriber.
pub(crate) async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    let registry = state.registry.clone();
    let capacity = state.queue_capacity;
    ws.on_upgrade(move |socket| serve_subscriber(socket, registry, capacity))
}

/// Run one subscriber connection until either side ends it.
///
/// The writer task drains the subscriber's queue into the socket; the
/// reader only watches for the close handshake. Frames the observer sends
/// are logged and dropped.
pub async fn serve_subscriber(socket: WebSocket, registry: Arc<SubscriberRegistry>, capacity: usize) {
    let (subscriber, mut outbox) = Subscriber::channel(capacity);
    let id = match registry.register(subscriber) {
        Ok(id) => id,
        Err(e) => {
            warn!(error = %e, "Failed to register WebSocket subscriber");
            return;
        }
    };
    info!(subscriber = id, total = registry.len(), "WebSocket subscriber connected");

    let (mut sink, mut stream) = socket.split();

    let mut writer = tokio::spawn(async move {
        while let Some(frame) = outbox.recv().await {
            if let Err(e) = sink.send(Message::Text(frame.to_string())).await {
                debug!(subscriber = outbox.id(), error = %e, "WebSocket send failed");
                break;
            }
        }
        let _ = sink.close().await;
    });

    let reader = async {
        while let Some(message) = stream.next().await {
            match message {
                Ok(Message::Close(_)) => {
                    registry.begin_close(id);
                    break;
                }
                Ok(Message::Text(text)) => {
                    debug!(subscriber = id, message = %text, "Ignoring message from subscriber");
                }
                Ok(Message::Binary(bytes)) => {
                    debug!(subscriber = id, len = bytes.len(), "Ignoring binary message from subscriber");
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(subscriber = id, error = %e, "WebSocket receive error");
                    break;
                }
            }
        }
    };

    tokio::select! {
        _ = reader => {
            registry.unregister(id);
            // Dropping the queue's sender lets the writer finish.
            if !finish_writer(&mut writer, WRITER_DRAIN_TIMEOUT).await {
                debug!(subscriber = id, "WebSocket writer stalled; aborted");
            }
        }
        _ = &mut writer => {
            registry.unregister(id);
        }
    }

    info!(subscriber = id, total = registry.len(), "WebSocket subscriber disconnected");
}

/// Wait up to `limit` for the writer to finish, aborting it otherwise.
///
/// Returns whether the writer finished on its own.
async fn finish_writer(writer: &mut JoinHandle<()>, limit: Duration) -> bool {
    match tokio::time::timeout(limit, &mut *writer).await {
        Ok(_) => true,
        Err(_) => {
            writer.abort();
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_finished_writer_is_awaited() {
        let mut writer = tokio::spawn(async {});
        assert!(finish_writer(&mut writer, Duration::from_secs(1)).await);
    }

    #[tokio::test]
    async fn test_stalled_writer_is_aborted() {
        let mut writer = tokio::spawn(std::future::pending::<()>());
        assert!(!finish_writer(&mut writer, Duration::from_millis(20)).await);

        let joined = writer.await;
        assert!(joined.unwrap_err().is_cancelled());
    }
}
