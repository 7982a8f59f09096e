//! HTTP surface: status and log queries, command submission, live channel.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value, json};
use tokio::sync::watch;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::coordinator::{BusState, CoordinatorHandle};
use crate::error::{BridgeError, Result};
use crate::registry::SubscriberRegistry;
use crate::stats::{BridgeStats, StatsSnapshot};
use crate::store::Stores;
use crate::ws;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub(crate) stores: Stores,
    pub(crate) registry: Arc<SubscriberRegistry>,
    pub(crate) coordinator: CoordinatorHandle,
    pub(crate) stats: Arc<BridgeStats>,
    pub(crate) queue_capacity: usize,
}

impl AppState {
    pub fn new(
        stores: Stores,
        registry: Arc<SubscriberRegistry>,
        coordinator: CoordinatorHandle,
        stats: Arc<BridgeStats>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            stores,
            registry,
            coordinator,
            stats,
            queue_capacity,
        }
    }
}

/// Body of `GET /health`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub bridge: &'static str,
    pub version: &'static str,
    pub bus: BusState,
    pub subscribers: usize,
    pub stats: StatsSnapshot,
}

/// Create the HTTP router.
///
/// The live channel is served on `/ws` and, like a plain WebSocket server,
/// on `/`.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(ws::ws_handler))
        .route("/ws", get(ws::ws_handler))
        .route("/status", get(status_handler))
        .route("/logs", get(logs_handler))
        .route("/set_alarm", post(set_alarm_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn message(status: StatusCode, text: impl Into<String>) -> Response {
    (status, Json(json!({ "message": text.into() }))).into_response()
}

fn internal_error() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
}

/// Handler for `GET /status`: the most recent snapshot.
async fn status_handler(State(state): State<AppState>) -> Response {
    match state.stores.status.latest().await {
        Ok(Some(snapshot)) => Json(snapshot).into_response(),
        Ok(None) => message(StatusCode::NOT_FOUND, "No status found"),
        Err(e) => {
            error!(error = %e, "Error fetching status");
            internal_error()
        }
    }
}

/// Handler for `GET /logs`: every audit entry, newest first.
async fn logs_handler(State(state): State<AppState>) -> Response {
    match state.stores.audit.all().await {
        Ok(entries) if entries.is_empty() => message(StatusCode::NOT_FOUND, "No logs found"),
        Ok(entries) => Json(entries).into_response(),
        Err(e) => {
            error!(error = %e, "Error fetching logs");
            internal_error()
        }
    }
}

/// Handler for `POST /set_alarm`: validate and forward a command.
async fn set_alarm_handler(State(state): State<AppState>, body: Bytes) -> Response {
    match state.coordinator.submit_command(body.to_vec()).await {
        Ok(delta) => {
            let mut reply = Map::new();
            reply.insert("message".to_string(), Value::from("Command sent"));
            // Body fields win, including a "message" field.
            reply.extend(delta.into_inner());
            Json(Value::Object(reply)).into_response()
        }
        Err(BridgeError::Decode(e)) => {
            warn!(error = %e, "Rejected command");
            message(StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(BridgeError::CoordinatorStopped) => {
            message(StatusCode::SERVICE_UNAVAILABLE, "Bridge is not running")
        }
        Err(e) => {
            error!(error = %e, "Failed to submit command");
            internal_error()
        }
    }
}

/// Handler for `GET /health`.
async fn health_handler(State(state): State<AppState>) -> Json<HealthReport> {
    Json(HealthReport {
        bridge: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        bus: state.coordinator.bus_state(),
        subscribers: state.registry.len(),
        stats: state.stats.snapshot(),
    })
}

/// HTTP server for the bridge.
pub struct HttpServer {
    state: AppState,
    listen_addr: SocketAddr,
}

impl HttpServer {
    pub fn new(state: AppState, listen_addr: SocketAddr) -> Self {
        Self { state, listen_addr }
    }

    /// Run the HTTP server until the shutdown signal is received.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        let router = create_router(self.state);

        let listener = tokio::net::TcpListener::bind(self.listen_addr)
            .await
            .map_err(|e| BridgeError::Http(format!("Failed to bind to {}: {}", self.listen_addr, e)))?;

        info!(addr = %self.listen_addr, "HTTP server listening");

        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                loop {
                    if shutdown.changed().await.is_err() {
                        break;
                    }
                    if *shutdown.borrow() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
            .map_err(|e| BridgeError::Http(e.to_string()))?;

        info!("HTTP server stopped");
        Ok(())
    }
}
