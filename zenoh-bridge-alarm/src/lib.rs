//! Zenoh bridge for alarm controllers.
//!
//! The device publishes status changes on a Zenoh topic. The bridge decodes
//! each message, records a status snapshot and human-readable audit entries,
//! and pushes the change to every connected WebSocket observer. Operator
//! commands travel the other way: HTTP request, Zenoh command topic, audit.
//!
//! # Architecture
//!
//! ```text
//!                     ┌──────────────────────────────────────────┐
//! device/status ────> │ DeviceBus ──> BridgeCoordinator          │
//!                     │                 ├─ TelemetryDecoder      │
//!                     │                 ├─ ChangeAuditor         │
//!                     │                 ├─ StatusStore/AuditStore│
//!                     │                 └─ Broadcaster ──────────┼──> /ws subscribers
//! device/command <─── │ ZenohLink <──── CoordinatorHandle <──────┼─── POST /set_alarm
//!                     └──────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```bash
//! zenoh-bridge-alarm --config alarm.json5
//! ```
//!
//! See [`config::AlarmBridgeConfig`] for configuration options.

pub mod args;
pub mod auditor;
pub mod broadcaster;
pub mod bus;
pub mod config;
pub mod coordinator;
pub mod decoder;
pub mod error;
pub mod event;
pub mod http;
pub mod registry;
pub mod runner;
pub mod stats;
pub mod store;
pub mod ws;

pub use args::BridgeArgs;
pub use auditor::ChangeAuditor;
pub use broadcaster::{BroadcastReport, Broadcaster};
pub use bus::{DeviceBus, ZenohLink};
pub use config::AlarmBridgeConfig;
pub use coordinator::{
    BridgeCoordinator, BridgeEvent, BusState, CommandPublisher, CoordinatorHandle,
};
pub use decoder::TelemetryDecoder;
pub use error::{
    BridgeError, BusConnectionError, DecodeError, DeliveryError, PersistenceError, Result,
};
pub use event::LiveEvent;
pub use http::{AppState, HttpServer, create_router};
pub use registry::{Subscriber, SubscriberId, SubscriberRegistry, SubscriberState};
pub use runner::BridgeRunner;
pub use stats::{BridgeStats, StatsSnapshot};
pub use store::{AuditStore, FileStore, MemoryStore, StatusStore, StoreBackend, StoreConfig, Stores};
