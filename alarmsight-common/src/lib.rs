//! AlarmSight Common Library
//!
//! Shared types and utilities for the AlarmSight device bridge:
//!
//! - [`status`] - Device data model (`StatusDelta`, `StatusSnapshot`, `AuditEntry`)
//! - [`schema`] - Declared, ordered set of recognized status fields
//! - [`topics`] - Device bus topics
//! - [`serialization`] - JSON/CBOR encoding and decoding
//! - [`config`] - Configuration loading (JSON5 format)
//! - [`session`] - Zenoh session management
//! - [`error`] - Error types

pub mod config;
pub mod error;
pub mod schema;
pub mod serialization;
pub mod session;
pub mod status;
pub mod topics;

// Re-export commonly used types at the crate root
pub use config::{LogFormat, LoggingConfig, ZenohConfig, ZenohMode, load_config, parse_config};
pub use error::{Error, Result};
pub use schema::{FieldKind, FieldSchema, FieldSpec};
pub use serialization::{Format, decode, decode_auto, encode};
pub use session::connect;
pub use status::{AuditEntry, RESERVED_KEYS, StatusDelta, StatusSnapshot};
pub use topics::{DEFAULT_COMMAND_TOPIC, DEFAULT_STATUS_TOPIC, DeviceTopics};

/// Initialize tracing with the given configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Zenoh's own
/// logging is capped at `warn` unless `RUST_LOG` says otherwise.
///
/// Supports two output formats:
/// - `LogFormat::Text` (default): Human-readable text format
/// - `LogFormat::Json`: Structured JSON format for log aggregation systems
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!("{},zenoh=warn", config.level))
            .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", config.level, e)))?,
    };

    let result = match config.format {
        LogFormat::Text => tracing_subscriber::registry()
            .with(fmt::layer())
            .with(filter)
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(filter)
            .try_init(),
    };

    result.map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))
}
