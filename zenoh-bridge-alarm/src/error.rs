//! Error types for the alarm bridge.
//!
//! Each pipeline stage has its own error so failures stay contained:
//! none of these is fatal to the process.

use thiserror::Error;

/// Result type alias using [`BridgeError`].
pub type Result<T> = std::result::Result<T, BridgeError>;

/// A device payload that could not be turned into a status delta.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Not well-formed JSON or CBOR.
    #[error("Malformed payload: {0}")]
    Malformed(String),

    /// Well-formed, but not a key/value object.
    #[error("Payload is not an object")]
    NotAnObject,

    /// A recognized field carries a value of the wrong shape.
    #[error("Field '{field}' expects {expected}, got {found}")]
    InvalidField {
        field: String,
        expected: String,
        found: String,
    },

    /// The payload uses a key the bridge adds itself.
    #[error("Field '{0}' is reserved")]
    ReservedField(String),
}

/// A status or audit store operation failed.
#[derive(Error, Debug)]
pub enum PersistenceError {
    /// I/O error from the backing storage.
    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record could not be encoded.
    #[error("Failed to encode record: {0}")]
    Encode(String),

    /// The store is not reachable.
    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// The device bus is unreachable or went away.
#[derive(Error, Debug, Clone)]
pub enum BusConnectionError {
    /// Opening the bus session failed.
    #[error("Failed to connect to device bus: {0}")]
    Connect(String),

    /// Declaring the status subscription failed.
    #[error("Failed to subscribe to {topic}: {message}")]
    Subscribe { topic: String, message: String },

    /// Publishing a command failed.
    #[error("Failed to publish to {topic}: {message}")]
    Publish { topic: String, message: String },

    /// No bus link is currently established.
    #[error("Device bus is not connected")]
    NotConnected,

    /// The subscription stream ended.
    #[error("Device bus connection lost: {0}")]
    Lost(String),
}

/// A single subscriber could not take an event.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// The subscriber is no longer open.
    #[error("Subscriber is closed")]
    Closed,

    /// The subscriber's queue is full; it cannot keep up.
    #[error("Subscriber is lagging")]
    Lagging,

    /// The connection writer has gone away.
    #[error("Subscriber connection dropped")]
    Disconnected,

    /// The event could not be serialized.
    #[error("Event could not be encoded")]
    Encode,
}

/// Errors raised while setting up or running the bridge.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration file not found.
    #[error("Configuration file not found: {path}")]
    ConfigNotFound { path: String },

    /// Configuration parse error.
    #[error("Failed to parse configuration: {0}")]
    ConfigParse(String),

    /// Configuration validation error.
    #[error("Configuration validation failed: {0}")]
    ConfigValidation(String),

    /// HTTP server error.
    #[error("HTTP server error: {0}")]
    Http(String),

    /// The coordinator is no longer accepting events.
    #[error("Bridge coordinator has stopped")]
    CoordinatorStopped,

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Bus(#[from] BusConnectionError),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// Create a configuration validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::ConfigValidation(msg.into())
    }
}

impl From<json5::Error> for BridgeError {
    fn from(err: json5::Error) -> Self {
        Self::ConfigParse(err.to_string())
    }
}

impl From<alarmsight_common::Error> for BridgeError {
    fn from(err: alarmsight_common::Error) -> Self {
        match err {
            alarmsight_common::Error::Io(e) => Self::Io(e),
            other => Self::Config(other.to_string()),
        }
    }
}
