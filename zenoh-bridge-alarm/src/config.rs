//! Alarm bridge configuration.

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;

use alarmsight_common::{DeviceTopics, FieldSchema, LoggingConfig, ZenohConfig};
use serde::{Deserialize, Serialize};

use crate::error::{BridgeError, Result};
use crate::store::StoreConfig;

/// Complete alarm bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AlarmBridgeConfig {
    /// Zenoh connection settings.
    #[serde(default)]
    pub zenoh: ZenohConfig,

    /// Device topics and field schema.
    #[serde(default)]
    pub device: DeviceConfig,

    /// Query and command HTTP surface.
    #[serde(default)]
    pub http: HttpConfig,

    /// Live subscriber channel.
    #[serde(default)]
    pub live: LiveConfig,

    /// Status and audit persistence.
    #[serde(default)]
    pub store: StoreConfig,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// The device the bridge talks to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    #[serde(default)]
    pub topics: DeviceTopics,

    /// Seconds to wait before reconnecting to the bus.
    #[serde(default = "default_reconnect_interval_secs")]
    pub reconnect_interval_secs: u64,

    /// Recognized fields, in audit order.
    #[serde(default)]
    pub fields: FieldSchema,
}

fn default_reconnect_interval_secs() -> u64 {
    5
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            topics: DeviceTopics::default(),
            reconnect_interval_secs: default_reconnect_interval_secs(),
            fields: FieldSchema::default(),
        }
    }
}

impl DeviceConfig {
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_secs(self.reconnect_interval_secs)
    }
}

/// HTTP listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Address to listen on (default: "0.0.0.0:3001").
    #[serde(default = "default_listen")]
    pub listen: String,
}

fn default_listen() -> String {
    "0.0.0.0:3001".to_string()
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
        }
    }
}

impl HttpConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen.parse().map_err(|e| {
            BridgeError::validation(format!("Invalid listen address '{}': {}", self.listen, e))
        })
    }
}

/// Live channel configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiveConfig {
    /// Text of the event sent to every new subscriber.
    #[serde(default = "default_welcome_message")]
    pub welcome_message: String,

    /// Events buffered per subscriber before it is considered lagging.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_welcome_message() -> String {
    "Connected to WebSocket server".to_string()
}

fn default_queue_capacity() -> usize {
    256
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            welcome_message: default_welcome_message(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl AlarmBridgeConfig {
    /// Load and validate a JSON5 configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(BridgeError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse and validate a JSON5 configuration string.
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self = json5::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.device
            .topics
            .validate()
            .map_err(|e| BridgeError::validation(e.to_string()))?;

        if self.device.reconnect_interval_secs == 0 {
            return Err(BridgeError::validation(
                "device.reconnect_interval_secs must be at least 1",
            ));
        }

        self.http.socket_addr()?;

        if self.live.queue_capacity == 0 {
            return Err(BridgeError::validation(
                "live.queue_capacity must be at least 1",
            ));
        }

        if self.logging.level.trim().is_empty() {
            return Err(BridgeError::validation("logging.level must not be empty"));
        }

        Ok(())
    }
}
