//! Device status data model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys the bridge adds to persisted snapshots; devices may not send them.
pub const RESERVED_KEYS: [&str; 2] = ["sequence", "timestamp"];

/// The subset of status fields carried by one inbound or outbound message.
///
/// Unrecognized fields are kept as-is so they reach persistence untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusDelta(Map<String, Value>);

impl StatusDelta {
    /// Create an empty delta.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Add a field to this delta.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Get a field value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether the delta carries `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Iterate over all fields.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for StatusDelta {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// One persisted status record. Never mutated once stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusSnapshot {
    /// Store-assigned insertion order; the highest is the current status.
    pub sequence: u64,

    /// When the bridge received the status.
    pub timestamp: DateTime<Utc>,

    /// Fields exactly as reported by the device.
    #[serde(flatten)]
    pub fields: StatusDelta,
}

impl StatusSnapshot {
    /// Create an unsequenced snapshot stamped with the current time.
    pub fn new(fields: StatusDelta) -> Self {
        Self {
            sequence: 0,
            timestamp: Utc::now(),
            fields,
        }
    }

    /// Copy of this snapshot carrying the store-assigned sequence.
    pub fn sequenced(mut self, sequence: u64) -> Self {
        self.sequence = sequence;
        self
    }
}

/// Human-readable record of a single flag transition or issued command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub message: String,
    pub timestamp: DateTime<Utc>,
}

impl AuditEntry {
    /// Create an entry stamped with the current time.
    pub fn new(message: impl Into<String>) -> Self {
        Self::at(message, Utc::now())
    }

    /// Create an entry with an explicit timestamp.
    pub fn at(message: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            message: message.into(),
            timestamp,
        }
    }
}
