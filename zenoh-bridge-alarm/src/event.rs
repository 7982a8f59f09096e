//! Events pushed to live subscribers.

use std::sync::Arc;

use alarmsight_common::StatusDelta;
use serde::{Deserialize, Serialize};

/// A serialized event, shared by every subscriber queue it is pushed to.
pub type Frame = Arc<str>;

/// Message sent over the live channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LiveEvent {
    /// Sent once, right after a subscriber connects.
    Welcome { message: String },
    /// A status change reported by the device.
    Status { data: StatusDelta },
}

impl LiveEvent {
    pub fn welcome(message: impl Into<String>) -> Self {
        Self::Welcome {
            message: message.into(),
        }
    }

    pub fn status(data: StatusDelta) -> Self {
        Self::Status { data }
    }

    /// Serialize once for fan-out.
    pub fn to_frame(&self) -> Result<Frame, serde_json::Error> {
        serde_json::to_string(self).map(Frame::from)
    }
}
