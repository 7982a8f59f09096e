//! Device bus topics.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Topic the device publishes status changes on.
pub const DEFAULT_STATUS_TOPIC: &str = "device/status";

/// Topic the device listens on for commands.
pub const DEFAULT_COMMAND_TOPIC: &str = "device/command";

/// The pair of topics used to talk to one device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceTopics {
    /// Inbound status topic.
    #[serde(default = "default_status")]
    pub status: String,

    /// Outbound command topic.
    #[serde(default = "default_command")]
    pub command: String,
}

fn default_status() -> String {
    DEFAULT_STATUS_TOPIC.to_string()
}

fn default_command() -> String {
    DEFAULT_COMMAND_TOPIC.to_string()
}

impl Default for DeviceTopics {
    fn default() -> Self {
        Self {
            status: default_status(),
            command: default_command(),
        }
    }
}

impl DeviceTopics {
    /// Topics under a custom prefix: `<prefix>/status` and `<prefix>/command`.
    ///
    /// # Example
    /// ```
    /// use alarmsight_common::topics::DeviceTopics;
    ///
    /// let topics = DeviceTopics::with_prefix("site/garage");
    /// assert_eq!(topics.status, "site/garage/status");
    /// assert_eq!(topics.command, "site/garage/command");
    /// ```
    pub fn with_prefix(prefix: &str) -> Self {
        let prefix = prefix.trim_end_matches('/');
        Self {
            status: format!("{}/status", prefix),
            command: format!("{}/command", prefix),
        }
    }

    /// Check both topics are concrete keys and distinct.
    pub fn validate(&self) -> Result<()> {
        validate_topic(&self.status)?;
        validate_topic(&self.command)?;
        if self.status == self.command {
            return Err(Error::Topic {
                topic: self.command.clone(),
                reason: "status and command topics must differ".to_string(),
            });
        }
        Ok(())
    }
}

/// Check that `topic` is a concrete (non-wildcard) key expression.
pub fn validate_topic(topic: &str) -> Result<()> {
    let invalid = |reason: &str| Error::Topic {
        topic: topic.to_string(),
        reason: reason.to_string(),
    };

    if topic.is_empty() {
        return Err(invalid("topic is empty"));
    }
    if topic.starts_with('/') || topic.ends_with('/') {
        return Err(invalid("topic must not start or end with '/'"));
    }
    if topic.split('/').any(str::is_empty) {
        return Err(invalid("topic contains an empty segment"));
    }
    if topic.contains(['*', '$', '?', '#']) {
        return Err(invalid("wildcards are not allowed"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let topics = DeviceTopics::default();
        assert_eq!(topics.status, "device/status");
        assert_eq!(topics.command, "device/command");
        assert!(topics.validate().is_ok());
    }

    #[test]
    fn test_prefix_trailing_slash() {
        let topics = DeviceTopics::with_prefix("alarm/");
        assert_eq!(topics.status, "alarm/status");
    }

    #[test]
    fn test_invalid_topics() {
        assert!(validate_topic("").is_err());
        assert!(validate_topic("/device/status").is_err());
        assert!(validate_topic("device//status").is_err());
        assert!(validate_topic("device/**").is_err());
        assert!(validate_topic("device/status").is_ok());
    }

    #[test]
    fn test_same_topic_rejected() {
        let topics = DeviceTopics {
            status: "device/io".to_string(),
            command: "device/io".to_string(),
        };
        assert!(matches!(topics.validate(), Err(Error::Topic { .. })));
    }
}
