//! Command line arguments.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::config::AlarmBridgeConfig;

/// Configuration file used when `--config` is not given.
pub const DEFAULT_CONFIG: &str = "alarm.json5";

/// Zenoh bridge for alarm controllers.
#[derive(Parser, Debug, Clone)]
#[command(name = "zenoh-bridge-alarm")]
#[command(about = "Bridge an alarm controller on Zenoh to HTTP and WebSocket clients")]
#[command(version)]
pub struct BridgeArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, default_value = DEFAULT_CONFIG)]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long)]
    pub log_level: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    pub listen: Option<String>,
}

impl BridgeArgs {
    /// Whether the configuration path is the implicit default.
    pub fn uses_default_config(&self) -> bool {
        self.config == Path::new(DEFAULT_CONFIG)
    }

    /// Apply command line overrides to a loaded configuration.
    pub fn apply(&self, config: &mut AlarmBridgeConfig) {
        if let Some(listen) = &self.listen {
            config.http.listen = listen.clone();
        }
        if let Some(level) = &self.log_level {
            config.logging = config.logging.with_level(level.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let args = BridgeArgs::try_parse_from(["zenoh-bridge-alarm"]).unwrap();
        assert_eq!(args.config, PathBuf::from("alarm.json5"));
        assert!(args.uses_default_config());
        assert!(args.log_level.is_none());
        assert!(args.listen.is_none());
    }

    #[test]
    fn test_overrides() {
        let args = BridgeArgs::try_parse_from([
            "zenoh-bridge-alarm",
            "-c",
            "/etc/alarm.json5",
            "--log-level",
            "debug",
            "--listen",
            "127.0.0.1:9000",
        ])
        .unwrap();
        assert!(!args.uses_default_config());

        let mut config = AlarmBridgeConfig::default();
        args.apply(&mut config);
        assert_eq!(config.http.listen, "127.0.0.1:9000");
        assert_eq!(config.logging.level, "debug");
    }
}
