//! Bridge runner for lifecycle management.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use alarmsight_common::init_tracing;
use tokio::sync::watch;
use tracing::{error, info, warn};

use crate::args::BridgeArgs;
use crate::broadcaster::Broadcaster;
use crate::bus::DeviceBus;
use crate::config::AlarmBridgeConfig;
use crate::coordinator::{BridgeCoordinator, DEFAULT_INBOX_CAPACITY};
use crate::error::{BridgeError, Result};
use crate::http::{AppState, HttpServer};
use crate::registry::SubscriberRegistry;
use crate::stats::BridgeStats;
use crate::store::Stores;

/// Time tasks get to stop after shutdown is signalled.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(5);

/// Wires the bridge together and runs it until shutdown.
///
/// Handles:
/// - Configuration loading and CLI overrides
/// - Logging initialization
/// - Spawning the coordinator, the device bus adapter and the HTTP server
/// - Graceful shutdown on Ctrl+C or SIGTERM
pub struct BridgeRunner {
    config: AlarmBridgeConfig,
}

impl BridgeRunner {
    /// Create a runner for an already loaded configuration.
    pub fn new(config: AlarmBridgeConfig) -> Self {
        Self { config }
    }

    /// Load the configuration named by `args`, apply overrides and
    /// initialize logging.
    pub fn from_args(args: &BridgeArgs) -> Result<Self> {
        let (mut config, loaded) = match AlarmBridgeConfig::load(&args.config) {
            Ok(config) => (config, true),
            Err(BridgeError::ConfigNotFound { .. }) if args.uses_default_config() => {
                (AlarmBridgeConfig::default(), false)
            }
            Err(e) => return Err(e),
        };
        args.apply(&mut config);
        config.validate()?;

        init_tracing(&config.logging)?;
        if loaded {
            info!(path = %args.config.display(), "Configuration loaded");
        } else {
            info!("No configuration file found, using defaults");
        }

        Ok(Self::new(config))
    }

    pub fn config(&self) -> &AlarmBridgeConfig {
        &self.config
    }

    /// Run until Ctrl+C or SIGTERM.
    pub async fn run(self) -> Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Run until `signal` completes or the HTTP server fails.
    pub async fn run_until<F>(self, signal: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let config = self.config;
        let listen_addr = config.http.socket_addr()?;

        info!(
            bridge = env!("CARGO_PKG_NAME"),
            version = env!("CARGO_PKG_VERSION"),
            "Starting bridge"
        );

        let stores = Stores::open(&config.store).await?;
        let registry = Arc::new(SubscriberRegistry::new(config.live.welcome_message.clone()));
        let stats = Arc::new(BridgeStats::new());

        let coordinator = BridgeCoordinator::new(
            Arc::new(config.device.fields.clone()),
            stores.clone(),
            Broadcaster::new(registry.clone()),
            stats.clone(),
        );
        let (handle, inbox) = coordinator.channel(DEFAULT_INBOX_CAPACITY);

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let coordinator_task = tokio::spawn(coordinator.run(inbox, shutdown_rx.clone()));

        let bus = DeviceBus::new(
            config.zenoh.clone(),
            config.device.topics.clone(),
            config.device.reconnect_interval(),
            handle.clone(),
        );
        let bus_task = tokio::spawn(bus.run(shutdown_rx.clone()));

        let http_server = HttpServer::new(
            AppState::new(
                stores,
                registry.clone(),
                handle,
                stats.clone(),
                config.live.queue_capacity,
            ),
            listen_addr,
        );
        let http_shutdown = shutdown_rx.clone();
        let mut http_task = tokio::spawn(async move { http_server.run(http_shutdown).await });

        info!(
            listen = %listen_addr,
            status_topic = %config.device.topics.status,
            command_topic = %config.device.topics.command,
            "Bridge running. Press Ctrl+C to stop."
        );

        let http_outcome = tokio::select! {
            _ = signal => {
                info!("Received shutdown signal");
                None
            }
            result = &mut http_task => Some(result),
        };

        shutdown_tx.send_replace(true);
        let closed = registry.close_all();
        if closed > 0 {
            info!(subscribers = closed, "Closed live subscribers");
        }

        let finished = tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
            let _ = coordinator_task.await;
            let _ = bus_task.await;
            match http_outcome {
                Some(outcome) => outcome,
                None => http_task.await,
            }
        })
        .await;

        let failure = match finished {
            Ok(Ok(Ok(()))) => None,
            Ok(Ok(Err(e))) => Some(e),
            Ok(Err(e)) => Some(BridgeError::Http(e.to_string())),
            Err(_) => {
                warn!("Timed out waiting for tasks to stop");
                None
            }
        };

        let stats = stats.snapshot();
        info!(
            messages_received = stats.messages_received,
            decode_failures = stats.decode_failures,
            snapshots_persisted = stats.snapshots_persisted,
            audit_entries_persisted = stats.audit_entries_persisted,
            persistence_failures = stats.persistence_failures,
            broadcasts = stats.broadcasts,
            subscribers_dropped = stats.subscribers_dropped,
            commands_published = stats.commands_published,
            publish_failures = stats.publish_failures,
            "Final statistics"
        );

        match failure {
            Some(e) => {
                error!(error = %e, "Bridge stopped with an error");
                Err(e)
            }
            None => {
                info!("Bridge stopped");
                Ok(())
            }
        }
    }
}

/// Completes on Ctrl+C or, on Unix, SIGTERM.
pub async fn shutdown_signal() {
    let terminate = async {
        #[cfg(unix)]
        {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut sigterm) => {
                    sigterm.recv().await;
                }
                Err(e) => {
                    warn!(error = %e, "Failed to listen for SIGTERM");
                    std::future::pending::<()>().await;
                }
            }
        }
        #[cfg(not(unix))]
        {
            std::future::pending::<()>().await;
        }
    };

    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                error!(error = %e, "Failed to listen for Ctrl+C");
                std::future::pending::<()>().await;
            }
        }
        _ = terminate => {
            info!("Received SIGTERM");
        }
    }
}
