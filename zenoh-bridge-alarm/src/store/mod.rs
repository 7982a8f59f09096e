//! Status and audit persistence.
//!
//! The bridge only needs append plus one read per store. Stores are
//! externally synchronized; the two are never written transactionally.

use std::path::PathBuf;
use std::sync::Arc;

use alarmsight_common::{AuditEntry, StatusSnapshot};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Durable storage for status snapshots.
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Durably record a snapshot, returning it with its assigned sequence.
    async fn append(&self, snapshot: StatusSnapshot) -> Result<StatusSnapshot, PersistenceError>;

    /// The most recently persisted snapshot, if any.
    async fn latest(&self) -> Result<Option<StatusSnapshot>, PersistenceError>;
}

/// Durable storage for audit entries.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Durably record one entry.
    async fn append(&self, entry: AuditEntry) -> Result<(), PersistenceError>;

    /// Every entry, most recent first.
    async fn all(&self) -> Result<Vec<AuditEntry>, PersistenceError>;
}

/// Storage backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    /// Keep everything in process memory (lost on restart).
    #[default]
    Memory,
    /// JSON-lines files on local disk.
    File,
}

/// Persistence configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,

    /// Directory for the file backend (default: `<data dir>/alarmsight`).
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl StoreConfig {
    /// Directory the file backend writes to.
    pub fn data_dir(&self) -> PathBuf {
        self.path.clone().unwrap_or_else(|| {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("alarmsight")
        })
    }
}

/// The pair of stores the coordinator writes to.
#[derive(Clone)]
pub struct Stores {
    pub status: Arc<dyn StatusStore>,
    pub audit: Arc<dyn AuditStore>,
}

impl Stores {
    /// Open the stores selected by `config`.
    pub async fn open(config: &StoreConfig) -> Result<Self, PersistenceError> {
        match config.backend {
            StoreBackend::Memory => Ok(Self::shared(Arc::new(MemoryStore::new()))),
            StoreBackend::File => {
                let dir = config.data_dir();
                tracing::info!(path = %dir.display(), "Opening file store");
                Ok(Self::shared(Arc::new(FileStore::open(dir).await?)))
            }
        }
    }

    /// Use one backend for both status and audit records.
    pub fn shared<S>(store: Arc<S>) -> Self
    where
        S: StatusStore + AuditStore + 'static,
    {
        Self {
            status: store.clone(),
            audit: store,
        }
    }
}
