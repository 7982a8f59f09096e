//! JSON-lines file store.
//!
//! ```text
//! <dir>/
//!   status.jsonl   # one StatusSnapshot per line, append-only
//!   audit.jsonl    # one AuditEntry per line, append-only
//! ```

use std::io::SeekFrom;
use std::path::{Path, PathBuf};

use alarmsight_common::{AuditEntry, StatusSnapshot};
use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::warn;

use super::{AuditStore, StatusStore};
use crate::error::PersistenceError;

const STATUS_FILE: &str = "status.jsonl";
const AUDIT_FILE: &str = "audit.jsonl";

/// Append-only log file; every append is synced before it returns.
#[derive(Debug)]
struct JsonLines {
    path: PathBuf,
    writer: Mutex<LineWriter>,
}

#[derive(Debug)]
struct LineWriter {
    file: File,
    /// The file does not end in a newline, so the next record starts a fresh line.
    realign: bool,
}

impl JsonLines {
    async fn open(path: PathBuf) -> Result<Self, PersistenceError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        let realign = !ends_with_newline(&path).await?;
        if realign {
            warn!(path = %path.display(), "Log ends in a partial record");
        }
        Ok(Self {
            path,
            writer: Mutex::new(LineWriter { file, realign }),
        })
    }

    async fn append<T: Serialize>(&self, record: &T) -> Result<(), PersistenceError> {
        let encoded =
            serde_json::to_vec(record).map_err(|e| PersistenceError::Encode(e.to_string()))?;

        let mut writer = self.writer.lock().await;
        let mut line = Vec::with_capacity(encoded.len() + 2);
        if writer.realign {
            line.push(b'\n');
        }
        line.extend_from_slice(&encoded);
        line.push(b'\n');

        let len = writer.file.metadata().await?.len();
        match write_synced(&mut writer.file, &line).await {
            Ok(()) => {
                writer.realign = false;
                Ok(())
            }
            Err(e) => {
                // Drop whatever part of the record made it to disk.
                if let Err(truncate) = writer.file.set_len(len).await {
                    warn!(
                        path = %self.path.display(),
                        error = %truncate,
                        "Failed to roll back partial write"
                    );
                    writer.realign = true;
                }
                Err(e.into())
            }
        }
    }

    async fn read_all<T: DeserializeOwned>(&self) -> Result<Vec<T>, PersistenceError> {
        read_records(&self.path).await
    }
}

async fn write_synced(file: &mut File, bytes: &[u8]) -> std::io::Result<()> {
    file.write_all(bytes).await?;
    file.flush().await?;
    file.sync_data().await
}

/// True for an empty file or one whose last byte is a newline.
async fn ends_with_newline(path: &Path) -> Result<bool, PersistenceError> {
    let mut file = File::open(path).await?;
    if file.metadata().await?.len() == 0 {
        return Ok(true);
    }
    file.seek(SeekFrom::End(-1)).await?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last).await?;
    Ok(last[0] == b'\n')
}

/// Read every parsable record; unreadable lines are logged and skipped.
async fn read_records<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>, PersistenceError> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };

    let records = content
        .lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .filter_map(|(i, line)| match serde_json::from_str(line) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = i + 1,
                    error = %e,
                    "Skipping unreadable record"
                );
                None
            }
        })
        .collect();
    Ok(records)
}

/// File-backed store for both status snapshots and audit entries.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
    status: JsonLines,
    audit: JsonLines,
    /// Highest sequence handed out; guarded by its own lock so sequence
    /// assignment and the write happen as one step.
    last_sequence: Mutex<u64>,
}

impl FileStore {
    /// Open (or create) a store rooted at `dir`.
    pub async fn open(dir: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir).await?;

        let status_path = dir.join(STATUS_FILE);
        let existing: Vec<StatusSnapshot> = read_records(&status_path).await?;
        let last_sequence = existing.iter().map(|s| s.sequence).max().unwrap_or(0);

        tracing::debug!(
            path = %dir.display(),
            snapshots = existing.len(),
            last_sequence,
            "File store opened"
        );

        Ok(Self {
            status: JsonLines::open(status_path).await?,
            audit: JsonLines::open(dir.join(AUDIT_FILE)).await?,
            dir,
            last_sequence: Mutex::new(last_sequence),
        })
    }

    /// Directory the store writes to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl StatusStore for FileStore {
    async fn append(&self, snapshot: StatusSnapshot) -> Result<StatusSnapshot, PersistenceError> {
        let mut last = self.last_sequence.lock().await;
        let stored = snapshot.sequenced(*last + 1);
        self.status.append(&stored).await?;
        *last = stored.sequence;
        Ok(stored)
    }

    async fn latest(&self) -> Result<Option<StatusSnapshot>, PersistenceError> {
        let snapshots: Vec<StatusSnapshot> = self.status.read_all().await?;
        Ok(snapshots.into_iter().max_by_key(|s| s.sequence))
    }
}

#[async_trait]
impl AuditStore for FileStore {
    async fn append(&self, entry: AuditEntry) -> Result<(), PersistenceError> {
        self.audit.append(&entry).await
    }

    async fn all(&self) -> Result<Vec<AuditEntry>, PersistenceError> {
        let mut entries: Vec<AuditEntry> = self.audit.read_all().await?;
        // File order is insertion order; a stable sort keeps it for equal timestamps.
        entries.reverse();
        entries.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(entries)
    }
}
