use crate::snapshot::SnapshotFile;
use crate::table::{Lookup, ShareTable, StoredShare};
use async_trait::async_trait;
use ferry::domain::validate_share;
use ferry::{
    Clock, PutResponse, RetentionPolicy, Share, ShareStore, ShareSummary, StorageKind,
    StoreSettings,
};
use serde_json::Value;
use shared::{Error, Result};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Share store that keeps the map in memory and rewrites a full JSON
/// snapshot after every mutation.
///
/// Snapshots are written while the table lock is held, so the file always
/// reflects a state the map actually passed through.
pub struct FileShareStore {
    table: Mutex<ShareTable>,
    snapshot: SnapshotFile,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

impl FileShareStore {
    /// Open the store, loading any existing snapshot at `path`.
    /// Creates the parent directory if it doesn't exist.
    pub async fn open(path: impl AsRef<Path>, settings: StoreSettings) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                Error::unavailable(format!(
                    "Failed to create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let snapshot = SnapshotFile::new(path, settings.io_timeout);
        let entries = snapshot.load().await;

        Ok(Self {
            table: Mutex::new(ShareTable::from_entries(entries)),
            snapshot,
            retention: settings.retention,
            clock: settings.clock,
        })
    }

    pub fn path(&self) -> &Path {
        self.snapshot.path()
    }
}

#[async_trait]
impl ShareStore for FileShareStore {
    fn kind(&self) -> StorageKind {
        StorageKind::File
    }

    async fn put(&self, id: &str, value: Value) -> Result<PutResponse> {
        validate_share(id, &value)?;

        let mut table = self.table.lock().await;
        let now = self.clock.now();
        let previous = table.insert(
            id,
            StoredShare {
                value,
                created_at: now,
            },
        );

        // The write only counts once it is on disk
        let written = self.snapshot.write(table.entries()).await;
        if let Err(e) = written {
            table.restore(id, previous);
            return Err(e);
        }

        let replaced = previous.is_some_and(|p| !self.retention.is_expired(p.created_at, now));
        Ok(PutResponse::new(replaced, now))
    }

    async fn get(&self, id: &str) -> Result<Share> {
        let mut table = self.table.lock().await;
        match table.lookup(id, &self.retention, self.clock.now()) {
            Lookup::Live(share) => Ok(share),
            Lookup::Evicted => {
                tracing::debug!("Evicted expired share on read: {}", id);
                let written = self.snapshot.write(table.entries()).await;
                if let Err(e) = written {
                    tracing::warn!("Snapshot after evicting '{}' failed: {}", id, e);
                }
                Err(Error::NotFound)
            }
            Lookup::Missing => Err(Error::NotFound),
        }
    }

    async fn list(&self, limit: usize) -> Result<Vec<ShareSummary>> {
        let table = self.table.lock().await;
        Ok(table.list(limit, &self.retention, self.clock.now()))
    }

    async fn sweep(&self) -> Result<usize> {
        let mut table = self.table.lock().await;
        let removed = table.sweep(&self.retention, self.clock.now());
        if removed > 0 {
            self.snapshot.write(table.entries()).await?;
        }
        Ok(removed)
    }

    async fn count(&self) -> Result<Option<usize>> {
        let table = self.table.lock().await;
        Ok(Some(table.live_count(&self.retention, self.clock.now())))
    }
}

impl Debug for FileShareStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileShareStore")
            .field("path", &self.snapshot.path())
            .field("retention", &self.retention)
            .finish()
    }
}
