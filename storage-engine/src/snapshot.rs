use crate::table::StoredShare;
use shared::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tempfile::NamedTempFile;

/// Single JSON file holding every share: `{ "<id>": { "value": ..., "createdAt": ... } }`
#[derive(Clone, Debug)]
pub struct SnapshotFile {
    path: PathBuf,
    io_timeout: Duration,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>, io_timeout: Duration) -> Self {
        Self {
            path: path.into(),
            io_timeout,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. A missing or unreadable file means starting empty.
    pub async fn load(&self) -> HashMap<String, StoredShare> {
        let bytes = match self.with_timeout(tokio::fs::read(&self.path)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("No snapshot found at {}, starting empty", self.path.display());
                return HashMap::new();
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to read snapshot {}: {}. Starting empty.",
                    self.path.display(),
                    e
                );
                return HashMap::new();
            }
        };

        match serde_json::from_slice::<HashMap<String, StoredShare>>(&bytes) {
            Ok(entries) => {
                tracing::info!(
                    "Loaded snapshot from {}: {} share(s)",
                    self.path.display(),
                    entries.len()
                );
                entries
            }
            Err(e) => {
                tracing::warn!(
                    "Failed to parse snapshot {}: {}. Starting empty.",
                    self.path.display(),
                    e
                );
                HashMap::new()
            }
        }
    }

    /// Replace the snapshot with `entries`.
    ///
    /// Each write goes to its own temp file in the snapshot's directory, is
    /// synced, then renamed over the real path, so a reader only ever sees
    /// the old or the new snapshot. The blocking work runs as one task; on
    /// timeout the task is told to drop its temp file instead of renaming.
    pub async fn write(&self, entries: &HashMap<String, StoredShare>) -> Result<()> {
        let ordered: BTreeMap<&String, &StoredShare> = entries.iter().collect();
        let json = serde_json::to_vec_pretty(&ordered)
            .map_err(|e| Error::unavailable(format!("Failed to serialize snapshot: {}", e)))?;

        let abandoned = Arc::new(AtomicBool::new(false));
        let task = tokio::task::spawn_blocking({
            let path = self.path.clone();
            let abandoned = abandoned.clone();
            move || replace_file(&path, &json, &abandoned)
        });

        let outcome = match tokio::time::timeout(self.io_timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_error)) => Err(io::Error::other(join_error)),
            Err(_) => {
                abandoned.store(true, Ordering::SeqCst);
                Err(self.timed_out())
            }
        };

        outcome.map_err(|e| {
            Error::unavailable(format!(
                "Failed to write snapshot {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(
            "Snapshot written to {}: {} share(s)",
            self.path.display(),
            entries.len()
        );
        Ok(())
    }

    async fn with_timeout<T>(
        &self,
        io: impl Future<Output = io::Result<T>>,
    ) -> io::Result<T> {
        match tokio::time::timeout(self.io_timeout, io).await {
            Ok(result) => result,
            Err(_) => Err(self.timed_out()),
        }
    }

    fn timed_out(&self) -> io::Error {
        io::Error::new(
            ErrorKind::TimedOut,
            format!("timed out after {:?}", self.io_timeout),
        )
    }
}

/// Write `contents` to a fresh temp file next to `path` and rename it into place.
/// The temp file is removed on any failure, including abandonment.
fn replace_file(path: &Path, contents: &[u8], abandoned: &AtomicBool) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents)?;
    tmp.as_file().sync_all()?;

    if abandoned.load(Ordering::SeqCst) {
        return Err(io::Error::new(
            ErrorKind::Interrupted,
            "snapshot write abandoned after timeout",
        ));
    }

    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}
