use crate::table::{Lookup, ShareTable, StoredShare};
use async_trait::async_trait;
use ferry::domain::validate_share;
use ferry::{
    Clock, PutResponse, RetentionPolicy, Share, ShareStore, ShareSummary, StorageKind,
    StoreSettings, SystemClock,
};
use serde_json::Value;
use shared::{Error, Result};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// In-process share store. Everything is lost on restart.
pub struct MemoryShareStore {
    table: Mutex<ShareTable>,
    retention: RetentionPolicy,
    clock: Arc<dyn Clock>,
}

impl MemoryShareStore {
    pub fn new(settings: StoreSettings) -> Self {
        Self {
            table: Mutex::new(ShareTable::new()),
            retention: settings.retention,
            clock: settings.clock,
        }
    }

    /// Wall clock and the default 7 day retention
    pub fn with_defaults() -> Self {
        Self::new(StoreSettings {
            retention: RetentionPolicy::default(),
            io_timeout: Duration::ZERO,
            clock: Arc::new(SystemClock),
        })
    }
}

#[async_trait]
impl ShareStore for MemoryShareStore {
    fn kind(&self) -> StorageKind {
        StorageKind::Memory
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
        let replaced = previous.is_some_and(|p| !self.retention.is_expired(p.created_at, now));

        Ok(PutResponse::new(replaced, now))
    }

    async fn get(&self, id: &str) -> Result<Share> {
        let mut table = self.table.lock().await;
        match table.lookup(id, &self.retention, self.clock.now()) {
            Lookup::Live(share) => Ok(share),
            Lookup::Evicted => {
                tracing::debug!("Evicted expired share on read: {}", id);
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
        Ok(table.sweep(&self.retention, self.clock.now()))
    }

    async fn count(&self) -> Result<Option<usize>> {
        let table = self.table.lock().await;
        Ok(Some(table.live_count(&self.retention, self.clock.now())))
    }
}

impl Debug for MemoryShareStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryShareStore")
            .field("retention", &self.retention)
            .field("table", &"<Mutex<ShareTable>>")
            .finish()
    }
}
