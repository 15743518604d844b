#![deny(clippy::all)]

use crate::domain::response::PutResponse;
use crate::domain::{Share, ShareSummary, StorageKind, StoreSettings};
use async_trait::async_trait;
use serde_json::Value;
use shared::Result;
use shared::config::StorageBackend;
use std::sync::Arc;

// Ports are the pluggable extension points for share persistence backends

/// Port for creating a share store from configuration
/// This allows different storage backends to be plugged in at startup
#[async_trait]
pub trait StorageFactory: Send + Sync + 'static {
    async fn create(
        &self,
        backend: &StorageBackend,
        settings: StoreSettings,
    ) -> Result<Arc<dyn ShareStore>>;
}

/// Port for share operations, identical across memory, file and remote backends
#[async_trait]
pub trait ShareStore: Send + Sync + 'static {
    fn kind(&self) -> StorageKind;

    /// Whether `sweep` actually purges anything on this backend
    fn supports_sweep(&self) -> bool {
        true
    }

    /// Store `value` under `id` stamped with the current time, replacing any prior entry
    async fn put(&self, id: &str, value: Value) -> Result<PutResponse>;

    /// Look up a live share. Expired entries are reported as `NotFound`.
    async fn get(&self, id: &str) -> Result<Share>;

    /// At most `limit` live shares, newest first
    async fn list(&self, limit: usize) -> Result<Vec<ShareSummary>>;

    /// Remove every expired entry and return how many were removed
    async fn sweep(&self) -> Result<usize>;

    /// Number of live shares, if the backend can count cheaply
    async fn count(&self) -> Result<Option<usize>>;
}
