pub mod file;
pub mod memory;
pub mod remote;
pub mod snapshot;
pub mod table;

pub use file::FileShareStore;
pub use memory::MemoryShareStore;
pub use remote::RemoteShareStore;

use async_trait::async_trait;
use ferry::{ShareStore, StorageFactory, StoreSettings};
use shared::Result;
use shared::config::StorageBackend;
use std::sync::Arc;

/// Builds whichever backend the configuration selects
#[derive(Clone, Copy, Debug, Default)]
pub struct UnifiedStorageFactory;

#[async_trait]
impl StorageFactory for UnifiedStorageFactory {
    async fn create(
        &self,
        backend: &StorageBackend,
        settings: StoreSettings,
    ) -> Result<Arc<dyn ShareStore>> {
        let store: Arc<dyn ShareStore> = match backend {
            StorageBackend::Memory => Arc::new(MemoryShareStore::new(settings)),
            StorageBackend::File { path } => {
                Arc::new(FileShareStore::open(path, settings).await?)
            }
            StorageBackend::Remote {
                url,
                api_key,
                table,
            } => Arc::new(RemoteShareStore::new(
                url,
                api_key.as_deref(),
                table,
                settings,
            )?),
        };

        tracing::info!("Share store ready: {} storage", store.kind());
        Ok(store)
    }
}
