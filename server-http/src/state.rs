use ferry::{
    Clock, RetentionPolicy, ShareStore, StorageFactory, StorageKind, StoreSettings, SystemClock,
};
use shared::config::{Config, StorageBackend};
use std::sync::Arc;
use std::time::Duration;
use storage_engine::{MemoryShareStore, UnifiedStorageFactory};

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ShareStore>,
    pub retention: RetentionPolicy,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(store: Arc<dyn ShareStore>, retention: RetentionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            retention,
            clock,
        }
    }

    /// Open the configured backend, falling back to memory if it can't be opened
    pub async fn from_config(config: &Config) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let settings = StoreSettings {
            retention: RetentionPolicy::new(config.retention),
            io_timeout: config.io_timeout(),
            clock: clock.clone(),
        };

        let store = Self::init_store(&config.storage, settings.clone()).await;
        Self::new(store, settings.retention, clock)
    }

    /// Sweep cadence for the store that actually came up, which is memory
    /// when the configured backend failed to open
    pub fn sweep_interval(&self, config: &Config) -> Option<Duration> {
        if !self.store.supports_sweep() {
            return None;
        }
        match self.store.kind() {
            StorageKind::Memory => Some(config.memory_sweep_interval()),
            StorageKind::File => Some(config.file_sweep_interval()),
            StorageKind::Remote => None,
        }
    }

    async fn init_store(backend: &StorageBackend, settings: StoreSettings) -> Arc<dyn ShareStore> {
        match UnifiedStorageFactory.create(backend, settings.clone()).await {
            Ok(store) => store,
            Err(e) => {
                tracing::warn!(
                    "Failed to initialize {} storage: {}. Running in-memory mode.",
                    backend.name(),
                    e
                );
                Arc::new(MemoryShareStore::new(settings))
            }
        }
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("storage", &self.store.kind())
            .field("retention", &self.retention)
            .finish()
    }
}
