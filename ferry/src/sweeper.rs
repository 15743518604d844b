use crate::ports::ShareStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Background task purging expired shares on a fixed cadence
///
/// Runs through the same `ShareStore` interface as request handlers, so it
/// takes the same lock as they do. A failed sweep is logged and the next tick
/// still runs. Dropping the handle stops the task.
pub struct Sweeper {
    token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl Sweeper {
    /// Spawn the sweep loop. The first sweep happens one `every` after spawning.
    pub fn spawn(store: Arc<dyn ShareStore>, every: Duration) -> Self {
        let token = CancellationToken::new();
        let handle = tokio::spawn(run(store, every, token.clone()));

        info!("Sweeper started, running every {:?}", every);

        Self {
            token,
            handle: Some(handle),
        }
    }

    /// Stop the loop and wait for an in-flight sweep to finish
    pub async fn shutdown(mut self) {
        self.token.cancel();
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                error!("Sweeper task ended abnormally: {}", e);
            }
        }
        info!("Sweeper stopped");
    }
}

impl Drop for Sweeper {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

async fn run(store: Arc<dyn ShareStore>, every: Duration, token: CancellationToken) {
    let mut ticker = tokio::time::interval_at(Instant::now() + every, every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {
                sweep_once(store.as_ref()).await;
            }
        }
    }
}

/// Run a single sweep, logging the outcome. Returns the removed count on success.
pub async fn sweep_once(store: &dyn ShareStore) -> Option<usize> {
    match store.sweep().await {
        Ok(0) => {
            debug!("Sweep on {} storage found nothing to remove", store.kind());
            Some(0)
        }
        Ok(removed) => {
            info!(
                "Sweep on {} storage removed {} expired share(s)",
                store.kind(),
                removed
            );
            Some(removed)
        }
        Err(e) => {
            error!("Sweep on {} storage failed: {}", store.kind(), e);
            None
        }
    }
}
