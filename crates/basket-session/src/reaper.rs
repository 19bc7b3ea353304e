//! Periodic cleanup of expired and dangling cart state.

use std::sync::Arc;

use basket_store::{CartSessionStore, CleanupReport, StoreError};
use basket_types::Catalog;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::config::ReaperConfig;

/// Runs [`CartSessionStore::cleanup`] on a fixed cadence.
///
/// Failures are logged and the next scheduled run tries again. Without a
/// catalog the reaper only removes expired and corrupt rows.
#[derive(Clone)]
pub struct ExpiryReaper {
    store: Arc<dyn CartSessionStore>,
    catalog: Option<Arc<dyn Catalog>>,
    config: ReaperConfig,
}

impl ExpiryReaper {
    pub fn new(
        store: Arc<dyn CartSessionStore>,
        catalog: Option<Arc<dyn Catalog>>,
        config: ReaperConfig,
    ) -> Self {
        Self {
            store,
            catalog,
            config,
        }
    }

    pub fn config(&self) -> &ReaperConfig {
        &self.config
    }

    /// One cleanup pass on the current thread.
    pub fn sweep(&self) -> Result<CleanupReport, StoreError> {
        self.store.cleanup(self.catalog.as_deref())
    }

    /// One cleanup pass on the blocking pool. Errors are logged, not returned.
    pub async fn run_once(&self) -> Option<CleanupReport> {
        let reaper = self.clone();
        match tokio::task::spawn_blocking(move || reaper.sweep()).await {
            Ok(Ok(report)) => {
                if report.is_noop() {
                    debug!("Reaper run found nothing to clean");
                } else {
                    info!(
                        expired = report.expired_count,
                        corrupt = report.corrupt_count,
                        pruned_items = report.pruned_item_count,
                        "Reaper run completed"
                    );
                }
                Some(report)
            }
            Ok(Err(e)) => {
                error!(error = %e, "Reaper run failed");
                None
            }
            Err(e) => {
                error!(error = %e, "Reaper task panicked");
                None
            }
        }
    }

    /// Run on a background task until `cancel` fires.
    ///
    /// The first run happens after `initial_delay`, then every `interval`.
    pub fn spawn(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = Instant::now() + self.config.initial_delay;
            let mut ticker = tokio::time::interval_at(start, self.config.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            info!(
                interval_secs = self.config.interval.as_secs(),
                initial_delay_secs = self.config.initial_delay.as_secs(),
                "Expiry reaper started"
            );

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        self.run_once().await;
                    }
                }
            }

            info!("Expiry reaper stopped");
        })
    }
}
