use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{
    AutoVacuumOptions, CancelToken, ProgressFn, VacuumProgress, VacuumResult, Vacuumable,
};

/// Background auto-vacuum control loop
///
/// On each wake the service measures fragmentation; below the configured
/// threshold it goes back to sleep, at or above it it runs one full
/// compaction pass. Errors from measurement or compaction are transient:
/// they are logged and the loop continues on its next scheduled wake.
/// Only cancellation ends the loop.
pub struct VacuumService<S> {
    store: Arc<S>,
    options: AutoVacuumOptions,
    progress: Option<Box<ProgressFn>>,
}

impl<S: Vacuumable> VacuumService<S> {
    /// Create a service over a shared store, validating the options
    pub fn new(store: Arc<S>, options: AutoVacuumOptions) -> VacuumResult<Self> {
        options.validate()?;
        Ok(Self {
            store,
            options,
            progress: None,
        })
    }

    /// Attach a progress observer forwarded to every compaction pass
    pub fn with_progress(
        mut self,
        observer: impl Fn(VacuumProgress) + Send + Sync + 'static,
    ) -> Self {
        self.progress = Some(Box::new(observer));
        self
    }

    /// Get the configured options
    pub fn options(&self) -> &AutoVacuumOptions {
        &self.options
    }

    /// Run the polling loop until the token is cancelled
    ///
    /// Intended to be spawned as a background task on the host runtime.
    pub async fn run(self, mut cancel: CancelToken) {
        info!(
            interval = ?self.options.check_interval,
            threshold = self.options.fragmentation_threshold,
            "auto-vacuum service started"
        );

        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.options.check_interval) => {}
                _ = cancel.cancelled() => {
                    debug!("auto-vacuum service stopping");
                    return;
                }
            }

            match self.store.fragmentation(&cancel).await {
                Ok(ratio) if ratio < self.options.fragmentation_threshold => {
                    debug!(
                        fragmentation = ratio,
                        threshold = self.options.fragmentation_threshold,
                        "fragmentation below threshold, skipping compaction"
                    );
                }
                Ok(ratio) => {
                    info!(fragmentation = ratio, "fragmentation at threshold, starting compaction");
                    let pass = self
                        .store
                        .vacuum(
                            self.options.fragmentation_threshold,
                            self.progress.as_deref(),
                            &cancel,
                        )
                        .await;
                    match pass {
                        Ok(summary) => {
                            info!(
                                processed_pages = summary.processed_pages,
                                pages_freed = summary.pages_freed,
                                bytes_reclaimed = summary.bytes_reclaimed,
                                "compaction pass complete"
                            );
                        }
                        Err(error) => {
                            warn!(%error, "compaction pass failed, retrying next cycle");
                        }
                    }
                }
                Err(error) => {
                    warn!(%error, "fragmentation check failed, retrying next cycle");
                }
            }

            if cancel.is_cancelled() {
                debug!("auto-vacuum service stopping");
                return;
            }
        }
    }
}
