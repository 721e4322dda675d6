//! Vacuum/compaction subsystem
//!
//! `Vacuumable` is the seam between a page-based store and the background
//! maintenance loop: fragmentation measurement plus a single cancellable
//! compaction pass with progress reporting. `VacuumService` polls any
//! `Vacuumable` on a schedule and triggers compaction once fragmentation
//! crosses the configured threshold.
//!
//! Cancellation is cooperative: a `CancelSource`/`CancelToken` pair built
//! on a watch channel governs the service lifetime and is observed
//! between compaction steps, never mid-step.

mod service;

pub use service::VacuumService;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;

/// Errors raised when configuring the vacuum subsystem
#[derive(Debug, Clone, Error)]
pub enum VacuumError {
    #[error("Invalid fragmentation threshold: {0} (must be within 0.0..=1.0)")]
    InvalidThreshold(f64),

    #[error("Invalid check interval: must be non-zero")]
    InvalidInterval,
}

pub type VacuumResult<T> = Result<T, VacuumError>;

/// Auto-vacuum configuration, supplied by the hosting application
///
/// Not mutated at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoVacuumOptions {
    /// Poll period between fragmentation checks
    pub check_interval: Duration,
    /// Ratio of reclaimable to allocated bytes above which compaction
    /// triggers (0.0 to 1.0)
    pub fragmentation_threshold: f64,
}

impl Default for AutoVacuumOptions {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(60),
            fragmentation_threshold: 0.5,
        }
    }
}

impl AutoVacuumOptions {
    /// Validate the configuration
    pub fn validate(&self) -> VacuumResult<()> {
        if !self.fragmentation_threshold.is_finite()
            || !(0.0..=1.0).contains(&self.fragmentation_threshold)
        {
            return Err(VacuumError::InvalidThreshold(self.fragmentation_threshold));
        }
        if self.check_interval.is_zero() {
            return Err(VacuumError::InvalidInterval);
        }
        Ok(())
    }
}

/// Snapshot of a running vacuum pass, regenerated per callback
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VacuumProgress {
    /// Source pages fully processed so far
    pub processed_pages: usize,
    /// Allocated pages at the start of the pass
    pub total_pages: usize,
    /// Bytes returned to the free list so far
    pub bytes_reclaimed: u64,
}

/// Outcome of a completed (or cancelled) vacuum pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VacuumSummary {
    /// Source pages fully drained during the pass
    pub processed_pages: usize,
    /// Pages released back to the free list
    pub pages_freed: usize,
    /// Bytes reclaimed by releasing pages
    pub bytes_reclaimed: u64,
}

/// Progress observer invoked with cumulative counters during a pass
pub type ProgressFn = dyn Fn(VacuumProgress) + Send + Sync;

/// Create a linked cancellation pair
///
/// The source side requests cancellation; any number of cloned tokens
/// observe it. Dropping the source also cancels outstanding tokens.
pub fn cancellation() -> (CancelSource, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelSource { tx }, CancelToken { rx })
}

/// Requests cooperative cancellation
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl CancelSource {
    /// Signal cancellation to all linked tokens
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Observes cooperative cancellation
#[derive(Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    /// Check for cancellation without waiting
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Wait until cancellation is requested
    ///
    /// Also completes when the source is dropped.
    pub async fn cancelled(&mut self) {
        let _ = self.rx.wait_for(|cancelled| *cancelled).await;
    }
}

/// A page-based store that can measure and reclaim fragmented space
pub trait Vacuumable {
    /// Error type surfaced by measurement and compaction
    type Error: std::error::Error + Send + Sync + 'static;

    /// Current fragmentation as a ratio in `[0, 1]` of reclaimable bytes
    /// to allocated bytes
    ///
    /// Must be computable from bookkeeping without blocking writers
    /// beyond a bounded scan.
    fn fragmentation(
        &self,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<f64, Self::Error>> + Send;

    /// Run a single compaction pass
    ///
    /// Relocates live records out of fragmented pages and releases
    /// fully-reclaimed pages to a free list. The `progress` observer is
    /// invoked periodically with cumulative counters. Cancellation is
    /// honored between atomic per-record relocation steps; a cancelled
    /// pass leaves the store consistent, never half-relocated.
    fn vacuum(
        &self,
        threshold: f64,
        progress: Option<&ProgressFn>,
        cancel: &CancelToken,
    ) -> impl Future<Output = Result<VacuumSummary, Self::Error>> + Send;
}
