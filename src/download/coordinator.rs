//! Per-run download coordinator.
//!
//! The coordinator turns [`DownloadTask`]s into independent download units
//! (one Tokio task each), bounds how many of them talk to the network at
//! once, and exposes a [`barrier`](DownloadCoordinator::barrier) that waits
//! for every unit submitted so far.
//!
//! # Concurrency Model
//!
//! - `submit` never blocks: it spawns the unit and records its handle
//! - Each unit acquires a permit from a fair (FIFO) semaphore before it
//!   fetches, so at most `concurrency` units run at a time and queued units
//!   start in submission order
//! - The handle registry is the only structure shared between the walk and
//!   the barrier; it sits behind a mutex
//! - A failed unit is logged and counted, it never aborts its siblings

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use super::constants::{MAX_CONCURRENCY, MIN_CONCURRENCY};
use super::error::DownloadError;
use super::filename::destination_filename;
use super::Fetcher;

/// Error type for coordinator construction.
#[derive(Debug, thiserror::Error)]
pub enum CoordinatorError {
    /// Invalid concurrency value provided.
    #[error(
        "invalid concurrency value {value}: must be between {MIN_CONCURRENCY} and {MAX_CONCURRENCY}"
    )]
    InvalidConcurrency {
        /// The invalid value that was provided.
        value: usize,
    },
}

/// One resource to materialize into one directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTask {
    pub source_url: String,
    pub destination: PathBuf,
}

impl DownloadTask {
    #[must_use]
    pub fn new(source_url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            source_url: source_url.into(),
            destination: destination.into(),
        }
    }

    /// Path the unit will write to.
    #[must_use]
    pub fn target_path(&self) -> PathBuf {
        self.destination.join(destination_filename(&self.source_url))
    }
}

/// A unit that terminated without producing its file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FailedDownload {
    pub url: String,
    pub destination: PathBuf,
    pub reason: String,
}

/// Live counters shared by every unit of a run.
///
/// Uses atomic counters for thread-safe updates from concurrent units.
#[derive(Debug, Default)]
pub struct DownloadStats {
    submitted: AtomicUsize,
    completed: AtomicUsize,
    failed: AtomicUsize,
    collisions: AtomicUsize,
}

impl DownloadStats {
    /// Creates a new stats tracker with zero counts.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of units submitted.
    #[must_use]
    pub fn submitted(&self) -> usize {
        self.submitted.load(Ordering::SeqCst)
    }

    /// Returns the number of successfully completed downloads.
    #[must_use]
    pub fn completed(&self) -> usize {
        self.completed.load(Ordering::SeqCst)
    }

    /// Returns the number of failed downloads.
    #[must_use]
    pub fn failed(&self) -> usize {
        self.failed.load(Ordering::SeqCst)
    }

    /// Returns the number of distinct URLs that mapped onto an already
    /// claimed destination file.
    #[must_use]
    pub fn collisions(&self) -> usize {
        self.collisions.load(Ordering::SeqCst)
    }

    /// Returns the number of terminated units (completed + failed).
    #[must_use]
    pub fn terminated(&self) -> usize {
        self.completed() + self.failed()
    }

    fn increment_submitted(&self) {
        self.submitted.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_completed(&self) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_failed(&self) {
        self.failed.fetch_add(1, Ordering::SeqCst);
    }

    fn increment_collisions(&self) {
        self.collisions.fetch_add(1, Ordering::SeqCst);
    }
}

/// Snapshot of a run's downloads, taken at the barrier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DownloadSummary {
    pub attempted: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub collisions: usize,
    pub failures: Vec<FailedDownload>,
}

/// A spawned unit, kept so a panic can still be reported against its task.
struct InFlight {
    url: String,
    destination: PathBuf,
    handle: JoinHandle<()>,
}

/// Issues download units and waits for them.
pub struct DownloadCoordinator {
    fetcher: Arc<dyn Fetcher>,
    semaphore: Arc<Semaphore>,
    concurrency: usize,
    in_flight: Mutex<Vec<InFlight>>,
    claimed: Mutex<HashMap<PathBuf, String>>,
    stats: Arc<DownloadStats>,
    failures: Arc<Mutex<Vec<FailedDownload>>>,
}

impl std::fmt::Debug for DownloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadCoordinator")
            .field("concurrency", &self.concurrency)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl DownloadCoordinator {
    /// Creates a coordinator running at most `concurrency` units at a time.
    ///
    /// # Errors
    ///
    /// Returns [`CoordinatorError::InvalidConcurrency`] if the value is outside
    /// the valid range (1-100).
    #[instrument(level = "debug", skip(fetcher))]
    pub fn new(concurrency: usize, fetcher: Arc<dyn Fetcher>) -> Result<Self, CoordinatorError> {
        if !(MIN_CONCURRENCY..=MAX_CONCURRENCY).contains(&concurrency) {
            return Err(CoordinatorError::InvalidConcurrency { value: concurrency });
        }
        debug!(concurrency, "creating download coordinator");
        Ok(Self {
            fetcher,
            semaphore: Arc::new(Semaphore::new(concurrency)),
            concurrency,
            in_flight: Mutex::new(Vec::new()),
            claimed: Mutex::new(HashMap::new()),
            stats: Arc::new(DownloadStats::new()),
            failures: Arc::new(Mutex::new(Vec::new())),
        })
    }

    /// Returns the configured concurrency limit.
    #[must_use]
    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Live counters for this run.
    #[must_use]
    pub fn stats(&self) -> &DownloadStats {
        &self.stats
    }

    /// Starts a download unit for `task` and returns immediately.
    ///
    /// Must be called from within a Tokio runtime. Invalid URLs are not
    /// rejected here; they fail inside the unit like any other error.
    pub fn submit(&self, task: DownloadTask) {
        self.note_collision(&task);
        self.stats.increment_submitted();

        let fetcher = Arc::clone(&self.fetcher);
        let semaphore = Arc::clone(&self.semaphore);
        let stats = Arc::clone(&self.stats);
        let failures = Arc::clone(&self.failures);
        let url = task.source_url.clone();
        let destination = task.destination.clone();

        let handle = tokio::spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => run_unit(fetcher.as_ref(), &task).await,
                Err(_) => Err(DownloadError::cancelled(&task.source_url)),
            };
            match result {
                Ok(path) => {
                    debug!(url = %task.source_url, path = %path.display(), "unit completed");
                    stats.increment_completed();
                }
                Err(error) => {
                    warn!(
                        url = %task.source_url,
                        destination = %task.destination.display(),
                        error = %error,
                        "download failed"
                    );
                    stats.increment_failed();
                    lock(&failures).push(FailedDownload {
                        url: task.source_url,
                        destination: task.destination,
                        reason: error.to_string(),
                    });
                }
            }
        });
        lock(&self.in_flight).push(InFlight {
            url,
            destination,
            handle,
        });
    }

    /// Waits until every unit submitted so far has terminated.
    ///
    /// Units submitted while the barrier is waiting are awaited as well.
    /// Individual failures never make this return early.
    #[instrument(skip(self))]
    pub async fn barrier(&self) -> DownloadSummary {
        loop {
            let units = std::mem::take(&mut *lock(&self.in_flight));
            if units.is_empty() {
                break;
            }
            debug!(task_count = units.len(), "waiting for downloads to complete");
            for unit in units {
                // A panicked unit terminated without a result; it is a failure.
                if let Err(e) = unit.handle.await {
                    warn!(url = %unit.url, error = %e, "download unit panicked");
                    self.stats.increment_failed();
                    lock(&self.failures).push(FailedDownload {
                        url: unit.url,
                        destination: unit.destination,
                        reason: format!("download unit panicked: {e}"),
                    });
                }
            }
        }

        let summary = DownloadSummary {
            attempted: self.stats.submitted(),
            succeeded: self.stats.completed(),
            failed: self.stats.failed(),
            collisions: self.stats.collisions(),
            failures: lock(&self.failures).clone(),
        };
        info!(
            attempted = summary.attempted,
            succeeded = summary.succeeded,
            failed = summary.failed,
            collisions = summary.collisions,
            "all downloads terminated"
        );
        summary
    }

    fn note_collision(&self, task: &DownloadTask) {
        let target = task.target_path();
        let mut claimed = lock(&self.claimed);
        match claimed.get(&target) {
            Some(previous) if previous != &task.source_url => {
                warn!(
                    path = %target.display(),
                    previous = %previous,
                    url = %task.source_url,
                    "distinct URLs share a destination file; the last to finish wins"
                );
                self.stats.increment_collisions();
                claimed.insert(target, task.source_url.clone());
            }
            Some(_) => {}
            None => {
                claimed.insert(target, task.source_url.clone());
            }
        }
    }
}

async fn run_unit(fetcher: &dyn Fetcher, task: &DownloadTask) -> Result<PathBuf, DownloadError> {
    fetcher
        .fetch_to(&task.source_url, Path::new(&task.destination))
        .await
}

// Registry updates never panic while holding the lock, so a poisoned guard
// still holds consistent data.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
