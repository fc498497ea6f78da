//! Download units and the per-run coordinator that issues them.
//!
//! This module provides everything needed to turn a remote resource into a
//! file of the mirror: the [`Fetcher`] seam, its streaming HTTP
//! implementation, and the [`DownloadCoordinator`] that runs units
//! concurrently behind a completion barrier.
//!
//! # Features
//!
//! - Streaming downloads (memory-efficient for large attachments)
//! - Filenames derived from the URL's final segment, percent-decoded and
//!   sanitized
//! - Bounded worker pool with FIFO admission
//! - Per-unit results accumulated into a [`DownloadSummary`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wikimirror_core::download::{DownloadCoordinator, DownloadTask, HttpClient};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let coordinator = DownloadCoordinator::new(10, Arc::new(HttpClient::new()?))?;
//! coordinator.submit(DownloadTask::new(
//!     "https://portal.example.com/api/media/spec.pdf",
//!     "./mirror/Acme/Design/links",
//! ));
//! let summary = coordinator.barrier().await;
//! println!("{} of {} downloads succeeded", summary.succeeded, summary.attempted);
//! # Ok(())
//! # }
//! ```

mod client;
mod constants;
mod coordinator;
mod error;
pub mod filename;

use std::path::{Path, PathBuf};

use async_trait::async_trait;

pub use client::HttpClient;
pub use constants::{
    CONNECT_TIMEOUT_SECS, DEFAULT_CONCURRENCY, MAX_CONCURRENCY, MIN_CONCURRENCY,
    READ_TIMEOUT_SECS,
};
pub use coordinator::{
    CoordinatorError, DownloadCoordinator, DownloadStats, DownloadSummary, DownloadTask,
    FailedDownload,
};
pub use error::DownloadError;

/// Materializes one remote resource into a directory.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetches `url` into `destination`, returning the written file.
    async fn fetch_to(&self, url: &str, destination: &Path) -> Result<PathBuf, DownloadError>;
}
