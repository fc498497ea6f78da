//! Run configuration for the library side.
//!
//! The binary builds a [`MirrorConfig`] from its command line; tests build
//! one directly. Everything the walk needs about the portal lives in
//! [`WalkSettings`], which the discoverer and the materializer share.

use std::path::PathBuf;
use std::time::Duration;

use crate::download::DEFAULT_CONCURRENCY;
use crate::session::{Credentials, PortalLayout};

/// Default readiness wait for community and wiki pages.
pub const DEFAULT_PAGE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default wait for the browser to finish saving a page download.
pub const DEFAULT_PAGE_DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(60);

/// Settings shared by every pass that drives the session.
#[derive(Debug, Clone)]
pub struct WalkSettings {
    pub layout: PortalLayout,
    /// Used when the session hits the login page.
    pub credentials: Option<Credentials>,
    /// Readiness wait for community and wiki pages.
    pub page_timeout: Duration,
    /// Wait for the "Download Page" file to settle in the staging area.
    pub page_download_timeout: Duration,
    /// Interval between staging-area polls.
    pub staging_poll_interval: Duration,
}

impl Default for WalkSettings {
    fn default() -> Self {
        Self {
            layout: PortalLayout::default(),
            credentials: None,
            page_timeout: DEFAULT_PAGE_TIMEOUT,
            page_download_timeout: DEFAULT_PAGE_DOWNLOAD_TIMEOUT,
            staging_poll_interval: Duration::from_millis(200),
        }
    }
}

/// Everything a mirroring run needs.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Root community to mirror.
    pub community_url: String,
    /// Also mirror subcommunities, at every depth.
    pub recursive: bool,
    /// Directory the finished community directory is moved into.
    pub target_dir: PathBuf,
    /// Parent of the run's staging directories.
    pub temp_dir: PathBuf,
    /// Maximum concurrent downloads.
    pub concurrency: usize,
    pub walk: WalkSettings,
}

impl MirrorConfig {
    /// Creates a configuration with defaults for everything but the URL.
    #[must_use]
    pub fn new(community_url: impl Into<String>) -> Self {
        Self {
            community_url: community_url.into(),
            recursive: false,
            target_dir: PathBuf::from("."),
            temp_dir: std::env::temp_dir(),
            concurrency: DEFAULT_CONCURRENCY,
            walk: WalkSettings::default(),
        }
    }
}
