//! Shared helpers for integration tests.

#![allow(dead_code)]

pub mod scripted_session;

use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use wikimirror_core::download::filename::destination_filename;
use wikimirror_core::{DownloadError, Fetcher, MirrorConfig};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub use scripted_session::{CommunityFixture, ScriptedSession, SubMenu, WikiFixture, community, wiki};

/// Base URL of the scripted portal.
pub const PORTAL: &str = "https://portal.example.com/communities/service/html/communityview";

pub fn community_url(id: &str) -> String {
    format!("{PORTAL}?communityUuid={id}")
}

/// Serves `body` at `route` on `server`.
pub async fn serve_file(server: &MockServer, route: &str, body: &[u8]) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.to_vec()))
        .mount(server)
        .await;
    format!("{}{route}", server.uri())
}

/// Answers `route` on `server` with `status`.
pub async fn serve_status(server: &MockServer, route: &str, status: u16) -> String {
    Mock::given(method("GET"))
        .and(path(route))
        .respond_with(ResponseTemplate::new(status))
        .mount(server)
        .await;
    format!("{}{route}", server.uri())
}

/// Temporary staging and target directories for one run.
pub struct RunDirs {
    pub temp: TempDir,
    pub target: TempDir,
}

impl RunDirs {
    pub fn new() -> Self {
        Self {
            temp: TempDir::new().expect("failed to create temp dir"),
            target: TempDir::new().expect("failed to create target dir"),
        }
    }

    pub fn target(&self) -> &Path {
        self.target.path()
    }

    /// Entries left in the staging parent after a run.
    pub fn staging_leftovers(&self) -> Vec<PathBuf> {
        std::fs::read_dir(self.temp.path())
            .expect("temp dir readable")
            .map(|entry| entry.expect("dir entry").path())
            .collect()
    }
}

/// Config with short waits, pointing at `dirs`.
pub fn fast_config(url: &str, dirs: &RunDirs) -> MirrorConfig {
    let mut config = MirrorConfig::new(url);
    config.temp_dir = dirs.temp.path().to_path_buf();
    config.target_dir = dirs.target.path().to_path_buf();
    config.concurrency = 4;
    config.walk.page_timeout = Duration::from_millis(300);
    config.walk.page_download_timeout = Duration::from_millis(300);
    config.walk.staging_poll_interval = Duration::from_millis(10);
    config
}

/// Sorted file names directly inside `dir`.
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap_or_else(|e| panic!("{} unreadable: {e}", dir.display()))
        .map(|entry| {
            entry
                .expect("dir entry")
                .file_name()
                .to_string_lossy()
                .into_owned()
        })
        .collect();
    names.sort();
    names
}

/// Fetcher that takes `delay` per unit and records what each unit saw.
#[derive(Debug)]
pub struct RecordingFetcher {
    delay: Duration,
    terminated: AtomicUsize,
    destination_present: Mutex<Vec<bool>>,
}

impl RecordingFetcher {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            terminated: AtomicUsize::new(0),
            destination_present: Mutex::new(Vec::new()),
        }
    }

    /// Units that have finished, successfully or not.
    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }

    /// Whether each unit's destination directory existed when it wrote.
    pub fn destination_present(&self) -> Vec<bool> {
        self.destination_present.lock().expect("lock").clone()
    }
}

#[async_trait]
impl Fetcher for RecordingFetcher {
    async fn fetch_to(&self, url: &str, destination: &Path) -> Result<PathBuf, DownloadError> {
        tokio::time::sleep(self.delay).await;
        self.destination_present
            .lock()
            .expect("lock")
            .push(destination.is_dir());
        let path = destination.join(destination_filename(url));
        let result = tokio::fs::write(&path, url.as_bytes())
            .await
            .map(|()| path.clone())
            .map_err(|e| DownloadError::io(path, e));
        self.terminated.fetch_add(1, Ordering::SeqCst);
        result
    }
}
