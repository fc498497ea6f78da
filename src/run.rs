//! One mirroring run, from discovery to publishing.
//!
//! A [`MirrorRun`] owns the run's two staging directories: the browser's
//! download area, where "Download Page" files land, and the target staging
//! area, where the mirror is assembled. The finished community directory is
//! moved into the configured target directory, and both staging areas are
//! removed at the end whatever happened, except when publishing itself
//! failed and the assembled mirror would otherwise be lost.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::config::MirrorConfig;
use crate::discover::discover;
use crate::download::{DownloadCoordinator, DownloadSummary, Fetcher};
use crate::error::MirrorError;
use crate::filesystem::{ensure_dir, move_path, remove_dir_if_exists};
use crate::materialize::materialize;
use crate::rewrite::{RewriteReport, rewrite_links};
use crate::session::Session;
use crate::synthesize::synthesize;
use crate::tree::{MirrorTree, NodeKind};

const DOWNLOAD_STAGING_LABEL: &str = "TEMP_DOWNLOAD_DIR";
const TARGET_STAGING_LABEL: &str = "TARGET_DIR";

/// Outcome of a run, reported whether it completed or not.
#[derive(Debug, Default)]
pub struct RunSummary {
    /// True when the run got through link rewriting. A mirror left in
    /// staging because publishing failed still counts as completed.
    pub completed: bool,
    pub elapsed: Duration,
    pub communities: usize,
    pub wikis: usize,
    pub pages_saved: usize,
    pub pages_missed: usize,
    pub downloads: DownloadSummary,
    pub rewrite: RewriteReport,
    /// Where the mirror ended up: the target directory, or the staging area
    /// when publishing failed.
    pub content_dir: Option<PathBuf>,
    /// The error that stopped the run early.
    pub error: Option<MirrorError>,
}

/// A prepared mirroring run.
#[derive(Debug)]
pub struct MirrorRun {
    config: MirrorConfig,
    download_staging: PathBuf,
    target_staging: PathBuf,
}

impl MirrorRun {
    /// Creates the run's staging directories under `config.temp_dir`.
    ///
    /// The session must be started afterwards, with
    /// [`download_staging`](Self::download_staging) as its download
    /// directory.
    ///
    /// # Errors
    ///
    /// Returns [`MirrorError::Filesystem`] when a staging directory cannot be
    /// created.
    pub fn prepare(config: MirrorConfig) -> Result<Self, MirrorError> {
        let temp_dir =
            std::path::absolute(&config.temp_dir).unwrap_or_else(|_| config.temp_dir.clone());
        let now = SystemTime::now();
        let download_staging = temp_dir.join(staging_dir_name(DOWNLOAD_STAGING_LABEL, now));
        let target_staging = temp_dir.join(staging_dir_name(TARGET_STAGING_LABEL, now));
        ensure_dir(&download_staging)?;
        ensure_dir(&target_staging)?;
        debug!(
            download = %download_staging.display(),
            target = %target_staging.display(),
            "staging directories created"
        );
        Ok(Self {
            config,
            download_staging,
            target_staging,
        })
    }

    /// Directory the browser saves page downloads into.
    #[must_use]
    pub fn download_staging(&self) -> &Path {
        &self.download_staging
    }

    /// Directory the mirror is assembled in before publishing.
    #[must_use]
    pub fn target_staging(&self) -> &Path {
        &self.target_staging
    }

    /// Removes the staging areas of a run that will never execute.
    pub fn abandon(self) {
        self.teardown(false);
    }

    /// Runs discovery, synthesis, materialization, link rewriting and
    /// publishing, then tears the run down and closes `session`.
    ///
    /// Never fails: a fatal error is recorded in [`RunSummary::error`] with
    /// `completed` left false.
    #[instrument(skip_all, fields(url = %self.config.community_url))]
    pub async fn execute(
        self,
        session: &mut dyn Session,
        fetcher: Arc<dyn Fetcher>,
    ) -> RunSummary {
        let started = Instant::now();
        let mut summary = RunSummary::default();
        let mut keep_target_staging = false;

        match self
            .pipeline(session, fetcher, &mut summary, &mut keep_target_staging)
            .await
        {
            Ok(()) => summary.completed = true,
            Err(e) => {
                error!(error = %e, "mirroring run failed");
                summary.error = Some(e);
            }
        }

        if let Err(e) = session.close().await {
            warn!(error = %e, "failed to close the browser session");
        }
        self.teardown(keep_target_staging);

        summary.elapsed = started.elapsed();
        info!(
            elapsed_secs = summary.elapsed.as_secs(),
            completed = summary.completed,
            "EXECUTION TIME: {:?}, COMPLETED SUCCESSFULLY: {}",
            summary.elapsed,
            summary.completed
        );
        summary
    }

    async fn pipeline(
        &self,
        session: &mut dyn Session,
        fetcher: Arc<dyn Fetcher>,
        summary: &mut RunSummary,
        keep_target_staging: &mut bool,
    ) -> Result<(), MirrorError> {
        let config = &self.config;
        let settings = &config.walk;

        info!("Step 1/3 : Scanning the community and building the structure tree");
        let tree = discover(session, settings, &config.community_url, config.recursive).await?;
        summary.wikis = tree.wiki_count();
        summary.communities = tree.node_count() - summary.wikis;

        info!("Step 2/3 : Creating a structure tree in the file system");
        let tree = synthesize(&self.target_staging, tree)?;
        log_tree(&tree);

        info!("Step 3/3 : Downloading community content");
        let coordinator = DownloadCoordinator::new(config.concurrency, fetcher)?;
        let report = materialize(
            session,
            settings,
            &tree,
            &coordinator,
            &self.download_staging,
        )
        .await?;
        summary.pages_saved = report.pages_saved;
        summary.pages_missed = report.pages_missed;
        summary.downloads = report.downloads;

        let root = tree.node(tree.root());
        let assembled = root
            .local_path()
            .ok_or_else(|| MirrorError::unresolved(root.name()))?;
        summary.rewrite = rewrite_links(assembled, &settings.layout)?;

        match self.publish(assembled) {
            Some(published) => {
                info!(
                    "--- The structure and content of the community now in the {}",
                    published.display()
                );
                summary.content_dir = Some(published);
            }
            None => {
                *keep_target_staging = true;
                info!(
                    "--- The structure and content of the community now in the {}",
                    assembled.display()
                );
                summary.content_dir = Some(assembled.to_path_buf());
            }
        }
        Ok(())
    }

    /// Moves the assembled community directory into the target directory.
    /// Returns `None`, after logging why, when it has to stay in staging.
    fn publish(&self, assembled: &Path) -> Option<PathBuf> {
        let target_dir = std::path::absolute(&self.config.target_dir)
            .unwrap_or_else(|_| self.config.target_dir.clone());
        let name = assembled.file_name()?;
        let destination = target_dir.join(name);
        if destination.exists() {
            warn!(
                destination = %destination.display(),
                "destination already exists, leaving the mirror in staging"
            );
            return None;
        }
        match move_path(assembled, &destination) {
            Ok(()) => Some(destination),
            Err(e) => {
                warn!(error = %e, "failed to publish the mirror, leaving it in staging");
                None
            }
        }
    }

    fn teardown(&self, keep_target_staging: bool) {
        if let Err(e) = remove_dir_if_exists(&self.download_staging) {
            warn!(error = %e, "failed to remove download staging area");
        }
        if keep_target_staging {
            info!(path = %self.target_staging.display(), "keeping target staging area");
            return;
        }
        if let Err(e) = remove_dir_if_exists(&self.target_staging) {
            warn!(error = %e, "failed to remove target staging area");
        }
    }
}

fn log_tree(tree: &MirrorTree) {
    for entry in tree.walk() {
        let kind = match entry.node.kind() {
            NodeKind::Community => "community",
            NodeKind::Wiki => "wiki",
        };
        debug!(
            depth = entry.depth,
            kind,
            name = %entry.node.name(),
            path = ?entry.node.local_path(),
            "mirror node"
        );
    }
}

/// Hex SHA-256 of `label` and the current time, used as a staging
/// directory name.
fn staging_dir_name(label: &str, now: SystemTime) -> String {
    let nanos = now
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_nanos());
    let digest = Sha256::digest(format!("{label}_{nanos}").as_bytes());
    digest.iter().map(|byte| format!("{byte:02x}")).collect()
}
