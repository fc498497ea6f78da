//! Content materialization.
//!
//! Visits every wiki of a resolved tree in walk order and, strictly one
//! wiki at a time, saves the page through the browser, then hands each
//! internal link and each attachment to the [`DownloadCoordinator`]. The
//! coordinator's barrier is awaited once, after the whole walk, or before a
//! fatal error is returned so no unit outlives the run.

use std::path::Path;
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

use crate::config::WalkSettings;
use crate::download::{DownloadCoordinator, DownloadSummary, DownloadTask};
use crate::error::MirrorError;
use crate::filesystem::{FilesystemError, move_contents, remove_dir_if_exists};
use crate::session::{PortalLayout, Session, SessionError, child_element_count, optional};
use crate::tree::{MirrorTree, NodeKind, TreeNode};

/// Suffixes browsers give to downloads still being written.
const PARTIAL_SUFFIXES: &[&str] = &[".part", ".crdownload", ".download", ".tmp"];

/// What the walk did, plus the coordinator's summary taken at the barrier.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub wikis_visited: usize,
    pub pages_saved: usize,
    /// Pages whose download never settled in the staging area.
    pub pages_missed: usize,
    pub links_submitted: usize,
    pub attachments_submitted: usize,
    /// Attachment listing pages scanned, across all wikis.
    pub attachment_pages_scanned: usize,
    pub downloads: DownloadSummary,
}

/// Materializes every wiki of `tree`.
///
/// Page downloads land in `download_staging` (the browser's download
/// directory) and are moved into the wiki's directory once settled.
///
/// # Errors
///
/// Fails on readiness timeouts, session failures, unresolved nodes and
/// filesystem errors while moving a saved page. Download failures are only
/// counted.
#[instrument(skip_all, fields(wikis = tree.wiki_count()))]
pub async fn materialize(
    session: &mut dyn Session,
    settings: &WalkSettings,
    tree: &MirrorTree,
    coordinator: &DownloadCoordinator,
    download_staging: &Path,
) -> Result<MaterializeReport, MirrorError> {
    let mut report = MaterializeReport::default();

    if let Err(error) = walk_wikis(
        session,
        settings,
        tree,
        coordinator,
        download_staging,
        &mut report,
    )
    .await
    {
        // Units already running write into the staging tree; it must
        // outlive them.
        warn!(
            error = %error,
            in_flight = coordinator
                .stats()
                .submitted()
                .saturating_sub(coordinator.stats().terminated()),
            "walk aborted, waiting for submitted downloads"
        );
        coordinator.barrier().await;
        return Err(error);
    }

    info!(
        submitted = coordinator.stats().submitted(),
        "walk finished, waiting for downloads"
    );
    report.downloads = coordinator.barrier().await;
    Ok(report)
}

async fn walk_wikis(
    session: &mut dyn Session,
    settings: &WalkSettings,
    tree: &MirrorTree,
    coordinator: &DownloadCoordinator,
    download_staging: &Path,
    report: &mut MaterializeReport,
) -> Result<(), MirrorError> {
    for entry in tree.walk() {
        match entry.node.kind() {
            NodeKind::Community => {
                info!(community = %entry.node.name(), depth = entry.depth, "mirroring community");
            }
            NodeKind::Wiki => {
                materialize_wiki(
                    session,
                    settings,
                    entry.node,
                    coordinator,
                    download_staging,
                    report,
                )
                .await?;
            }
        }
    }
    Ok(())
}

async fn materialize_wiki(
    session: &mut dyn Session,
    settings: &WalkSettings,
    wiki: &TreeNode,
    coordinator: &DownloadCoordinator,
    download_staging: &Path,
    report: &mut MaterializeReport,
) -> Result<(), MirrorError> {
    let layout = &settings.layout;
    let (Some(local_path), Some(dirs)) = (wiki.local_path(), wiki.content_dirs()) else {
        return Err(MirrorError::unresolved(wiki.name()));
    };

    session.navigate(wiki.source_url()).await?;
    let ready = |title: &str| layout.is_wiki_page(title);
    session
        .wait_for_title(&ready, settings.page_timeout, "wiki page")
        .await?;
    report.wikis_visited += 1;

    if save_page(session, settings, local_path, download_staging).await? {
        report.pages_saved += 1;
        info!(wiki = %wiki.name(), "page saved");
    } else {
        report.pages_missed += 1;
        warn!(
            wiki = %wiki.name(),
            timeout_secs = settings.page_download_timeout.as_secs(),
            "page download did not settle, skipping page file"
        );
    }

    let links = submit_internal_links(session, layout, coordinator, &dirs.links).await?;
    report.links_submitted += links;
    debug!(wiki = %wiki.name(), links, "links submitted");

    let scan = submit_attachments(session, layout, coordinator, &dirs.attachments).await?;
    report.attachments_submitted += scan.submitted;
    report.attachment_pages_scanned += scan.pages;
    debug!(
        wiki = %wiki.name(),
        attachments = scan.submitted,
        pages = scan.pages,
        "attachments submitted"
    );
    Ok(())
}

/// Triggers the portal's "Download Page" action and moves the saved file
/// into `local_path`. Returns false when nothing settled in time.
async fn save_page(
    session: &mut dyn Session,
    settings: &WalkSettings,
    local_path: &Path,
    download_staging: &Path,
) -> Result<bool, MirrorError> {
    let layout = &settings.layout;
    let menu = session.find_element(None, &layout.page_actions_menu).await?;
    session.force_click(&menu).await?;
    let action = session
        .find_element(None, &layout.download_page_action)
        .await?;
    session.click(&action).await?;

    let settled = wait_for_settled_download(
        download_staging,
        settings.page_download_timeout,
        settings.staging_poll_interval,
    )
    .await?;
    if !settled {
        // Leftovers would otherwise be moved into the next wiki.
        clear_dir(download_staging)?;
        return Ok(false);
    }
    let moved = move_contents(download_staging, local_path)?;
    debug!(files = moved.len(), dest = %local_path.display(), "moved staged download");
    Ok(true)
}

/// Polls `dir` until it holds at least one entry and none of them is still
/// being written.
async fn wait_for_settled_download(
    dir: &Path,
    timeout: Duration,
    poll_interval: Duration,
) -> Result<bool, FilesystemError> {
    let deadline = Instant::now() + timeout;
    loop {
        let names = staged_names(dir).await?;
        if !names.is_empty() && !names.iter().any(|name| is_partial(name)) {
            return Ok(true);
        }
        if Instant::now() >= deadline {
            return Ok(false);
        }
        tokio::time::sleep(poll_interval).await;
    }
}

async fn staged_names(dir: &Path) -> Result<Vec<String>, FilesystemError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| FilesystemError::read(dir, e))?;
    let mut names = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| FilesystemError::read(dir, e))?
    {
        names.push(entry.file_name().to_string_lossy().into_owned());
    }
    Ok(names)
}

fn is_partial(name: &str) -> bool {
    PARTIAL_SUFFIXES.iter().any(|suffix| name.ends_with(suffix))
}

fn clear_dir(dir: &Path) -> Result<(), FilesystemError> {
    let entries = std::fs::read_dir(dir).map_err(|e| FilesystemError::read(dir, e))?;
    for entry in entries {
        let path = entry.map_err(|e| FilesystemError::read(dir, e))?.path();
        if path.is_dir() {
            remove_dir_if_exists(&path)?;
        } else {
            std::fs::remove_file(&path).map_err(|e| FilesystemError::remove(&path, e))?;
        }
    }
    Ok(())
}

/// Submits one download per internal API anchor of the page body.
async fn submit_internal_links(
    session: &mut dyn Session,
    layout: &PortalLayout,
    coordinator: &DownloadCoordinator,
    destination: &Path,
) -> Result<usize, SessionError> {
    let Some(content) = optional(session.find_element(None, &layout.wiki_content).await)? else {
        return Ok(0);
    };
    let anchors = session
        .find_elements(Some(&content), &layout.internal_links)
        .await?;

    let mut submitted = 0;
    for anchor in anchors {
        match session.attribute(&anchor, "href").await? {
            Some(href) if layout.is_internal_link(&href) => {
                coordinator.submit(DownloadTask::new(href, destination));
                submitted += 1;
            }
            _ => {}
        }
    }
    Ok(submitted)
}

#[derive(Debug, Default)]
struct AttachmentScan {
    submitted: usize,
    pages: usize,
}

/// Opens the attachments tab and submits every listed attachment, following
/// the pager until it has no next link. A missing element anywhere ends the
/// scan.
async fn submit_attachments(
    session: &mut dyn Session,
    layout: &PortalLayout,
    coordinator: &DownloadCoordinator,
    destination: &Path,
) -> Result<AttachmentScan, SessionError> {
    let mut scan = AttachmentScan::default();
    let Some(tab) = optional(session.find_element(None, &layout.attachments_tab).await)? else {
        return Ok(scan);
    };
    session.click(&tab).await?;
    let Some(listing) = optional(
        session
            .find_element(None, &layout.attachments_listing)
            .await,
    )?
    else {
        return Ok(scan);
    };

    loop {
        scan.pages += 1;
        let rows = session
            .find_elements(Some(&listing), &layout.attachment_rows)
            .await?;
        for row in rows {
            let Some(anchor) = optional(
                session
                    .find_element(Some(&row), &layout.attachment_anchor)
                    .await,
            )?
            else {
                return Ok(scan);
            };
            if let Some(href) = session.attribute(&anchor, "href").await? {
                coordinator.submit(DownloadTask::new(href, destination));
                scan.submitted += 1;
            }
        }

        let Some(pager) = optional(session.find_element(None, &layout.next_page_control).await)?
        else {
            break;
        };
        if child_element_count(session, &pager).await? == 0 {
            break;
        }
        let Some(next) = optional(
            session
                .find_element(Some(&pager), &layout.next_page_anchor)
                .await,
        )?
        else {
            break;
        };
        session.click(&next).await?;
    }
    Ok(scan)
}
