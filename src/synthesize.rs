//! Filesystem synthesis: lays out the mirror's directories before any
//! content is fetched and records them on the tree.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::download::filename::{claim_unique_path, decoded_last_segment, sanitize_component};
use crate::filesystem::{FilesystemError, ensure_dir};
use crate::tree::{ContentDirs, MirrorTree, NodeId, NodeKind, TreeNode};

/// Directory receiving a wiki's internal API links.
pub const LINKS_DIR: &str = "links";
/// Directory receiving a wiki's attachments.
pub const ATTACHMENTS_DIR: &str = "attachments";

/// Creates the directory tree for `tree` under `staging_root` and returns
/// the tree with every node resolved.
///
/// Communities are named after their sanitized title, wikis after the
/// decoded last segment of their URL. Siblings that would share a directory
/// get a numeric suffix.
///
/// # Errors
///
/// Returns [`FilesystemError::CreateDir`] when a directory cannot be created
/// for a reason other than already existing.
#[instrument(skip(tree), fields(staging_root = %staging_root.display()))]
pub fn synthesize(
    staging_root: &Path,
    mut tree: MirrorTree,
) -> Result<MirrorTree, FilesystemError> {
    let order: Vec<NodeId> = tree.walk().map(|entry| entry.id).collect();
    let mut taken: HashSet<PathBuf> = HashSet::new();

    for id in order {
        let node = tree.node(id);
        let parent_dir = match node.parent() {
            Some(parent) => tree
                .node(parent)
                .local_path()
                .map_or_else(|| staging_root.to_path_buf(), Path::to_path_buf),
            None => staging_root.to_path_buf(),
        };
        let name = directory_name(node);
        let path = claim_unique_path(&parent_dir, &name, &mut taken);
        if path.file_name() != Some(std::ffi::OsStr::new(&name)) {
            warn!(
                node = %node.name(),
                path = %path.display(),
                "directory name already used by a sibling, suffixed"
            );
        }
        ensure_dir(&path)?;

        match node.kind() {
            NodeKind::Community => {
                debug!(path = %path.display(), "community directory");
                tree.assign_community_path(id, path);
            }
            NodeKind::Wiki => {
                let dirs = ContentDirs {
                    links: path.join(LINKS_DIR),
                    attachments: path.join(ATTACHMENTS_DIR),
                };
                ensure_dir(&dirs.links)?;
                ensure_dir(&dirs.attachments)?;
                // Subwikis must not land on the content directories.
                taken.insert(dirs.links.clone());
                taken.insert(dirs.attachments.clone());
                debug!(path = %path.display(), "wiki directory");
                tree.assign_wiki_paths(id, path, dirs);
            }
        }
    }

    info!(nodes = tree.node_count(), "directory tree created");
    Ok(tree)
}

fn directory_name(node: &TreeNode) -> String {
    match node.kind() {
        NodeKind::Community => sanitize_component(node.name()),
        NodeKind::Wiki => decoded_last_segment(node.source_url())
            .map_or_else(|| sanitize_component(node.name()), |segment| {
                sanitize_component(&segment)
            }),
    }
}
