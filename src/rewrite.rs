//! Link rewriting over saved pages.
//!
//! Pages are saved with absolute references to the portal's file API. Once
//! every download has terminated, those references are pointed at the
//! copies in the wiki's `links/` directory so the mirror browses offline.
//! Pages are handled as bytes; whatever encoding they were saved in is kept.

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::bytes::{NoExpand, Regex};
use tracing::{debug, info, instrument};
use walkdir::WalkDir;

use crate::download::filename::destination_filename;
use crate::filesystem::FilesystemError;
use crate::session::PortalLayout;
use crate::synthesize::LINKS_DIR;

/// `href` value of an anchor start tag. Byte-oriented, so attributes in a
/// legacy encoding still match.
#[allow(clippy::expect_used)]
static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?-u)<a\b[^>]*?\bhref="([^"\s]+)""#).expect("anchor href regex is valid")
});

/// Counts produced by [`rewrite_links`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RewriteReport {
    pub files_scanned: usize,
    pub files_rewritten: usize,
    pub hrefs_rewritten: usize,
}

/// Rewrites internal API hrefs in every page file below `mirror_root` to
/// `./links/<filename>`.
///
/// Files are only written when their content changes, so a second pass
/// over the same tree rewrites nothing.
///
/// # Errors
///
/// Returns [`FilesystemError`] when the tree cannot be walked or a page
/// cannot be read or written.
#[instrument(skip(layout), fields(root = %mirror_root.display()))]
pub fn rewrite_links(
    mirror_root: &Path,
    layout: &PortalLayout,
) -> Result<RewriteReport, FilesystemError> {
    let mut report = RewriteReport::default();

    for entry in WalkDir::new(mirror_root).follow_links(false) {
        let entry = entry.map_err(|e| {
            let path = e
                .path()
                .map_or_else(|| mirror_root.to_path_buf(), Path::to_path_buf);
            FilesystemError::read(path, e.into())
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some(layout.page_extension.as_str()) {
            continue;
        }

        report.files_scanned += 1;
        let content = fs::read(path).map_err(|e| FilesystemError::read(path, e))?;
        let (rewritten, count) = rewrite_content(&content, layout);
        if count == 0 {
            continue;
        }
        fs::write(path, rewritten).map_err(|e| FilesystemError::write(path, e))?;
        debug!(path = %path.display(), hrefs = count, "page rewritten");
        report.files_rewritten += 1;
        report.hrefs_rewritten += count;
    }

    info!(
        files_scanned = report.files_scanned,
        files_rewritten = report.files_rewritten,
        hrefs_rewritten = report.hrefs_rewritten,
        "links rewritten"
    );
    Ok(report)
}

/// Returns the rewritten page and the number of replaced occurrences.
fn rewrite_content(content: &[u8], layout: &PortalLayout) -> (Vec<u8>, usize) {
    let mut links: Vec<&str> = ANCHOR_HREF
        .captures_iter(content)
        .filter_map(|captures| captures.get(1))
        .filter_map(|m| std::str::from_utf8(m.as_bytes()).ok())
        .filter(|href| layout.is_internal_link(href))
        .collect();
    // Longest first, so a link that prefixes another cannot clobber it.
    links.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
    links.dedup();

    let mut output = content.to_vec();
    let mut count = 0;
    for link in links {
        let pattern = match Regex::new(&regex::escape(link)) {
            Ok(pattern) => pattern,
            Err(e) => {
                debug!(link, error = %e, "link not rewritable, skipping");
                continue;
            }
        };
        let occurrences = pattern.find_iter(&output).count();
        if occurrences == 0 {
            continue;
        }
        let local = format!("./{LINKS_DIR}/{}", destination_filename(link));
        output = pattern
            .replace_all(&output, NoExpand(local.as_bytes()))
            .into_owned();
        count += occurrences;
    }
    (output, count)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><body>
<p>See <a class="doc" href="https://portal/wikis/api/wiki/acme/media/Q3%20plan.pdf?v=2">the plan</a>
and <a href="https://example.com/external.pdf">an outside doc</a>.</p>
<a href="https://portal/wikis/api/wiki/acme/media/spec.pdf">spec</a>
<a href="https://portal/wikis/api/wiki/acme/media/spec.pdf">spec again</a>
</body></html>"#;

    #[test]
    fn test_rewrites_only_internal_api_links() {
        let (out, count) = rewrite_content(PAGE.as_bytes(), &PortalLayout::default());
        let out = String::from_utf8(out).unwrap();
        assert_eq!(count, 3);
        assert!(out.contains(r#"href="./links/Q3 plan.pdf""#));
        assert!(out.contains(r#"href="./links/spec.pdf">spec again"#));
        assert!(out.contains(r#"href="https://example.com/external.pdf""#));
        assert!(!out.contains("/api/"));
    }

    #[test]
    fn test_prefix_links_do_not_clobber_each_other() {
        let page = r#"<a href="https://p/api/a">x</a><a href="https://p/api/a.pdf">y</a>"#;
        let (out, count) = rewrite_content(page.as_bytes(), &PortalLayout::default());
        assert_eq!(count, 2);
        assert_eq!(out, br#"<a href="./links/a">x</a><a href="./links/a.pdf">y</a>"#);
    }

    #[test]
    fn test_rewrite_is_idempotent_on_disk() {
        let root = tempfile::tempdir().unwrap();
        let wiki = root.path().join("Acme/Design Notes");
        fs::create_dir_all(&wiki).unwrap();
        fs::write(wiki.join("Design Notes.html"), PAGE).unwrap();
        fs::write(wiki.join("notes.txt"), PAGE).unwrap();
        let layout = PortalLayout::default();

        let first = rewrite_links(root.path(), &layout).unwrap();
        let after_first = fs::read_to_string(wiki.join("Design Notes.html")).unwrap();
        let second = rewrite_links(root.path(), &layout).unwrap();
        let after_second = fs::read_to_string(wiki.join("Design Notes.html")).unwrap();

        assert_eq!(
            first,
            RewriteReport {
                files_scanned: 1,
                files_rewritten: 1,
                hrefs_rewritten: 3
            }
        );
        assert_eq!(second.files_scanned, 1);
        assert_eq!(second.files_rewritten, 0);
        assert_eq!(after_first, after_second);
        // Non-page files are left alone.
        assert_eq!(fs::read_to_string(wiki.join("notes.txt")).unwrap(), PAGE);
    }

    #[test]
    fn test_page_without_anchors_is_untouched() {
        let page = "<p>/api/ mentioned in text</p>";
        let (out, count) = rewrite_content(page.as_bytes(), &PortalLayout::default());
        assert_eq!(count, 0);
        assert_eq!(out, page.as_bytes());
    }

    #[test]
    fn test_non_utf8_page_keeps_its_other_bytes() {
        let root = tempfile::tempdir().unwrap();
        let page_path = root.path().join("Caf\u{e9}.html");
        let mut page = b"<p>caf\xE9</p><a title=\"caf\xE9\" href=\"https://p/api/menu.pdf\">m</a>".to_vec();
        page.extend_from_slice(b"<p>\xA9 2024</p>");
        fs::write(&page_path, &page).unwrap();

        let report = rewrite_links(root.path(), &PortalLayout::default()).unwrap();

        assert_eq!(report.hrefs_rewritten, 1);
        assert_eq!(
            fs::read(&page_path).unwrap(),
            b"<p>caf\xE9</p><a title=\"caf\xE9\" href=\"./links/menu.pdf\">m</a><p>\xA9 2024</p>"
        );
    }
}
