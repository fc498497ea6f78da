//! Filename derivation and sanitization for mirrored files and directories.
//!
//! The download unit, the synthesizer and the link rewriter all name things
//! through this module, so a link's saved filename and its rewritten
//! `./links/<name>` reference always agree.

use std::collections::HashSet;
use std::path::{Component, Path, PathBuf};

use tracing::debug;

/// Name used when a URL has no usable final segment.
pub const FALLBACK_FILENAME: &str = "download.bin";

/// Returns the percent-decoded final path segment of `url`.
///
/// Query string and fragment are dropped. Returns `None` when the URL ends
/// with a slash or has no path.
#[must_use]
pub fn decoded_last_segment(url: &str) -> Option<String> {
    let without_fragment = url.split('#').next().unwrap_or(url);
    let without_query = without_fragment
        .split('?')
        .next()
        .unwrap_or(without_fragment);
    let (_, last) = without_query.rsplit_once('/')?;
    if last.is_empty() {
        return None;
    }
    let decoded = urlencoding::decode(last).map_or_else(
        |e| {
            debug!(segment = %last, error = %e, "URL decoding failed, using raw segment");
            last.to_string()
        },
        std::borrow::Cow::into_owned,
    );
    Some(decoded)
}

/// Sanitizes a single path component for filesystem safety.
///
/// Replaces characters that are invalid on common filesystems
/// (`/ \ : * ? " < > |`) and control characters with `_`, strips trailing
/// dots and spaces, and rewrites `.`/`..` so the result can never escape
/// its parent directory.
#[must_use]
pub fn sanitize_component(name: &str) -> String {
    let sanitized: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let trimmed = sanitized.trim().trim_end_matches('.').trim_end();

    if trimmed.is_empty() {
        return "_".to_string();
    }
    if is_safe_segment(trimmed) {
        trimmed.to_string()
    } else {
        trimmed.replace('.', "_")
    }
}

/// Filename a download of `url` is stored under.
#[must_use]
pub fn destination_filename(url: &str) -> String {
    decoded_last_segment(url).map_or_else(|| FALLBACK_FILENAME.to_string(), |segment| {
        sanitize_component(&segment)
    })
}

/// Picks `dir/name`, or `dir/name_2`, `dir/name_3`, ... when an earlier
/// sibling already took the name during this run.
pub(crate) fn claim_unique_path(dir: &Path, name: &str, taken: &mut HashSet<PathBuf>) -> PathBuf {
    let base = dir.join(name);
    if taken.insert(base.clone()) {
        return base;
    }
    let mut suffix = 2usize;
    loop {
        let candidate = dir.join(format!("{name}_{suffix}"));
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        suffix += 1;
    }
}

fn is_safe_segment(name: &str) -> bool {
    let mut components = Path::new(name).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
