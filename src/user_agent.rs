//! User-Agent string for download traffic.

/// Contact URL advertised to the portal.
const PROJECT_UA_URL: &str = "https://github.com/soulless-viewer/wikimirror";

/// User-Agent sent with link and attachment downloads.
#[must_use]
pub(crate) fn default_download_user_agent() -> String {
    let version = env!("CARGO_PKG_VERSION");
    format!("wikimirror/{version} (offline-mirror-tool; +{PROJECT_UA_URL})")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_download_ua_contains_version_and_project_url() {
        let ua = default_download_user_agent();
        assert!(ua.contains(PROJECT_UA_URL), "UA must contain project URL: {ua}");
        assert_eq!(
            env!("CARGO_PKG_VERSION"),
            ua.strip_prefix("wikimirror/")
                .and_then(|s| s.split(' ').next())
                .unwrap_or_default(),
            "UA must contain crate version"
        );
    }
}
