//! Error types for the download module.
//!
//! Every variant carries the URL or path it concerns so a failed unit can be
//! reported on its own, without the caller having to remember which task it
//! belonged to.

use std::path::PathBuf;

use thiserror::Error;

/// Why a single download unit produced no file.
#[derive(Debug, Error)]
pub enum DownloadError {
    /// Connection, DNS, TLS or body-stream failure.
    #[error("network error downloading {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("timeout downloading {url}")]
    Timeout { url: String },

    /// The portal answered with a non-success status.
    #[error("HTTP {status} downloading {url}")]
    HttpStatus { url: String, status: u16 },

    /// Creating, writing or renaming the file in the mirror failed.
    #[error("IO error writing to {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Not an absolute http(s) URL.
    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    /// The coordinator's semaphore closed before the unit got a permit.
    #[error("download of {url} was cancelled before it started")]
    Cancelled { url: String },
}

impl DownloadError {
    pub fn network(url: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Network {
            url: url.into(),
            source,
        }
    }

    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    pub fn timeout(url: impl Into<String>) -> Self {
        Self::Timeout { url: url.into() }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    pub fn cancelled(url: impl Into<String>) -> Self {
        Self::Cancelled { url: url.into() }
    }
}
