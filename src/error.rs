//! Errors that end a mirroring run.

use thiserror::Error;

use crate::download::CoordinatorError;
use crate::filesystem::FilesystemError;
use crate::session::SessionError;

/// A fatal failure of a mirroring run.
///
/// Individual download failures never show up here; they are counted in
/// the run summary instead.
#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    #[error(transparent)]
    Filesystem(#[from] FilesystemError),

    #[error("download coordinator error: {0}")]
    Coordinator(#[from] CoordinatorError),

    /// A pass was handed a node the synthesizer never resolved.
    #[error("node `{name}` has no local path")]
    Unresolved { name: String },
}

impl MirrorError {
    pub fn unresolved(name: impl Into<String>) -> Self {
        Self::Unresolved { name: name.into() }
    }

    /// True when a readiness wait ran out.
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Session(SessionError::Timeout { .. }))
    }
}
