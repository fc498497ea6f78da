//! Wikimirror Core Library
//!
//! This library mirrors a community portal's hierarchy of communities and
//! wikis into a local directory tree that can be browsed offline.
//!
//! # Architecture
//!
//! A run goes through these modules in order:
//! - [`discover`] - Walks the portal through a [`session::Session`] and
//!   builds a structural [`MirrorTree`]
//! - [`synthesize`] - Creates the directory layout and resolves node paths
//! - [`materialize`] - Saves pages and issues link/attachment downloads
//!   through the [`download`] coordinator, then waits on its barrier
//! - [`rewrite`] - Points internal API hrefs at the mirrored copies
//!
//! [`run::MirrorRun`] ties them together with staging, publishing and
//! teardown.

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod discover;
pub mod download;
pub mod error;
pub mod filesystem;
pub mod materialize;
pub mod rewrite;
pub mod run;
pub mod session;
pub mod synthesize;
pub mod tree;
mod user_agent;

// Re-export commonly used types
pub use config::{MirrorConfig, WalkSettings};
pub use discover::discover;
pub use download::{
    DEFAULT_CONCURRENCY, DownloadCoordinator, DownloadError, DownloadSummary, DownloadTask,
    Fetcher, HttpClient,
};
pub use error::MirrorError;
pub use filesystem::FilesystemError;
pub use materialize::{MaterializeReport, materialize};
pub use rewrite::{RewriteReport, rewrite_links};
pub use run::{MirrorRun, RunSummary};
pub use session::{Credentials, PortalLayout, Session, SessionError};
pub use synthesize::synthesize;
pub use tree::{MirrorTree, NodeId, NodeKind, TreeNode};
