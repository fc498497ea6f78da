//! Filesystem primitives of a mirroring run.
//!
//! Directory creation tolerates pre-existence; moves fall back to
//! copy-then-delete when a rename crosses filesystems (the staging area
//! usually lives under the system temp dir, the target often does not).

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, trace};
use walkdir::WalkDir;

/// Errors raised while laying out, moving or rewriting mirror files.
#[derive(Debug, Error)]
pub enum FilesystemError {
    #[error("failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to move {from} to {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl FilesystemError {
    pub fn create_dir(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::CreateDir {
            path: path.into(),
            source,
        }
    }

    pub fn moving(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Move {
            from: from.into(),
            to: to.into(),
            source,
        }
    }

    pub fn remove(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Remove {
            path: path.into(),
            source,
        }
    }

    pub fn read(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

/// Creates `path` and its parents; an existing directory is fine.
pub fn ensure_dir(path: &Path) -> Result<(), FilesystemError> {
    match fs::create_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists && path.is_dir() => Ok(()),
        Err(e) => Err(FilesystemError::create_dir(path, e)),
    }
}

/// Moves every entry of `source` into `destination`, replacing entries of
/// the same name. Returns the moved paths at their new location.
pub fn move_contents(source: &Path, destination: &Path) -> Result<Vec<PathBuf>, FilesystemError> {
    let entries = fs::read_dir(source).map_err(|e| FilesystemError::read(source, e))?;
    let mut moved = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| FilesystemError::read(source, e))?;
        let target = destination.join(entry.file_name());
        move_path(&entry.path(), &target)?;
        moved.push(target);
    }
    Ok(moved)
}

/// Moves a file or directory tree, replacing an existing target.
pub fn move_path(from: &Path, to: &Path) -> Result<(), FilesystemError> {
    if to.is_dir() {
        remove_dir_if_exists(to)?;
    }
    match fs::rename(from, to) {
        Ok(()) => {
            trace!(from = %from.display(), to = %to.display(), "renamed");
            Ok(())
        }
        Err(e) => {
            debug!(error = %e, from = %from.display(), "rename failed, copying instead");
            copy_tree(from, to).map_err(|source| FilesystemError::moving(from, to, source))?;
            if from.is_dir() {
                remove_dir_if_exists(from)
            } else {
                fs::remove_file(from).map_err(|e| FilesystemError::remove(from, e))
            }
        }
    }
}

/// Recursively deletes `path`; a missing directory is fine.
pub fn remove_dir_if_exists(path: &Path) -> Result<(), FilesystemError> {
    match fs::remove_dir_all(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(FilesystemError::remove(path, e)),
    }
}

fn copy_tree(from: &Path, to: &Path) -> io::Result<()> {
    if from.is_file() {
        fs::copy(from, to)?;
        return Ok(());
    }
    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let target = to.join(relative);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else {
            fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}
