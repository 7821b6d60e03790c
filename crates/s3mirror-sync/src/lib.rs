//! s3mirror Sync - Queue consumption and local mirror adapter
//!
//! Provides:
//! - The long-running message loop that drains the notification queue
//! - Atomic local file writes and idempotent removals
//!
//! ## Modules
//!
//! - [`message_loop`] - Receive, process and acknowledge cycles with backoff
//! - [`filesystem`] - Local filesystem adapter (atomic writes via temp + rename)

pub mod filesystem;
pub mod message_loop;

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while touching the local mirror
#[derive(Debug, Error)]
pub enum SyncError {
    /// An I/O error occurred during a file operation
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Insufficient filesystem permissions
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The target path names a directory, not a file
    #[error("Not a regular file: {0}")]
    NotAFile(PathBuf),

    /// The target path has no parent directory to write into
    #[error("Path has no parent directory: {0}")]
    NoParent(PathBuf),

    /// A blocking filesystem task panicked or was cancelled
    #[error("Filesystem task failed: {0}")]
    TaskFailed(String),
}

impl SyncError {
    /// Classifies an I/O error raised while operating on `path`
    pub fn from_io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        let path = path.into();
        match source.kind() {
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path),
            _ => Self::Io { path, source },
        }
    }
}
