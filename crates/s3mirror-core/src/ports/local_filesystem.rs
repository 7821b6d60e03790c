//! Local filesystem port (driven/secondary port)
//!
//! This module defines the interface for mutating the local mirror.
//! Both operations act on a single [`MirrorPath`] produced by the
//! [`PathMapper`](crate::domain::PathMapper), which guarantees the path
//! lies below a configured local root.

use crate::domain::newtypes::MirrorPath;

/// Port trait for local mirror mutations
#[async_trait::async_trait]
pub trait ILocalFileSystem: Send + Sync {
    /// Writes `data` to `path`, replacing any existing file
    ///
    /// Missing parent directories are created. Implementations must make
    /// the replacement atomic so readers never observe a partial file.
    async fn write_file(&self, path: &MirrorPath, data: &[u8]) -> anyhow::Result<()>;

    /// Removes the file at `path`
    ///
    /// # Returns
    /// `true` if a file was removed, `false` if nothing existed at `path`
    async fn remove_file(&self, path: &MirrorPath) -> anyhow::Result<bool>;
}
