//! Local filesystem adapter (secondary/driven adapter)
//!
//! Implements [`ILocalFileSystem`] for the mirror directories.
//!
//! ## Design Decisions
//!
//! - **Atomic writes**: content goes to a uniquely named temporary file in
//!   the target directory, is flushed to disk, then renamed over the target.
//!   Readers see either the old file or the new one, never a partial write.
//! - **Idempotent removal**: a missing file is reported as `false`, not as
//!   an error, so redelivered or reordered delete events succeed.

use std::io::{ErrorKind, Write};
use std::path::Path;

use s3mirror_core::{domain::newtypes::MirrorPath, ports::local_filesystem::ILocalFileSystem};
use tracing::{debug, instrument};

use crate::SyncError;

// ============================================================================
// LocalFileSystemAdapter struct
// ============================================================================

/// Adapter that bridges the [`ILocalFileSystem`] port to the real filesystem.
///
/// This is a zero-sized struct because every operation derives its context
/// from the [`MirrorPath`] argument, which the mapper has already confined
/// to a configured local root.
#[derive(Debug, Clone, Default)]
pub struct LocalFileSystemAdapter;

impl LocalFileSystemAdapter {
    /// Create a new `LocalFileSystemAdapter`.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

/// Permission bits for materialized files.
#[cfg(unix)]
const FILE_MODE: u32 = 0o644;

/// Blocking body of [`LocalFileSystemAdapter::write_file`].
fn write_atomic(target: &Path, data: &[u8]) -> Result<(), SyncError> {
    let parent = target
        .parent()
        .ok_or_else(|| SyncError::NoParent(target.to_path_buf()))?;

    std::fs::create_dir_all(parent).map_err(|e| SyncError::from_io(parent, e))?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".s3mirror-")
        .suffix(".part")
        .tempfile_in(parent)
        .map_err(|e| SyncError::from_io(parent, e))?;

    tmp.write_all(data)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| SyncError::from_io(tmp.path(), e))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tmp.as_file()
            .set_permissions(std::fs::Permissions::from_mode(FILE_MODE))
            .map_err(|e| SyncError::from_io(tmp.path(), e))?;
    }

    // The temporary file is deleted on drop if the rename fails.
    tmp.persist(target)
        .map_err(|e| SyncError::from_io(target, e.error))?;

    Ok(())
}

// ============================================================================
// ILocalFileSystem implementation
// ============================================================================

#[async_trait::async_trait]
impl ILocalFileSystem for LocalFileSystemAdapter {
    #[instrument(skip(self, data), fields(path = %path, bytes = data.len()))]
    async fn write_file(&self, path: &MirrorPath, data: &[u8]) -> anyhow::Result<()> {
        let target = path.as_path().clone();
        let data = data.to_vec();

        debug!("writing via temporary file");
        tokio::task::spawn_blocking(move || write_atomic(&target, &data))
            .await
            .map_err(|e| SyncError::TaskFailed(e.to_string()))??;

        debug!("write complete");
        Ok(())
    }

    #[instrument(skip(self), fields(path = %path))]
    async fn remove_file(&self, path: &MirrorPath) -> anyhow::Result<bool> {
        let p = path.as_path();

        let metadata = match tokio::fs::symlink_metadata(p).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("file already absent");
                return Ok(false);
            }
            Err(e) => return Err(SyncError::from_io(p, e).into()),
        };

        if metadata.is_dir() {
            return Err(SyncError::NotAFile(p.clone()).into());
        }

        match tokio::fs::remove_file(p).await {
            Ok(()) => {
                debug!("file removed");
                Ok(true)
            }
            // Lost a race with another remover
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(SyncError::from_io(p, e).into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    /// Helper: create a [`MirrorPath`] inside the given temp directory.
    fn mirror_path(dir: &TempDir, name: &str) -> MirrorPath {
        MirrorPath::new(dir.path().join(name)).expect("temp dir paths are absolute")
    }

    // ------------------------------------------------------------------
    // write
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_write_then_read() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystemAdapter::new();
        let path = mirror_path(&dir, "hello.txt");

        fs.write_file(&path, b"Hello, mirror!").await.unwrap();

        assert_eq!(std::fs::read(path.as_path()).unwrap(), b"Hello, mirror!");
    }

    #[tokio::test]
    async fn test_write_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystemAdapter::new();
        let path = mirror_path(&dir, "a/b/c/nested.txt");

        fs.write_file(&path, b"nested content").await.unwrap();

        assert_eq!(std::fs::read(path.as_path()).unwrap(), b"nested content");
    }

    #[tokio::test]
    async fn test_write_overwrites_existing() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystemAdapter::new();
        let path = mirror_path(&dir, "overwrite.txt");

        fs.write_file(&path, b"first, longer content").await.unwrap();
        fs.write_file(&path, b"second").await.unwrap();

        assert_eq!(std::fs::read(path.as_path()).unwrap(), b"second");
    }

    #[tokio::test]
    async fn test_write_leaves_no_temporary_files() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystemAdapter::new();

        fs.write_file(&mirror_path(&dir, "one.bin"), &[0u8; 4096])
            .await
            .unwrap();
        fs.write_file(&mirror_path(&dir, "two.bin"), b"").await.unwrap();

        let mut names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        assert_eq!(names, vec!["one.bin", "two.bin"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_write_sets_file_mode() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystemAdapter::new();
        let path = mirror_path(&dir, "mode.txt");

        fs.write_file(&path, b"x").await.unwrap();

        let mode = std::fs::metadata(path.as_path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o644);
    }

    #[tokio::test]
    async fn test_write_over_directory_fails() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystemAdapter::new();
        let path = mirror_path(&dir, "taken");
        std::fs::create_dir_all(dir.path().join("taken/child")).unwrap();

        assert!(fs.write_file(&path, b"data").await.is_err());
        assert!(path.as_path().is_dir());
    }

    // ------------------------------------------------------------------
    // remove
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn test_remove_existing_file() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystemAdapter::new();
        let path = mirror_path(&dir, "to_delete.txt");

        fs.write_file(&path, b"bye").await.unwrap();

        assert!(fs.remove_file(&path).await.unwrap());
        assert!(!path.as_path().exists());
    }

    #[tokio::test]
    async fn test_remove_missing_file_is_not_an_error() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystemAdapter::new();
        let path = mirror_path(&dir, "never/existed.txt");

        assert!(!fs.remove_file(&path).await.unwrap());
        assert!(!fs.remove_file(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_directory_is_refused() {
        let dir = TempDir::new().unwrap();
        let fs = LocalFileSystemAdapter::new();
        let path = mirror_path(&dir, "subdir");
        std::fs::create_dir(path.as_path()).unwrap();

        let err = fs.remove_file(&path).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<SyncError>(),
            Some(SyncError::NotAFile(_))
        ));
        assert!(path.as_path().is_dir());
    }
}
