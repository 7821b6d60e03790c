//! Filesystem action dispatch
//!
//! Turns one decoded [`ChangeNotification`] plus its resolved local path
//! into at most one mutation of the local mirror.
//!
//! | condition                         | outcome                       |
//! |-----------------------------------|-------------------------------|
//! | no resolved path                  | `Skipped(Unmapped)`           |
//! | key ends with `/`                 | `Skipped(DirectoryMarker)`    |
//! | `ObjectPut`                       | fetch, then `Materialized`    |
//! | `ObjectDelete`, file present      | `Removed`                     |
//! | `ObjectDelete`, file missing      | `AlreadyAbsent`               |
//! | `Other`                           | `Skipped(NotActionable)`      |

use std::fmt::{self, Display, Formatter};
use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, info};

use crate::domain::newtypes::MirrorPath;
use crate::domain::notification::{ChangeNotification, EventKind};
use crate::ports::{ILocalFileSystem, IRemoteStore};

/// Why an event was accepted without touching the filesystem
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// No sync prefix matches the key
    Unmapped,
    /// The key is a folder placeholder
    DirectoryMarker,
    /// The event kind is not mirrored
    NotActionable,
}

impl Display for SkipReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Unmapped => "unmapped",
            Self::DirectoryMarker => "directory marker",
            Self::NotActionable => "not actionable",
        };
        f.write_str(s)
    }
}

/// Successful result of applying one notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    /// The object was fetched and written to disk
    Materialized { bytes: u64 },
    /// The local file was removed
    Removed,
    /// Delete requested for a file that does not exist locally
    AlreadyAbsent,
    /// Nothing to do
    Skipped(SkipReason),
}

impl ActionOutcome {
    /// Returns true if the filesystem was changed
    pub fn mutated(&self) -> bool {
        matches!(self, Self::Materialized { .. } | Self::Removed)
    }
}

/// Failures while applying a notification
#[derive(Debug, Error)]
pub enum ActionError {
    /// The object could not be read from the remote store
    #[error("Failed to fetch s3://{container}/{key}: {source:#}")]
    FetchFailed {
        container: String,
        key: String,
        #[source]
        source: anyhow::Error,
    },

    /// The fetched content could not be written locally
    #[error("Failed to write {path}: {source:#}")]
    WriteFailed {
        path: MirrorPath,
        #[source]
        source: anyhow::Error,
    },

    /// The local file could not be removed
    #[error("Failed to remove {path}: {source:#}")]
    RemoveFailed {
        path: MirrorPath,
        #[source]
        source: anyhow::Error,
    },
}

/// Applies notifications to the local mirror
#[derive(Clone)]
pub struct ActionDispatcher {
    remote_store: Arc<dyn IRemoteStore>,
    local_filesystem: Arc<dyn ILocalFileSystem>,
}

impl ActionDispatcher {
    /// Creates a new ActionDispatcher
    ///
    /// # Arguments
    ///
    /// * `remote_store` - Source of object content for put events
    /// * `local_filesystem` - Local mirror mutations
    pub fn new(
        remote_store: Arc<dyn IRemoteStore>,
        local_filesystem: Arc<dyn ILocalFileSystem>,
    ) -> Self {
        Self {
            remote_store,
            local_filesystem,
        }
    }

    /// Applies one notification
    ///
    /// # Arguments
    ///
    /// * `notification` - The decoded change
    /// * `resolved_path` - Local path from the mapper, `None` if out of scope
    ///
    /// # Errors
    ///
    /// Returns an [`ActionError`] if fetching, writing or removing fails.
    /// The caller decides whether to retry (by leaving the message
    /// unacknowledged).
    #[tracing::instrument(
        skip(self, notification, resolved_path),
        fields(kind = %notification.kind, bucket = %notification.container, key = %notification.object_key)
    )]
    pub async fn apply(
        &self,
        notification: &ChangeNotification,
        resolved_path: Option<&MirrorPath>,
    ) -> Result<ActionOutcome, ActionError> {
        let Some(path) = resolved_path else {
            debug!("key outside mirrored prefixes, skipping");
            return Ok(ActionOutcome::Skipped(SkipReason::Unmapped));
        };

        if notification.is_directory_marker() {
            debug!("directory marker, skipping");
            return Ok(ActionOutcome::Skipped(SkipReason::DirectoryMarker));
        }

        match &notification.kind {
            EventKind::ObjectPut => self.materialize(notification, path).await,
            EventKind::ObjectDelete => self.remove(path).await,
            EventKind::Other(name) => {
                debug!(event = %name, "event kind not mirrored, skipping");
                Ok(ActionOutcome::Skipped(SkipReason::NotActionable))
            }
        }
    }

    async fn materialize(
        &self,
        notification: &ChangeNotification,
        path: &MirrorPath,
    ) -> Result<ActionOutcome, ActionError> {
        let data = self
            .remote_store
            .fetch_object(&notification.container, &notification.object_key)
            .await
            .map_err(|source| ActionError::FetchFailed {
                container: notification.container.clone(),
                key: notification.object_key.clone(),
                source,
            })?;

        self.local_filesystem
            .write_file(path, &data)
            .await
            .map_err(|source| ActionError::WriteFailed {
                path: path.clone(),
                source,
            })?;

        let bytes = data.len() as u64;
        info!(local_path = %path, bytes, "object materialized");
        Ok(ActionOutcome::Materialized { bytes })
    }

    async fn remove(&self, path: &MirrorPath) -> Result<ActionOutcome, ActionError> {
        let removed = self
            .local_filesystem
            .remove_file(path)
            .await
            .map_err(|source| ActionError::RemoveFailed {
                path: path.clone(),
                source,
            })?;

        if removed {
            info!(local_path = %path, "local file removed");
            Ok(ActionOutcome::Removed)
        } else {
            debug!(local_path = %path, "local file already absent");
            Ok(ActionOutcome::AlreadyAbsent)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    /// In-memory store keyed by `bucket/key`
    #[derive(Default)]
    struct MockStore {
        objects: Mutex<HashMap<String, Vec<u8>>>,
        fetches: Mutex<Vec<String>>,
    }

    impl MockStore {
        fn with_object(self, bucket: &str, key: &str, data: &[u8]) -> Self {
            self.objects
                .lock()
                .unwrap()
                .insert(format!("{bucket}/{key}"), data.to_vec());
            self
        }

        fn fetch_count(&self) -> usize {
            self.fetches.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl IRemoteStore for MockStore {
        async fn fetch_object(&self, container: &str, key: &str) -> anyhow::Result<Vec<u8>> {
            let id = format!("{container}/{key}");
            self.fetches.lock().unwrap().push(id.clone());
            self.objects
                .lock()
                .unwrap()
                .get(&id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("NoSuchKey: {id}"))
        }
    }

    /// Filesystem double that keeps files in a map
    #[derive(Default)]
    struct MockFs {
        files: Mutex<HashMap<PathBuf, Vec<u8>>>,
        fail_writes: bool,
    }

    impl MockFs {
        fn failing() -> Self {
            Self {
                fail_writes: true,
                ..Self::default()
            }
        }

        fn get(&self, path: &MirrorPath) -> Option<Vec<u8>> {
            self.files.lock().unwrap().get(path.as_path()).cloned()
        }

        fn len(&self) -> usize {
            self.files.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl ILocalFileSystem for MockFs {
        async fn write_file(&self, path: &MirrorPath, data: &[u8]) -> anyhow::Result<()> {
            if self.fail_writes {
                anyhow::bail!("read-only filesystem");
            }
            self.files
                .lock()
                .unwrap()
                .insert(path.as_path().clone(), data.to_vec());
            Ok(())
        }

        async fn remove_file(&self, path: &MirrorPath) -> anyhow::Result<bool> {
            Ok(self.files.lock().unwrap().remove(path.as_path()).is_some())
        }
    }

    fn notification(kind: EventKind, key: &str) -> ChangeNotification {
        ChangeNotification {
            kind,
            container: "bucket".to_string(),
            raw_key: key.to_string(),
            object_key: key.to_string(),
            size: None,
            event_time: None,
            sequencer: None,
            record_count: 1,
        }
    }

    fn path(p: &str) -> MirrorPath {
        MirrorPath::new(PathBuf::from(p)).unwrap()
    }

    fn dispatcher(store: Arc<MockStore>, fs: Arc<MockFs>) -> ActionDispatcher {
        ActionDispatcher::new(store, fs)
    }

    #[tokio::test]
    async fn test_put_fetches_and_writes() {
        let store = Arc::new(MockStore::default().with_object("bucket", "a/x.txt", b"hello"));
        let fs = Arc::new(MockFs::default());
        let target = path("/srv/a/x.txt");

        let outcome = dispatcher(store.clone(), fs.clone())
            .apply(&notification(EventKind::ObjectPut, "a/x.txt"), Some(&target))
            .await
            .unwrap();

        assert_eq!(outcome, ActionOutcome::Materialized { bytes: 5 });
        assert!(outcome.mutated());
        assert_eq!(fs.get(&target), Some(b"hello".to_vec()));
        assert_eq!(store.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_put_fetch_failure_is_fetch_failed() {
        let store = Arc::new(MockStore::default());
        let fs = Arc::new(MockFs::default());

        let err = dispatcher(store, fs.clone())
            .apply(
                &notification(EventKind::ObjectPut, "a/missing.txt"),
                Some(&path("/srv/a/missing.txt")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::FetchFailed { .. }));
        assert!(err.to_string().contains("s3://bucket/a/missing.txt"));
        assert_eq!(fs.len(), 0);
    }

    #[tokio::test]
    async fn test_put_write_failure_is_write_failed() {
        let store = Arc::new(MockStore::default().with_object("bucket", "a/x.txt", b"data"));
        let fs = Arc::new(MockFs::failing());

        let err = dispatcher(store, fs)
            .apply(
                &notification(EventKind::ObjectPut, "a/x.txt"),
                Some(&path("/srv/a/x.txt")),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::WriteFailed { .. }));
    }

    #[tokio::test]
    async fn test_delete_twice_is_idempotent() {
        let store = Arc::new(MockStore::default().with_object("bucket", "a/x.txt", b"data"));
        let fs = Arc::new(MockFs::default());
        let d = dispatcher(store, fs.clone());
        let target = path("/srv/a/x.txt");

        d.apply(&notification(EventKind::ObjectPut, "a/x.txt"), Some(&target))
            .await
            .unwrap();

        let first = d
            .apply(&notification(EventKind::ObjectDelete, "a/x.txt"), Some(&target))
            .await
            .unwrap();
        let second = d
            .apply(&notification(EventKind::ObjectDelete, "a/x.txt"), Some(&target))
            .await
            .unwrap();

        assert_eq!(first, ActionOutcome::Removed);
        assert_eq!(second, ActionOutcome::AlreadyAbsent);
        assert_eq!(fs.len(), 0);
    }

    #[tokio::test]
    async fn test_unmapped_is_skipped_without_fetch() {
        let store = Arc::new(MockStore::default());
        let fs = Arc::new(MockFs::default());

        let outcome = dispatcher(store.clone(), fs)
            .apply(&notification(EventKind::ObjectPut, "elsewhere/x.txt"), None)
            .await
            .unwrap();

        assert_eq!(outcome, ActionOutcome::Skipped(SkipReason::Unmapped));
        assert_eq!(store.fetch_count(), 0);
    }

    #[tokio::test]
    async fn test_directory_marker_is_skipped() {
        let store = Arc::new(MockStore::default());
        let fs = Arc::new(MockFs::default());
        let d = dispatcher(store.clone(), fs.clone());

        for kind in [EventKind::ObjectPut, EventKind::ObjectDelete] {
            let outcome = d
                .apply(&notification(kind, "a/folder/"), Some(&path("/srv/a/folder")))
                .await
                .unwrap();
            assert_eq!(outcome, ActionOutcome::Skipped(SkipReason::DirectoryMarker));
        }

        assert_eq!(store.fetch_count(), 0);
        assert_eq!(fs.len(), 0);
    }

    #[tokio::test]
    async fn test_other_event_is_skipped() {
        let store = Arc::new(MockStore::default());
        let fs = Arc::new(MockFs::default());

        let outcome = dispatcher(store.clone(), fs)
            .apply(
                &notification(EventKind::Other("ObjectRestore:Post".into()), "a/x.txt"),
                Some(&path("/srv/a/x.txt")),
            )
            .await
            .unwrap();

        assert_eq!(outcome, ActionOutcome::Skipped(SkipReason::NotActionable));
        assert!(!outcome.mutated());
        assert_eq!(store.fetch_count(), 0);
    }
}
