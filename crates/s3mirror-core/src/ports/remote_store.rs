//! Remote object store port (driven/secondary port)
//!
//! Uses `anyhow::Result` because errors at port boundaries are
//! adapter-specific and don't need domain-level classification. The
//! [`ActionDispatcher`](crate::usecases::ActionDispatcher) wraps them into
//! a typed `FetchFailed` error.

/// Port trait for reading objects from the remote store
#[async_trait::async_trait]
pub trait IRemoteStore: Send + Sync {
    /// Fetches an object's full content
    ///
    /// # Arguments
    /// * `container` - Bucket holding the object
    /// * `key` - Decoded object key
    ///
    /// # Returns
    /// The object contents as a byte vector
    async fn fetch_object(&self, container: &str, key: &str) -> anyhow::Result<Vec<u8>>;
}
