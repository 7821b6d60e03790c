//! Amazon S3 adapter for the [`IRemoteStore`] port
//!
//! Objects are read with `GetObject` through one SDK client that shares the
//! session's region, retry policy and credential chain with the SQS adapter.
//! Keys go on the wire exactly as decoded from the notification; empty
//! segments, `.` and `..` segments and leading separators are all part of
//! a valid S3 key and are never normalised away.

use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::Client;
use s3mirror_core::ports::remote_store::IRemoteStore;
use tracing::{debug, instrument};

use crate::session::AwsSession;
use crate::AwsError;

/// Reads whole objects from S3
#[derive(Debug, Clone)]
pub struct S3ObjectFetcher {
    client: Client,
}

impl S3ObjectFetcher {
    /// Creates a fetcher from the session's SDK configuration
    ///
    /// Endpoint overrides (LocalStack, MinIO) use path-style addressing.
    pub fn new(session: &AwsSession) -> Self {
        let config = aws_sdk_s3::config::Builder::from(session.sdk_config())
            .force_path_style(session.endpoint_url().is_some())
            .build();
        Self::with_client(Client::from_conf(config))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl IRemoteStore for S3ObjectFetcher {
    #[instrument(skip(self))]
    async fn fetch_object(&self, container: &str, key: &str) -> anyhow::Result<Vec<u8>> {
        let get_error = |message: String| AwsError::GetObject {
            bucket: container.to_string(),
            key: key.to_string(),
            message,
        };

        let output = self
            .client
            .get_object()
            .bucket(container)
            .key(key)
            .send()
            .await
            .map_err(|e| get_error(DisplayErrorContext(&e).to_string()))?;

        let data = output
            .body
            .collect()
            .await
            .map_err(|e| get_error(e.to_string()))?
            .into_bytes();

        debug!(bytes = data.len(), "Object fetched");
        Ok(data.to_vec())
    }
}

