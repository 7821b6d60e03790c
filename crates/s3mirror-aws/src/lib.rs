//! s3mirror AWS - Amazon SQS and S3 adapters
//!
//! Provides:
//! - [`session::AwsSession`]: one shared SDK configuration (region, endpoint
//!   override, retry policy, default credential chain)
//! - [`sqs::SqsMessageQueue`]: the `IMessageQueue` port over Amazon SQS
//! - [`s3::S3ObjectFetcher`]: the `IRemoteStore` port over Amazon S3
//!
//! Both adapters draw credentials from the same chain held by the session.

pub mod s3;
pub mod session;
pub mod sqs;

use thiserror::Error;

/// Errors raised by the AWS adapters
#[derive(Debug, Error)]
pub enum AwsError {
    /// The SDK configuration carries no credential provider
    #[error("No AWS credentials provider configured")]
    NoCredentialsProvider,

    /// The credential chain could not produce credentials
    #[error("Failed to resolve AWS credentials: {0}")]
    Credentials(String),

    /// The queue name could not be resolved to a URL
    #[error("Failed to resolve URL of queue '{queue}': {message}")]
    QueueUrl { queue: String, message: String },

    /// A ReceiveMessage call failed
    #[error("ReceiveMessage failed: {0}")]
    Receive(String),

    /// A DeleteMessage call failed
    #[error("DeleteMessage failed for message {message_id}: {message}")]
    Delete { message_id: String, message: String },

    /// A GetObject call failed or its body could not be read
    #[error("GetObject failed for s3://{bucket}/{key}: {message}")]
    GetObject {
        bucket: String,
        key: String,
        message: String,
    },
}
