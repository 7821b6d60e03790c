//! Message queue port (driving side of the pipeline)
//!
//! The queue delivers change notifications with at-least-once semantics.
//! A [`QueueMessage`] is owned by the consumer for one processing attempt:
//! it is either passed by value to [`IMessageQueue::delete`] or dropped,
//! in which case the queue redelivers it after its visibility timeout.

use std::fmt::{self, Display, Formatter};

/// Opaque token the queue issues for one delivery of a message
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReceiptHandle(String);

impl ReceiptHandle {
    pub fn new(handle: impl Into<String>) -> Self {
        Self(handle.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ReceiptHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One delivery of a queue message
#[derive(Debug)]
pub struct QueueMessage {
    /// Queue-assigned message id, used for logging only
    pub message_id: Option<String>,
    /// Raw message body
    pub body: String,
    /// Handle needed to acknowledge this delivery
    pub receipt_handle: ReceiptHandle,
}

impl QueueMessage {
    pub fn new(
        message_id: Option<String>,
        body: impl Into<String>,
        receipt_handle: ReceiptHandle,
    ) -> Self {
        Self {
            message_id,
            body: body.into(),
            receipt_handle,
        }
    }

    /// Message id for log fields, `-` when the queue did not provide one
    pub fn display_id(&self) -> &str {
        self.message_id.as_deref().unwrap_or("-")
    }
}

/// Port trait for the notification queue
#[async_trait::async_trait]
pub trait IMessageQueue: Send + Sync {
    /// Receives up to `max_messages` messages
    ///
    /// May block (long poll) until messages arrive or the adapter's wait
    /// time elapses; an empty vector is a normal result.
    async fn receive(&self, max_messages: u32) -> anyhow::Result<Vec<QueueMessage>>;

    /// Acknowledges a message so it is not redelivered
    ///
    /// Consumes the message: a delivery is acknowledged at most once.
    async fn delete(&self, message: QueueMessage) -> anyhow::Result<()>;
}
