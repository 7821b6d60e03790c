//! Amazon SQS adapter for the [`IMessageQueue`] port

use aws_sdk_sqs::error::DisplayErrorContext;
use aws_sdk_sqs::Client;
use s3mirror_core::config::QueueConfig;
use s3mirror_core::ports::message_queue::{IMessageQueue, QueueMessage, ReceiptHandle};
use tracing::{debug, info, instrument, warn};

use crate::session::AwsSession;
use crate::AwsError;

/// Notification queue backed by Amazon SQS
#[derive(Debug, Clone)]
pub struct SqsMessageQueue {
    client: Client,
    queue_url: String,
    wait_time_seconds: i32,
    visibility_timeout: Option<i32>,
}

impl SqsMessageQueue {
    /// Creates the client and resolves the queue URL from its name
    ///
    /// # Errors
    ///
    /// Returns [`AwsError::QueueUrl`] if the queue does not exist or the
    /// lookup fails. Callers treat this as fatal.
    pub async fn connect(session: &AwsSession, config: &QueueConfig) -> Result<Self, AwsError> {
        let client = Client::new(session.sdk_config());
        Self::with_client(client, config).await
    }

    /// Same as [`connect`](Self::connect) with an existing client
    #[instrument(skip_all, fields(queue = %config.name))]
    pub async fn with_client(client: Client, config: &QueueConfig) -> Result<Self, AwsError> {
        let queue_url_error = |message: String| AwsError::QueueUrl {
            queue: config.name.clone(),
            message,
        };

        let output = client
            .get_queue_url()
            .queue_name(&config.name)
            .send()
            .await
            .map_err(|e| queue_url_error(DisplayErrorContext(&e).to_string()))?;

        let queue_url = output
            .queue_url()
            .ok_or_else(|| queue_url_error("response carried no queue URL".to_string()))?
            .to_string();

        info!(queue_url = %queue_url, "Queue URL resolved");

        Ok(Self {
            client,
            queue_url,
            wait_time_seconds: to_i32(config.wait_time_seconds),
            visibility_timeout: config.visibility_timeout.map(to_i32),
        })
    }

    pub fn queue_url(&self) -> &str {
        &self.queue_url
    }
}

fn to_i32(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

#[async_trait::async_trait]
impl IMessageQueue for SqsMessageQueue {
    #[instrument(skip(self))]
    async fn receive(&self, max_messages: u32) -> anyhow::Result<Vec<QueueMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(to_i32(max_messages))
            .wait_time_seconds(self.wait_time_seconds)
            .set_visibility_timeout(self.visibility_timeout)
            .send()
            .await
            .map_err(|e| AwsError::Receive(DisplayErrorContext(&e).to_string()))?;

        let mut messages = Vec::new();
        for message in output.messages.unwrap_or_default() {
            let Some(handle) = message.receipt_handle else {
                warn!(
                    message_id = ?message.message_id,
                    "Message without receipt handle dropped from batch; it will be redelivered"
                );
                continue;
            };
            messages.push(QueueMessage::new(
                message.message_id,
                message.body.unwrap_or_default(),
                ReceiptHandle::new(handle),
            ));
        }

        debug!(count = messages.len(), "Messages received");
        Ok(messages)
    }

    #[instrument(skip_all, fields(message_id = %message.display_id()))]
    async fn delete(&self, message: QueueMessage) -> anyhow::Result<()> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(message.receipt_handle.as_str())
            .send()
            .await
            .map_err(|e| AwsError::Delete {
                message_id: message.display_id().to_string(),
                message: DisplayErrorContext(&e).to_string(),
            })?;

        debug!("Message deleted");
        Ok(())
    }
}
