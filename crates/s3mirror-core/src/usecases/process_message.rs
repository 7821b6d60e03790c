//! Per-message pipeline: decode, resolve, apply
//!
//! A [`MessageProcessor`] owns no queue state. It reports success or a
//! [`ProcessError`]; acknowledging the message is the caller's job.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;

use super::apply_change::{ActionDispatcher, ActionError, ActionOutcome, SkipReason};
use crate::domain::errors::DomainError;
use crate::domain::mapping::PathMapper;
use crate::domain::newtypes::MirrorPath;
use crate::domain::notification::{ChangeNotification, EventDecoder};

/// Failure at one of the pipeline stages
#[derive(Debug, Error)]
pub enum ProcessError {
    /// The body is not a usable notification
    #[error("Undecodable notification: {0}")]
    Decode(#[source] DomainError),

    /// The key matched a prefix but no safe local path could be built
    #[error("Cannot map s3://{container}/{key}: {source}")]
    Resolve {
        container: String,
        key: String,
        #[source]
        source: DomainError,
    },

    /// Fetch, write or remove failed
    #[error(transparent)]
    Action(#[from] ActionError),
}

impl ProcessError {
    /// Short stage name used as a log field
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Decode(_) => "decode",
            Self::Resolve { .. } => "resolve",
            Self::Action(ActionError::FetchFailed { .. }) => "fetch",
            Self::Action(ActionError::WriteFailed { .. }) => "write",
            Self::Action(ActionError::RemoveFailed { .. }) => "remove",
        }
    }

    /// True when the message itself is at fault; redelivery alone will not fix it
    pub fn is_input_error(&self) -> bool {
        matches!(self, Self::Decode(_) | Self::Resolve { .. })
    }
}

/// Result of a successfully processed message
#[derive(Debug, Clone)]
pub struct ProcessedMessage {
    pub notification: ChangeNotification,
    pub local_path: Option<MirrorPath>,
    pub outcome: ActionOutcome,
}

/// Runs one message body through the decode, resolve and apply stages
#[derive(Clone)]
pub struct MessageProcessor {
    decoder: EventDecoder,
    mapper: Arc<PathMapper>,
    dispatcher: ActionDispatcher,
}

impl MessageProcessor {
    pub fn new(decoder: EventDecoder, mapper: Arc<PathMapper>, dispatcher: ActionDispatcher) -> Self {
        Self {
            decoder,
            mapper,
            dispatcher,
        }
    }

    /// Processes one message body
    ///
    /// # Errors
    ///
    /// Returns a [`ProcessError`] naming the stage that failed. Any error
    /// means the message should stay on the queue for redelivery.
    pub async fn process(&self, body: &str) -> Result<ProcessedMessage, ProcessError> {
        let notification = self
            .decoder
            .decode(body.as_bytes())
            .map_err(ProcessError::Decode)?;

        info!(
            event = %notification.kind,
            bucket = %notification.container,
            key = %notification.object_key,
            "notification received"
        );

        // Folder placeholders never reach the mapper; a key equal to its
        // prefix plus `/` has no file name to map to.
        if notification.is_directory_marker() {
            return Ok(ProcessedMessage {
                notification,
                local_path: None,
                outcome: ActionOutcome::Skipped(SkipReason::DirectoryMarker),
            });
        }

        let local_path = self
            .mapper
            .resolve_decoded(&notification.object_key)
            .map_err(|source| ProcessError::Resolve {
                container: notification.container.clone(),
                key: notification.object_key.clone(),
                source,
            })?;

        let outcome = self
            .dispatcher
            .apply(&notification, local_path.as_ref())
            .await?;

        Ok(ProcessedMessage {
            notification,
            local_path,
            outcome,
        })
    }
}
