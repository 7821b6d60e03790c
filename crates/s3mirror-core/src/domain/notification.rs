//! S3 change notifications
//!
//! Decodes one queue message body (an S3 event notification envelope)
//! into a [`ChangeNotification`]. Only the first record of an envelope is
//! consulted; a warning is logged when more are present.

use std::borrow::Cow;
use std::fmt::{self, Display, Formatter};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::errors::DomainError;

/// Percent-decodes an object key as delivered in S3 notifications
///
/// S3 encodes keys the way HTML forms do, so `+` stands for a space and is
/// translated before `%XX` sequences are decoded.
///
/// # Errors
/// Returns `DomainError::UndecodableKey` if the decoded bytes are not UTF-8
pub fn decode_object_key(raw_key: &str) -> Result<String, DomainError> {
    let spaced = raw_key.replace('+', " ");
    urlencoding::decode(&spaced)
        .map(Cow::into_owned)
        .map_err(|e| DomainError::UndecodableKey(format!("{raw_key}: {e}")))
}

// ============================================================================
// EventKind / EventNamePolicy
// ============================================================================

/// What a notification asks the mirror to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventKind {
    /// The object was created or overwritten
    ObjectPut,
    /// The object was removed
    ObjectDelete,
    /// Any other event; carries the raw event name for logging
    Other(String),
}

impl EventKind {
    /// Returns true for kinds that touch the filesystem
    pub fn is_actionable(&self) -> bool {
        !matches!(self, Self::Other(_))
    }
}

impl Display for EventKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::ObjectPut => write!(f, "ObjectPut"),
            Self::ObjectDelete => write!(f, "ObjectDelete"),
            Self::Other(name) => write!(f, "Other({name})"),
        }
    }
}

/// How S3 event names are classified into [`EventKind`]s
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventNamePolicy {
    /// Only `ObjectCreated:Put` and `ObjectRemoved:Delete` are actionable
    #[default]
    Exact,
    /// Every `ObjectCreated:*` and `ObjectRemoved:*` event is actionable
    AnyCreateOrRemove,
}

impl EventNamePolicy {
    pub fn classify(&self, event_name: &str) -> EventKind {
        let name = event_name.strip_prefix("s3:").unwrap_or(event_name);

        let kind = match self {
            Self::Exact => match name {
                "ObjectCreated:Put" => Some(EventKind::ObjectPut),
                "ObjectRemoved:Delete" => Some(EventKind::ObjectDelete),
                _ => None,
            },
            Self::AnyCreateOrRemove => {
                if name.starts_with("ObjectCreated:") {
                    Some(EventKind::ObjectPut)
                } else if name.starts_with("ObjectRemoved:") {
                    Some(EventKind::ObjectDelete)
                } else {
                    None
                }
            }
        };

        kind.unwrap_or_else(|| EventKind::Other(event_name.to_string()))
    }
}

// ============================================================================
// ChangeNotification
// ============================================================================

/// One decoded change to an object in the store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeNotification {
    pub kind: EventKind,
    /// Bucket holding the object
    pub container: String,
    /// Object key exactly as delivered (percent-encoded)
    pub raw_key: String,
    /// Percent-decoded object key
    pub object_key: String,
    /// Object size in bytes, informational only
    pub size: Option<u64>,
    pub event_time: Option<DateTime<Utc>>,
    /// S3 per-key ordering token, informational only
    pub sequencer: Option<String>,
    /// Number of records in the envelope this notification came from
    pub record_count: usize,
}

impl ChangeNotification {
    /// Keys ending in `/` are folder placeholders, not objects
    pub fn is_directory_marker(&self) -> bool {
        self.object_key.ends_with('/')
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Debug, Deserialize)]
struct NotificationEnvelope {
    #[serde(rename = "Records", alias = "records", default)]
    records: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EventRecord {
    event_name: String,
    #[serde(default)]
    event_time: Option<DateTime<Utc>>,
    s3: S3Entity,
}

#[derive(Debug, Deserialize)]
struct S3Entity {
    bucket: BucketEntity,
    object: ObjectEntity,
}

#[derive(Debug, Deserialize)]
struct BucketEntity {
    name: String,
}

#[derive(Debug, Deserialize)]
struct ObjectEntity {
    key: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    sequencer: Option<String>,
}

// ============================================================================
// EventDecoder
// ============================================================================

/// Parses queue message bodies into [`ChangeNotification`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDecoder {
    policy: EventNamePolicy,
}

impl EventDecoder {
    pub fn new(policy: EventNamePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> EventNamePolicy {
        self.policy
    }

    /// Decodes one message body
    ///
    /// # Errors
    /// Returns `DomainError::MalformedEvent` if the body is not a
    /// notification envelope, has no records, or its first record lacks
    /// the event name, bucket name or object key. An object key that
    /// cannot be percent-decoded is also reported as malformed.
    pub fn decode(&self, raw_body: &[u8]) -> Result<ChangeNotification, DomainError> {
        let envelope: NotificationEnvelope = serde_json::from_slice(raw_body)
            .map_err(|e| DomainError::MalformedEvent(format!("invalid envelope: {e}")))?;

        let record_count = envelope.records.len();
        let Some(record) = envelope.records.into_iter().next() else {
            return Err(DomainError::MalformedEvent(
                "envelope contains no records".to_string(),
            ));
        };

        if record_count > 1 {
            warn!(
                record_count,
                "notification carries multiple records; only the first is processed"
            );
        }

        let raw_key = record.s3.object.key;
        let object_key = decode_object_key(&raw_key)
            .map_err(|e| DomainError::MalformedEvent(e.to_string()))?;

        Ok(ChangeNotification {
            kind: self.policy.classify(&record.event_name),
            container: record.s3.bucket.name,
            raw_key,
            object_key,
            size: record.s3.object.size,
            event_time: record.event_time,
            sequencer: record.s3.object.sequencer,
            record_count,
        })
    }
}
