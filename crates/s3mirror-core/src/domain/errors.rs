//! Domain error types
//!
//! This module defines error types specific to domain operations:
//! path construction, key decoding and notification parsing.

use thiserror::Error;

/// Errors that can occur in domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Invalid path format or content
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// A mapped key would resolve outside its configured local root
    #[error("Path escapes local root: {0}")]
    PathOutsideRoot(String),

    /// The object key could not be percent-decoded
    #[error("Undecodable object key: {0}")]
    UndecodableKey(String),

    /// The queue message body is not a usable notification envelope
    #[error("Malformed event: {0}")]
    MalformedEvent(String),
}
