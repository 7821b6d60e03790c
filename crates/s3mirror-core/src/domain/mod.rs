//! Domain types and pure logic
//!
//! This module contains the core domain types for s3mirror:
//! - Validated local paths produced by key mapping
//! - Longest-prefix mapping rules and the table built from them
//! - Decoded change notifications and the envelope decoder
//! - Domain-specific error types

pub mod errors;
pub mod mapping;
pub mod newtypes;
pub mod notification;

// Re-export commonly used types
pub use errors::DomainError;
pub use mapping::{MappingRule, MappingRules, PathMapper};
pub use newtypes::MirrorPath;
pub use notification::{
    decode_object_key, ChangeNotification, EventDecoder, EventKind, EventNamePolicy,
};
