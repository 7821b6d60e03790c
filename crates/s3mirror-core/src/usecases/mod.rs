//! Use cases that orchestrate domain types through the ports
//!
//! - [`MessageProcessor`] runs one queue message body through decode,
//!   resolve and apply
//! - [`ActionDispatcher`] performs the single filesystem action a
//!   notification calls for

pub mod apply_change;
pub mod process_message;

pub use apply_change::{ActionDispatcher, ActionError, ActionOutcome, SkipReason};
pub use process_message::{MessageProcessor, ProcessError, ProcessedMessage};
