//! Port definitions (hexagonal architecture interfaces)
//!
//! This module defines the port traits that form the boundaries of the
//! hexagonal architecture. Ports are interfaces that the domain core
//! depends on, but whose implementations live in adapter crates.
//!
//! ## Ports Overview
//!
//! - [`IMessageQueue`] - Receiving and acknowledging change notifications
//! - [`IRemoteStore`] - Fetching object content from the remote store
//! - [`ILocalFileSystem`] - Writing and removing files in the local mirror

pub mod local_filesystem;
pub mod message_queue;
pub mod remote_store;

pub use local_filesystem::ILocalFileSystem;
pub use message_queue::{IMessageQueue, QueueMessage, ReceiptHandle};
pub use remote_store::IRemoteStore;
