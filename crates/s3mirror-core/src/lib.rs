//! s3mirror Core - Domain logic for notification-driven S3 mirroring
//!
//! This crate contains the hexagonal architecture core with:
//! - **Domain types** - `MappingRule`, `PathMapper`, `ChangeNotification`, `MirrorPath`
//! - **Use cases** - `ActionDispatcher`, `MessageProcessor`
//! - **Port definitions** - Traits for adapters: `IMessageQueue`, `IRemoteStore`, `ILocalFileSystem`
//! - **Configuration** - Typed YAML configuration with validation
//!
//! # Architecture
//!
//! The domain module contains pure logic with no I/O. Ports define the
//! trait interfaces that adapter crates implement (`s3mirror-aws` for the
//! queue and object store, `s3mirror-sync` for the local filesystem).
//! Use cases orchestrate domain types through port interfaces.

pub mod config;
pub mod domain;
pub mod ports;
pub mod usecases;
