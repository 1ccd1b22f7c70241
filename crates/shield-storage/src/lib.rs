//! Clip storage and delivery.
//!
//! This crate provides:
//! - The on-disk recordings directory layout
//! - The [`ClipTransport`] capability and a multipart HTTP implementation
//! - [`Uploader`], which delivers clips in the background without blocking
//!   the caller

pub mod collector;
pub mod error;
pub mod recordings;
pub mod uploader;

pub use collector::{ClipTransport, CollectorClient, CollectorConfig};
pub use error::{StorageError, StorageResult};
pub use recordings::RecordingsDir;
pub use uploader::{Uploader, UPLOADS_TOTAL};
