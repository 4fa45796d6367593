//! Blob storage for gallery media.
//!
//! This crate provides:
//! - The [`BlobStore`] trait with progress reporting and cooperative cancellation
//! - A Cloudflare R2 client (single put or multipart with per-part progress)
//! - Public or presigned read URLs
//! - An in-memory store for local runs and tests

pub mod blob;
pub mod client;
pub mod error;
pub mod memory;

pub use blob::{BlobStore, CancelSignal, ProgressFn, SharedBlobStore, UploadProgress};
pub use client::{R2Client, R2Config, MULTIPART_PART_SIZE};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryBlobStore;
