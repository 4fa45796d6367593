//! Firestore REST API client and gallery repositories.
//!
//! This crate provides:
//! - A Firestore REST client with service account auth via gcp_auth
//! - The [`DocumentStore`] seam with a Firestore and an in-memory backend
//! - Atomic multi-document commits guarded by `updateTime` preconditions
//! - Transport and optimistic-conflict retry policies
//! - Typed repositories for albums, photos, tokens, guests and content hashes

pub mod client;
pub mod error;
pub mod fields;
pub mod memory;
pub mod metrics;
pub mod repos;
pub mod retry;
pub mod store;
pub mod token_cache;
pub mod types;

pub use client::{FirestoreClient, FirestoreConfig};
pub use error::{FirestoreError, FirestoreResult};
pub use memory::MemoryStore;
pub use repos::{
    AlbumRepository, AlbumScope, GuestRepository, MediaHashRepository, PhotoRepository,
    TokenRepository, Versioned,
};
pub use retry::{with_conflict_retry, with_retry, ConflictAware, RetryConfig};
pub use store::{DocumentStore, SharedStore};
pub use types::{Document, FromFirestoreValue, ToFirestoreValue, Value, Write};
