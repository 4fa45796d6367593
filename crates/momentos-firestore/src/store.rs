//! Document store abstraction.
//!
//! Repositories talk to [`DocumentStore`] rather than to the REST client so
//! the same transaction code runs against Firestore in production and against
//! [`crate::MemoryStore`] in tests and local development.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::FirestoreResult;
use crate::types::{CommitResponse, Document, StructuredQuery, Write};

/// Minimal document database surface used by the gallery.
///
/// Paths are relative to the database root, e.g. collection
/// `weddings/w1/albums` and document id `moments`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document. `Ok(None)` when it does not exist.
    async fn get_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<Option<Document>>;

    /// Apply all writes atomically, or none of them.
    ///
    /// A failed precondition surfaces as `PreconditionFailed` (stale
    /// `update_time`) or `AlreadyExists` (`exists=false` on a present document).
    async fn commit(&self, writes: Vec<Write>) -> FirestoreResult<CommitResponse>;

    /// Run a single-collection query under `parent_path`.
    async fn run_query(
        &self,
        parent_path: &str,
        query: StructuredQuery,
    ) -> FirestoreResult<Vec<Document>>;

    /// Resource name used in writes for `collection/doc_id`.
    fn full_document_name(&self, collection: &str, doc_id: &str) -> String;
}

/// Shared handle to a document store.
pub type SharedStore = Arc<dyn DocumentStore>;

/// Strip the `projects/.../documents/` prefix from a resource name.
pub fn relative_path(full_name: &str) -> &str {
    match full_name.find("/documents/") {
        Some(idx) => &full_name[idx + "/documents/".len()..],
        None => full_name,
    }
}
