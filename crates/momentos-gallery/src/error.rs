//! Gallery error types.
//!
//! Display strings of the validation variants are shown to guests as-is.

use thiserror::Error;

use momentos_firestore::{ConflictAware, FirestoreError};
use momentos_models::PhotoStatus;
use momentos_storage::StorageError;

pub type GalleryResult<T> = Result<T, GalleryError>;

#[derive(Debug, Error)]
pub enum GalleryError {
    #[error("The upload period for this album has ended. Contact the hosts to request access.")]
    WindowClosed,

    #[error("This upload link is not valid. Ask the hosts for a new one.")]
    TokenNotFound,

    #[error("This upload link is no longer active. Ask the hosts for a new one.")]
    TokenInactive,

    #[error("This upload link has expired. Ask the hosts for a new one.")]
    TokenExpired,

    #[error("This upload link has reached its upload limit. Ask the hosts for a new one.")]
    TokenUsageExceeded,

    #[error("This upload link only accepts photos for: {allowed}")]
    SceneNotAllowed { allowed: String },

    #[error("This file has already been shared in the album.")]
    DuplicatePhoto,

    #[error("Videos longer than {max_secs} seconds cannot be uploaded while the album is over its storage budget.")]
    VideoTooLong { max_secs: u64 },

    #[error("Reactions are disabled for this album.")]
    ReactionsDisabled,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Upload cancelled")]
    Cancelled,

    #[error("Photo not found: {0}")]
    PhotoNotFound(String),

    #[error("Cannot move photo from {from} to {to}")]
    InvalidTransition { from: PhotoStatus, to: PhotoStatus },

    #[error("Failed to record upload metadata: {0}")]
    MetadataWriteFailed(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Store error: {0}")]
    Store(#[from] FirestoreError),
}

impl GalleryError {
    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Guest-facing validation failure: the request can be corrected or
    /// retried with a new link, nothing was written.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::WindowClosed
                | Self::TokenNotFound
                | Self::TokenInactive
                | Self::TokenExpired
                | Self::TokenUsageExceeded
                | Self::SceneNotAllowed { .. }
                | Self::DuplicatePhoto
                | Self::VideoTooLong { .. }
                | Self::ReactionsDisabled
                | Self::InvalidInput(_)
        )
    }

    /// Wrap a store failure raised after the blob was uploaded.
    pub(crate) fn into_metadata_failure(self) -> Self {
        match self {
            Self::Store(e) => Self::MetadataWriteFailed(e.to_string()),
            other => other,
        }
    }
}

impl ConflictAware for GalleryError {
    fn is_conflict(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_conflict())
    }

    fn conflict_exhausted(operation: &str, attempts: u32) -> Self {
        Self::Store(FirestoreError::conflict_exhausted(operation, attempts))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_detection() {
        let conflict = GalleryError::Store(FirestoreError::PreconditionFailed("stale".into()));
        assert!(conflict.is_conflict());
        assert!(!GalleryError::WindowClosed.is_conflict());
    }

    #[test]
    fn test_metadata_failure_wrapping() {
        let err = GalleryError::Store(FirestoreError::request_failed("boom")).into_metadata_failure();
        assert!(matches!(err, GalleryError::MetadataWriteFailed(_)));
        assert!(matches!(
            GalleryError::Cancelled.into_metadata_failure(),
            GalleryError::Cancelled
        ));
    }

    #[test]
    fn test_validation_messages_are_actionable() {
        assert!(GalleryError::WindowClosed.is_validation());
        assert!(GalleryError::WindowClosed.to_string().contains("Contact the hosts"));
        assert!(!GalleryError::MetadataWriteFailed("x".into()).is_validation());
    }
}
