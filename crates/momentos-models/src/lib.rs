//! Shared data models for the Momentos event gallery.
//!
//! This crate provides Serde-serializable types for:
//! - Albums with their upload window, counters and settings
//! - Photos and their moderation state
//! - Guest access tokens
//! - Guest contribution records and badges
//! - Content hash reservations used for duplicate detection

pub mod album;
pub mod guest;
pub mod ids;
pub mod media_hash;
pub mod photo;
pub mod token;

// Re-export common types
pub use album::{
    Album, AlbumCounters, AlbumSettings, AlbumStatus, CleanupStatus, ModerationMode,
    QrCodePointer, Scene, SlideshowSettings, UploadWindow, COMPRESSION_THRESHOLD_BYTES,
    DEFAULT_ALBUM_ID, DEFAULT_PREFERRED_SCENES, RETENTION_DAYS, UPLOAD_WINDOW_DAYS,
};
pub use guest::{BadgeRule, GuestContribution, ANONYMOUS_GUEST_NAME};
pub use ids::{AlbumId, PhotoId, TokenId, WeddingId};
pub use media_hash::{HashStatus, MediaHash};
pub use photo::{
    Highlight, MediaKind, Photo, PhotoStatus, Rejection, StoragePaths, UploadInfo,
    UploaderIdentity, UploaderKind, FEATURED_LABEL,
};
pub use token::{AccessToken, TokenKind, TokenStatus};
