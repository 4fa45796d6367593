//! Typed repositories for gallery documents.
//!
//! Layout:
//! - `weddings/{w}/albums/{a}` album document
//! - `weddings/{w}/albums/{a}/photos/{photo_id}`
//! - `weddings/{w}/albums/{a}/tokens/{token_id}`
//! - `weddings/{w}/albums/{a}/guest_progress/{guest_id}`
//! - `weddings/{w}/albums/{a}/hashes/{sha256}`
//!
//! Repositories only read documents and build [`Write`]s. Callers assemble
//! the writes of one transaction and hand them to [`DocumentStore::commit`]
//! so several documents change atomically.

mod album;
mod guest;
mod media_hash;
mod photo;
mod token;

pub use album::{album_to_fields, document_to_album, AlbumRepository};
pub use guest::{document_to_guest, guest_to_fields, GuestRepository};
pub use media_hash::{document_to_media_hash, media_hash_to_fields, MediaHashRepository};
pub use photo::{document_to_photo, photo_to_fields, PhotoRepository};
pub use token::{document_to_token, token_to_fields, TokenRepository};

use momentos_models::{AlbumId, WeddingId};

use crate::store::SharedStore;

/// A document value together with the `update_time` it was read at.
///
/// `update_time` is `None` for values that are not stored yet; writing such a
/// value uses an `exists=false` precondition.
#[derive(Debug, Clone)]
pub struct Versioned<T> {
    pub value: T,
    pub update_time: Option<String>,
}

impl<T> Versioned<T> {
    pub fn new(value: T, update_time: Option<String>) -> Self {
        Self { value, update_time }
    }

    /// A value that does not exist in the store yet.
    pub fn unsaved(value: T) -> Self {
        Self {
            value,
            update_time: None,
        }
    }

    pub fn is_stored(&self) -> bool {
        self.update_time.is_some()
    }
}

/// Addressing shared by every repository of one album.
#[derive(Clone)]
pub struct AlbumScope {
    pub store: SharedStore,
    pub wedding_id: WeddingId,
    pub album_id: AlbumId,
}

impl AlbumScope {
    pub fn new(store: SharedStore, wedding_id: WeddingId, album_id: AlbumId) -> Self {
        Self {
            store,
            wedding_id,
            album_id,
        }
    }

    /// `weddings/{w}/albums`
    pub fn albums_collection(&self) -> String {
        format!("weddings/{}/albums", self.wedding_id)
    }

    /// `weddings/{w}/albums/{a}`, parent of the album's subcollections.
    pub fn album_path(&self) -> String {
        format!("{}/{}", self.albums_collection(), self.album_id)
    }

    pub fn subcollection(&self, name: &str) -> String {
        format!("{}/{}", self.album_path(), name)
    }

    pub fn albums(&self) -> AlbumRepository {
        AlbumRepository::new(self.clone())
    }

    pub fn photos(&self) -> PhotoRepository {
        PhotoRepository::new(self.clone())
    }

    pub fn tokens(&self) -> TokenRepository {
        TokenRepository::new(self.clone())
    }

    pub fn guests(&self) -> GuestRepository {
        GuestRepository::new(self.clone())
    }

    pub fn hashes(&self) -> MediaHashRepository {
        MediaHashRepository::new(self.clone())
    }
}
