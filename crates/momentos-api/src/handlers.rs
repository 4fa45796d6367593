//! Request handlers.

use serde::Deserialize;

use momentos_models::{AlbumId, PhotoId, TokenId, WeddingId};

pub mod albums;
pub mod health;
pub mod moderation;
pub mod photos;
pub mod tokens;
pub mod uploads;

pub use health::*;

/// `/weddings/:wedding_id/albums/:album_id`
#[derive(Debug, Deserialize)]
pub struct AlbumPath {
    pub wedding_id: WeddingId,
    pub album_id: AlbumId,
}

/// `/weddings/:wedding_id/albums/:album_id/photos/:photo_id`
#[derive(Debug, Deserialize)]
pub struct PhotoPath {
    pub wedding_id: WeddingId,
    pub album_id: AlbumId,
    pub photo_id: PhotoId,
}

/// `/weddings/:wedding_id/albums/:album_id/tokens/:token_id`
#[derive(Debug, Deserialize)]
pub struct TokenPath {
    pub wedding_id: WeddingId,
    pub album_id: AlbumId,
    pub token_id: TokenId,
}
