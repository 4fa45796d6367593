//! Shared fixtures for gallery integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use momentos_firestore::{AlbumScope, DocumentStore, MemoryStore, RetryConfig, Versioned};
use momentos_gallery::{Gallery, GalleryConfig, GalleryContext, IssueTokenRequest, UploadRequest};
use momentos_media::{ImageOptimizer, MediaError, MediaResult, OptimizeOptions, OptimizedImage};
use momentos_models::{Album, AlbumId, UploaderKind, WeddingId};
use momentos_storage::MemoryBlobStore;

/// Halves images and counts how often it was asked to.
#[derive(Default)]
pub struct CountingOptimizer {
    optimize_calls: AtomicUsize,
}

impl CountingOptimizer {
    pub fn optimize_calls(&self) -> usize {
        self.optimize_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageOptimizer for CountingOptimizer {
    async fn optimize(
        &self,
        bytes: &[u8],
        _options: OptimizeOptions,
    ) -> MediaResult<Option<OptimizedImage>> {
        self.optimize_calls.fetch_add(1, Ordering::SeqCst);
        Ok(Some(OptimizedImage {
            bytes: bytes[..bytes.len() / 2].to_vec(),
            width: 2560,
            height: 1707,
            content_type: "image/jpeg".to_string(),
        }))
    }

    async fn thumbnail(&self, bytes: &[u8]) -> MediaResult<OptimizedImage> {
        if bytes.is_empty() {
            return Err(MediaError::DecodeFailed("empty".into()));
        }
        Ok(OptimizedImage {
            bytes: vec![0xAB; 16],
            width: 640,
            height: 427,
            content_type: "image/jpeg".to_string(),
        })
    }

    fn dimensions(&self, _bytes: &[u8]) -> Option<(u32, u32)> {
        Some((4000, 3000))
    }
}

pub struct Harness {
    pub gallery: Arc<Gallery>,
    pub store: Arc<MemoryStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub optimizer: Arc<CountingOptimizer>,
    pub wedding_id: WeddingId,
    pub album_id: AlbumId,
}

pub fn test_config() -> GalleryConfig {
    GalleryConfig {
        share_base_url: "https://moments.test".to_string(),
        transaction_retry: RetryConfig {
            max_retries: 60,
            base_delay_ms: 2,
            max_delay_ms: 40,
        },
        ..GalleryConfig::default()
    }
}

pub fn harness() -> Harness {
    harness_with(MemoryBlobStore::new())
}

pub fn harness_with(blobs: MemoryBlobStore) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let blobs = Arc::new(blobs);
    let optimizer = Arc::new(CountingOptimizer::default());
    let ctx = GalleryContext::new(store.clone(), blobs.clone(), optimizer.clone(), test_config());
    Harness {
        gallery: Arc::new(Gallery::new(ctx)),
        store,
        blobs,
        optimizer,
        wedding_id: WeddingId::from("ana-leo"),
        album_id: AlbumId::default(),
    }
}

impl Harness {
    pub fn scope(&self) -> AlbumScope {
        self.gallery.context().scope(&self.wedding_id, &self.album_id)
    }

    pub fn photos_collection(&self) -> String {
        self.scope().subcollection("photos")
    }

    pub fn hashes_collection(&self) -> String {
        self.scope().subcollection("hashes")
    }

    /// Store the album with a custom compression threshold.
    pub async fn seed_album(&self, threshold_bytes: u64) -> Album {
        let scope = self.scope();
        let mut album = Versioned::unsaved(Album::new(
            self.wedding_id.clone(),
            self.album_id.clone(),
            Utc::now(),
        ));
        album.value.upload_window.compression_threshold_bytes = threshold_bytes;
        self.store
            .commit(vec![scope.albums().write(&album)])
            .await
            .unwrap();
        album.value
    }

    pub async fn album(&self) -> Album {
        self.gallery
            .albums
            .get_album(&self.wedding_id, &self.album_id)
            .await
            .unwrap()
            .expect("album stored")
    }

    pub async fn issue_token(&self, request: IssueTokenRequest) -> String {
        self.gallery
            .tokens
            .issue(&self.wedding_id, &self.album_id, request, Utc::now())
            .await
            .unwrap()
            .token
            .secret
    }

    pub fn host_upload(&self, bytes: Vec<u8>) -> UploadRequest {
        UploadRequest {
            uploader_kind: UploaderKind::Host,
            ..UploadRequest::new(self.wedding_id.clone(), self.album_id.clone(), bytes, "image/jpeg")
        }
    }

    pub fn guest_upload(&self, bytes: Vec<u8>, secret: &str) -> UploadRequest {
        UploadRequest {
            token_secret: Some(secret.to_string()),
            ..UploadRequest::new(self.wedding_id.clone(), self.album_id.clone(), bytes, "image/jpeg")
        }
    }
}

/// Distinct payload per seed.
pub fn image_bytes(seed: u32, len: usize) -> Vec<u8> {
    let mut bytes = vec![(seed % 251) as u8; len];
    let tag = seed.to_be_bytes();
    let n = tag.len().min(len);
    bytes[..n].copy_from_slice(&tag[..n]);
    bytes
}
