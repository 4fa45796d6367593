//! Shared handles used by every gallery service.

use std::sync::Arc;

use momentos_firestore::{AlbumScope, SharedStore};
use momentos_media::ImageOptimizer;
use momentos_models::{AlbumId, WeddingId};
use momentos_storage::SharedBlobStore;

use crate::config::GalleryConfig;

#[derive(Clone)]
pub struct GalleryContext {
    pub store: SharedStore,
    pub blobs: SharedBlobStore,
    pub optimizer: Arc<dyn ImageOptimizer>,
    pub config: Arc<GalleryConfig>,
}

impl GalleryContext {
    pub fn new(
        store: SharedStore,
        blobs: SharedBlobStore,
        optimizer: Arc<dyn ImageOptimizer>,
        config: GalleryConfig,
    ) -> Self {
        Self {
            store,
            blobs,
            optimizer,
            config: Arc::new(config),
        }
    }

    pub fn scope(&self, wedding_id: &WeddingId, album_id: &AlbumId) -> AlbumScope {
        AlbumScope::new(self.store.clone(), wedding_id.clone(), album_id.clone())
    }
}
