//! Application state.

use std::sync::Arc;

use tracing::{info, warn};

use momentos_firestore::{FirestoreClient, MemoryStore, SharedStore};
use momentos_gallery::{Gallery, GalleryConfig, GalleryContext};
use momentos_media::JpegOptimizer;
use momentos_storage::{MemoryBlobStore, R2Client, SharedBlobStore};

use crate::auth::JwtVerifier;
use crate::config::{ApiConfig, StoreBackend, DEV_JWT_SECRET};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub gallery: Arc<Gallery>,
    pub store: SharedStore,
    /// Set on the cloud backend, used by readiness checks.
    pub r2: Option<Arc<R2Client>>,
    pub jwt: Arc<JwtVerifier>,
}

impl AppState {
    /// Create new application state.
    pub async fn new(config: ApiConfig) -> anyhow::Result<Self> {
        if config.jwt_secret == DEV_JWT_SECRET {
            if config.is_production() {
                anyhow::bail!("JWT_SECRET must be set in production");
            }
            warn!("JWT_SECRET not set, using the development secret");
        }

        let (store, blobs, r2): (SharedStore, SharedBlobStore, Option<Arc<R2Client>>) =
            match config.store_backend {
                StoreBackend::Memory => {
                    info!("Using in-memory document and blob stores");
                    let store: SharedStore = Arc::new(MemoryStore::new());
                    let blobs: SharedBlobStore = Arc::new(MemoryBlobStore::new());
                    (store, blobs, None)
                }
                StoreBackend::Cloud => {
                    let store: SharedStore = Arc::new(FirestoreClient::from_env().await?);
                    let r2 = Arc::new(R2Client::from_env()?);
                    let blobs: SharedBlobStore = r2.clone();
                    (store, blobs, Some(r2))
                }
            };

        let ctx = GalleryContext::new(
            store.clone(),
            blobs,
            Arc::new(JpegOptimizer::new()),
            GalleryConfig::from_env(),
        );
        Ok(Self::from_parts(config, Gallery::new(ctx), r2))
    }

    /// Assemble state around an existing gallery.
    pub fn from_parts(config: ApiConfig, gallery: Gallery, r2: Option<Arc<R2Client>>) -> Self {
        let jwt = JwtVerifier::new(&config.jwt_secret, config.jwt_issuer.as_deref());
        Self {
            store: gallery.context().store.clone(),
            gallery: Arc::new(gallery),
            r2,
            jwt: Arc::new(jwt),
            config,
        }
    }
}
