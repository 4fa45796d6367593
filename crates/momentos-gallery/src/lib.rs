//! Guest-contributed event gallery.
//!
//! This crate provides:
//! - Upload window and storage budget tracking ([`WindowManager`])
//! - Guest access tokens ([`TokenService`])
//! - The upload ingestion pipeline ([`IngestionPipeline`])
//! - Moderation and highlight scoring ([`ModerationEngine`], [`scoring`])
//! - Album settings, feeds and exports ([`AlbumService`])

pub mod albums;
pub mod config;
pub mod context;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod moderation;
pub mod scoring;
pub mod tokens;
pub mod window;

pub use albums::{
    summarize_by_scene, AlbumOverrides, AlbumService, DownloadLink, SceneSummary, SettingsPatch,
};
pub use config::GalleryConfig;
pub use context::GalleryContext;
pub use error::{GalleryError, GalleryResult};
pub use ingest::{IngestionPipeline, UploadRequest, AUTO_MODERATION_ACTOR, DEFAULT_SCENE};
pub use moderation::{Decision, ModerationEngine};
pub use scoring::HighlightScore;
pub use tokens::{IssueTokenRequest, IssuedToken, TokenService};
pub use window::{UploadState, WindowManager, WindowState};

/// All gallery services over one shared context.
pub struct Gallery {
    pub albums: AlbumService,
    pub windows: WindowManager,
    pub tokens: TokenService,
    pub ingest: IngestionPipeline,
    pub moderation: ModerationEngine,
    ctx: GalleryContext,
}

impl Gallery {
    pub fn new(ctx: GalleryContext) -> Self {
        Self {
            albums: AlbumService::new(ctx.clone()),
            windows: WindowManager::new(ctx.clone()),
            tokens: TokenService::new(ctx.clone()),
            ingest: IngestionPipeline::new(ctx.clone()),
            moderation: ModerationEngine::new(ctx.clone()),
            ctx,
        }
    }

    pub fn context(&self) -> &GalleryContext {
        &self.ctx
    }

    pub fn config(&self) -> &GalleryConfig {
        &self.ctx.config
    }
}
