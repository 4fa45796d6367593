//! Ingestion pipeline.
//!
//! Validates an upload against the album window and the guest token, decides
//! whether it must be recompressed, stores a single blob (plus a thumbnail
//! for images) and records the photo, the album counters, the content hash,
//! the token usage and the guest ledger in one commit.
//!
//! The content hash is reserved before any bytes are stored and released on
//! every failure after that, so a cancelled or failed upload never blocks a
//! retry of the same file.

use std::time::Instant;

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use momentos_firestore::{with_conflict_retry, AlbumScope, FirestoreError, Versioned};
use momentos_media::OptimizeOptions;
use momentos_models::{
    AlbumId, GuestContribution, MediaHash, MediaKind, ModerationMode, Photo, PhotoId, PhotoStatus,
    StoragePaths, TokenId, UploadInfo, UploaderIdentity, UploaderKind, WeddingId,
};
use momentos_storage::{CancelSignal, ProgressFn, StorageError};

use crate::albums::load_album;
use crate::context::GalleryContext;
use crate::error::{GalleryError, GalleryResult};
use crate::metrics;
use crate::moderation::{Decision, ModerationEngine};
use crate::tokens::{record_usage, TokenService};
use crate::window::{resolve_window, WindowManager};

/// Scene recorded for uploads without one.
pub const DEFAULT_SCENE: &str = "other";

/// Actor recorded on photos approved without a host.
pub const AUTO_MODERATION_ACTOR: &str = "auto-moderation";

const DEFAULT_SOURCE: &str = "web";

/// One file submitted to an album.
#[derive(Debug, Clone)]
pub struct UploadRequest {
    pub wedding_id: WeddingId,
    pub album_id: AlbumId,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub file_name: Option<String>,
    pub scene: Option<String>,
    pub labels: Vec<String>,
    pub uploader_kind: UploaderKind,
    pub uploader: UploaderIdentity,
    pub guest_name: Option<String>,
    pub source: Option<String>,
    /// Required for guest uploads.
    pub token_secret: Option<String>,
    pub video_duration_secs: Option<f64>,
    pub taken_at: Option<DateTime<Utc>>,
    /// Set by the content checker; flagged uploads always wait for a host.
    pub flagged: bool,
}

impl UploadRequest {
    /// Anonymous guest upload with no metadata.
    pub fn new(
        wedding_id: WeddingId,
        album_id: AlbumId,
        bytes: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            wedding_id,
            album_id,
            bytes,
            content_type: content_type.into(),
            file_name: None,
            scene: None,
            labels: Vec::new(),
            uploader_kind: UploaderKind::Guest,
            uploader: UploaderIdentity::Anonymous,
            guest_name: None,
            source: None,
            token_secret: None,
            video_duration_secs: None,
            taken_at: None,
            flagged: false,
        }
    }
}

/// Everything decided before bytes are stored.
struct Plan {
    photo_id: PhotoId,
    media_kind: MediaKind,
    scene: Option<String>,
    labels: Vec<String>,
    token_id: Option<TokenId>,
    compress: bool,
    over_budget: bool,
    threshold_bytes: u64,
    hash: String,
    moderation_mode: ModerationMode,
}

/// Side effects of the metadata commit reported after it lands.
struct Recorded {
    compression_latched: bool,
    token_exhausted: bool,
    badges: Vec<String>,
}

struct StoredMedia {
    key: String,
    url: String,
    content_type: String,
    size: u64,
    compressed: bool,
    dimensions: Option<(u32, u32)>,
    thumbnail: Option<(String, String, u64)>,
}

impl StoredMedia {
    fn keys(&self) -> Vec<String> {
        let mut keys = vec![self.key.clone()];
        if let Some((key, _, _)) = &self.thumbnail {
            keys.push(key.clone());
        }
        keys
    }
}

pub struct IngestionPipeline {
    ctx: GalleryContext,
    windows: WindowManager,
    tokens: TokenService,
    moderation: ModerationEngine,
}

impl IngestionPipeline {
    pub fn new(ctx: GalleryContext) -> Self {
        Self {
            windows: WindowManager::new(ctx.clone()),
            tokens: TokenService::new(ctx.clone()),
            moderation: ModerationEngine::new(ctx.clone()),
            ctx,
        }
    }

    /// Ingest one upload and return the stored photo.
    ///
    /// `progress` observes the main blob transfer. Triggering `cancel` before
    /// the metadata commit aborts the upload without recording anything.
    pub async fn ingest(
        &self,
        request: UploadRequest,
        progress: Option<ProgressFn>,
        cancel: &CancelSignal,
        now: DateTime<Utc>,
    ) -> GalleryResult<Photo> {
        let start = Instant::now();
        let wedding_id = request.wedding_id.clone();
        let album_id = request.album_id.clone();

        match self.ingest_inner(request, progress, cancel, now).await {
            Ok(photo) => {
                metrics::record_upload(
                    photo.uploader_kind.as_str(),
                    photo.media_kind.as_str(),
                    photo.upload.original_size_bytes,
                );
                info!(
                    wedding_id = %wedding_id,
                    album_id = %album_id,
                    photo_id = %photo.id,
                    status = %photo.status,
                    compressed = photo.upload.compressed,
                    original_bytes = photo.upload.original_size_bytes,
                    stored_bytes = photo.upload.stored_size_bytes,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Upload ingested"
                );
                Ok(photo)
            }
            Err(e) => {
                metrics::record_upload_failure(failure_reason(&e));
                if e.is_validation() || matches!(e, GalleryError::Cancelled) {
                    info!(wedding_id = %wedding_id, album_id = %album_id, error = %e, "Upload refused");
                } else {
                    warn!(wedding_id = %wedding_id, album_id = %album_id, error = %e, "Upload failed");
                }
                Err(e)
            }
        }
    }

    async fn ingest_inner(
        &self,
        request: UploadRequest,
        progress: Option<ProgressFn>,
        cancel: &CancelSignal,
        now: DateTime<Utc>,
    ) -> GalleryResult<Photo> {
        let size = request.bytes.len() as u64;
        if size == 0 {
            return Err(GalleryError::invalid_input("file is empty"));
        }
        let media_kind = media_kind_for(&request.content_type)?;

        let album = self
            .windows
            .observe(&request.wedding_id, &request.album_id, now)
            .await?;
        let window = resolve_window(&album);
        if window.is_closed(now) {
            return Err(GalleryError::WindowClosed);
        }
        if size > album.settings.max_file_size_bytes() {
            return Err(GalleryError::invalid_input(format!(
                "file exceeds the {} MB limit",
                album.settings.max_file_size_mb
            )));
        }

        let scene = request
            .scene
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if let Some(scene) = &scene {
            if album.settings.scene(scene).is_none() {
                return Err(GalleryError::invalid_input(format!("unknown scene: {}", scene)));
            }
        }

        let secret = request.token_secret.as_deref().filter(|s| !s.trim().is_empty());
        let token = match secret {
            Some(secret) => Some(
                self.tokens
                    .validate(&request.wedding_id, &request.album_id, secret, now)
                    .await?,
            ),
            None if request.uploader_kind == UploaderKind::Guest => {
                return Err(GalleryError::TokenNotFound)
            }
            None => None,
        };
        if let Some(token) = &token {
            if !token.allows_scene(scene.as_deref()) {
                return Err(GalleryError::SceneNotAllowed {
                    allowed: token.scene_targets.join(", "),
                });
            }
        }

        let compress = window.should_compress(album.counters.total_bytes, size);
        if media_kind == MediaKind::Video && compress {
            let max_secs = self.ctx.config.max_video_secs_when_compressing;
            if request.video_duration_secs.is_some_and(|d| d > max_secs as f64) {
                return Err(GalleryError::VideoTooLong { max_secs });
            }
        }

        if cancel.is_cancelled() {
            return Err(GalleryError::Cancelled);
        }

        let plan = Plan {
            photo_id: PhotoId::new(),
            media_kind,
            labels: build_labels(scene.as_deref(), &request.labels),
            scene,
            token_id: token.map(|t| t.id),
            compress,
            over_budget: album.counters.total_bytes >= window.threshold_bytes,
            threshold_bytes: window.threshold_bytes,
            hash: content_hash(&request.bytes),
            moderation_mode: album.settings.moderation_mode,
        };

        let scope = self.ctx.scope(&request.wedding_id, &request.album_id);
        self.reserve_hash(&scope, &plan.hash, request.file_name.clone(), now)
            .await?;

        let result = self
            .store_and_record(&scope, request, &plan, progress, cancel, now)
            .await;
        if result.is_err() {
            self.release_hash(&scope, &plan.hash).await;
        }
        let mut photo = result?;

        if plan.moderation_mode == ModerationMode::Auto && !photo.flagged {
            match self
                .moderation
                .approve(
                    &scope.wedding_id,
                    &scope.album_id,
                    &photo.id,
                    Decision::by(AUTO_MODERATION_ACTOR),
                    now,
                )
                .await
            {
                Ok(approved) => photo = approved,
                Err(e) => warn!(photo_id = %photo.id, error = %e, "Auto-moderation failed, photo left pending"),
            }
        }

        Ok(photo)
    }

    async fn store_and_record(
        &self,
        scope: &AlbumScope,
        request: UploadRequest,
        plan: &Plan,
        progress: Option<ProgressFn>,
        cancel: &CancelSignal,
        now: DateTime<Utc>,
    ) -> GalleryResult<Photo> {
        let original_size = request.bytes.len() as u64;
        let stored = self
            .store_media(scope, &request, plan, progress, cancel)
            .await?;

        if cancel.is_cancelled() {
            self.delete_blobs(&stored.keys()).await;
            return Err(GalleryError::Cancelled);
        }

        let photo = Photo {
            id: plan.photo_id.clone(),
            wedding_id: scope.wedding_id.clone(),
            album_id: scope.album_id.clone(),
            uploader_kind: request.uploader_kind,
            uploader: request.uploader,
            guest_name: request
                .guest_name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            source: request
                .source
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            media_kind: plan.media_kind,
            scene: plan.scene.clone(),
            labels: plan.labels.clone(),
            status: PhotoStatus::Pending,
            flagged: request.flagged,
            storage: StoragePaths {
                original: stored.key.clone(),
                optimized: stored.key.clone(),
                thumbnail: stored.thumbnail.as_ref().map(|(key, _, _)| key.clone()),
            },
            url: stored.url.clone(),
            thumbnail_url: stored.thumbnail.as_ref().map(|(_, url, _)| url.clone()),
            width: stored.dimensions.map(|(w, _)| w),
            height: stored.dimensions.map(|(_, h)| h),
            taken_at: request.taken_at,
            reactions: Default::default(),
            highlight: None,
            rejection: None,
            upload: UploadInfo {
                original_size_bytes: original_size,
                stored_size_bytes: stored.size,
                thumbnail_size_bytes: stored.thumbnail.as_ref().map(|(_, _, size)| *size),
                original_content_type: request.content_type,
                stored_content_type: stored.content_type.clone(),
                compressed: stored.compressed,
                compression_threshold_bytes: plan.threshold_bytes,
                content_hash: Some(plan.hash.clone()),
                video_duration_secs: request.video_duration_secs,
                file_name: request.file_name,
            },
            token_id: plan.token_id.clone(),
            approved_at: None,
            removed_at: None,
            created_at: now,
            updated_at: now,
        };

        let recorded = with_conflict_retry(&self.ctx.config.transaction_retry, "ingest.record", |_| {
            self.record_once(scope, &photo, plan, now)
        })
        .await;

        let recorded = match recorded {
            Ok(recorded) => recorded,
            Err(e) => {
                self.delete_blobs(&stored.keys()).await;
                return Err(e.into_metadata_failure());
            }
        };

        if recorded.compression_latched {
            metrics::record_compression_latched();
            info!(
                wedding_id = %scope.wedding_id,
                album_id = %scope.album_id,
                threshold_bytes = plan.threshold_bytes,
                "Storage budget reached, compression enabled"
            );
        }
        if recorded.token_exhausted {
            if let Some(token_id) = &plan.token_id {
                info!(album_id = %scope.album_id, token_id = %token_id, "Access token usage limit reached");
            }
        }
        if !recorded.badges.is_empty() {
            metrics::record_badges(recorded.badges.len());
            info!(
                album_id = %scope.album_id,
                guest_id = ?photo.uploader.id(),
                badges = ?recorded.badges,
                "Badges granted"
            );
        }

        Ok(photo)
    }

    /// Optimize when required and upload the blob and its thumbnail.
    async fn store_media(
        &self,
        scope: &AlbumScope,
        request: &UploadRequest,
        plan: &Plan,
        progress: Option<ProgressFn>,
        cancel: &CancelSignal,
    ) -> GalleryResult<StoredMedia> {
        let optimizer = &self.ctx.optimizer;
        let is_image = plan.media_kind == MediaKind::Image;

        let thumbnail = if is_image {
            match optimizer.thumbnail(&request.bytes).await {
                Ok(thumb) => Some(thumb),
                Err(e) => {
                    debug!(photo_id = %plan.photo_id, error = %e, "Thumbnail skipped");
                    None
                }
            }
        } else {
            None
        };

        let optimized = if is_image && plan.compress {
            let options = if plan.over_budget {
                OptimizeOptions::OVER_BUDGET
            } else {
                OptimizeOptions::STANDARD
            };
            match optimizer.optimize(&request.bytes, options).await {
                Ok(optimized) => optimized,
                Err(e) => {
                    warn!(photo_id = %plan.photo_id, error = %e, "Optimization failed, storing original");
                    None
                }
            }
        } else {
            None
        };

        let prefix = format!(
            "weddings/{}/albums/{}/photos/{}",
            scope.wedding_id, scope.album_id, plan.photo_id
        );
        let (key, bytes, content_type, dimensions, compressed) = match optimized {
            Some(image) => (
                format!("{}/optimized.jpg", prefix),
                image.bytes,
                image.content_type,
                Some((image.width, image.height)),
                true,
            ),
            None => (
                format!(
                    "{}/original.{}",
                    prefix,
                    extension_for(&request.content_type, request.file_name.as_deref())
                ),
                request.bytes.clone(),
                request.content_type.clone(),
                if is_image {
                    optimizer.dimensions(&request.bytes)
                } else {
                    None
                },
                false,
            ),
        };
        let size = bytes.len() as u64;

        let url = self
            .ctx
            .blobs
            .put(&key, bytes, &content_type, progress, cancel)
            .await
            .map_err(storage_error)?;

        let thumbnail = match thumbnail {
            Some(thumb) => {
                let thumb_key = format!("{}/thumb.jpg", prefix);
                let thumb_size = thumb.size();
                match self
                    .ctx
                    .blobs
                    .put(&thumb_key, thumb.bytes, &thumb.content_type, None, cancel)
                    .await
                {
                    Ok(thumb_url) => Some((thumb_key, thumb_url, thumb_size)),
                    Err(e) if e.is_cancelled() => {
                        self.delete_blobs(&[key]).await;
                        return Err(GalleryError::Cancelled);
                    }
                    Err(e) => {
                        warn!(photo_id = %plan.photo_id, error = %e, "Thumbnail upload failed");
                        None
                    }
                }
            }
            None => None,
        };

        Ok(StoredMedia {
            key,
            url,
            content_type,
            size,
            compressed,
            dimensions,
            thumbnail,
        })
    }

    /// Photo, album counters, hash activation, token usage and guest ledger in one commit.
    async fn record_once(
        &self,
        scope: &AlbumScope,
        photo: &Photo,
        plan: &Plan,
        now: DateTime<Utc>,
    ) -> GalleryResult<Recorded> {
        let mut album = load_album(scope, now).await?;
        let window = resolve_window(&album.value);
        if window.is_closed(now) {
            return Err(GalleryError::WindowClosed);
        }

        let counters = &mut album.value.counters;
        counters.record_upload(photo.upload.original_size_bytes, photo.upload.stored_size_bytes);
        let over_threshold = counters.total_bytes >= window.threshold_bytes;
        let compression_latched = (plan.compress || over_threshold)
            && album.value.upload_window.latch_compression(now);

        let mut writes = vec![
            scope.photos().write(&Versioned::unsaved(photo.clone())),
            scope.hashes().activate(&plan.hash, &photo.id, now),
        ];

        // The token is charged in the same commit, so concurrent uploads
        // cannot push it past its usage cap.
        let mut token_exhausted = false;
        if let Some(token_id) = &plan.token_id {
            let mut token = scope
                .tokens()
                .get(token_id)
                .await?
                .ok_or(GalleryError::TokenNotFound)?;
            token_exhausted = record_usage(&mut token.value, now)?;
            writes.push(scope.tokens().write(&token));
        }

        let mut badges = Vec::new();
        if let (UploaderKind::Guest, UploaderIdentity::Known(guest_id)) =
            (photo.uploader_kind, &photo.uploader)
        {
            let mut guest = match scope.guests().get(guest_id).await? {
                Some(mut guest) => {
                    if let Some(name) = &photo.guest_name {
                        guest.value.display_name = name.clone();
                    }
                    guest
                }
                None => {
                    album.value.counters.guest_contributors += 1;
                    Versioned::unsaved(GuestContribution::new(
                        guest_id.clone(),
                        photo.guest_name.clone(),
                    ))
                }
            };
            let scene = photo.scene.as_deref().unwrap_or(DEFAULT_SCENE);
            badges = guest
                .value
                .record_upload(scene, &self.ctx.config.badge_rules, now);
            album.value.counters.badges_granted += badges.len() as u64;
            writes.push(scope.guests().write(&guest));
        }

        album.value.updated_at = now;
        writes.push(scope.albums().write(&album));
        scope.store.commit(writes).await?;

        Ok(Recorded {
            compression_latched,
            token_exhausted,
            badges,
        })
    }

    async fn reserve_hash(
        &self,
        scope: &AlbumScope,
        hash: &str,
        file_name: Option<String>,
        now: DateTime<Utc>,
    ) -> GalleryResult<()> {
        let reservation = MediaHash::reserve(hash, file_name, now);
        match scope.store.commit(vec![scope.hashes().reserve(&reservation)]).await {
            Ok(_) => Ok(()),
            Err(FirestoreError::AlreadyExists(_)) => Err(GalleryError::DuplicatePhoto),
            Err(e) => Err(e.into()),
        }
    }

    async fn release_hash(&self, scope: &AlbumScope, hash: &str) {
        if let Err(e) = scope.store.commit(vec![scope.hashes().release(hash)]).await {
            warn!(album_id = %scope.album_id, hash, error = %e, "Failed to release content hash");
        }
    }

    async fn delete_blobs(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.ctx.blobs.delete(key).await {
                warn!(key = %key, error = %e, "Failed to delete orphaned blob");
            }
        }
    }
}

fn storage_error(e: StorageError) -> GalleryError {
    if e.is_cancelled() {
        GalleryError::Cancelled
    } else {
        GalleryError::Storage(e)
    }
}

fn media_kind_for(content_type: &str) -> GalleryResult<MediaKind> {
    let content_type = content_type.trim().to_ascii_lowercase();
    if content_type.starts_with("image/") || content_type.starts_with("video/") {
        Ok(MediaKind::from_content_type(&content_type))
    } else {
        Err(GalleryError::invalid_input(format!(
            "unsupported content type: {}",
            content_type
        )))
    }
}

/// Scene first, then the caller's labels, without blanks or duplicates.
pub fn build_labels(scene: Option<&str>, labels: &[String]) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(labels.len() + 1);
    let candidates = std::iter::once(scene.unwrap_or(DEFAULT_SCENE))
        .chain(labels.iter().map(String::as_str))
        .map(str::trim)
        .filter(|l| !l.is_empty());
    for label in candidates {
        if !out.iter().any(|l| l == label) {
            out.push(label.to_string());
        }
    }
    out
}

/// Hex SHA-256 of the uploaded bytes.
pub fn content_hash(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

fn extension_for(content_type: &str, file_name: Option<&str>) -> String {
    let known = match content_type.trim().to_ascii_lowercase().as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        "image/heif" => Some("heif"),
        "video/mp4" => Some("mp4"),
        "video/quicktime" => Some("mov"),
        "video/webm" => Some("webm"),
        _ => None,
    };
    if let Some(ext) = known {
        return ext.to_string();
    }
    file_name
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or_else(|| "bin".to_string())
}

fn failure_reason(e: &GalleryError) -> &'static str {
    match e {
        GalleryError::WindowClosed => "window_closed",
        GalleryError::TokenNotFound
        | GalleryError::TokenInactive
        | GalleryError::TokenExpired
        | GalleryError::TokenUsageExceeded => "token",
        GalleryError::SceneNotAllowed { .. } => "scene_not_allowed",
        GalleryError::DuplicatePhoto => "duplicate",
        GalleryError::VideoTooLong { .. } => "video_too_long",
        GalleryError::InvalidInput(_) => "invalid_input",
        GalleryError::Cancelled => "cancelled",
        GalleryError::MetadataWriteFailed(_) => "metadata",
        GalleryError::Storage(_) => "storage",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_labels() {
        let labels = build_labels(
            Some("party"),
            &["dance".to_string(), " party ".to_string(), "".to_string(), "dance".to_string()],
        );
        assert_eq!(labels, vec!["party", "dance"]);
        assert_eq!(build_labels(None, &[]), vec![DEFAULT_SCENE]);
    }

    #[test]
    fn test_content_hash() {
        assert_eq!(
            content_hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_extension_for() {
        assert_eq!(extension_for("image/jpeg", None), "jpg");
        assert_eq!(extension_for("video/quicktime", Some("clip.MOV")), "mov");
        assert_eq!(extension_for("image/x-raw", Some("IMG_01.DNG")), "dng");
        assert_eq!(extension_for("image/x-raw", Some("noext")), "bin");
    }

    #[test]
    fn test_media_kind_for() {
        assert_eq!(media_kind_for("image/png").unwrap(), MediaKind::Image);
        assert_eq!(media_kind_for("Video/MP4").unwrap(), MediaKind::Video);
        assert!(matches!(
            media_kind_for("application/pdf"),
            Err(GalleryError::InvalidInput(_))
        ));
    }
}
