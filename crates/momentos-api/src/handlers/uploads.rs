//! Multipart upload handler.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info};

use momentos_gallery::{GalleryError, UploadRequest};
use momentos_models::{Photo, PhotoId, PhotoStatus, UploaderIdentity, UploaderKind};
use momentos_storage::{CancelSignal, ProgressFn, UploadProgress};

use crate::auth::{GuestIdentity, HostUser};
use crate::error::{ApiError, ApiResult};
use crate::handlers::AlbumPath;
use crate::metrics;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub id: PhotoId,
    pub status: PhotoStatus,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub scene: Option<String>,
    pub compressed: bool,
}

impl From<Photo> for UploadResponse {
    fn from(photo: Photo) -> Self {
        Self {
            id: photo.id,
            status: photo.status,
            url: photo.url,
            thumbnail_url: photo.thumbnail_url,
            scene: photo.scene,
            compressed: photo.upload.compressed,
        }
    }
}

/// Accept one photo or video.
///
/// Multipart fields: `file` (required), `token` (guests), `scene`,
/// `labels` (comma separated, repeatable), `guest_name`, `source`,
/// `video_duration_secs`, `taken_at` (RFC 3339).
///
/// Signed-in hosts upload without a token. Uploads still running after the
/// configured timeout are cancelled and leave nothing behind.
pub async fn upload_photo(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    host: Option<HostUser>,
    GuestIdentity(guest): GuestIdentity,
    multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    if let Some(host) = &host {
        host.authorize(&path.wedding_id)?;
    }

    let mut request = read_upload(&path, multipart).await?;
    match host {
        Some(host) => {
            request.uploader_kind = UploaderKind::Host;
            request.uploader = UploaderIdentity::Known(host.uid);
        }
        None => {
            request.uploader_kind = UploaderKind::Guest;
            request.uploader = guest;
        }
    }

    let start = Instant::now();
    let size = request.bytes.len();
    let (cancel_tx, cancel) = CancelSignal::channel();
    let timeout = state.config.upload_timeout;
    let timer = tokio::spawn(async move {
        tokio::time::sleep(timeout).await;
        let _ = cancel_tx.send(true);
    });

    let progress: ProgressFn = Arc::new(|p: UploadProgress| {
        debug!(bytes_sent = p.bytes_sent, total_bytes = p.total_bytes, "Upload progress");
    });
    let result = state
        .gallery
        .ingest
        .ingest(request, Some(progress), &cancel, Utc::now())
        .await;
    timer.abort();

    let elapsed = start.elapsed().as_secs_f64();
    match result {
        Ok(photo) => {
            metrics::record_upload_duration("stored", elapsed);
            info!(
                wedding_id = %path.wedding_id,
                album_id = %path.album_id,
                photo_id = %photo.id,
                size,
                "Upload accepted"
            );
            Ok((StatusCode::CREATED, Json(UploadResponse::from(photo))))
        }
        Err(GalleryError::Cancelled) if cancel.is_cancelled() => {
            metrics::record_upload_duration("timeout", elapsed);
            metrics::record_upload_timeout();
            Err(ApiError::Timeout)
        }
        Err(e) => {
            metrics::record_upload_duration("failed", elapsed);
            Err(e.into())
        }
    }
}

async fn read_upload(path: &AlbumPath, mut multipart: Multipart) -> ApiResult<UploadRequest> {
    let mut request = UploadRequest::new(
        path.wedding_id.clone(),
        path.album_id.clone(),
        Vec::new(),
        "application/octet-stream",
    );
    let mut has_file = false;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if let Some(content_type) = field.content_type() {
                    request.content_type = content_type.to_string();
                }
                request.file_name = field.file_name().map(str::to_string);
                request.bytes = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::bad_request(format!("Failed to read file: {}", e)))?
                    .to_vec();
                has_file = true;
            }
            "token" => request.token_secret = non_empty(text(field).await?),
            "scene" => request.scene = non_empty(text(field).await?),
            "labels" => request.labels.extend(
                text(field)
                    .await?
                    .split(',')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string),
            ),
            "guest_name" => request.guest_name = non_empty(text(field).await?),
            "source" => request.source = non_empty(text(field).await?),
            "video_duration_secs" => {
                let raw = text(field).await?;
                let secs: f64 = raw
                    .trim()
                    .parse()
                    .map_err(|_| ApiError::bad_request("video_duration_secs must be a number"))?;
                request.video_duration_secs = Some(secs);
            }
            "taken_at" => {
                let raw = text(field).await?;
                let taken_at = DateTime::parse_from_rfc3339(raw.trim())
                    .map_err(|_| ApiError::bad_request("taken_at must be an RFC 3339 timestamp"))?;
                request.taken_at = Some(taken_at.with_timezone(&Utc));
            }
            other => debug!(field = other, "Ignoring unknown multipart field"),
        }
    }

    if !has_file {
        return Err(ApiError::bad_request("Missing file field"));
    }
    Ok(request)
}

async fn text(field: Field<'_>) -> ApiResult<String> {
    field
        .text()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart field: {}", e)))
}

fn non_empty(s: String) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}
