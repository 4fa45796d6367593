//! Album API handlers.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use momentos_gallery::{
    summarize_by_scene, AlbumOverrides, DownloadLink, SceneSummary, SettingsPatch, UploadState,
};
use momentos_models::{Album, AlbumSettings, PhotoStatus};

use crate::auth::HostUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::AlbumPath;
use crate::state::AppState;

/// Photos considered by the scene summary.
const SUMMARY_SCAN_LIMIT: u32 = 1000;

/// Create the album on first use; existing albums are returned unchanged.
pub async fn ensure_album(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    user: HostUser,
    Json(overrides): Json<AlbumOverrides>,
) -> ApiResult<Json<Album>> {
    user.authorize(&path.wedding_id)?;
    let album = state
        .gallery
        .albums
        .ensure_album(&path.wedding_id, &path.album_id, overrides)
        .await?;
    Ok(Json(album))
}

pub async fn get_album(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    user: HostUser,
) -> ApiResult<Json<Album>> {
    user.authorize(&path.wedding_id)?;
    state
        .gallery
        .albums
        .get_album(&path.wedding_id, &path.album_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("Album {} not found", path.album_id)))
}

pub async fn update_settings(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    user: HostUser,
    Json(patch): Json<SettingsPatch>,
) -> ApiResult<Json<AlbumSettings>> {
    user.authorize(&path.wedding_id)?;
    let settings = state
        .gallery
        .albums
        .update_settings(&path.wedding_id, &path.album_id, patch)
        .await?;
    Ok(Json(settings))
}

pub async fn archive_album(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    user: HostUser,
) -> ApiResult<Json<Album>> {
    user.authorize(&path.wedding_id)?;
    let album = state
        .gallery
        .albums
        .archive_album(&path.wedding_id, &path.album_id)
        .await?;
    Ok(Json(album))
}

/// Event date update pushed by the wedding service.
#[derive(Debug, Deserialize)]
pub struct EventDateRequest {
    pub event_date: Option<DateTime<Utc>>,
}

pub async fn set_event_date(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    user: HostUser,
    Json(request): Json<EventDateRequest>,
) -> ApiResult<Json<Album>> {
    user.authorize(&path.wedding_id)?;
    let album = state
        .gallery
        .windows
        .sync_event_date(&path.wedding_id, &path.album_id, request.event_date, Utc::now())
        .await?;
    Ok(Json(album))
}

pub async fn close_window(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    user: HostUser,
) -> ApiResult<Json<Album>> {
    user.authorize(&path.wedding_id)?;
    let album = state
        .gallery
        .windows
        .close_window(&path.wedding_id, &path.album_id, Utc::now())
        .await?;
    Ok(Json(album))
}

/// Countdown and storage budget. Public so the guest page can show it.
pub async fn upload_state(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
) -> ApiResult<Json<UploadState>> {
    let upload_state = state
        .gallery
        .windows
        .state(&path.wedding_id, &path.album_id, Utc::now())
        .await?;
    Ok(Json(upload_state))
}

pub async fn scene_summary(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    user: HostUser,
) -> ApiResult<Json<SceneSummary>> {
    user.authorize(&path.wedding_id)?;
    let photos = state
        .gallery
        .albums
        .list_photos(&path.wedding_id, &path.album_id, None, SUMMARY_SCAN_LIMIT)
        .await?;
    Ok(Json(summarize_by_scene(&photos)))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    pub status: Option<PhotoStatus>,
}

#[derive(Serialize)]
pub struct ExportResponse {
    pub status: PhotoStatus,
    pub count: usize,
    pub links: Vec<DownloadLink>,
}

/// Bulk download links, approved photos unless asked otherwise.
pub async fn export_links(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    Query(query): Query<ExportQuery>,
    user: HostUser,
) -> ApiResult<Json<ExportResponse>> {
    user.authorize(&path.wedding_id)?;
    let status = query.status.unwrap_or(PhotoStatus::Approved);
    let links = state
        .gallery
        .albums
        .export_download_links(&path.wedding_id, &path.album_id, status)
        .await?;
    Ok(Json(ExportResponse {
        status,
        count: links.len(),
        links,
    }))
}
