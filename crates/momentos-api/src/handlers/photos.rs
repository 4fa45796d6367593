//! Photo feed and guest gallery handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use momentos_models::{Album, GuestContribution, Photo, PhotoId, PhotoStatus};

use crate::auth::HostUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{AlbumPath, PhotoPath};
use crate::state::AppState;

const DEFAULT_PAGE_SIZE: u32 = 50;
const MAX_PAGE_SIZE: u32 = 200;

#[derive(Debug, Default, Deserialize)]
pub struct ListPhotosQuery {
    pub status: Option<PhotoStatus>,
    pub limit: Option<u32>,
}

impl ListPhotosQuery {
    fn page_size(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE)
    }
}

/// Host feed, any status.
pub async fn list_photos(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    Query(query): Query<ListPhotosQuery>,
    user: HostUser,
) -> ApiResult<Json<Vec<Photo>>> {
    user.authorize(&path.wedding_id)?;
    let photos = state
        .gallery
        .albums
        .list_photos(&path.wedding_id, &path.album_id, query.status, query.page_size())
        .await?;
    Ok(Json(photos))
}

pub async fn get_photo(
    State(state): State<AppState>,
    Path(path): Path<PhotoPath>,
    user: HostUser,
) -> ApiResult<Json<Photo>> {
    user.authorize(&path.wedding_id)?;
    let photo = state
        .gallery
        .albums
        .get_photo(&path.wedding_id, &path.album_id, &path.photo_id)
        .await?;
    Ok(Json(photo))
}

/// What guests see of a photo. Uploader ids stay private.
#[derive(Debug, Serialize)]
pub struct GuestPhoto {
    pub id: PhotoId,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub scene: Option<String>,
    pub labels: Vec<String>,
    pub guest_name: Option<String>,
    pub reactions: u64,
    pub highlight_score: f64,
    pub created_at: DateTime<Utc>,
}

impl From<Photo> for GuestPhoto {
    fn from(photo: Photo) -> Self {
        Self {
            reactions: photo.total_reactions(),
            highlight_score: photo.highlight_score(),
            id: photo.id,
            url: photo.url,
            thumbnail_url: photo.thumbnail_url,
            scene: photo.scene,
            labels: photo.labels,
            guest_name: photo.guest_name,
            created_at: photo.created_at,
        }
    }
}

async fn require_guest_gallery(state: &AppState, path: &AlbumPath) -> ApiResult<Album> {
    let album = state
        .gallery
        .albums
        .get_album(&path.wedding_id, &path.album_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Album {} not found", path.album_id)))?;
    if !album.settings.allow_guest_gallery {
        return Err(ApiError::forbidden("The guest gallery is not enabled for this album"));
    }
    Ok(album)
}

/// Approved photos for guests.
pub async fn guest_feed(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    Query(query): Query<ListPhotosQuery>,
) -> ApiResult<Json<Vec<GuestPhoto>>> {
    require_guest_gallery(&state, &path).await?;
    let photos = state
        .gallery
        .albums
        .list_photos(
            &path.wedding_id,
            &path.album_id,
            Some(PhotoStatus::Approved),
            query.page_size(),
        )
        .await?;
    Ok(Json(photos.into_iter().map(GuestPhoto::from).collect()))
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub limit: Option<u32>,
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    Query(query): Query<LeaderboardQuery>,
) -> ApiResult<Json<Vec<GuestContribution>>> {
    require_guest_gallery(&state, &path).await?;
    let limit = query.limit.unwrap_or(10).clamp(1, 100);
    let entries = state
        .gallery
        .albums
        .guest_leaderboard(&path.wedding_id, &path.album_id, limit)
        .await?;
    Ok(Json(entries))
}

#[derive(Debug, Deserialize)]
pub struct ReactionRequest {
    pub reaction: String,
    #[serde(default = "default_delta")]
    pub delta: i64,
}

fn default_delta() -> i64 {
    1
}

#[derive(Serialize)]
pub struct ReactionResponse {
    pub id: PhotoId,
    pub reactions: std::collections::BTreeMap<String, u64>,
    pub highlight_score: f64,
}

/// Guests add or take back one reaction on an approved photo.
pub async fn react(
    State(state): State<AppState>,
    Path(path): Path<PhotoPath>,
    Json(request): Json<ReactionRequest>,
) -> ApiResult<Json<ReactionResponse>> {
    if request.delta != 1 && request.delta != -1 {
        return Err(ApiError::bad_request("delta must be 1 or -1"));
    }

    let albums = &state.gallery.albums;
    let photo = albums
        .get_photo(&path.wedding_id, &path.album_id, &path.photo_id)
        .await?;
    if photo.status != PhotoStatus::Approved || photo.is_removed() {
        return Err(ApiError::not_found(format!("Photo {} not found", path.photo_id)));
    }

    let photo = albums
        .react(
            &path.wedding_id,
            &path.album_id,
            &path.photo_id,
            &request.reaction,
            request.delta,
        )
        .await?;
    Ok(Json(ReactionResponse {
        highlight_score: photo.highlight_score(),
        id: photo.id,
        reactions: photo.reactions,
    }))
}

#[derive(Debug, Deserialize)]
pub struct LabelsRequest {
    pub labels: Vec<String>,
}

pub async fn update_labels(
    State(state): State<AppState>,
    Path(path): Path<PhotoPath>,
    user: HostUser,
    Json(request): Json<LabelsRequest>,
) -> ApiResult<Json<Photo>> {
    user.authorize(&path.wedding_id)?;
    let photo = state
        .gallery
        .albums
        .update_labels(&path.wedding_id, &path.album_id, &path.photo_id, request.labels)
        .await?;
    Ok(Json(photo))
}

/// Hide a photo from every feed. Media and counters are kept.
pub async fn remove_photo(
    State(state): State<AppState>,
    Path(path): Path<PhotoPath>,
    user: HostUser,
) -> ApiResult<StatusCode> {
    user.authorize(&path.wedding_id)?;
    state
        .gallery
        .albums
        .soft_remove(&path.wedding_id, &path.album_id, &path.photo_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
