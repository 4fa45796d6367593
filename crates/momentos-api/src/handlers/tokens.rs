//! Guest link handlers.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use momentos_gallery::{IssueTokenRequest, IssuedToken};
use momentos_models::{AccessToken, Scene, TokenKind};

use crate::auth::HostUser;
use crate::error::{ApiError, ApiResult};
use crate::handlers::{AlbumPath, TokenPath};
use crate::state::AppState;

/// Issue a guest link. The QR code of the album follows the newest link.
pub async fn issue_token(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    user: HostUser,
    Json(mut request): Json<IssueTokenRequest>,
) -> ApiResult<(StatusCode, Json<IssuedToken>)> {
    user.authorize(&path.wedding_id)?;
    if request.created_by.is_none() {
        request.created_by = Some(user.uid);
    }
    let issued = state
        .gallery
        .tokens
        .issue(&path.wedding_id, &path.album_id, request, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(issued)))
}

#[derive(Debug, Deserialize)]
pub struct ListTokensQuery {
    pub limit: Option<u32>,
}

pub async fn list_tokens(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    Query(query): Query<ListTokensQuery>,
    user: HostUser,
) -> ApiResult<Json<Vec<AccessToken>>> {
    user.authorize(&path.wedding_id)?;
    let tokens = state
        .gallery
        .tokens
        .list(&path.wedding_id, &path.album_id, query.limit.unwrap_or(50).clamp(1, 200))
        .await?;
    Ok(Json(tokens))
}

pub async fn revoke_token(
    State(state): State<AppState>,
    Path(path): Path<TokenPath>,
    user: HostUser,
) -> ApiResult<Json<AccessToken>> {
    user.authorize(&path.wedding_id)?;
    let token = state
        .gallery
        .tokens
        .revoke(&path.wedding_id, &path.album_id, &path.token_id, Utc::now())
        .await?;
    Ok(Json(token))
}

#[derive(Debug, Deserialize)]
pub struct GuestAccessQuery {
    pub token: String,
}

/// What the guest upload page needs to render.
#[derive(Debug, Serialize)]
pub struct GuestAccessResponse {
    pub album_name: String,
    pub kind: TokenKind,
    pub expires_at: DateTime<Utc>,
    pub remaining_usages: u32,
    /// Scenes the guest may pick from.
    pub scenes: Vec<Scene>,
    pub max_file_size_mb: u32,
}

/// Check a guest link before showing the upload form.
pub async fn guest_access(
    State(state): State<AppState>,
    Path(path): Path<AlbumPath>,
    Query(query): Query<GuestAccessQuery>,
) -> ApiResult<Json<GuestAccessResponse>> {
    let token = state
        .gallery
        .tokens
        .validate(&path.wedding_id, &path.album_id, &query.token, Utc::now())
        .await?;
    let album = state
        .gallery
        .albums
        .get_album(&path.wedding_id, &path.album_id)
        .await?
        .ok_or_else(|| ApiError::not_found(format!("Album {} not found", path.album_id)))?;

    let scenes = album
        .settings
        .scenes
        .into_iter()
        .filter(|s| token.allows_scene(Some(s.id.as_str())))
        .collect();

    Ok(Json(GuestAccessResponse {
        album_name: album.name,
        kind: token.kind,
        expires_at: token.expires_at,
        remaining_usages: token.remaining_usages(),
        scenes,
        max_file_size_mb: album.settings.max_file_size_mb,
    }))
}
