//! Moderation handlers.

use axum::extract::{Path, State};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;

use momentos_gallery::Decision;
use momentos_models::Photo;

use crate::auth::HostUser;
use crate::error::ApiResult;
use crate::handlers::PhotoPath;
use crate::state::AppState;

pub async fn approve_photo(
    State(state): State<AppState>,
    Path(path): Path<PhotoPath>,
    user: HostUser,
) -> ApiResult<Json<Photo>> {
    user.authorize(&path.wedding_id)?;
    let photo = state
        .gallery
        .moderation
        .approve(
            &path.wedding_id,
            &path.album_id,
            &path.photo_id,
            Decision::by(user.uid),
            Utc::now(),
        )
        .await?;
    Ok(Json(photo))
}

#[derive(Debug, Default, Deserialize)]
pub struct RejectRequest {
    pub reason: Option<String>,
}

pub async fn reject_photo(
    State(state): State<AppState>,
    Path(path): Path<PhotoPath>,
    user: HostUser,
    request: Option<Json<RejectRequest>>,
) -> ApiResult<Json<Photo>> {
    user.authorize(&path.wedding_id)?;
    let reason = request
        .and_then(|Json(r)| r.reason)
        .filter(|r| !r.trim().is_empty());
    let mut decision = Decision::by(user.uid);
    if let Some(reason) = reason {
        decision = decision.with_reason(reason);
    }
    let photo = state
        .gallery
        .moderation
        .reject(&path.wedding_id, &path.album_id, &path.photo_id, decision, Utc::now())
        .await?;
    Ok(Json(photo))
}

/// Re-run the highlight scorer on an approved photo.
pub async fn rescore_photo(
    State(state): State<AppState>,
    Path(path): Path<PhotoPath>,
    user: HostUser,
) -> ApiResult<Json<Photo>> {
    user.authorize(&path.wedding_id)?;
    let photo = state
        .gallery
        .moderation
        .rescore(&path.wedding_id, &path.album_id, &path.photo_id, Utc::now())
        .await?;
    Ok(Json(photo))
}
