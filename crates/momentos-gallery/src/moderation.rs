//! Moderation state machine.
//!
//! Photos start `pending`. Hosts approve or reject them and may later flip a
//! decision (re-review). Nothing moves back to `pending`. Every transition
//! updates the album counters in the same commit as the photo.

use chrono::{DateTime, Utc};
use tracing::info;

use momentos_firestore::{with_conflict_retry, AlbumScope};
use momentos_models::{
    Album, AlbumId, Highlight, Photo, PhotoId, PhotoStatus, Rejection, WeddingId, FEATURED_LABEL,
};

use crate::albums::{load_album, require_photo};
use crate::context::GalleryContext;
use crate::error::{GalleryError, GalleryResult};
use crate::metrics;
use crate::scoring;

const DEFAULT_REJECTION_REASON: &str = "Rejected by host";

/// Who decided and why.
#[derive(Debug, Clone, Default)]
pub struct Decision {
    pub reason: Option<String>,
    pub actor: Option<String>,
}

impl Decision {
    pub fn by(actor: impl Into<String>) -> Self {
        Self {
            reason: None,
            actor: Some(actor.into()),
        }
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }
}

/// Recompute the highlight of `photo`, never lowering a stored score.
///
/// Photos reaching the album threshold are labelled featured. Returns true
/// when the highlight changed.
pub(crate) fn refresh_highlight(photo: &mut Photo, album: &Album, now: DateTime<Utc>) -> bool {
    let result = scoring::score(photo, album);
    let previous = photo.highlight.as_ref();
    if previous.is_some_and(|h| h.score >= result.score) {
        return false;
    }

    let surfaced = result.score >= album.settings.highlight_threshold;
    let surfaced_at = previous
        .and_then(|h| h.surfaced_at)
        .or_else(|| surfaced.then_some(now));
    photo.highlight = Some(Highlight {
        score: result.score,
        reasons: result.reasons,
        surfaced_at,
    });
    if surfaced {
        photo.add_label(FEATURED_LABEL);
    }
    true
}

pub struct ModerationEngine {
    ctx: GalleryContext,
}

impl ModerationEngine {
    pub fn new(ctx: GalleryContext) -> Self {
        Self { ctx }
    }

    /// Move a photo to `next`. Setting the current status again is a no-op.
    pub async fn set_status(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        photo_id: &PhotoId,
        next: PhotoStatus,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> GalleryResult<Photo> {
        let scope = self.ctx.scope(wedding_id, album_id);
        with_conflict_retry(&self.ctx.config.transaction_retry, "moderation.set_status", |_| {
            self.set_status_once(&scope, photo_id, next, &decision, now)
        })
        .await
    }

    pub async fn approve(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        photo_id: &PhotoId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> GalleryResult<Photo> {
        self.set_status(wedding_id, album_id, photo_id, PhotoStatus::Approved, decision, now)
            .await
    }

    pub async fn reject(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        photo_id: &PhotoId,
        decision: Decision,
        now: DateTime<Utc>,
    ) -> GalleryResult<Photo> {
        self.set_status(wedding_id, album_id, photo_id, PhotoStatus::Rejected, decision, now)
            .await
    }

    async fn set_status_once(
        &self,
        scope: &AlbumScope,
        photo_id: &PhotoId,
        next: PhotoStatus,
        decision: &Decision,
        now: DateTime<Utc>,
    ) -> GalleryResult<Photo> {
        let mut photo = require_photo(scope, photo_id).await?;
        let from = photo.value.status;
        if from == next {
            return Ok(photo.value);
        }
        if next == PhotoStatus::Pending {
            return Err(GalleryError::InvalidTransition { from, to: next });
        }

        let mut album = load_album(scope, now).await?;
        album.value.counters.apply_transition(from, next);
        album.value.updated_at = now;

        let photo_value = &mut photo.value;
        photo_value.status = next;
        photo_value.updated_at = now;
        match next {
            PhotoStatus::Approved => {
                photo_value.rejection = None;
                photo_value.approved_at = Some(now);
                refresh_highlight(photo_value, &album.value, now);
            }
            PhotoStatus::Rejected => {
                let reason = decision
                    .reason
                    .as_deref()
                    .map(str::trim)
                    .filter(|r| !r.is_empty())
                    .unwrap_or(DEFAULT_REJECTION_REASON);
                photo_value.rejection = Some(Rejection {
                    reason: reason.to_string(),
                    rejected_by: decision.actor.clone(),
                    rejected_at: now,
                });
            }
            PhotoStatus::Pending => {}
        }

        scope
            .store
            .commit(vec![scope.photos().write(&photo), scope.albums().write(&album)])
            .await?;

        metrics::record_moderation(next.as_str());
        info!(
            album_id = %scope.album_id,
            photo_id = %photo_id,
            from = %from,
            to = %next,
            actor = ?decision.actor,
            "Photo moderated"
        );
        Ok(photo.value)
    }

    /// Recompute the highlight of an approved photo.
    pub async fn rescore(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        photo_id: &PhotoId,
        now: DateTime<Utc>,
    ) -> GalleryResult<Photo> {
        let scope = self.ctx.scope(wedding_id, album_id);
        with_conflict_retry(&self.ctx.config.transaction_retry, "moderation.rescore", |_| {
            self.rescore_once(&scope, photo_id, now)
        })
        .await
    }

    async fn rescore_once(
        &self,
        scope: &AlbumScope,
        photo_id: &PhotoId,
        now: DateTime<Utc>,
    ) -> GalleryResult<Photo> {
        let mut photo = require_photo(scope, photo_id).await?;
        if photo.value.status != PhotoStatus::Approved {
            return Ok(photo.value);
        }
        let album = load_album(scope, now).await?;
        if refresh_highlight(&mut photo.value, &album.value, now) {
            photo.value.updated_at = now;
            scope.store.commit(vec![scope.photos().write(&photo)]).await?;
        }
        Ok(photo.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use momentos_models::{
        MediaKind, StoragePaths, UploadInfo, UploaderIdentity, UploaderKind,
    };
    use std::collections::BTreeMap;

    fn photo() -> Photo {
        let now = Utc::now();
        Photo {
            id: PhotoId::from("p1"),
            wedding_id: WeddingId::from("w1"),
            album_id: AlbumId::default(),
            uploader_kind: UploaderKind::Guest,
            uploader: UploaderIdentity::Anonymous,
            guest_name: None,
            source: "web".into(),
            media_kind: MediaKind::Image,
            scene: Some("ceremony".into()),
            labels: vec![],
            status: PhotoStatus::Approved,
            flagged: false,
            storage: StoragePaths::default(),
            url: String::new(),
            thumbnail_url: None,
            width: None,
            height: None,
            taken_at: None,
            reactions: BTreeMap::new(),
            highlight: None,
            rejection: None,
            upload: UploadInfo::default(),
            token_id: None,
            approved_at: None,
            removed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_refresh_highlight_features_above_threshold() {
        let mut album = Album::new(WeddingId::from("w1"), AlbumId::default(), Utc::now());
        album.settings.highlight_threshold = 0.5;
        let mut p = photo();

        // 0.35 + 0.12 + 0.05
        assert!(refresh_highlight(&mut p, &album, Utc::now()));
        let highlight = p.highlight.clone().unwrap();
        assert_eq!(highlight.score, 0.52);
        assert!(highlight.surfaced_at.is_some());
        assert!(p.has_label(FEATURED_LABEL));
    }

    #[test]
    fn test_refresh_highlight_below_threshold() {
        let mut album = Album::new(WeddingId::from("w1"), AlbumId::default(), Utc::now());
        album.settings.highlight_threshold = 0.9;
        let mut p = photo();

        refresh_highlight(&mut p, &album, Utc::now());
        assert!(p.highlight.as_ref().unwrap().surfaced_at.is_none());
        assert!(!p.has_label(FEATURED_LABEL));
    }

    #[test]
    fn test_refresh_highlight_never_lowers() {
        let album = Album::new(WeddingId::from("w1"), AlbumId::default(), Utc::now());
        let mut p = photo();
        p.highlight = Some(Highlight {
            score: 0.8,
            reasons: vec!["reactions:20".into()],
            surfaced_at: None,
        });

        assert!(!refresh_highlight(&mut p, &album, Utc::now()));
        assert_eq!(p.highlight_score(), 0.8);
    }
}
