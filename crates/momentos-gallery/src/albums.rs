//! Album lifecycle, settings and photo feeds.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use momentos_firestore::{with_conflict_retry, AlbumScope, Versioned};
use momentos_models::{
    Album, AlbumId, AlbumSettings, AlbumStatus, GuestContribution, ModerationMode, Photo, PhotoId,
    PhotoStatus, Scene, SlideshowSettings, UploaderKind, WeddingId,
};

use crate::context::GalleryContext;
use crate::error::{GalleryError, GalleryResult};
use crate::moderation::refresh_highlight;
use crate::window::apply_event_date;

/// Scene key used for photos without a scene.
const UNSCENED: &str = "other";

/// The stored album, or a fresh unsaved one with defaults.
pub(crate) async fn load_album(scope: &AlbumScope, now: DateTime<Utc>) -> GalleryResult<Versioned<Album>> {
    Ok(scope.albums().get().await?.unwrap_or_else(|| {
        Versioned::unsaved(Album::new(scope.wedding_id.clone(), scope.album_id.clone(), now))
    }))
}

pub(crate) async fn require_photo(scope: &AlbumScope, photo_id: &PhotoId) -> GalleryResult<Versioned<Photo>> {
    scope
        .photos()
        .get(photo_id)
        .await?
        .ok_or_else(|| GalleryError::PhotoNotFound(photo_id.to_string()))
}

/// Values applied when an album is first created.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AlbumOverrides {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub event_date: Option<DateTime<Utc>>,
    pub settings: Option<SettingsPatch>,
}

/// Partial settings update. Absent fields keep their current value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    pub moderation_mode: Option<ModerationMode>,
    pub max_file_size_mb: Option<u32>,
    pub allow_reactions: Option<bool>,
    pub allow_guest_gallery: Option<bool>,
    pub highlight_threshold: Option<f64>,
    pub slideshow: Option<SlideshowSettings>,
    pub scenes: Option<Vec<Scene>>,
}

impl SettingsPatch {
    pub fn apply(self, settings: &mut AlbumSettings) -> GalleryResult<()> {
        if let Some(threshold) = self.highlight_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                return Err(GalleryError::invalid_input("highlight_threshold must be within [0, 1]"));
            }
            settings.highlight_threshold = threshold;
        }
        if let Some(mb) = self.max_file_size_mb {
            if mb == 0 {
                return Err(GalleryError::invalid_input("max_file_size_mb must be positive"));
            }
            settings.max_file_size_mb = mb;
        }
        if let Some(mode) = self.moderation_mode {
            settings.moderation_mode = mode;
        }
        if let Some(v) = self.allow_reactions {
            settings.allow_reactions = v;
        }
        if let Some(v) = self.allow_guest_gallery {
            settings.allow_guest_gallery = v;
        }
        if let Some(slideshow) = self.slideshow {
            settings.slideshow = slideshow;
        }
        if let Some(scenes) = self.scenes {
            settings.scenes = Scene::normalize(scenes);
        }
        Ok(())
    }
}

/// Entry of a bulk download export.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadLink {
    pub id: PhotoId,
    pub url: String,
    pub scene: Option<String>,
    pub uploader_kind: UploaderKind,
    pub file_name: String,
    pub status: PhotoStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SceneSummary {
    pub total: usize,
    pub scenes: BTreeMap<String, usize>,
}

/// Count photos per scene.
pub fn summarize_by_scene(photos: &[Photo]) -> SceneSummary {
    let mut scenes = BTreeMap::new();
    for photo in photos {
        let key = photo.scene.as_deref().unwrap_or(UNSCENED);
        *scenes.entry(key.to_string()).or_insert(0) += 1;
    }
    SceneSummary {
        total: photos.len(),
        scenes,
    }
}

pub struct AlbumService {
    ctx: GalleryContext,
}

impl AlbumService {
    pub fn new(ctx: GalleryContext) -> Self {
        Self { ctx }
    }

    /// Create the album with defaults unless it exists already.
    pub async fn ensure_album(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        overrides: AlbumOverrides,
    ) -> GalleryResult<Album> {
        let scope = self.ctx.scope(wedding_id, album_id);
        with_conflict_retry(&self.ctx.config.transaction_retry, "albums.ensure", |_| {
            self.ensure_once(&scope, overrides.clone())
        })
        .await
    }

    async fn ensure_once(&self, scope: &AlbumScope, overrides: AlbumOverrides) -> GalleryResult<Album> {
        let now = Utc::now();
        let mut album = load_album(scope, now).await?;
        if album.is_stored() {
            return Ok(album.value);
        }

        if let Some(name) = overrides.name.filter(|n| !n.trim().is_empty()) {
            album.value.name = name.trim().to_string();
        }
        if let Some(slug) = overrides.slug.filter(|s| !s.trim().is_empty()) {
            album.value.slug = slug.trim().to_string();
        }
        if let Some(patch) = overrides.settings {
            patch.apply(&mut album.value.settings)?;
        }
        if overrides.event_date.is_some() {
            apply_event_date(&mut album.value, overrides.event_date, now);
        }

        scope.store.commit(vec![scope.albums().write(&album)]).await?;
        info!(wedding_id = %scope.wedding_id, album_id = %scope.album_id, "Album created");
        Ok(album.value)
    }

    pub async fn get_album(&self, wedding_id: &WeddingId, album_id: &AlbumId) -> GalleryResult<Option<Album>> {
        let scope = self.ctx.scope(wedding_id, album_id);
        Ok(scope.albums().get().await?.map(|v| v.value))
    }

    pub async fn update_settings(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        patch: SettingsPatch,
    ) -> GalleryResult<AlbumSettings> {
        let scope = self.ctx.scope(wedding_id, album_id);
        with_conflict_retry(&self.ctx.config.transaction_retry, "albums.update_settings", |_| {
            self.update_settings_once(&scope, patch.clone())
        })
        .await
    }

    async fn update_settings_once(&self, scope: &AlbumScope, patch: SettingsPatch) -> GalleryResult<AlbumSettings> {
        let now = Utc::now();
        let mut album = load_album(scope, now).await?;
        patch.apply(&mut album.value.settings)?;
        album.value.updated_at = now;
        scope.store.commit(vec![scope.albums().write(&album)]).await?;
        info!(wedding_id = %scope.wedding_id, album_id = %scope.album_id, "Album settings updated");
        Ok(album.value.settings)
    }

    /// Archive the album. Archived albums reject uploads and are never deleted.
    pub async fn archive_album(&self, wedding_id: &WeddingId, album_id: &AlbumId) -> GalleryResult<Album> {
        let scope = self.ctx.scope(wedding_id, album_id);
        with_conflict_retry(&self.ctx.config.transaction_retry, "albums.archive", |_| {
            self.archive_once(&scope)
        })
        .await
    }

    async fn archive_once(&self, scope: &AlbumScope) -> GalleryResult<Album> {
        let now = Utc::now();
        let mut album = load_album(scope, now).await?;
        if album.value.status != AlbumStatus::Archived {
            album.value.status = AlbumStatus::Archived;
            album.value.updated_at = now;
            scope.store.commit(vec![scope.albums().write(&album)]).await?;
            info!(wedding_id = %scope.wedding_id, album_id = %scope.album_id, "Album archived");
        }
        Ok(album.value)
    }

    /// Newest first. Soft-removed photos are left out.
    pub async fn list_photos(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        status: Option<PhotoStatus>,
        limit: u32,
    ) -> GalleryResult<Vec<Photo>> {
        let scope = self.ctx.scope(wedding_id, album_id);
        let photos = scope.photos().list(status, limit).await?;
        Ok(photos.into_iter().filter(|p| !p.is_removed()).collect())
    }

    pub async fn get_photo(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        photo_id: &PhotoId,
    ) -> GalleryResult<Photo> {
        let scope = self.ctx.scope(wedding_id, album_id);
        scope
            .photos()
            .get(photo_id)
            .await?
            .map(|v| v.value)
            .ok_or_else(|| GalleryError::PhotoNotFound(photo_id.to_string()))
    }

    /// Adjust one reaction counter. Approved photos are re-scored.
    pub async fn react(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        photo_id: &PhotoId,
        reaction: &str,
        delta: i64,
    ) -> GalleryResult<Photo> {
        let reaction = reaction.trim();
        if reaction.is_empty() || reaction.contains('.') {
            return Err(GalleryError::invalid_input("reaction must be a plain key"));
        }
        let scope = self.ctx.scope(wedding_id, album_id);
        with_conflict_retry(&self.ctx.config.transaction_retry, "albums.react", |_| {
            self.react_once(&scope, photo_id, reaction, delta)
        })
        .await
    }

    async fn react_once(
        &self,
        scope: &AlbumScope,
        photo_id: &PhotoId,
        reaction: &str,
        delta: i64,
    ) -> GalleryResult<Photo> {
        let now = Utc::now();
        let album = load_album(scope, now).await?;
        if !album.value.settings.allow_reactions {
            return Err(GalleryError::ReactionsDisabled);
        }
        let mut photo = require_photo(scope, photo_id).await?;

        let count = photo.value.reactions.entry(reaction.to_string()).or_insert(0);
        *count = count.saturating_add_signed(delta);
        if photo.value.status == PhotoStatus::Approved {
            refresh_highlight(&mut photo.value, &album.value, now);
        }
        photo.value.updated_at = now;

        scope.store.commit(vec![scope.photos().write(&photo)]).await?;
        Ok(photo.value)
    }

    /// Replace the labels of a photo, dropping blanks and duplicates.
    pub async fn update_labels(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        photo_id: &PhotoId,
        labels: Vec<String>,
    ) -> GalleryResult<Photo> {
        let mut unique: Vec<String> = Vec::with_capacity(labels.len());
        for label in labels.iter().map(|l| l.trim()).filter(|l| !l.is_empty()) {
            if !unique.iter().any(|u| u == label) {
                unique.push(label.to_string());
            }
        }

        let scope = self.ctx.scope(wedding_id, album_id);
        with_conflict_retry(&self.ctx.config.transaction_retry, "albums.update_labels", |_| {
            self.update_labels_once(&scope, photo_id, unique.clone())
        })
        .await
    }

    async fn update_labels_once(
        &self,
        scope: &AlbumScope,
        photo_id: &PhotoId,
        labels: Vec<String>,
    ) -> GalleryResult<Photo> {
        let mut photo = require_photo(scope, photo_id).await?;
        photo.value.labels = labels;
        photo.value.updated_at = Utc::now();
        scope.store.commit(vec![scope.photos().write(&photo)]).await?;
        Ok(photo.value)
    }

    /// Hide a photo from feeds and exports. Counters are left untouched.
    pub async fn soft_remove(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        photo_id: &PhotoId,
    ) -> GalleryResult<Photo> {
        let scope = self.ctx.scope(wedding_id, album_id);
        with_conflict_retry(&self.ctx.config.transaction_retry, "albums.soft_remove", |_| {
            self.soft_remove_once(&scope, photo_id)
        })
        .await
    }

    async fn soft_remove_once(&self, scope: &AlbumScope, photo_id: &PhotoId) -> GalleryResult<Photo> {
        let mut photo = require_photo(scope, photo_id).await?;
        if photo.value.is_removed() {
            return Ok(photo.value);
        }
        let now = Utc::now();
        photo.value.removed_at = Some(now);
        photo.value.updated_at = now;
        scope.store.commit(vec![scope.photos().write(&photo)]).await?;
        info!(album_id = %scope.album_id, photo_id = %photo_id, "Photo removed");
        Ok(photo.value)
    }

    /// Guests with the most uploads first.
    pub async fn guest_leaderboard(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        limit: u32,
    ) -> GalleryResult<Vec<GuestContribution>> {
        let scope = self.ctx.scope(wedding_id, album_id);
        Ok(scope.guests().leaderboard(limit).await?)
    }

    /// Download links for every photo in `status`, newest first.
    pub async fn export_download_links(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        status: PhotoStatus,
    ) -> GalleryResult<Vec<DownloadLink>> {
        let photos = self.list_photos(wedding_id, album_id, Some(status), 1000).await?;
        let links: Vec<DownloadLink> = photos
            .into_iter()
            .filter(|p| !p.url.is_empty())
            .map(|p| DownloadLink {
                file_name: p
                    .upload
                    .file_name
                    .clone()
                    .filter(|f| !f.is_empty())
                    .unwrap_or_else(|| p.export_file_name()),
                id: p.id,
                url: p.url,
                scene: p.scene,
                uploader_kind: p.uploader_kind,
                status: p.status,
            })
            .collect();

        info!(wedding_id = %wedding_id, album_id = %album_id, count = links.len(), "Download links generated");
        Ok(links)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_settings_patch_normalizes_scenes() {
        let mut settings = AlbumSettings::default();
        SettingsPatch {
            scenes: Some(vec![
                Scene::new(" party ", ""),
                Scene::new("party", "Dup"),
                Scene::new("", "Blank"),
            ]),
            allow_reactions: Some(false),
            ..Default::default()
        }
        .apply(&mut settings)
        .unwrap();

        assert_eq!(settings.scenes.len(), 1);
        assert_eq!(settings.scenes[0].id, "party");
        assert_eq!(settings.scenes[0].label, "party");
        assert!(!settings.allow_reactions);

        SettingsPatch {
            scenes: Some(vec![]),
            ..Default::default()
        }
        .apply(&mut settings)
        .unwrap();
        assert_eq!(settings.scenes, Scene::defaults());
    }

    #[test]
    fn test_settings_patch_rejects_bad_threshold() {
        let mut settings = AlbumSettings::default();
        let res = SettingsPatch {
            highlight_threshold: Some(1.5),
            ..Default::default()
        }
        .apply(&mut settings);
        assert!(matches!(res, Err(GalleryError::InvalidInput(_))));
    }
}
