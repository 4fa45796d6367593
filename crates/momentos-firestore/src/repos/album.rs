//! Album repository.

use std::collections::HashMap;

use chrono::Utc;

use momentos_models::{
    Album, AlbumCounters, AlbumId, AlbumSettings, AlbumStatus, CleanupStatus, ModerationMode,
    QrCodePointer, Scene, SlideshowSettings, TokenId, UploadWindow, WeddingId,
    COMPRESSION_THRESHOLD_BYTES,
};

use super::{AlbumScope, Versioned};
use crate::error::FirestoreResult;
use crate::fields::{FieldMap, FieldReader};
use crate::types::{Document, Value, Write};

pub struct AlbumRepository {
    scope: AlbumScope,
}

impl AlbumRepository {
    pub fn new(scope: AlbumScope) -> Self {
        Self { scope }
    }

    pub async fn get(&self) -> FirestoreResult<Option<Versioned<Album>>> {
        let doc = self
            .scope
            .store
            .get_document(&self.scope.albums_collection(), self.scope.album_id.as_str())
            .await?;

        match doc {
            Some(d) => {
                let album = document_to_album(&d, &self.scope.wedding_id, &self.scope.album_id)?;
                Ok(Some(Versioned::new(album, d.update_time)))
            }
            None => Ok(None),
        }
    }

    /// Full-document write guarded by the version the album was read at.
    pub fn write(&self, album: &Versioned<Album>) -> Write {
        Write::replace(
            self.document_name(),
            album_to_fields(&album.value),
            album.update_time.as_deref(),
        )
    }

    pub fn document_name(&self) -> String {
        self.scope
            .store
            .full_document_name(&self.scope.albums_collection(), self.scope.album_id.as_str())
    }
}

// ============================================================================
// Codec
// ============================================================================

fn scene_to_value(scene: &Scene) -> Value {
    FieldMap::new()
        .set("id", scene.id.clone())
        .set("label", scene.label.clone())
        .set("emoji", scene.emoji.clone())
        .set("color", scene.color.clone())
        .set("priority", scene.priority)
        .into_value()
}

pub fn album_to_fields(album: &Album) -> HashMap<String, Value> {
    let window = &album.upload_window;
    let upload_window = FieldMap::new()
        .set("closes_at", window.closes_at)
        .set("closed_at", window.closed_at)
        .set("compression_threshold_bytes", window.compression_threshold_bytes)
        .set("compression_active", window.compression_active)
        .set("last_compression_at", window.last_compression_at)
        .set("last_token_at", window.last_token_at)
        .set("cleanup_at", window.cleanup_at)
        .set("cleanup_status", window.cleanup_status.as_str())
        .into_value();

    let c = &album.counters;
    let counters = FieldMap::new()
        .set("total_photos", c.total_photos)
        .set("pending_photos", c.pending_photos)
        .set("approved_photos", c.approved_photos)
        .set("rejected_photos", c.rejected_photos)
        .set("guest_contributors", c.guest_contributors)
        .set("badges_granted", c.badges_granted)
        .set("total_bytes", c.total_bytes)
        .set("optimized_bytes", c.optimized_bytes)
        .into_value();

    let s = &album.settings;
    let slideshow = FieldMap::new()
        .set("auto_advance_seconds", s.slideshow.auto_advance_seconds)
        .set("theme", s.slideshow.theme.clone())
        .set("highlight_threshold", s.slideshow.highlight_threshold)
        .set("show_captions", s.slideshow.show_captions)
        .into_value();
    let settings = FieldMap::new()
        .set("moderation_mode", s.moderation_mode.as_str())
        .set("max_file_size_mb", s.max_file_size_mb)
        .set("allow_reactions", s.allow_reactions)
        .set("allow_guest_gallery", s.allow_guest_gallery)
        .set("highlight_threshold", s.highlight_threshold)
        .set("slideshow", slideshow)
        .set("scenes", s.scenes.iter().map(scene_to_value).collect::<Vec<_>>())
        .into_value();

    let qr_code = FieldMap::new()
        .set(
            "latest_token_id",
            album.qr_code.latest_token_id.as_ref().map(|t| t.to_string()),
        )
        .set("expires_at", album.qr_code.expires_at)
        .into_value();

    FieldMap::new()
        .set("name", album.name.clone())
        .set("slug", album.slug.clone())
        .set("status", album.status.as_str())
        .set("event_date", album.event_date)
        .set("upload_window", upload_window)
        .set("counters", counters)
        .set("settings", settings)
        .set("qr_code", qr_code)
        .set("created_at", album.created_at)
        .set("updated_at", album.updated_at)
        .into_inner()
}

pub fn document_to_album(
    doc: &Document,
    wedding_id: &WeddingId,
    album_id: &AlbumId,
) -> FirestoreResult<Album> {
    let context = format!("weddings/{}/albums/{}", wedding_id, album_id);
    let f = FieldReader::from_document(doc, &context)?;

    let w = f.map("upload_window");
    let upload_window = UploadWindow {
        closes_at: w.timestamp("closes_at"),
        closed_at: w.timestamp("closed_at"),
        compression_threshold_bytes: w
            .get("compression_threshold_bytes")
            .filter(|n: &u64| *n > 0)
            .unwrap_or(COMPRESSION_THRESHOLD_BYTES),
        compression_active: w.bool("compression_active", false),
        last_compression_at: w.timestamp("last_compression_at"),
        last_token_at: w.timestamp("last_token_at"),
        cleanup_at: w.timestamp("cleanup_at"),
        cleanup_status: w
            .string("cleanup_status")
            .and_then(|s| CleanupStatus::parse(&s))
            .unwrap_or_default(),
    };

    let c = f.map("counters");
    let counters = AlbumCounters {
        total_photos: c.u64("total_photos"),
        pending_photos: c.u64("pending_photos"),
        approved_photos: c.u64("approved_photos"),
        rejected_photos: c.u64("rejected_photos"),
        guest_contributors: c.u64("guest_contributors"),
        badges_granted: c.u64("badges_granted"),
        total_bytes: c.u64("total_bytes"),
        optimized_bytes: c.u64("optimized_bytes"),
    };

    let defaults = AlbumSettings::default();
    let s = f.map("settings");
    let sl = s.map("slideshow");
    let scenes: Vec<Scene> = s
        .maps("scenes")
        .into_iter()
        .map(|m| Scene {
            id: m.string_or_default("id"),
            label: m.string_or_default("label"),
            emoji: m.string("emoji"),
            color: m.string("color"),
            priority: m.bool("priority", false),
        })
        .collect();
    let settings = AlbumSettings {
        moderation_mode: s
            .string("moderation_mode")
            .and_then(|m| ModerationMode::parse(&m))
            .unwrap_or(defaults.moderation_mode),
        max_file_size_mb: s.get("max_file_size_mb").unwrap_or(defaults.max_file_size_mb),
        allow_reactions: s.bool("allow_reactions", defaults.allow_reactions),
        allow_guest_gallery: s.bool("allow_guest_gallery", defaults.allow_guest_gallery),
        highlight_threshold: s
            .f64("highlight_threshold")
            .unwrap_or(defaults.highlight_threshold),
        slideshow: SlideshowSettings {
            auto_advance_seconds: sl
                .get("auto_advance_seconds")
                .unwrap_or(defaults.slideshow.auto_advance_seconds),
            theme: sl.string("theme").unwrap_or(defaults.slideshow.theme),
            highlight_threshold: sl
                .f64("highlight_threshold")
                .unwrap_or(defaults.slideshow.highlight_threshold),
            show_captions: sl.bool("show_captions", defaults.slideshow.show_captions),
        },
        scenes: Scene::normalize(scenes),
    };

    let q = f.map("qr_code");
    let now = Utc::now();

    Ok(Album {
        id: album_id.clone(),
        wedding_id: wedding_id.clone(),
        name: f.string_or_default("name"),
        slug: f.string_or_default("slug"),
        status: f
            .string("status")
            .and_then(|s| AlbumStatus::parse(&s))
            .unwrap_or_default(),
        event_date: f.timestamp("event_date"),
        upload_window,
        counters,
        settings,
        qr_code: QrCodePointer {
            latest_token_id: q.string("latest_token_id").map(TokenId::from),
            expires_at: q.timestamp("expires_at"),
        },
        created_at: f.timestamp("created_at").unwrap_or(now),
        updated_at: f.timestamp("updated_at").unwrap_or(now),
    })
}
