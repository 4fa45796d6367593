//! Photo repository.

use std::collections::HashMap;

use chrono::Utc;
use tracing::warn;

use momentos_models::{
    AlbumId, Highlight, MediaKind, Photo, PhotoId, PhotoStatus, Rejection, StoragePaths,
    TokenId, UploadInfo, UploaderIdentity, UploaderKind, WeddingId,
};

use super::{AlbumScope, Versioned};
use crate::error::FirestoreResult;
use crate::fields::{FieldMap, FieldReader};
use crate::types::{Document, StructuredQuery, ToFirestoreValue, Value, Write};

const PHOTOS: &str = "photos";

pub struct PhotoRepository {
    scope: AlbumScope,
}

impl PhotoRepository {
    pub fn new(scope: AlbumScope) -> Self {
        Self { scope }
    }

    fn collection(&self) -> String {
        self.scope.subcollection(PHOTOS)
    }

    pub async fn get(&self, photo_id: &PhotoId) -> FirestoreResult<Option<Versioned<Photo>>> {
        let doc = self
            .scope
            .store
            .get_document(&self.collection(), photo_id.as_str())
            .await?;

        match doc {
            Some(d) => {
                let photo = document_to_photo(&d, &self.scope.wedding_id, &self.scope.album_id, photo_id)?;
                Ok(Some(Versioned::new(photo, d.update_time)))
            }
            None => Ok(None),
        }
    }

    pub fn write(&self, photo: &Versioned<Photo>) -> Write {
        Write::replace(
            self.scope
                .store
                .full_document_name(&self.collection(), photo.value.id.as_str()),
            photo_to_fields(&photo.value),
            photo.update_time.as_deref(),
        )
    }

    /// Newest photos first, optionally restricted to one status.
    pub async fn list(&self, status: Option<PhotoStatus>, limit: u32) -> FirestoreResult<Vec<Photo>> {
        let mut query = StructuredQuery::collection(PHOTOS);
        if let Some(status) = status {
            query = query.where_eq("status", status.as_str().to_firestore_value());
        }
        let query = query.order_by("created_at", true).limit(limit.clamp(1, 1000));

        let docs = self
            .scope
            .store
            .run_query(&self.scope.album_path(), query)
            .await?;

        let mut photos = Vec::with_capacity(docs.len());
        for doc in docs {
            let Some(id) = doc.id().map(PhotoId::from) else {
                continue;
            };
            match document_to_photo(&doc, &self.scope.wedding_id, &self.scope.album_id, &id) {
                Ok(photo) => photos.push(photo),
                Err(e) => warn!(photo_id = %id, "Skipping unreadable photo document: {}", e),
            }
        }
        Ok(photos)
    }
}

// ============================================================================
// Codec
// ============================================================================

pub fn photo_to_fields(photo: &Photo) -> HashMap<String, Value> {
    let storage = FieldMap::new()
        .set("original", photo.storage.original.clone())
        .set("optimized", photo.storage.optimized.clone())
        .set("thumbnail", photo.storage.thumbnail.clone())
        .into_value();

    let u = &photo.upload;
    let upload = FieldMap::new()
        .set("original_size_bytes", u.original_size_bytes)
        .set("stored_size_bytes", u.stored_size_bytes)
        .set("thumbnail_size_bytes", u.thumbnail_size_bytes)
        .set("original_content_type", u.original_content_type.clone())
        .set("stored_content_type", u.stored_content_type.clone())
        .set("compressed", u.compressed)
        .set("compression_threshold_bytes", u.compression_threshold_bytes)
        .set("content_hash", u.content_hash.clone())
        .set("video_duration_secs", u.video_duration_secs)
        .set("file_name", u.file_name.clone())
        .into_value();

    let highlight = photo
        .highlight
        .as_ref()
        .map(|h| {
            FieldMap::new()
                .set("score", h.score)
                .set("reasons", h.reasons.clone())
                .set("surfaced_at", h.surfaced_at)
                .into_value()
        })
        .unwrap_or(Value::NullValue(()));

    let rejection = photo
        .rejection
        .as_ref()
        .map(|r| {
            FieldMap::new()
                .set("reason", r.reason.clone())
                .set("rejected_by", r.rejected_by.clone())
                .set("rejected_at", r.rejected_at)
                .into_value()
        })
        .unwrap_or(Value::NullValue(()));

    FieldMap::new()
        .set("uploader_kind", photo.uploader_kind.as_str())
        .set("uploader_id", photo.uploader.id().map(str::to_string))
        .set("guest_name", photo.guest_name.clone())
        .set("source", photo.source.clone())
        .set("media_kind", photo.media_kind.as_str())
        .set("scene", photo.scene.clone())
        .set("labels", photo.labels.clone())
        .set("status", photo.status.as_str())
        .set("flagged", photo.flagged)
        .set("storage", storage)
        .set("url", photo.url.clone())
        .set("thumbnail_url", photo.thumbnail_url.clone())
        .set("width", photo.width)
        .set("height", photo.height)
        .set("taken_at", photo.taken_at)
        .set("reactions", photo.reactions.clone())
        .set("highlight", highlight)
        .set("rejection", rejection)
        .set("upload", upload)
        .set("token_id", photo.token_id.as_ref().map(|t| t.to_string()))
        .set("approved_at", photo.approved_at)
        .set("removed_at", photo.removed_at)
        .set("created_at", photo.created_at)
        .set("updated_at", photo.updated_at)
        .into_inner()
}

pub fn document_to_photo(
    doc: &Document,
    wedding_id: &WeddingId,
    album_id: &AlbumId,
    photo_id: &PhotoId,
) -> FirestoreResult<Photo> {
    let context = format!("weddings/{}/albums/{}/photos/{}", wedding_id, album_id, photo_id);
    let f = FieldReader::from_document(doc, &context)?;

    let s = f.map("storage");
    let storage = StoragePaths {
        original: s.string_or_default("original"),
        optimized: s.string_or_default("optimized"),
        thumbnail: s.string("thumbnail"),
    };

    let u = f.map("upload");
    let upload = UploadInfo {
        original_size_bytes: u.u64("original_size_bytes"),
        stored_size_bytes: u.u64("stored_size_bytes"),
        thumbnail_size_bytes: u.get("thumbnail_size_bytes"),
        original_content_type: u.string_or_default("original_content_type"),
        stored_content_type: u.string_or_default("stored_content_type"),
        compressed: u.bool("compressed", false),
        compression_threshold_bytes: u.u64("compression_threshold_bytes"),
        content_hash: u.string("content_hash"),
        video_duration_secs: u.f64("video_duration_secs"),
        file_name: u.string("file_name"),
    };

    let highlight = f.is_present("highlight").then(|| {
        let h = f.map("highlight");
        Highlight {
            score: h.f64("score").unwrap_or(0.0),
            reasons: h.strings("reasons"),
            surfaced_at: h.timestamp("surfaced_at"),
        }
    });

    let rejection = if f.is_present("rejection") {
        let r = f.map("rejection");
        Some(Rejection {
            reason: r.string_or_default("reason"),
            rejected_by: r.string("rejected_by"),
            rejected_at: r.require("rejected_at")?,
        })
    } else {
        None
    };

    let now = Utc::now();

    Ok(Photo {
        id: photo_id.clone(),
        wedding_id: wedding_id.clone(),
        album_id: album_id.clone(),
        uploader_kind: f
            .string("uploader_kind")
            .and_then(|k| UploaderKind::parse(&k))
            .unwrap_or_default(),
        uploader: UploaderIdentity::from_option(f.string("uploader_id")),
        guest_name: f.string("guest_name"),
        source: f.string("source").unwrap_or_else(|| "web".to_string()),
        media_kind: f
            .string("media_kind")
            .and_then(|k| MediaKind::parse(&k))
            .unwrap_or_default(),
        scene: f.string("scene"),
        labels: f.strings("labels"),
        status: f
            .string("status")
            .and_then(|s| PhotoStatus::parse(&s))
            .unwrap_or_default(),
        flagged: f.bool("flagged", false),
        storage,
        url: f.string_or_default("url"),
        thumbnail_url: f.string("thumbnail_url"),
        width: f.get("width"),
        height: f.get("height"),
        taken_at: f.timestamp("taken_at"),
        reactions: f.counts("reactions"),
        highlight,
        rejection,
        upload,
        token_id: f.string("token_id").map(TokenId::from),
        approved_at: f.timestamp("approved_at"),
        removed_at: f.timestamp("removed_at"),
        created_at: f.timestamp("created_at").unwrap_or(now),
        updated_at: f.timestamp("updated_at").unwrap_or(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample() -> Photo {
        let now = Utc::now();
        Photo {
            id: PhotoId::from("p1"),
            wedding_id: WeddingId::from("w1"),
            album_id: AlbumId::default(),
            uploader_kind: UploaderKind::Guest,
            uploader: UploaderIdentity::Known("g1".into()),
            guest_name: Some("Ana".into()),
            source: "qr".into(),
            media_kind: MediaKind::Image,
            scene: Some("party".into()),
            labels: vec!["party".into()],
            status: PhotoStatus::Rejected,
            flagged: true,
            storage: StoragePaths {
                original: "a/original.png".into(),
                optimized: "a/optimized.jpg".into(),
                thumbnail: Some("a/thumb.jpg".into()),
            },
            url: "https://cdn/a/optimized.jpg".into(),
            thumbnail_url: None,
            width: Some(1200),
            height: Some(800),
            taken_at: None,
            reactions: BTreeMap::from([("heart".to_string(), 2)]),
            highlight: Some(Highlight {
                score: 0.5,
                reasons: vec!["guest".into()],
                surfaced_at: Some(now),
            }),
            rejection: Some(Rejection {
                reason: "blurry".into(),
                rejected_by: Some("host-1".into()),
                rejected_at: now,
            }),
            upload: UploadInfo {
                original_size_bytes: 100,
                stored_size_bytes: 60,
                compressed: true,
                content_hash: Some("abc".into()),
                ..UploadInfo::default()
            },
            token_id: Some(TokenId::from("t1")),
            approved_at: None,
            removed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_photo_codec() {
        let photo = sample();
        let doc = Document::named("x", photo_to_fields(&photo));
        let decoded = document_to_photo(&doc, &photo.wedding_id, &photo.album_id, &photo.id).unwrap();

        assert_eq!(decoded.status, PhotoStatus::Rejected);
        assert_eq!(decoded.uploader, UploaderIdentity::Known("g1".into()));
        assert_eq!(decoded.rejection.as_ref().map(|r| r.reason.as_str()), Some("blurry"));
        assert_eq!(decoded.highlight.as_ref().map(|h| h.score), Some(0.5));
        assert_eq!(decoded.reactions, photo.reactions);
        assert_eq!(decoded.storage, photo.storage);
        assert_eq!(decoded.upload.stored_size_bytes, 60);
        assert!(decoded.flagged);
    }

    #[test]
    fn test_photo_without_rejection_or_highlight() {
        let mut photo = sample();
        photo.rejection = None;
        photo.highlight = None;
        let doc = Document::named("x", photo_to_fields(&photo));
        let decoded = document_to_photo(&doc, &photo.wedding_id, &photo.album_id, &photo.id).unwrap();
        assert!(decoded.rejection.is_none());
        assert!(decoded.highlight.is_none());
    }
}
