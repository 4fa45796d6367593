//! Photo models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::ids::{AlbumId, PhotoId, TokenId, WeddingId};

/// Label added automatically to approved photos that score above the album threshold.
pub const FEATURED_LABEL: &str = "featured";

/// Moderation status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum PhotoStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl PhotoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PhotoStatus::Pending => "pending",
            PhotoStatus::Approved => "approved",
            PhotoStatus::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for PhotoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Who uploaded the photo.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum UploaderKind {
    Host,
    #[default]
    Guest,
}

impl UploaderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            UploaderKind::Host => "host",
            UploaderKind::Guest => "guest",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "host" => Some(Self::Host),
            "guest" => Some(Self::Guest),
            _ => None,
        }
    }
}

/// Identity attached to an upload.
///
/// Anonymous guests contribute photos but never get a contribution record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(tag = "type", content = "id", rename_all = "snake_case")]
pub enum UploaderIdentity {
    #[default]
    Anonymous,
    Known(String),
}

impl UploaderIdentity {
    /// Build from an optional id, treating blank ids as anonymous.
    pub fn from_option(id: Option<String>) -> Self {
        match id {
            Some(id) if !id.trim().is_empty() => Self::Known(id.trim().to_string()),
            _ => Self::Anonymous,
        }
    }

    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::Known(id) => Some(id),
        }
    }
}

/// Kind of media stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    #[default]
    Image,
    Video,
}

impl MediaKind {
    pub fn from_content_type(content_type: &str) -> Self {
        if content_type.starts_with("video/") {
            Self::Video
        } else {
            Self::Image
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Image => "image",
            MediaKind::Video => "video",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "image" => Some(Self::Image),
            "video" => Some(Self::Video),
            _ => None,
        }
    }
}

/// Rejection record. Present only while the photo is rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Rejection {
    pub reason: String,
    pub rejected_by: Option<String>,
    pub rejected_at: DateTime<Utc>,
}

/// Highlight score computed on approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Highlight {
    pub score: f64,
    pub reasons: Vec<String>,
    pub surfaced_at: Option<DateTime<Utc>>,
}

/// Object keys of the stored media.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StoragePaths {
    pub original: String,
    /// Same as `original` when no recompression happened.
    pub optimized: String,
    pub thumbnail: Option<String>,
}

/// Upload audit information.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UploadInfo {
    pub original_size_bytes: u64,
    pub stored_size_bytes: u64,
    pub thumbnail_size_bytes: Option<u64>,
    pub original_content_type: String,
    pub stored_content_type: String,
    pub compressed: bool,
    /// Budget in force at upload time.
    pub compression_threshold_bytes: u64,
    pub content_hash: Option<String>,
    pub video_duration_secs: Option<f64>,
    pub file_name: Option<String>,
}

/// Photo document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Photo {
    pub id: PhotoId,
    pub wedding_id: WeddingId,
    pub album_id: AlbumId,
    pub uploader_kind: UploaderKind,
    #[serde(default)]
    pub uploader: UploaderIdentity,
    pub guest_name: Option<String>,
    pub source: String,
    pub media_kind: MediaKind,
    pub scene: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    pub status: PhotoStatus,
    /// Judgment of the external content checker at upload time.
    #[serde(default)]
    pub flagged: bool,
    pub storage: StoragePaths,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub taken_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reactions: BTreeMap<String, u64>,
    pub highlight: Option<Highlight>,
    pub rejection: Option<Rejection>,
    pub upload: UploadInfo,
    pub token_id: Option<TokenId>,
    pub approved_at: Option<DateTime<Utc>>,
    pub removed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Photo {
    pub fn total_reactions(&self) -> u64 {
        self.reactions.values().sum()
    }

    pub fn megapixels(&self) -> Option<f64> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => Some(f64::from(w) * f64::from(h) / 1_000_000.0),
            _ => None,
        }
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    /// Append `label` unless present.
    pub fn add_label(&mut self, label: &str) -> bool {
        if self.has_label(label) {
            return false;
        }
        self.labels.push(label.to_string());
        true
    }

    pub fn is_removed(&self) -> bool {
        self.removed_at.is_some()
    }

    /// Prior highlight score, 0 when never scored.
    pub fn highlight_score(&self) -> f64 {
        self.highlight.as_ref().map(|h| h.score).unwrap_or(0.0)
    }

    /// File name used in bulk exports.
    pub fn export_file_name(&self) -> String {
        let ext = self
            .storage
            .optimized
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.contains('/'))
            .unwrap_or("jpg");
        format!("{}.{}", self.id, ext)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn photo() -> Photo {
        let now = Utc::now();
        Photo {
            id: PhotoId::from_string("p1"),
            wedding_id: WeddingId::from_string("w1"),
            album_id: AlbumId::default(),
            uploader_kind: UploaderKind::Guest,
            uploader: UploaderIdentity::Anonymous,
            guest_name: None,
            source: "web".to_string(),
            media_kind: MediaKind::Image,
            scene: None,
            labels: vec![],
            status: PhotoStatus::Pending,
            flagged: false,
            storage: StoragePaths {
                original: "weddings/w1/albums/moments/photos/p1/original.png".to_string(),
                optimized: "weddings/w1/albums/moments/photos/p1/optimized.jpg".to_string(),
                thumbnail: None,
            },
            url: String::new(),
            thumbnail_url: None,
            width: Some(4000),
            height: Some(2000),
            taken_at: None,
            reactions: BTreeMap::from([("heart".to_string(), 3), ("laugh".to_string(), 2)]),
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
    fn test_status_parse_roundtrip() {
        for status in [PhotoStatus::Pending, PhotoStatus::Approved, PhotoStatus::Rejected] {
            assert_eq!(PhotoStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(PhotoStatus::parse("deleted"), None);
    }

    #[test]
    fn test_uploader_identity_from_option() {
        assert_eq!(UploaderIdentity::from_option(None), UploaderIdentity::Anonymous);
        assert_eq!(
            UploaderIdentity::from_option(Some("  ".into())),
            UploaderIdentity::Anonymous
        );
        assert_eq!(
            UploaderIdentity::from_option(Some(" g1 ".into())).id(),
            Some("g1")
        );
    }

    #[test]
    fn test_photo_helpers() {
        let mut p = photo();
        assert_eq!(p.total_reactions(), 5);
        assert_eq!(p.megapixels(), Some(8.0));
        assert!(p.add_label(FEATURED_LABEL));
        assert!(!p.add_label(FEATURED_LABEL));
        assert_eq!(p.labels.len(), 1);
        assert_eq!(p.export_file_name(), "p1.jpg");
        assert_eq!(p.highlight_score(), 0.0);
    }

    #[test]
    fn test_media_kind_from_content_type() {
        assert_eq!(MediaKind::from_content_type("video/mp4"), MediaKind::Video);
        assert_eq!(MediaKind::from_content_type("image/heic"), MediaKind::Image);
    }
}
