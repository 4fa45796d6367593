//! Album models.
//!
//! An album is the container guests and hosts upload into. Its counters are
//! maintained incrementally by the ingestion and moderation paths; nothing
//! recomputes them by scanning photos.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::{AlbumId, TokenId, WeddingId};
use crate::photo::PhotoStatus;

/// Album id created for every wedding on first access.
pub const DEFAULT_ALBUM_ID: &str = "moments";

/// Storage budget after which new uploads are recompressed (30 GiB).
pub const COMPRESSION_THRESHOLD_BYTES: u64 = 30 * 1024 * 1024 * 1024;

/// Days after the event date during which uploads are accepted.
pub const UPLOAD_WINDOW_DAYS: i64 = 30;

/// Days after the event date at which album media is scheduled for cleanup.
pub const RETENTION_DAYS: i64 = 365;

/// Scene ids that score as preferred when no album scene declares a priority.
pub const DEFAULT_PREFERRED_SCENES: &[&str] = &["ceremony", "banquet"];

/// Album lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum AlbumStatus {
    #[default]
    Active,
    /// Upload window is over. Reading and moderation continue.
    Closed,
    /// Terminal state; albums are never hard-deleted.
    Archived,
}

impl AlbumStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlbumStatus::Active => "active",
            AlbumStatus::Closed => "closed",
            AlbumStatus::Archived => "archived",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "closed" => Some(Self::Closed),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

impl fmt::Display for AlbumStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How new uploads enter the gallery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModerationMode {
    /// Every upload waits for a host decision.
    #[default]
    Manual,
    /// Uploads not flagged by the content checker are approved immediately.
    Auto,
}

impl ModerationMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModerationMode::Manual => "manual",
            ModerationMode::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "manual" => Some(Self::Manual),
            "auto" => Some(Self::Auto),
            _ => None,
        }
    }
}

/// Retention cleanup state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum CleanupStatus {
    #[default]
    Scheduled,
    Completed,
}

impl CleanupStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CleanupStatus::Scheduled => "scheduled",
            CleanupStatus::Completed => "completed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "scheduled" => Some(Self::Scheduled),
            "completed" => Some(Self::Completed),
            _ => None,
        }
    }
}

/// A moment of the event photos can be tagged with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Scene {
    pub id: String,
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emoji: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Priority scenes get a highlight bonus.
    #[serde(default)]
    pub priority: bool,
}

impl Scene {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            emoji: None,
            color: None,
            priority: false,
        }
    }

    /// Scenes every album starts with.
    pub fn defaults() -> Vec<Scene> {
        vec![
            Scene::new("ceremony", "Ceremony"),
            Scene::new("banquet", "Banquet"),
            Scene::new("party", "Party"),
            Scene::new("post_wedding", "Post-wedding"),
            Scene::new("other", "Other"),
        ]
    }

    /// Trim ids, drop empty and duplicate entries, fall back to the defaults
    /// when nothing usable remains.
    pub fn normalize(scenes: Vec<Scene>) -> Vec<Scene> {
        let mut out: Vec<Scene> = Vec::with_capacity(scenes.len());
        for mut scene in scenes {
            scene.id = scene.id.trim().to_string();
            if scene.id.is_empty() || out.iter().any(|s| s.id == scene.id) {
                continue;
            }
            scene.label = match scene.label.trim() {
                "" => scene.id.clone(),
                label => label.to_string(),
            };
            out.push(scene);
        }
        if out.is_empty() {
            return Scene::defaults();
        }
        out
    }
}

/// Slideshow presentation settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SlideshowSettings {
    pub auto_advance_seconds: u32,
    pub theme: String,
    pub highlight_threshold: f64,
    pub show_captions: bool,
}

impl Default for SlideshowSettings {
    fn default() -> Self {
        Self {
            auto_advance_seconds: 6,
            theme: "classic".to_string(),
            highlight_threshold: 0.75,
            show_captions: true,
        }
    }
}

/// Host-editable album settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AlbumSettings {
    pub moderation_mode: ModerationMode,
    pub max_file_size_mb: u32,
    pub allow_reactions: bool,
    pub allow_guest_gallery: bool,
    /// Approved photos scoring at or above this get the `featured` label.
    pub highlight_threshold: f64,
    pub slideshow: SlideshowSettings,
    pub scenes: Vec<Scene>,
}

impl Default for AlbumSettings {
    fn default() -> Self {
        Self {
            moderation_mode: ModerationMode::Manual,
            max_file_size_mb: 25,
            allow_reactions: true,
            allow_guest_gallery: true,
            highlight_threshold: 0.72,
            slideshow: SlideshowSettings::default(),
            scenes: Scene::defaults(),
        }
    }
}

impl AlbumSettings {
    pub fn scene(&self, id: &str) -> Option<&Scene> {
        self.scenes.iter().find(|s| s.id == id)
    }

    pub fn max_file_size_bytes(&self) -> u64 {
        u64::from(self.max_file_size_mb) * 1024 * 1024
    }

    /// Whether `scene_id` earns the preferred-scene bonus.
    ///
    /// A scene configured on the album decides by its own `priority` flag;
    /// unknown scenes fall back to [`DEFAULT_PREFERRED_SCENES`].
    pub fn is_preferred_scene(&self, scene_id: &str) -> bool {
        self.scene(scene_id).map(|s| s.priority).unwrap_or(false)
            || DEFAULT_PREFERRED_SCENES.contains(&scene_id)
    }
}

/// Aggregate counters kept on the album document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AlbumCounters {
    pub total_photos: u64,
    pub pending_photos: u64,
    pub approved_photos: u64,
    pub rejected_photos: u64,
    pub guest_contributors: u64,
    pub badges_granted: u64,
    /// Sum of original upload sizes.
    pub total_bytes: u64,
    /// Sum of stored (possibly recompressed) sizes.
    pub optimized_bytes: u64,
}

impl AlbumCounters {
    /// Account for a new pending photo.
    pub fn record_upload(&mut self, original_bytes: u64, stored_bytes: u64) {
        self.total_photos += 1;
        self.pending_photos += 1;
        self.total_bytes += original_bytes;
        self.optimized_bytes += stored_bytes;
    }

    /// Move one photo between status buckets.
    pub fn apply_transition(&mut self, from: PhotoStatus, to: PhotoStatus) {
        if from == to {
            return;
        }
        match from {
            PhotoStatus::Pending => self.pending_photos = self.pending_photos.saturating_sub(1),
            PhotoStatus::Approved => self.approved_photos = self.approved_photos.saturating_sub(1),
            PhotoStatus::Rejected => self.rejected_photos = self.rejected_photos.saturating_sub(1),
        }
        match to {
            PhotoStatus::Pending => self.pending_photos += 1,
            PhotoStatus::Approved => self.approved_photos += 1,
            PhotoStatus::Rejected => self.rejected_photos += 1,
        }
    }
}

/// Upload window and storage budget state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct UploadWindow {
    /// Explicit close time; derived from the event date when absent.
    pub closes_at: Option<DateTime<Utc>>,
    /// Stamped once when the closure is first observed.
    pub closed_at: Option<DateTime<Utc>>,
    pub compression_threshold_bytes: u64,
    /// Latched on once the budget is crossed. Never switches back off.
    pub compression_active: bool,
    pub last_compression_at: Option<DateTime<Utc>>,
    pub last_token_at: Option<DateTime<Utc>>,
    pub cleanup_at: Option<DateTime<Utc>>,
    pub cleanup_status: CleanupStatus,
}

impl Default for UploadWindow {
    fn default() -> Self {
        Self {
            closes_at: None,
            closed_at: None,
            compression_threshold_bytes: COMPRESSION_THRESHOLD_BYTES,
            compression_active: false,
            last_compression_at: None,
            last_token_at: None,
            cleanup_at: None,
            cleanup_status: CleanupStatus::Scheduled,
        }
    }
}

impl UploadWindow {
    /// Latch compression on. Returns true only on the off→on transition.
    pub fn latch_compression(&mut self, now: DateTime<Utc>) -> bool {
        if self.compression_active {
            return false;
        }
        self.compression_active = true;
        self.last_compression_at = Some(now);
        true
    }
}

/// Pointer to the most recently issued guest QR token.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct QrCodePointer {
    pub latest_token_id: Option<TokenId>,
    pub expires_at: Option<DateTime<Utc>>,
}

/// Album document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Album {
    pub id: AlbumId,
    pub wedding_id: WeddingId,
    pub name: String,
    pub slug: String,
    #[serde(default)]
    pub status: AlbumStatus,
    pub event_date: Option<DateTime<Utc>>,
    pub upload_window: UploadWindow,
    pub counters: AlbumCounters,
    pub settings: AlbumSettings,
    pub qr_code: QrCodePointer,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Album {
    /// Album with default settings, counters and window.
    pub fn new(wedding_id: WeddingId, id: AlbumId, now: DateTime<Utc>) -> Self {
        let slug = format!("{}-main", id.as_str());
        Self {
            id,
            wedding_id,
            name: "Memories gallery".to_string(),
            slug,
            status: AlbumStatus::Active,
            event_date: None,
            upload_window: UploadWindow::default(),
            counters: AlbumCounters::default(),
            settings: AlbumSettings::default(),
            qr_code: QrCodePointer::default(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_archived(&self) -> bool {
        self.status == AlbumStatus::Archived
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = AlbumSettings::default();
        assert_eq!(settings.moderation_mode, ModerationMode::Manual);
        assert_eq!(settings.max_file_size_mb, 25);
        assert!((settings.highlight_threshold - 0.72).abs() < f64::EPSILON);
        assert_eq!(settings.scenes.len(), 5);
        assert_eq!(settings.max_file_size_bytes(), 25 * 1024 * 1024);
    }

    #[test]
    fn test_preferred_scene_defaults_and_priority() {
        let mut settings = AlbumSettings::default();
        assert!(settings.is_preferred_scene("ceremony"));
        assert!(settings.is_preferred_scene("banquet"));
        assert!(!settings.is_preferred_scene("party"));

        settings.scenes[2].priority = true;
        assert!(settings.is_preferred_scene("party"));
    }

    #[test]
    fn test_normalize_scenes() {
        let scenes = vec![
            Scene::new(" ceremony ", ""),
            Scene::new("ceremony", "Duplicate"),
            Scene::new("", "Empty"),
        ];
        let normalized = Scene::normalize(scenes);
        assert_eq!(normalized.len(), 1);
        assert_eq!(normalized[0].id, "ceremony");
        assert_eq!(normalized[0].label, "ceremony");

        assert_eq!(Scene::normalize(vec![]).len(), 5);
    }

    #[test]
    fn test_counters_transition() {
        let mut counters = AlbumCounters::default();
        counters.record_upload(100, 60);
        counters.record_upload(100, 100);
        assert_eq!(counters.total_photos, 2);
        assert_eq!(counters.pending_photos, 2);
        assert_eq!(counters.total_bytes, 200);
        assert_eq!(counters.optimized_bytes, 160);

        counters.apply_transition(PhotoStatus::Pending, PhotoStatus::Rejected);
        counters.apply_transition(PhotoStatus::Pending, PhotoStatus::Approved);
        counters.apply_transition(PhotoStatus::Approved, PhotoStatus::Approved);
        assert_eq!(counters.pending_photos, 0);
        assert_eq!(counters.approved_photos, 1);
        assert_eq!(counters.rejected_photos, 1);
    }

    #[test]
    fn test_compression_latch_is_sticky() {
        let mut window = UploadWindow::default();
        let now = Utc::now();
        assert!(window.latch_compression(now));
        assert!(!window.latch_compression(now));
        assert!(window.compression_active);
        assert_eq!(window.last_compression_at, Some(now));
    }
}
