//! Highlight scoring.
//!
//! A deterministic heuristic ranking how likely a photo is to be a "best
//! moment". Scores never go down: the prior stored score is a floor.

use chrono::Duration;
use serde::Serialize;

use momentos_models::{Album, Photo, UploaderKind, FEATURED_LABEL};

const BASE_SCORE: f64 = 0.35;
const PREFERRED_SCENE_BONUS: f64 = 0.12;
const PER_REACTION_BONUS: f64 = 0.015;
const MAX_COUNTED_REACTIONS: u64 = 20;
const GUEST_BONUS: f64 = 0.05;
const EVENT_MOMENT_BONUS: f64 = 0.04;
const EVENT_MOMENT_HOURS: i64 = 3;
const FEATURED_BONUS: f64 = 0.15;
const HIGH_RESOLUTION_BONUS: f64 = 0.05;
const HIGH_RESOLUTION_MEGAPIXELS: f64 = 8.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HighlightScore {
    pub score: f64,
    pub reasons: Vec<String>,
}

/// Score `photo` in the context of `album`.
pub fn score(photo: &Photo, album: &Album) -> HighlightScore {
    let mut reasons = Vec::new();
    let mut score = BASE_SCORE;

    if let Some(scene) = photo.scene.as_deref() {
        if album.settings.is_preferred_scene(scene) {
            score += PREFERRED_SCENE_BONUS;
            reasons.push(format!("scene:{}", scene));
        }
    }

    let reactions = photo.total_reactions();
    if reactions > 0 {
        score += reactions.min(MAX_COUNTED_REACTIONS) as f64 * PER_REACTION_BONUS;
        reasons.push(format!("reactions:{}", reactions));
    }

    if photo.uploader_kind == UploaderKind::Guest {
        score += GUEST_BONUS;
        reasons.push("guest_upload".to_string());
    }

    if let (Some(taken_at), Some(event_date)) = (photo.taken_at, album.event_date) {
        if (taken_at - event_date).abs() < Duration::hours(EVENT_MOMENT_HOURS) {
            score += EVENT_MOMENT_BONUS;
            reasons.push("event_moment".to_string());
        }
    }

    if photo.has_label(FEATURED_LABEL) {
        score += FEATURED_BONUS;
        reasons.push("featured".to_string());
    }

    if photo
        .megapixels()
        .is_some_and(|mp| mp >= HIGH_RESOLUTION_MEGAPIXELS)
    {
        score += HIGH_RESOLUTION_BONUS;
        reasons.push("high_resolution".to_string());
    }

    let score = score.max(photo.highlight_score());
    let score = ((score * 1000.0).round() / 1000.0).min(1.0);

    HighlightScore { score, reasons }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use momentos_models::{
        AlbumId, Highlight, MediaKind, PhotoId, PhotoStatus, StoragePaths, UploadInfo,
        UploaderIdentity, WeddingId,
    };
    use std::collections::BTreeMap;

    fn album() -> Album {
        Album::new(WeddingId::from("w1"), AlbumId::default(), Utc::now())
    }

    fn photo(kind: UploaderKind) -> Photo {
        let now = Utc::now();
        Photo {
            id: PhotoId::from("p1"),
            wedding_id: WeddingId::from("w1"),
            album_id: AlbumId::default(),
            uploader_kind: kind,
            uploader: UploaderIdentity::Anonymous,
            guest_name: None,
            source: "web".into(),
            media_kind: MediaKind::Image,
            scene: Some("party".into()),
            labels: vec![],
            status: PhotoStatus::Pending,
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
    fn test_base_score_for_host_photo() {
        let result = score(&photo(UploaderKind::Host), &album());
        assert_eq!(result.score, 0.35);
        assert!(result.reasons.is_empty());
    }

    #[test]
    fn test_all_bonuses() {
        let mut album = album();
        let event = Utc::now();
        album.event_date = Some(event);

        let mut p = photo(UploaderKind::Guest);
        p.scene = Some("ceremony".into());
        p.reactions.insert("heart".into(), 30);
        p.taken_at = Some(event + Duration::hours(1));
        p.labels.push(FEATURED_LABEL.into());
        p.width = Some(4000);
        p.height = Some(3000);

        // 0.35 + 0.12 + 0.30 + 0.05 + 0.04 + 0.15 + 0.05 = 1.06, capped
        let result = score(&p, &album);
        assert_eq!(result.score, 1.0);
        assert_eq!(result.reasons.len(), 6);
    }

    #[test]
    fn test_reactions_and_guest() {
        let mut p = photo(UploaderKind::Guest);
        p.reactions.insert("heart".into(), 2);
        p.reactions.insert("wow".into(), 1);
        // 0.35 + 0.045 + 0.05
        assert_eq!(score(&p, &album()).score, 0.445);
    }

    #[test]
    fn test_priority_scene_from_settings() {
        let mut album = album();
        if let Some(scene) = album.settings.scenes.iter_mut().find(|s| s.id == "party") {
            scene.priority = true;
        }
        let result = score(&photo(UploaderKind::Host), &album);
        assert_eq!(result.score, 0.47);
    }

    #[test]
    fn test_capture_outside_event_range() {
        let mut album = album();
        let event = Utc::now();
        album.event_date = Some(event);
        let mut p = photo(UploaderKind::Host);
        p.taken_at = Some(event - Duration::hours(4));
        assert_eq!(score(&p, &album).score, 0.35);
    }

    #[test]
    fn test_prior_score_is_a_floor() {
        let mut p = photo(UploaderKind::Host);
        p.highlight = Some(Highlight {
            score: 0.9,
            reasons: vec![],
            surfaced_at: None,
        });
        assert_eq!(score(&p, &album()).score, 0.9);
    }

    #[test]
    fn test_deterministic() {
        let mut p = photo(UploaderKind::Guest);
        p.reactions.insert("heart".into(), 7);
        let album = album();
        assert_eq!(score(&p, &album), score(&p, &album));
    }
}
