//! Moderation, scoring and album feed integration tests.

mod common;

use chrono::Utc;

use common::{harness, image_bytes, Harness};
use momentos_gallery::{summarize_by_scene, Decision, GalleryError, SettingsPatch, UploadRequest};
use momentos_models::{Photo, PhotoStatus, FEATURED_LABEL};
use momentos_storage::CancelSignal;

async fn upload(h: &Harness, seed: u32, scene: Option<&str>) -> Photo {
    let request = UploadRequest {
        scene: scene.map(str::to_string),
        file_name: Some(format!("IMG_{}.jpg", seed)),
        ..h.host_upload(image_bytes(seed, 48))
    };
    h.gallery
        .ingest
        .ingest(request, None, &CancelSignal::never(), Utc::now())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_approve_is_idempotent() {
    let h = harness();
    let photo = upload(&h, 1, Some("party")).await;
    let moderation = &h.gallery.moderation;

    let first = moderation
        .approve(&h.wedding_id, &h.album_id, &photo.id, Decision::by("host-1"), Utc::now())
        .await
        .unwrap();
    let second = moderation
        .approve(&h.wedding_id, &h.album_id, &photo.id, Decision::by("host-1"), Utc::now())
        .await
        .unwrap();

    assert_eq!(first.status, PhotoStatus::Approved);
    assert_eq!(second.approved_at, first.approved_at);

    let album = h.album().await;
    assert_eq!(album.counters.approved_photos, 1);
    assert_eq!(album.counters.pending_photos, 0);
    assert_eq!(album.counters.total_photos, 1);
}

#[tokio::test]
async fn test_reject_records_reason() {
    let h = harness();
    let blurry = upload(&h, 1, None).await;
    let other = upload(&h, 2, None).await;
    let moderation = &h.gallery.moderation;

    let rejected = moderation
        .reject(
            &h.wedding_id,
            &h.album_id,
            &blurry.id,
            Decision::by("host-1").with_reason("blurry"),
            Utc::now(),
        )
        .await
        .unwrap();
    let rejection = rejected.rejection.unwrap();
    assert_eq!(rejected.status, PhotoStatus::Rejected);
    assert_eq!(rejection.reason, "blurry");
    assert_eq!(rejection.rejected_by.as_deref(), Some("host-1"));

    let rejected = moderation
        .reject(&h.wedding_id, &h.album_id, &other.id, Decision::default(), Utc::now())
        .await
        .unwrap();
    assert_eq!(rejected.rejection.unwrap().reason, "Rejected by host");

    let album = h.album().await;
    assert_eq!(album.counters.rejected_photos, 2);
    assert_eq!(album.counters.pending_photos, 0);
}

#[tokio::test]
async fn test_re_review_moves_counters() {
    let h = harness();
    let photo = upload(&h, 1, None).await;
    let moderation = &h.gallery.moderation;

    moderation
        .reject(&h.wedding_id, &h.album_id, &photo.id, Decision::default(), Utc::now())
        .await
        .unwrap();
    let approved = moderation
        .approve(&h.wedding_id, &h.album_id, &photo.id, Decision::default(), Utc::now())
        .await
        .unwrap();
    assert!(approved.rejection.is_none());

    let err = moderation
        .set_status(
            &h.wedding_id,
            &h.album_id,
            &photo.id,
            PhotoStatus::Pending,
            Decision::default(),
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        GalleryError::InvalidTransition {
            from: PhotoStatus::Approved,
            to: PhotoStatus::Pending
        }
    ));

    let album = h.album().await;
    assert_eq!(album.counters.approved_photos, 1);
    assert_eq!(album.counters.rejected_photos, 0);
    assert_eq!(album.counters.pending_photos, 0);
}

#[tokio::test]
async fn test_unknown_photo() {
    let h = harness();
    let err = h
        .gallery
        .moderation
        .approve(
            &h.wedding_id,
            &h.album_id,
            &"missing".into(),
            Decision::default(),
            Utc::now(),
        )
        .await
        .unwrap_err();
    assert!(matches!(err, GalleryError::PhotoNotFound(_)));
}

#[tokio::test]
async fn test_highlight_score_is_monotonic() {
    let h = harness();
    let photo = upload(&h, 1, Some("party")).await;
    let approved = h
        .gallery
        .moderation
        .approve(&h.wedding_id, &h.album_id, &photo.id, Decision::default(), Utc::now())
        .await
        .unwrap();
    // host upload, 12MP from the test optimizer
    assert_eq!(approved.highlight_score(), 0.4);

    let reacted = h
        .gallery
        .albums
        .react(&h.wedding_id, &h.album_id, &photo.id, "heart", 5)
        .await
        .unwrap();
    assert_eq!(reacted.highlight_score(), 0.475);

    let unreacted = h
        .gallery
        .albums
        .react(&h.wedding_id, &h.album_id, &photo.id, "heart", -5)
        .await
        .unwrap();
    assert_eq!(unreacted.reactions.get("heart"), Some(&0));
    assert_eq!(unreacted.highlight_score(), 0.475);

    let rescored = h
        .gallery
        .moderation
        .rescore(&h.wedding_id, &h.album_id, &photo.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(rescored.highlight_score(), 0.475);
}

#[tokio::test]
async fn test_featured_label_above_threshold() {
    let h = harness();
    h.gallery
        .albums
        .update_settings(
            &h.wedding_id,
            &h.album_id,
            SettingsPatch {
                highlight_threshold: Some(0.5),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let photo = upload(&h, 1, Some("ceremony")).await;
    let approved = h
        .gallery
        .moderation
        .approve(&h.wedding_id, &h.album_id, &photo.id, Decision::default(), Utc::now())
        .await
        .unwrap();

    // 0.35 + 0.12 + 0.05
    assert_eq!(approved.highlight_score(), 0.52);
    assert!(approved.has_label(FEATURED_LABEL));
    assert!(approved.highlight.unwrap().surfaced_at.is_some());
}

#[tokio::test]
async fn test_reactions_can_be_disabled() {
    let h = harness();
    let photo = upload(&h, 1, None).await;
    h.gallery
        .albums
        .update_settings(
            &h.wedding_id,
            &h.album_id,
            SettingsPatch {
                allow_reactions: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = h
        .gallery
        .albums
        .react(&h.wedding_id, &h.album_id, &photo.id, "heart", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, GalleryError::ReactionsDisabled));
}

#[tokio::test]
async fn test_soft_remove_hides_photo() {
    let h = harness();
    let kept = upload(&h, 1, Some("party")).await;
    let removed = upload(&h, 2, Some("party")).await;

    h.gallery
        .albums
        .soft_remove(&h.wedding_id, &h.album_id, &removed.id)
        .await
        .unwrap();

    let photos = h
        .gallery
        .albums
        .list_photos(&h.wedding_id, &h.album_id, None, 50)
        .await
        .unwrap();
    assert_eq!(photos.len(), 1);
    assert_eq!(photos[0].id, kept.id);

    // Counters still include removed photos.
    assert_eq!(h.album().await.counters.total_photos, 2);
}

#[tokio::test]
async fn test_export_and_scene_summary() {
    let h = harness();
    let a = upload(&h, 1, Some("ceremony")).await;
    let b = upload(&h, 2, Some("party")).await;
    let c = upload(&h, 3, None).await;
    let _pending = upload(&h, 4, Some("party")).await;

    for id in [&a.id, &b.id, &c.id] {
        h.gallery
            .moderation
            .approve(&h.wedding_id, &h.album_id, id, Decision::default(), Utc::now())
            .await
            .unwrap();
    }

    let links = h
        .gallery
        .albums
        .export_download_links(&h.wedding_id, &h.album_id, PhotoStatus::Approved)
        .await
        .unwrap();
    assert_eq!(links.len(), 3);
    assert!(links.iter().all(|l| l.status == PhotoStatus::Approved));
    assert!(links.iter().all(|l| l.url.starts_with("memory://")));
    let ceremony = links.iter().find(|l| l.id == a.id).unwrap();
    assert_eq!(ceremony.file_name, "IMG_1.jpg");

    let photos = h
        .gallery
        .albums
        .list_photos(&h.wedding_id, &h.album_id, None, 50)
        .await
        .unwrap();
    let summary = summarize_by_scene(&photos);
    assert_eq!(summary.total, 4);
    assert_eq!(summary.scenes.get("party"), Some(&2));
    assert_eq!(summary.scenes.get("ceremony"), Some(&1));
    assert_eq!(summary.scenes.get("other"), Some(&1));
}

#[tokio::test]
async fn test_update_labels_dedupes() {
    let h = harness();
    let photo = upload(&h, 1, Some("party")).await;
    let updated = h
        .gallery
        .albums
        .update_labels(
            &h.wedding_id,
            &h.album_id,
            &photo.id,
            vec!["party".into(), " cake ".into(), "party".into(), "".into()],
        )
        .await
        .unwrap();
    assert_eq!(updated.labels, vec!["party", "cake"]);
}
