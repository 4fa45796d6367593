//! Access token and upload window integration tests.

mod common;

use chrono::{Duration, SubsecRound, Utc};

use common::harness;
use momentos_gallery::{GalleryError, IssueTokenRequest};
use momentos_models::{TokenKind, TokenStatus};

#[tokio::test]
async fn test_issue_points_qr_code_at_token() {
    let h = harness();
    let issued = h
        .gallery
        .tokens
        .issue(
            &h.wedding_id,
            &h.album_id,
            IssueTokenRequest {
                kind: TokenKind::Host,
                created_by: Some("host-1".into()),
                ..Default::default()
            },
            Utc::now(),
        )
        .await
        .unwrap();

    let token = &issued.token;
    assert_eq!(token.secret.len(), 48);
    assert_eq!(token.max_usages, 200);
    assert_eq!(token.status, TokenStatus::Active);
    assert_eq!(
        issued.share_url,
        format!(
            "https://moments.test/moments/upload?w=ana-leo&album=moments&token={}",
            token.secret
        )
    );

    let album = h.album().await;
    assert_eq!(album.qr_code.latest_token_id.as_ref(), Some(&token.id));
    assert!(album.upload_window.last_token_at.is_some());

    let validated = h
        .gallery
        .tokens
        .validate(&h.wedding_id, &h.album_id, &token.secret, Utc::now())
        .await
        .unwrap();
    assert_eq!(validated.id, token.id);
}

#[tokio::test]
async fn test_zero_ttl_token_is_expired() {
    let h = harness();
    let secret = h
        .issue_token(IssueTokenRequest {
            ttl_hours: Some(0),
            ..Default::default()
        })
        .await;

    let err = h
        .gallery
        .tokens
        .validate(&h.wedding_id, &h.album_id, &secret, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, GalleryError::TokenExpired));
}

#[tokio::test]
async fn test_revoked_token_is_inactive() {
    let h = harness();
    let issued = h
        .gallery
        .tokens
        .issue(&h.wedding_id, &h.album_id, IssueTokenRequest::default(), Utc::now())
        .await
        .unwrap();

    let revoked = h
        .gallery
        .tokens
        .revoke(&h.wedding_id, &h.album_id, &issued.token.id, Utc::now())
        .await
        .unwrap();
    assert_eq!(revoked.status, TokenStatus::Revoked);
    assert!(revoked.revoked_at.is_some());

    let err = h
        .gallery
        .tokens
        .validate(&h.wedding_id, &h.album_id, &issued.token.secret, Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, GalleryError::TokenInactive));

    let err = h
        .gallery
        .tokens
        .revoke(&h.wedding_id, &h.album_id, &"missing".into(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, GalleryError::TokenNotFound));
}

#[tokio::test]
async fn test_expiry_clamped_to_window() {
    let h = harness();
    let now = Utc::now().trunc_subsecs(3);
    // Window closes in one day.
    h.gallery
        .windows
        .sync_event_date(&h.wedding_id, &h.album_id, Some(now - Duration::days(29)), now)
        .await
        .unwrap();

    let issued = h
        .gallery
        .tokens
        .issue(
            &h.wedding_id,
            &h.album_id,
            IssueTokenRequest {
                ttl_hours: Some(72),
                ..Default::default()
            },
            now,
        )
        .await
        .unwrap();
    assert_eq!(issued.token.expires_at, now + Duration::days(1));
}

#[tokio::test]
async fn test_no_tokens_after_window_closes() {
    let h = harness();
    let now = Utc::now();
    h.gallery
        .windows
        .close_window(&h.wedding_id, &h.album_id, now)
        .await
        .unwrap();

    let err = h
        .gallery
        .tokens
        .issue(&h.wedding_id, &h.album_id, IssueTokenRequest::default(), Utc::now())
        .await
        .unwrap_err();
    assert!(matches!(err, GalleryError::WindowClosed));
}

#[tokio::test]
async fn test_issue_rejects_bad_requests() {
    let h = harness();
    for request in [
        IssueTokenRequest {
            ttl_hours: Some(-1),
            ..Default::default()
        },
        IssueTokenRequest {
            max_usages: Some(0),
            ..Default::default()
        },
        IssueTokenRequest {
            scene_targets: vec!["afterparty".into()],
            ..Default::default()
        },
    ] {
        let err = h
            .gallery
            .tokens
            .issue(&h.wedding_id, &h.album_id, request, Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, GalleryError::InvalidInput(_)));
    }
}

#[tokio::test]
async fn test_event_date_reopens_window() {
    let h = harness();
    let now = Utc::now();
    let windows = &h.gallery.windows;

    windows
        .sync_event_date(&h.wedding_id, &h.album_id, Some(now - Duration::days(40)), now)
        .await
        .unwrap();
    let state = windows.state(&h.wedding_id, &h.album_id, now).await.unwrap();
    assert!(!state.is_open);
    assert!(state.window.closed_at.is_some());
    assert!(state.remaining_days.unwrap() < 0);

    let album = windows
        .sync_event_date(&h.wedding_id, &h.album_id, Some(now + Duration::days(2)), now)
        .await
        .unwrap();
    assert!(album.upload_window.closed_at.is_none());

    let state = windows.state(&h.wedding_id, &h.album_id, now).await.unwrap();
    assert!(state.is_open);
    assert_eq!(state.remaining_days, Some(32));
    assert!(!state.cleanup_due);
}
