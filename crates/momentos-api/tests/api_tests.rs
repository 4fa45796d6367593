//! Router tests against the in-memory backends.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;

use momentos_api::auth::HostClaims;
use momentos_api::{create_router, ApiConfig, AppState};
use momentos_firestore::MemoryStore;
use momentos_gallery::{Gallery, GalleryConfig, GalleryContext};
use momentos_media::JpegOptimizer;
use momentos_storage::MemoryBlobStore;

const SECRET: &str = "test-secret";
const BOUNDARY: &str = "momentos-test-boundary";
const ALBUM: &str = "/api/weddings/ana-leo/albums/moments";

struct TestApp {
    router: Router,
    blobs: Arc<MemoryBlobStore>,
}

fn app() -> TestApp {
    let blobs = Arc::new(MemoryBlobStore::new());
    let ctx = GalleryContext::new(
        Arc::new(MemoryStore::new()),
        blobs.clone(),
        Arc::new(JpegOptimizer::new()),
        GalleryConfig {
            share_base_url: "https://moments.test".to_string(),
            ..GalleryConfig::default()
        },
    );
    let config = ApiConfig {
        jwt_secret: SECRET.to_string(),
        ..ApiConfig::default()
    };
    let state = AppState::from_parts(config, Gallery::new(ctx), None);
    TestApp {
        router: create_router(state, None),
        blobs,
    }
}

fn host_token(weddings: &[&str]) -> String {
    let claims = HostClaims {
        sub: "host-1".to_string(),
        weddings: weddings.iter().map(|w| w.to_string()).collect(),
        role: None,
        exp: Utc::now().timestamp() + 600,
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(SECRET.as_bytes())).unwrap()
}

fn json_request(method: Method, uri: &str, auth: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = auth {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn get(uri: &str, auth: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = auth {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::empty()).unwrap()
}

/// Multipart upload with text fields and one image file.
fn upload(fields: &[(&str, &str)], file: &[u8], guest_id: Option<&str>, auth: Option<&str>) -> Request<Body> {
    let mut body = Vec::new();
    for (name, value) in fields {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"IMG_0001.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n",
            BOUNDARY
        )
        .as_bytes(),
    );
    body.extend_from_slice(file);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());

    let mut builder = Request::builder()
        .method(Method::POST)
        .uri(format!("{}/uploads", ALBUM))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        );
    if let Some(id) = guest_id {
        builder = builder.header("X-Guest-Id", id);
    }
    if let Some(token) = auth {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    builder.body(Body::from(body)).unwrap()
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

/// Create the album and return a fresh guest link secret.
async fn issue_guest_link(app: &TestApp, host: &str) -> String {
    let (status, _) = send(
        app,
        json_request(Method::PUT, ALBUM, Some(host), json!({ "name": "Ana & Leo" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        json_request(Method::POST, &format!("{}/tokens", ALBUM), Some(host), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["token"]["secret"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_and_ready() {
    let app = app();
    let (status, body) = send(&app, get("/health", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, get("/ready", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ready");
    assert_eq!(body["checks"]["documents"]["status"], "ok");
}

#[tokio::test]
async fn test_host_routes_require_session() {
    let app = app();
    let (status, body) = send(&app, get(ALBUM, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].as_str().unwrap().contains("Authorization"));

    let outsider = host_token(&["someone-else"]);
    let (status, _) = send(&app, get(&format!("{}/photos", ALBUM), Some(&outsider))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let host = host_token(&["ana-leo"]);
    let (status, body) = send(&app, get(ALBUM, Some(&host))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["detail"].is_string());
}

#[tokio::test]
async fn test_guest_upload_flow() {
    let app = app();
    let host = host_token(&["ana-leo"]);
    let secret = issue_guest_link(&app, &host).await;

    let (status, body) = send(
        &app,
        get(&format!("{}/guest-access?token={}", ALBUM, secret), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["album_name"], "Ana & Leo");
    assert_eq!(body["scenes"].as_array().unwrap().len(), 5);

    let file = vec![7u8; 512];
    let (status, body) = send(
        &app,
        upload(
            &[("token", &secret), ("scene", "party"), ("guest_name", "Tia Rosa")],
            &file,
            Some("device-1"),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["scene"], "party");
    let photo_id = body["id"].as_str().unwrap().to_string();
    assert!(!app.blobs.is_empty());

    // Same bytes again
    let (status, body) = send(&app, upload(&[("token", &secret)], &file, None, None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "duplicate_photo");

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("{}/photos/{}/approve", ALBUM, photo_id),
            Some(&host),
            json!({}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");

    let (status, body) = send(&app, get(&format!("{}/feed", ALBUM), None)).await;
    assert_eq!(status, StatusCode::OK);
    let feed = body.as_array().unwrap();
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0]["guest_name"], "Tia Rosa");
    assert!(feed[0].get("uploader").is_none());

    let (status, body) = send(&app, get(&format!("{}/leaderboard", ALBUM), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body[0]["guest_id"], "device-1");
    assert_eq!(body[0]["total_uploads"], 1);

    let (status, body) = send(&app, get(ALBUM, Some(&host))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["counters"]["approved_photos"], 1);
    assert_eq!(body["counters"]["guest_contributors"], 1);
}

#[tokio::test]
async fn test_guest_upload_needs_valid_link() {
    let app = app();
    let host = host_token(&["ana-leo"]);
    issue_guest_link(&app, &host).await;

    let (status, body) = send(&app, upload(&[], &[1u8; 64], None, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "token_not_found");
    assert!(body["detail"].as_str().unwrap().contains("Ask the hosts"));

    let (status, _) = send(&app, upload(&[("token", "bogus")], &[1u8; 64], None, None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(app.blobs.is_empty());
}

#[tokio::test]
async fn test_host_upload_skips_token() {
    let app = app();
    let host = host_token(&["ana-leo"]);
    issue_guest_link(&app, &host).await;

    let (status, body) = send(&app, upload(&[("scene", "ceremony")], &[3u8; 128], None, Some(&host))).await;
    assert_eq!(status, StatusCode::CREATED);
    let photo_id = body["id"].as_str().unwrap();

    let (status, body) = send(
        &app,
        get(&format!("{}/photos/{}", ALBUM, photo_id), Some(&host)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["uploader_kind"], "host");
    assert_eq!(body["uploader"]["id"], "host-1");
}

#[tokio::test]
async fn test_closed_window_refuses_uploads() {
    let app = app();
    let host = host_token(&["ana-leo"]);
    let secret = issue_guest_link(&app, &host).await;

    let (status, _) = send(
        &app,
        json_request(Method::POST, &format!("{}/close", ALBUM), Some(&host), json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(&app, upload(&[("token", &secret)], &[9u8; 64], None, None)).await;
    assert_eq!(status, StatusCode::GONE);
    assert_eq!(body["code"], "window_closed");

    let (status, body) = send(&app, get(&format!("{}/upload-state", ALBUM), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["is_open"], false);
}

#[tokio::test]
async fn test_reaction_delta_is_bounded() {
    let app = app();
    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("{}/photos/p1/reactions", ALBUM),
            None,
            json!({ "reaction": "heart", "delta": 5 }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["detail"].as_str().unwrap().contains("delta"));
}

#[tokio::test]
async fn test_reject_with_reason_and_export() {
    let app = app();
    let host = host_token(&["ana-leo"]);
    issue_guest_link(&app, &host).await;

    let (_, body) = send(&app, upload(&[], &[4u8; 96], None, Some(&host))).await;
    let photo_id = body["id"].as_str().unwrap().to_string();

    let (status, body) = send(
        &app,
        json_request(
            Method::POST,
            &format!("{}/photos/{}/reject", ALBUM, photo_id),
            Some(&host),
            json!({ "reason": "blurry" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rejection"]["reason"], "blurry");

    let (status, body) = send(&app, get(&format!("{}/export?status=rejected", ALBUM), Some(&host))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["count"], 1);

    let (status, body) = send(&app, get(&format!("{}/export", ALBUM), Some(&host))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "approved");
    assert_eq!(body["count"], 0);
}

#[tokio::test]
async fn test_security_headers_and_request_id() {
    let app = app();
    let request = Request::builder()
        .uri("/health")
        .header("X-Request-ID", "req-42")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    let headers = response.headers();
    assert_eq!(headers["X-Request-ID"], "req-42");
    assert_eq!(headers["X-Content-Type-Options"], "nosniff");
    assert_eq!(headers["X-Frame-Options"], "DENY");
}
