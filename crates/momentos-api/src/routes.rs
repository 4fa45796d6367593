//! API routes.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{delete, get, patch, post, put};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::albums::{
    archive_album, close_window, ensure_album, export_links, get_album, scene_summary,
    set_event_date, update_settings, upload_state,
};
use crate::handlers::moderation::{approve_photo, reject_photo, rescore_photo};
use crate::handlers::photos::{
    get_photo, guest_feed, leaderboard, list_photos, react, remove_photo, update_labels,
};
use crate::handlers::tokens::{guest_access, issue_token, list_tokens, revoke_token};
use crate::handlers::uploads::upload_photo;
use crate::handlers::{health, ready};
use crate::metrics::metrics_middleware;
use crate::middleware::{
    cors_layer, rate_limit_middleware, request_id, request_logging, security_headers,
    RateLimiterCache,
};
use crate::state::AppState;

const ALBUM: &str = "/weddings/:wedding_id/albums/:album_id";

fn album_route(suffix: &str) -> String {
    format!("{}{}", ALBUM, suffix)
}

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    // Host dashboard, requires a host session
    let host_routes = Router::new()
        .route(ALBUM, put(ensure_album).get(get_album))
        .route(&album_route("/settings"), patch(update_settings))
        .route(&album_route("/archive"), post(archive_album))
        .route(&album_route("/event-date"), put(set_event_date))
        .route(&album_route("/close"), post(close_window))
        .route(&album_route("/summary"), get(scene_summary))
        .route(&album_route("/export"), get(export_links))
        .route(&album_route("/photos"), get(list_photos))
        .route(
            &album_route("/photos/:photo_id"),
            get(get_photo).delete(remove_photo),
        )
        .route(&album_route("/photos/:photo_id/labels"), put(update_labels))
        .route(&album_route("/photos/:photo_id/approve"), post(approve_photo))
        .route(&album_route("/photos/:photo_id/reject"), post(reject_photo))
        .route(&album_route("/photos/:photo_id/rescore"), post(rescore_photo))
        .route(&album_route("/tokens"), post(issue_token).get(list_tokens))
        .route(&album_route("/tokens/:token_id"), delete(revoke_token));

    // Guest-facing pages, no session
    let guest_routes = Router::new()
        .route(&album_route("/upload-state"), get(upload_state))
        .route(&album_route("/guest-access"), get(guest_access))
        .route(&album_route("/feed"), get(guest_feed))
        .route(&album_route("/leaderboard"), get(leaderboard))
        .route(&album_route("/photos/:photo_id/reactions"), post(react));

    // Multipart bodies bypass axum's default 2MB cap; the global limit applies
    let upload_routes = Router::new()
        .route(&album_route("/uploads"), post(upload_photo))
        .layer(DefaultBodyLimit::disable());

    let config = &state.config;
    let rate_limiter = Arc::new(RateLimiterCache::new(config.rate_limit_rps, config.rate_limit_burst));

    // Public routes are keyed only by IP, so they get a tighter quota
    let guest_rate_limiter = Arc::new(RateLimiterCache::new(
        config.upload_rate_limit_rps,
        config.upload_rate_limit_rps.saturating_mul(2),
    ));

    let api_routes = Router::new()
        .merge(host_routes)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware))
        .merge(
            Router::new()
                .merge(guest_routes)
                .merge(upload_routes)
                .layer(middleware::from_fn_with_state(
                    guest_rate_limiter,
                    rate_limit_middleware,
                )),
        );

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}
