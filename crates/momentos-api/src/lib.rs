//! Axum HTTP API for the event gallery.
//!
//! This crate provides:
//! - Host dashboard routes behind HS256 session tokens
//! - Guest upload, feed and reaction routes keyed by access links
//! - Rate limiting and security headers
//! - Prometheus metrics

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::{ApiConfig, StoreBackend};
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
