//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use momentos_gallery::GalleryError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Upload timed out")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Gallery(#[from] GalleryError),
}

impl ApiError {
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Timeout => StatusCode::REQUEST_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Gallery(e) => gallery_status(e),
        }
    }

    /// Stable machine-readable code for clients.
    pub fn code(&self) -> Option<&'static str> {
        let code = match self {
            ApiError::Timeout => "upload_timeout",
            ApiError::Gallery(e) => match e {
                GalleryError::WindowClosed => "window_closed",
                GalleryError::TokenNotFound => "token_not_found",
                GalleryError::TokenInactive => "token_inactive",
                GalleryError::TokenExpired => "token_expired",
                GalleryError::TokenUsageExceeded => "token_usage_exceeded",
                GalleryError::SceneNotAllowed { .. } => "scene_not_allowed",
                GalleryError::DuplicatePhoto => "duplicate_photo",
                GalleryError::VideoTooLong { .. } => "video_too_long",
                GalleryError::ReactionsDisabled => "reactions_disabled",
                GalleryError::InvalidInput(_) => "invalid_input",
                GalleryError::Cancelled => "upload_cancelled",
                GalleryError::PhotoNotFound(_) => "photo_not_found",
                GalleryError::InvalidTransition { .. } => "invalid_transition",
                GalleryError::MetadataWriteFailed(_) => "metadata_write_failed",
                GalleryError::Storage(_) | GalleryError::Store(_) => return None,
            },
            _ => return None,
        };
        Some(code)
    }

    fn is_internal(&self) -> bool {
        match self {
            ApiError::Internal(_) => true,
            ApiError::Gallery(e) => matches!(
                e,
                GalleryError::Storage(_) | GalleryError::Store(_) | GalleryError::MetadataWriteFailed(_)
            ),
            _ => false,
        }
    }
}

fn gallery_status(e: &GalleryError) -> StatusCode {
    match e {
        GalleryError::WindowClosed | GalleryError::TokenExpired => StatusCode::GONE,
        GalleryError::TokenNotFound
        | GalleryError::TokenInactive
        | GalleryError::TokenUsageExceeded
        | GalleryError::SceneNotAllowed { .. }
        | GalleryError::ReactionsDisabled => StatusCode::FORBIDDEN,
        GalleryError::DuplicatePhoto | GalleryError::InvalidTransition { .. } => StatusCode::CONFLICT,
        GalleryError::VideoTooLong { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        GalleryError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        GalleryError::Cancelled => StatusCode::REQUEST_TIMEOUT,
        GalleryError::PhotoNotFound(_) => StatusCode::NOT_FOUND,
        GalleryError::MetadataWriteFailed(_) => StatusCode::SERVICE_UNAVAILABLE,
        GalleryError::Storage(_) | GalleryError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Don't expose internal error details in production
        let detail = if self.is_internal()
            && std::env::var("ENVIRONMENT").unwrap_or_default() == "production"
        {
            "An internal error occurred".to_string()
        } else {
            self.to_string()
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        }

        let body = ErrorResponse {
            detail,
            code: self.code(),
        };

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gallery_status_mapping() {
        assert_eq!(ApiError::from(GalleryError::WindowClosed).status_code(), StatusCode::GONE);
        assert_eq!(
            ApiError::from(GalleryError::DuplicatePhoto).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(GalleryError::TokenUsageExceeded).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            ApiError::from(GalleryError::PhotoNotFound("p1".into())).status_code(),
            StatusCode::NOT_FOUND
        );
    }

    #[test]
    fn test_guest_message_passes_through() {
        let err = ApiError::from(GalleryError::TokenExpired);
        assert_eq!(err.code(), Some("token_expired"));
        assert!(err.to_string().contains("Ask the hosts"));
        assert!(!err.is_internal());
    }
}
