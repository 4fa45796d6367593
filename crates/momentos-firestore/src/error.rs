//! Firestore error types.

use thiserror::Error;

/// Result type for Firestore operations.
pub type FirestoreResult<T> = Result<T, FirestoreError>;

/// Errors that can occur during Firestore operations.
#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Document not found: {0}")]
    NotFound(String),

    #[error("Document already exists: {0}")]
    AlreadyExists(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("Server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),

    #[error("Write conflict persisted after {attempts} attempts on {operation}")]
    ConflictRetriesExhausted { operation: String, attempts: u32 },
}

impl FirestoreError {
    pub fn auth_error(msg: impl Into<String>) -> Self {
        Self::AuthError(msg.into())
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn request_failed(msg: impl Into<String>) -> Self {
        Self::RequestFailed(msg.into())
    }

    pub fn invalid_document(msg: impl Into<String>) -> Self {
        Self::InvalidDocument(msg.into())
    }

    /// Map an HTTP error response to an error variant.
    ///
    /// Firestore reports an `updateTime` mismatch as 400 `FAILED_PRECONDITION`,
    /// transaction contention as 409 `ABORTED` and `exists=false` violations as
    /// 409 `ALREADY_EXISTS`.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            400 if body.contains("FAILED_PRECONDITION") => Self::PreconditionFailed(body),
            400 => Self::RequestFailed(body),
            401 => Self::AuthError(body),
            403 => Self::PermissionDenied(body),
            404 => Self::NotFound(body),
            409 if body.contains("ABORTED") => Self::PreconditionFailed(body),
            409 => Self::AlreadyExists(body),
            412 => Self::PreconditionFailed(body),
            429 => Self::RateLimited(1000),
            500..=599 => Self::ServerError(status, body),
            _ => Self::RequestFailed(body),
        }
    }

    /// HTTP status equivalent, used for request metrics.
    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::AuthError(_) => Some(401),
            Self::PermissionDenied(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::AlreadyExists(_) => Some(409),
            Self::PreconditionFailed(_) | Self::ConflictRetriesExhausted { .. } => Some(412),
            Self::RateLimited(_) => Some(429),
            Self::ServerError(code, _) => Some(*code),
            Self::RequestFailed(_) | Self::InvalidDocument(_) => Some(400),
            Self::Network(_) | Self::Json(_) => None,
        }
    }

    /// Server-suggested delay before the next attempt.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Check if error is retryable at the transport level.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FirestoreError::Network(_)
                | FirestoreError::RateLimited(_)
                | FirestoreError::ServerError(_, _)
        )
    }

    /// True if the error was caused by a failed precondition (e.g., updateTime mismatch).
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, FirestoreError::PreconditionFailed(_))
    }

    /// True when a concurrent writer won the race and the caller should
    /// re-read and try again.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            FirestoreError::PreconditionFailed(_) | FirestoreError::AlreadyExists(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status_precondition() {
        let err = FirestoreError::from_http_status(400, "{\"status\":\"FAILED_PRECONDITION\"}");
        assert!(err.is_precondition_failed());
        assert!(err.is_conflict());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_from_http_status_conflicts() {
        let aborted = FirestoreError::from_http_status(409, "ABORTED: too much contention");
        assert!(aborted.is_precondition_failed());

        let exists = FirestoreError::from_http_status(409, "ALREADY_EXISTS");
        assert!(matches!(exists, FirestoreError::AlreadyExists(_)));
        assert!(exists.is_conflict());
    }

    #[test]
    fn test_from_http_status_retryable() {
        assert!(FirestoreError::from_http_status(429, "slow down").is_retryable());
        assert!(FirestoreError::from_http_status(503, "unavailable").is_retryable());
        assert!(!FirestoreError::from_http_status(400, "bad request").is_retryable());
        assert!(matches!(
            FirestoreError::from_http_status(404, "missing"),
            FirestoreError::NotFound(_)
        ));
    }

    #[test]
    fn test_http_status_getter() {
        assert_eq!(FirestoreError::RateLimited(1000).http_status(), Some(429));
        assert_eq!(
            FirestoreError::ServerError(502, "bad gateway".into()).http_status(),
            Some(502)
        );
        assert_eq!(FirestoreError::RateLimited(250).retry_after_ms(), Some(250));
        assert_eq!(FirestoreError::not_found("x").retry_after_ms(), None);
    }
}
