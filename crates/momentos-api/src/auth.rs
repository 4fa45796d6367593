//! Host session verification and guest identity.
//!
//! Hosts sign in through the external auth service, which issues HS256 JWTs
//! listing the weddings they manage. Guests never authenticate; they may send
//! a stable device id in `X-Guest-Id` so their uploads count towards badges.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use tracing::debug;

use momentos_models::{UploaderIdentity, WeddingId};

use crate::error::ApiError;
use crate::state::AppState;

/// Header carrying the guest device id.
pub const GUEST_ID_HEADER: &str = "X-Guest-Id";

const MAX_GUEST_ID_LEN: usize = 128;

/// Decoded host session claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostClaims {
    /// User ID
    pub sub: String,
    /// Weddings this user may manage
    #[serde(default)]
    pub weddings: Vec<String>,
    /// `admin` may manage every wedding
    #[serde(default)]
    pub role: Option<String>,
    /// Expiration
    pub exp: i64,
}

/// Authenticated host extracted from request.
#[derive(Debug, Clone)]
pub struct HostUser {
    pub uid: String,
    pub weddings: Vec<String>,
    pub is_admin: bool,
}

impl From<HostClaims> for HostUser {
    fn from(claims: HostClaims) -> Self {
        Self {
            uid: claims.sub,
            weddings: claims.weddings,
            is_admin: claims.role.as_deref() == Some("admin"),
        }
    }
}

impl HostUser {
    pub fn can_manage(&self, wedding_id: &WeddingId) -> bool {
        self.is_admin || self.weddings.iter().any(|w| w == wedding_id.as_str())
    }

    /// Fail with 403 unless this host manages `wedding_id`.
    pub fn authorize(&self, wedding_id: &WeddingId) -> Result<(), ApiError> {
        if self.can_manage(wedding_id) {
            Ok(())
        } else {
            Err(ApiError::forbidden("Not a host of this wedding"))
        }
    }
}

/// Verifies host session tokens.
pub struct JwtVerifier {
    key: DecodingKey,
    validation: Validation,
}

impl JwtVerifier {
    pub fn new(secret: &str, issuer: Option<&str>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        if let Some(issuer) = issuer {
            validation.set_issuer(&[issuer]);
        }
        Self {
            key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    pub fn verify_token(&self, token: &str) -> Result<HostClaims, ApiError> {
        let data = decode::<HostClaims>(token, &self.key, &self.validation)
            .map_err(|e| ApiError::unauthorized(format!("Token validation failed: {}", e)))?;
        debug!(uid = %data.claims.sub, "Host session verified");
        Ok(data.claims)
    }
}

/// Axum extractor for authenticated hosts.
#[axum::async_trait]
impl FromRequestParts<AppState> for HostUser {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get("Authorization")
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::unauthorized("Missing Authorization header"))?;

        let token = auth_header
            .strip_prefix("Bearer ")
            .ok_or_else(|| ApiError::unauthorized("Invalid Authorization header format"))?;

        let claims = state.jwt.verify_token(token)?;
        Ok(HostUser::from(claims))
    }
}

/// Optional guest device id. Blank or oversized ids are treated as anonymous.
#[derive(Debug, Clone, Default)]
pub struct GuestIdentity(pub UploaderIdentity);

#[axum::async_trait]
impl<S: Send + Sync> FromRequestParts<S> for GuestIdentity {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let id = parts
            .headers
            .get(GUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .filter(|id| id.len() <= MAX_GUEST_ID_LEN)
            .map(str::to_string);
        Ok(Self(UploaderIdentity::from_option(id)))
    }
}
