//! Guest access tokens.
//!
//! A token is an unguessable secret embedded in the album's share link and
//! QR code. It grants upload access until it expires, is revoked or runs out
//! of usages, and never outlives the upload window.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;

use momentos_firestore::{with_conflict_retry, AlbumScope, Versioned};
use momentos_models::{
    AccessToken, AlbumId, TokenId, TokenKind, TokenStatus, WeddingId,
};

use crate::albums::load_album;
use crate::context::GalleryContext;
use crate::error::{GalleryError, GalleryResult};
use crate::metrics;
use crate::window::resolve_window;

/// Random bytes in a token secret (48 hex chars).
const SECRET_BYTES: usize = 24;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IssueTokenRequest {
    #[serde(default)]
    pub kind: TokenKind,
    pub ttl_hours: Option<i64>,
    pub max_usages: Option<u32>,
    #[serde(default)]
    pub scene_targets: Vec<String>,
    pub created_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct IssuedToken {
    pub token: AccessToken,
    pub share_url: String,
}

pub fn generate_secret() -> String {
    hex::encode(rand::random::<[u8; SECRET_BYTES]>())
}

/// `{base}/moments/upload?w=..&album=..&token=..`
pub fn build_share_url(base: &str, wedding_id: &WeddingId, album_id: &AlbumId, secret: &str) -> String {
    format!(
        "{}/moments/upload?w={}&album={}&token={}",
        base.trim_end_matches('/'),
        urlencoding::encode(wedding_id.as_str()),
        urlencoding::encode(album_id.as_str()),
        urlencoding::encode(secret)
    )
}

/// Check a token on its own, without the album window.
pub fn check_token(token: &AccessToken, now: DateTime<Utc>) -> GalleryResult<()> {
    if !token.is_active() {
        return Err(GalleryError::TokenInactive);
    }
    if token.is_expired(now) {
        return Err(GalleryError::TokenExpired);
    }
    if token.is_exhausted() {
        return Err(GalleryError::TokenUsageExceeded);
    }
    Ok(())
}

/// Count one successful upload against `token`.
///
/// Fails without touching the token once its cap is reached. Returns true
/// when this use was the last one.
pub fn record_usage(token: &mut AccessToken, now: DateTime<Utc>) -> GalleryResult<bool> {
    if token.is_exhausted() {
        return Err(GalleryError::TokenUsageExceeded);
    }
    token.used_count += 1;
    token.last_used_at = Some(now);
    Ok(token.is_exhausted())
}

pub struct TokenService {
    ctx: GalleryContext,
}

impl TokenService {
    pub fn new(ctx: GalleryContext) -> Self {
        Self { ctx }
    }

    /// Issue a token and point the album QR code at it.
    pub async fn issue(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        request: IssueTokenRequest,
        now: DateTime<Utc>,
    ) -> GalleryResult<IssuedToken> {
        let ttl_hours = request.ttl_hours.unwrap_or(self.ctx.config.default_token_ttl_hours);
        if ttl_hours < 0 {
            return Err(GalleryError::invalid_input("ttl_hours must not be negative"));
        }
        let max_usages = request
            .max_usages
            .unwrap_or(self.ctx.config.default_token_max_usages);
        if max_usages == 0 {
            return Err(GalleryError::invalid_input("max_usages must be positive"));
        }

        let mut scene_targets: Vec<String> = Vec::new();
        for scene in request.scene_targets.iter().map(|s| s.trim()).filter(|s| !s.is_empty()) {
            if !scene_targets.iter().any(|s| s == scene) {
                scene_targets.push(scene.to_string());
            }
        }

        let token = AccessToken {
            id: TokenId::new(),
            album_id: album_id.clone(),
            secret: generate_secret(),
            kind: request.kind,
            status: TokenStatus::Active,
            expires_at: now + Duration::hours(ttl_hours),
            max_usages,
            used_count: 0,
            scene_targets,
            created_by: request.created_by,
            created_at: now,
            last_used_at: None,
            revoked_at: None,
        };

        let scope = self.ctx.scope(wedding_id, album_id);
        let token = with_conflict_retry(&self.ctx.config.transaction_retry, "tokens.issue", |_| {
            self.issue_once(&scope, token.clone(), now)
        })
        .await?;

        metrics::record_token_issued(token.kind.as_str());
        info!(
            wedding_id = %wedding_id,
            album_id = %album_id,
            token_id = %token.id,
            kind = %token.kind.as_str(),
            expires_at = %token.expires_at,
            max_usages = token.max_usages,
            "Access token issued"
        );

        let share_url = self.share_url(wedding_id, album_id, &token.secret);
        Ok(IssuedToken { token, share_url })
    }

    async fn issue_once(
        &self,
        scope: &AlbumScope,
        mut token: AccessToken,
        now: DateTime<Utc>,
    ) -> GalleryResult<AccessToken> {
        let mut album = load_album(scope, now).await?;
        let window = resolve_window(&album.value);
        if window.is_closed(now) {
            return Err(GalleryError::WindowClosed);
        }

        for scene in &token.scene_targets {
            if album.value.settings.scene(scene).is_none() {
                return Err(GalleryError::invalid_input(format!("unknown scene: {}", scene)));
            }
        }

        if let Some(closes_at) = window.closes_at {
            token.expires_at = token.expires_at.min(closes_at);
        }

        album.value.qr_code.latest_token_id = Some(token.id.clone());
        album.value.qr_code.expires_at = Some(token.expires_at);
        album.value.upload_window.last_token_at = Some(now);
        album.value.updated_at = now;

        let token = Versioned::unsaved(token);
        scope
            .store
            .commit(vec![scope.tokens().write(&token), scope.albums().write(&album)])
            .await?;
        Ok(token.value)
    }

    /// Resolve a secret presented by a guest.
    ///
    /// Checks run in order: unknown, inactive, expired, exhausted, then the
    /// album window.
    pub async fn validate(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        secret: &str,
        now: DateTime<Utc>,
    ) -> GalleryResult<AccessToken> {
        let secret = secret.trim();
        if secret.is_empty() {
            return Err(GalleryError::TokenNotFound);
        }
        let scope = self.ctx.scope(wedding_id, album_id);
        let token = scope
            .tokens()
            .find_by_secret(secret)
            .await?
            .ok_or(GalleryError::TokenNotFound)?;
        check_token(&token, now)?;

        let album = load_album(&scope, now).await?;
        if resolve_window(&album.value).is_closed(now) {
            return Err(GalleryError::WindowClosed);
        }
        Ok(token)
    }

    pub async fn revoke(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        token_id: &TokenId,
        now: DateTime<Utc>,
    ) -> GalleryResult<AccessToken> {
        let scope = self.ctx.scope(wedding_id, album_id);
        let token = with_conflict_retry(&self.ctx.config.transaction_retry, "tokens.revoke", |_| {
            self.revoke_once(&scope, token_id, now)
        })
        .await?;
        info!(album_id = %album_id, token_id = %token_id, "Access token revoked");
        Ok(token)
    }

    async fn revoke_once(
        &self,
        scope: &AlbumScope,
        token_id: &TokenId,
        now: DateTime<Utc>,
    ) -> GalleryResult<AccessToken> {
        let mut token = scope
            .tokens()
            .get(token_id)
            .await?
            .ok_or(GalleryError::TokenNotFound)?;
        if token.value.status == TokenStatus::Revoked {
            return Ok(token.value);
        }
        token.value.status = TokenStatus::Revoked;
        token.value.revoked_at = Some(now);
        scope.store.commit(vec![scope.tokens().write(&token)]).await?;
        Ok(token.value)
    }

    /// Newest first.
    pub async fn list(
        &self,
        wedding_id: &WeddingId,
        album_id: &AlbumId,
        limit: u32,
    ) -> GalleryResult<Vec<AccessToken>> {
        let scope = self.ctx.scope(wedding_id, album_id);
        Ok(scope.tokens().list(limit).await?)
    }

    pub fn share_url(&self, wedding_id: &WeddingId, album_id: &AlbumId, secret: &str) -> String {
        build_share_url(&self.ctx.config.share_base_url, wedding_id, album_id, secret)
    }
}
