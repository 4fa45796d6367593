//! OAuth access token cache for the Firestore REST client.
//!
//! Tokens are refreshed a minute before they expire. Refreshes are
//! serialized behind a write lock so a burst of requests triggers a single
//! call to the token provider, and a failed refresh falls back to the old
//! token while it is still technically valid.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use gcp_auth::TokenProvider;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::{FirestoreError, FirestoreResult};

const REFRESH_MARGIN: Duration = Duration::from_secs(60);

/// Used when the provider reports an expiry we cannot convert.
const FALLBACK_TTL: Duration = Duration::from_secs(50 * 60);

/// OAuth scope for Firestore/Datastore access.
pub const FIRESTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn fresh(&self, now: Instant) -> bool {
        now + REFRESH_MARGIN < self.expires_at
    }

    fn usable(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

pub struct TokenCache {
    provider: Arc<dyn TokenProvider>,
    slot: RwLock<Option<CachedToken>>,
}

impl TokenCache {
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider,
            slot: RwLock::new(None),
        }
    }

    /// Drop the cached token, e.g. after the server rejected it.
    pub async fn invalidate(&self) {
        self.slot.write().await.take();
    }

    pub async fn get_token(&self) -> FirestoreResult<String> {
        if let Some(token) = self.slot.read().await.as_ref() {
            if token.fresh(Instant::now()) {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.slot.write().await;
        if let Some(token) = slot.as_ref() {
            if token.fresh(Instant::now()) {
                return Ok(token.value.clone());
            }
        }

        match self.provider.token(&[FIRESTORE_SCOPE]).await {
            Ok(token) => {
                let remaining = token.expires_at() - Utc::now();
                let ttl = if remaining <= chrono::Duration::zero() {
                    Duration::ZERO
                } else {
                    remaining.to_std().unwrap_or(FALLBACK_TTL)
                };
                let value = token.as_str().to_string();
                *slot = Some(CachedToken {
                    value: value.clone(),
                    expires_at: Instant::now() + ttl,
                });
                debug!(ttl_secs = ttl.as_secs(), "Refreshed Firestore access token");
                Ok(value)
            }
            Err(e) => match slot.as_ref() {
                Some(stale) if stale.usable(Instant::now()) => {
                    warn!("Token refresh failed, reusing current token: {}", e);
                    Ok(stale.value.clone())
                }
                _ => Err(FirestoreError::auth_error(format!(
                    "Failed to obtain auth token: {}",
                    e
                ))),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cached_token_margins() {
        let now = Instant::now();
        let token = CachedToken {
            value: "t".into(),
            expires_at: now + Duration::from_secs(30),
        };
        assert!(!token.fresh(now));
        assert!(token.usable(now));
    }

    #[test]
    fn test_firestore_scope() {
        assert!(FIRESTORE_SCOPE.contains("datastore"));
    }
}
