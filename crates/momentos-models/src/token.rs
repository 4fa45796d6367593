//! Guest access tokens.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::{AlbumId, TokenId};

/// Who the token is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    #[default]
    Guest,
    Host,
}

impl TokenKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenKind::Guest => "guest",
            TokenKind::Host => "host",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "guest" => Some(Self::Guest),
            "host" => Some(Self::Host),
            _ => None,
        }
    }
}

/// Token lifecycle status. Revocation is permanent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenStatus {
    #[default]
    Active,
    Revoked,
}

impl TokenStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenStatus::Active => "active",
            TokenStatus::Revoked => "revoked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "revoked" => Some(Self::Revoked),
            _ => None,
        }
    }
}

/// Capability to upload into one album.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AccessToken {
    pub id: TokenId,
    pub album_id: AlbumId,
    /// Unguessable bearer secret carried in the share link.
    pub secret: String,
    pub kind: TokenKind,
    pub status: TokenStatus,
    pub expires_at: DateTime<Utc>,
    pub max_usages: u32,
    pub used_count: u32,
    /// When non-empty, uploads are limited to these scenes.
    #[serde(default)]
    pub scene_targets: Vec<String>,
    pub created_by: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub revoked_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    pub fn is_active(&self) -> bool {
        self.status == TokenStatus::Active
    }

    /// Expiry is exclusive: a token is expired at `expires_at`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_exhausted(&self) -> bool {
        self.used_count >= self.max_usages
    }

    pub fn remaining_usages(&self) -> u32 {
        self.max_usages.saturating_sub(self.used_count)
    }

    pub fn allows_scene(&self, scene: Option<&str>) -> bool {
        if self.scene_targets.is_empty() {
            return true;
        }
        scene.is_some_and(|s| self.scene_targets.iter().any(|t| t == s))
    }
}
