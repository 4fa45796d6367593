//! Content hash reservations.
//!
//! Each album keeps one document per SHA-256 digest of uploaded originals so
//! the same file cannot be ingested twice.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::ids::PhotoId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum HashStatus {
    /// Reserved by an upload in flight.
    #[default]
    Pending,
    /// Bound to a stored photo.
    Active,
}

impl HashStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashStatus::Pending => "pending",
            HashStatus::Active => "active",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "active" => Some(Self::Active),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaHash {
    /// Hex digest; also the document id.
    pub hash: String,
    pub status: HashStatus,
    pub photo_id: Option<PhotoId>,
    pub file_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaHash {
    pub fn reserve(hash: impl Into<String>, file_name: Option<String>, now: DateTime<Utc>) -> Self {
        Self {
            hash: hash.into(),
            status: HashStatus::Pending,
            photo_id: None,
            file_name,
            created_at: now,
            updated_at: now,
        }
    }
}
