//! Identifier newtypes.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            /// Create from an existing string.
            pub fn from_string(s: impl Into<String>) -> Self {
                Self(s.into())
            }

            /// Get the inner string.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }
    };
}

string_id!(
    /// Wedding (tenant) identifier. Owned by the external wedding service.
    WeddingId
);

string_id!(
    /// Album identifier, unique within a wedding.
    AlbumId
);

string_id!(
    /// Photo identifier.
    PhotoId
);

string_id!(
    /// Access token identifier. Distinct from the token secret.
    TokenId
);

impl AlbumId {
    /// The album every wedding gets by default.
    pub fn default_album() -> Self {
        Self(crate::album::DEFAULT_ALBUM_ID.to_string())
    }
}

impl Default for AlbumId {
    fn default() -> Self {
        Self::default_album()
    }
}

impl PhotoId {
    /// Generate a new random photo ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for PhotoId {
    fn default() -> Self {
        Self::new()
    }
}

impl TokenId {
    /// Generate a new random token ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for TokenId {
    fn default() -> Self {
        Self::new()
    }
}
