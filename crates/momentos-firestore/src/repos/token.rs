//! Access token repository.

use std::collections::HashMap;

use chrono::Utc;
use tracing::warn;

use momentos_models::{AccessToken, AlbumId, TokenId, TokenKind, TokenStatus};

use super::{AlbumScope, Versioned};
use crate::error::FirestoreResult;
use crate::fields::{FieldMap, FieldReader};
use crate::types::{Document, StructuredQuery, ToFirestoreValue, Value, Write};

const TOKENS: &str = "tokens";

pub struct TokenRepository {
    scope: AlbumScope,
}

impl TokenRepository {
    pub fn new(scope: AlbumScope) -> Self {
        Self { scope }
    }

    fn collection(&self) -> String {
        self.scope.subcollection(TOKENS)
    }

    pub async fn get(&self, token_id: &TokenId) -> FirestoreResult<Option<Versioned<AccessToken>>> {
        let doc = self
            .scope
            .store
            .get_document(&self.collection(), token_id.as_str())
            .await?;

        match doc {
            Some(d) => {
                let token = document_to_token(&d, &self.scope.album_id, token_id)?;
                Ok(Some(Versioned::new(token, d.update_time)))
            }
            None => Ok(None),
        }
    }

    /// Look a token up by its bearer secret.
    pub async fn find_by_secret(&self, secret: &str) -> FirestoreResult<Option<AccessToken>> {
        let query = StructuredQuery::collection(TOKENS)
            .where_eq("secret", secret.to_firestore_value())
            .limit(1);
        let docs = self
            .scope
            .store
            .run_query(&self.scope.album_path(), query)
            .await?;

        match docs.first() {
            Some(doc) => {
                let id = TokenId::from(doc.id().unwrap_or_default());
                Ok(Some(document_to_token(doc, &self.scope.album_id, &id)?))
            }
            None => Ok(None),
        }
    }

    pub fn write(&self, token: &Versioned<AccessToken>) -> Write {
        Write::replace(
            self.scope
                .store
                .full_document_name(&self.collection(), token.value.id.as_str()),
            token_to_fields(&token.value),
            token.update_time.as_deref(),
        )
    }

    /// Newest tokens first.
    pub async fn list(&self, limit: u32) -> FirestoreResult<Vec<AccessToken>> {
        let query = StructuredQuery::collection(TOKENS)
            .order_by("created_at", true)
            .limit(limit.clamp(1, 500));
        let docs = self
            .scope
            .store
            .run_query(&self.scope.album_path(), query)
            .await?;

        let mut tokens = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = TokenId::from(doc.id().unwrap_or_default());
            match document_to_token(&doc, &self.scope.album_id, &id) {
                Ok(token) => tokens.push(token),
                Err(e) => warn!(token_id = %id, "Skipping unreadable token document: {}", e),
            }
        }
        Ok(tokens)
    }
}

pub fn token_to_fields(token: &AccessToken) -> HashMap<String, Value> {
    FieldMap::new()
        .set("secret", token.secret.clone())
        .set("kind", token.kind.as_str())
        .set("status", token.status.as_str())
        .set("expires_at", token.expires_at)
        .set("max_usages", token.max_usages)
        .set("used_count", token.used_count)
        .set("scene_targets", token.scene_targets.clone())
        .set("created_by", token.created_by.clone())
        .set("created_at", token.created_at)
        .set("last_used_at", token.last_used_at)
        .set("revoked_at", token.revoked_at)
        .into_inner()
}

pub fn document_to_token(
    doc: &Document,
    album_id: &AlbumId,
    token_id: &TokenId,
) -> FirestoreResult<AccessToken> {
    let context = format!("tokens/{}", token_id);
    let f = FieldReader::from_document(doc, &context)?;

    Ok(AccessToken {
        id: token_id.clone(),
        album_id: album_id.clone(),
        secret: f.require("secret")?,
        kind: f
            .string("kind")
            .and_then(|k| TokenKind::parse(&k))
            .unwrap_or_default(),
        status: f
            .string("status")
            .and_then(|s| TokenStatus::parse(&s))
            .unwrap_or(TokenStatus::Revoked),
        expires_at: f.require("expires_at")?,
        max_usages: f.u32("max_usages"),
        used_count: f.u32("used_count"),
        scene_targets: f.strings("scene_targets"),
        created_by: f.string("created_by"),
        created_at: f.timestamp("created_at").unwrap_or_else(Utc::now),
        last_used_at: f.timestamp("last_used_at"),
        revoked_at: f.timestamp("revoked_at"),
    })
}
