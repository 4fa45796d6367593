//! Content hash reservations.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use momentos_models::{HashStatus, MediaHash, PhotoId};

use super::{AlbumScope, Versioned};
use crate::error::FirestoreResult;
use crate::fields::{FieldMap, FieldReader};
use crate::types::{Document, Value, Write};

const HASHES: &str = "hashes";

pub struct MediaHashRepository {
    scope: AlbumScope,
}

impl MediaHashRepository {
    pub fn new(scope: AlbumScope) -> Self {
        Self { scope }
    }

    fn collection(&self) -> String {
        self.scope.subcollection(HASHES)
    }

    fn document_name(&self, hash: &str) -> String {
        self.scope.store.full_document_name(&self.collection(), hash)
    }

    pub async fn get(&self, hash: &str) -> FirestoreResult<Option<Versioned<MediaHash>>> {
        let doc = self.scope.store.get_document(&self.collection(), hash).await?;
        match doc {
            Some(d) => {
                let value = document_to_media_hash(&d, hash)?;
                Ok(Some(Versioned::new(value, d.update_time)))
            }
            None => Ok(None),
        }
    }

    /// Create-only write; fails with `AlreadyExists` for a known hash.
    pub fn reserve(&self, reservation: &MediaHash) -> Write {
        Write::create(
            self.document_name(&reservation.hash),
            media_hash_to_fields(reservation),
        )
    }

    pub fn write(&self, reservation: &Versioned<MediaHash>) -> Write {
        Write::replace(
            self.document_name(&reservation.value.hash),
            media_hash_to_fields(&reservation.value),
            reservation.update_time.as_deref(),
        )
    }

    /// Mark an existing reservation as belonging to a stored photo.
    pub fn activate(&self, hash: &str, photo_id: &PhotoId, now: DateTime<Utc>) -> Write {
        let fields = FieldMap::new()
            .set("status", HashStatus::Active.as_str())
            .set("photo_id", photo_id.to_string())
            .set("updated_at", now)
            .into_inner();
        Write::merge(self.document_name(hash), fields, None)
    }

    pub fn release(&self, hash: &str) -> Write {
        Write::delete(self.document_name(hash))
    }
}

pub fn media_hash_to_fields(hash: &MediaHash) -> HashMap<String, Value> {
    FieldMap::new()
        .set("status", hash.status.as_str())
        .set("photo_id", hash.photo_id.as_ref().map(|p| p.to_string()))
        .set("file_name", hash.file_name.clone())
        .set("created_at", hash.created_at)
        .set("updated_at", hash.updated_at)
        .into_inner()
}

pub fn document_to_media_hash(doc: &Document, hash: &str) -> FirestoreResult<MediaHash> {
    let context = format!("hashes/{}", hash);
    let f = FieldReader::from_document(doc, &context)?;
    let now = Utc::now();

    Ok(MediaHash {
        hash: hash.to_string(),
        status: f
            .string("status")
            .and_then(|s| HashStatus::parse(&s))
            .unwrap_or_default(),
        photo_id: f.string("photo_id").map(PhotoId::from),
        file_name: f.string("file_name"),
        created_at: f.timestamp("created_at").unwrap_or(now),
        updated_at: f.timestamp("updated_at").unwrap_or(now),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use crate::store::DocumentStore;
    use crate::FirestoreError;
    use momentos_models::{AlbumId, WeddingId};
    use std::sync::Arc;

    fn scope() -> AlbumScope {
        AlbumScope::new(Arc::new(MemoryStore::new()), WeddingId::from("w1"), AlbumId::default())
    }

    #[tokio::test]
    async fn test_reserve_activate_release() {
        let scope = scope();
        let repo = scope.hashes();
        let now = Utc::now();
        let reservation = MediaHash::reserve("abc", Some("a.jpg".into()), now);

        scope.store.commit(vec![repo.reserve(&reservation)]).await.unwrap();
        let dup = scope.store.commit(vec![repo.reserve(&reservation)]).await;
        assert!(matches!(dup, Err(FirestoreError::AlreadyExists(_))));

        let photo_id = PhotoId::from("p1");
        scope
            .store
            .commit(vec![repo.activate("abc", &photo_id, now)])
            .await
            .unwrap();
        let stored = repo.get("abc").await.unwrap().unwrap().value;
        assert_eq!(stored.status, HashStatus::Active);
        assert_eq!(stored.photo_id, Some(photo_id));
        assert_eq!(stored.file_name.as_deref(), Some("a.jpg"));

        scope.store.commit(vec![repo.release("abc")]).await.unwrap();
        assert!(repo.get("abc").await.unwrap().is_none());
    }
}
