//! Guest contribution repository.

use std::collections::HashMap;

use tracing::warn;

use momentos_models::{GuestContribution, ANONYMOUS_GUEST_NAME};

use super::{AlbumScope, Versioned};
use crate::error::FirestoreResult;
use crate::fields::{FieldMap, FieldReader};
use crate::types::{Document, StructuredQuery, Value, Write};

const GUEST_PROGRESS: &str = "guest_progress";

pub struct GuestRepository {
    scope: AlbumScope,
}

impl GuestRepository {
    pub fn new(scope: AlbumScope) -> Self {
        Self { scope }
    }

    fn collection(&self) -> String {
        self.scope.subcollection(GUEST_PROGRESS)
    }

    pub async fn get(&self, guest_id: &str) -> FirestoreResult<Option<Versioned<GuestContribution>>> {
        let doc = self
            .scope
            .store
            .get_document(&self.collection(), guest_id)
            .await?;

        match doc {
            Some(d) => {
                let guest = document_to_guest(&d, guest_id)?;
                Ok(Some(Versioned::new(guest, d.update_time)))
            }
            None => Ok(None),
        }
    }

    pub fn write(&self, guest: &Versioned<GuestContribution>) -> Write {
        Write::replace(
            self.scope
                .store
                .full_document_name(&self.collection(), &guest.value.guest_id),
            guest_to_fields(&guest.value),
            guest.update_time.as_deref(),
        )
    }

    /// Most active contributors first.
    pub async fn leaderboard(&self, limit: u32) -> FirestoreResult<Vec<GuestContribution>> {
        let query = StructuredQuery::collection(GUEST_PROGRESS)
            .order_by("total_uploads", true)
            .limit(limit.clamp(1, 200));
        let docs = self
            .scope
            .store
            .run_query(&self.scope.album_path(), query)
            .await?;

        let mut guests = Vec::with_capacity(docs.len());
        for doc in docs {
            let id = doc.id().unwrap_or_default().to_string();
            match document_to_guest(&doc, &id) {
                Ok(guest) => guests.push(guest),
                Err(e) => warn!(guest_id = %id, "Skipping unreadable guest document: {}", e),
            }
        }
        Ok(guests)
    }
}

pub fn guest_to_fields(guest: &GuestContribution) -> HashMap<String, Value> {
    FieldMap::new()
        .set("display_name", guest.display_name.clone())
        .set("total_uploads", guest.total_uploads)
        .set("scene_breakdown", guest.scene_breakdown.clone())
        .set("badges", guest.badges.clone())
        .set("last_upload_at", guest.last_upload_at)
        .into_inner()
}

pub fn document_to_guest(doc: &Document, guest_id: &str) -> FirestoreResult<GuestContribution> {
    let context = format!("guest_progress/{}", guest_id);
    let f = FieldReader::from_document(doc, &context)?;

    Ok(GuestContribution {
        guest_id: guest_id.to_string(),
        display_name: f
            .string("display_name")
            .unwrap_or_else(|| ANONYMOUS_GUEST_NAME.to_string()),
        total_uploads: f.u64("total_uploads"),
        scene_breakdown: f.counts("scene_breakdown"),
        badges: f.string_set("badges"),
        last_upload_at: f.timestamp("last_upload_at"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use momentos_models::BadgeRule;

    #[test]
    fn test_guest_codec() {
        let mut guest = GuestContribution::new("g1", Some("Lucia".into()));
        guest.record_upload("party", &BadgeRule::defaults(), Utc::now());

        let doc = Document::named("x", guest_to_fields(&guest));
        let decoded = document_to_guest(&doc, "g1").unwrap();
        assert_eq!(decoded.display_name, "Lucia");
        assert_eq!(decoded.total_uploads, 1);
        assert_eq!(decoded.badges, guest.badges);
        assert_eq!(decoded.scene_breakdown, guest.scene_breakdown);
    }
}
