//! In-process document store.
//!
//! Mirrors the Firestore semantics the repositories rely on: atomic commits,
//! `exists` / `updateTime` preconditions, top-level update masks, equality
//! filters, ordering and limits. Used for local development
//! (`STORE_BACKEND=memory`) and as the backend of the test suites.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use tracing::debug;

use crate::error::{FirestoreError, FirestoreResult};
use crate::store::{relative_path, DocumentStore};
use crate::types::{
    CommitResponse, Document, Filter, FromFirestoreValue, StructuredQuery, Value, Write,
    WriteResult,
};

const ROOT: &str = "projects/local/databases/(default)/documents";

#[derive(Debug, Clone)]
struct StoredDocument {
    fields: HashMap<String, Value>,
    create_time: String,
    update_time: String,
}

#[derive(Default)]
struct Inner {
    docs: HashMap<String, StoredDocument>,
    last_nanos: i64,
}

impl Inner {
    /// Strictly increasing revision timestamp.
    fn next_revision(&mut self) -> String {
        let now = Utc::now().timestamp_nanos_opt().unwrap_or(i64::MAX);
        self.last_nanos = now.max(self.last_nanos + 1);
        DateTime::from_timestamp_nanos(self.last_nanos).to_rfc3339_opts(SecondsFormat::Nanos, true)
    }
}

/// Thread-safe in-memory [`DocumentStore`].
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
    failing_commits: AtomicUsize,
    /// One more than the commits to let through before the scheduled failure; 0 when unset.
    scheduled_failure: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `count` commits fail with a server error.
    pub fn fail_next_commits(&self, count: usize) {
        self.failing_commits.store(count, AtomicOrdering::SeqCst);
    }

    /// Let `count` commits succeed, then fail the one after them.
    pub fn fail_commit_after(&self, count: usize) {
        self.scheduled_failure.store(count + 1, AtomicOrdering::SeqCst);
    }

    /// Number of stored documents directly inside `collection`.
    pub fn count(&self, collection: &str) -> usize {
        let prefix = format!("{}/", collection);
        self.lock()
            .docs
            .keys()
            .filter(|k| k.strip_prefix(&prefix).is_some_and(|rest| !rest.contains('/')))
            .count()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means another test thread panicked mid-commit;
        // commits validate before mutating so the map is still consistent.
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn to_document(path: &str, doc: &StoredDocument) -> Document {
        Document {
            name: Some(format!("{}/{}", ROOT, path)),
            fields: Some(doc.fields.clone()),
            create_time: Some(doc.create_time.clone()),
            update_time: Some(doc.update_time.clone()),
        }
    }

    fn check_precondition(inner: &Inner, write: &Write, path: &str) -> FirestoreResult<()> {
        let Some(pre) = &write.current_document else {
            return Ok(());
        };
        let current = inner.docs.get(path);
        match (pre.exists, current) {
            (Some(false), Some(_)) => return Err(FirestoreError::AlreadyExists(path.to_string())),
            (Some(true), None) => return Err(FirestoreError::not_found(path.to_string())),
            _ => {}
        }
        if let Some(expected) = &pre.update_time {
            match current {
                Some(doc) if &doc.update_time == expected => {}
                Some(_) => {
                    return Err(FirestoreError::PreconditionFailed(format!(
                        "FAILED_PRECONDITION: {} changed since {}",
                        path, expected
                    )))
                }
                None => {
                    return Err(FirestoreError::PreconditionFailed(format!(
                        "FAILED_PRECONDITION: {} no longer exists",
                        path
                    )))
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_document(&self, collection: &str, doc_id: &str) -> FirestoreResult<Option<Document>> {
        let path = format!("{}/{}", collection, doc_id);
        let inner = self.lock();
        Ok(inner.docs.get(&path).map(|d| Self::to_document(&path, d)))
    }

    async fn commit(&self, writes: Vec<Write>) -> FirestoreResult<CommitResponse> {
        if self
            .failing_commits
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(FirestoreError::ServerError(503, "injected commit failure".into()));
        }
        if self
            .scheduled_failure
            .fetch_update(AtomicOrdering::SeqCst, AtomicOrdering::SeqCst, |n| n.checked_sub(1))
            == Ok(1)
        {
            return Err(FirestoreError::ServerError(503, "scheduled commit failure".into()));
        }

        let mut inner = self.lock();

        let mut targets = Vec::with_capacity(writes.len());
        for write in &writes {
            let path = write
                .target()
                .map(|n| relative_path(n).to_string())
                .ok_or_else(|| FirestoreError::request_failed("Write has no target document"))?;
            Self::check_precondition(&inner, write, &path)?;
            targets.push(path);
        }

        let revision = inner.next_revision();
        let mut results = Vec::with_capacity(writes.len());
        for (write, path) in writes.into_iter().zip(targets) {
            match write.update {
                Some(update) => {
                    let incoming = update.fields.unwrap_or_default();
                    let existing = inner.docs.remove(&path);
                    let create_time = existing
                        .as_ref()
                        .map(|d| d.create_time.clone())
                        .unwrap_or_else(|| revision.clone());
                    let fields = match (write.update_mask, existing) {
                        (Some(mask), Some(mut current)) => {
                            for field in mask.field_paths {
                                match incoming.get(&field) {
                                    Some(value) => current.fields.insert(field, value.clone()),
                                    None => current.fields.remove(&field),
                                };
                            }
                            current.fields
                        }
                        _ => incoming,
                    };
                    inner.docs.insert(
                        path,
                        StoredDocument {
                            fields,
                            create_time,
                            update_time: revision.clone(),
                        },
                    );
                }
                None => {
                    inner.docs.remove(&path);
                }
            }
            results.push(WriteResult {
                update_time: Some(revision.clone()),
            });
        }

        debug!(writes = results.len(), revision = %revision, "Committed memory store writes");
        Ok(CommitResponse {
            write_results: Some(results),
            commit_time: Some(revision),
        })
    }

    async fn run_query(
        &self,
        parent_path: &str,
        query: StructuredQuery,
    ) -> FirestoreResult<Vec<Document>> {
        let collection = if parent_path.is_empty() {
            query.collection_id().to_string()
        } else {
            format!("{}/{}", parent_path, query.collection_id())
        };
        let prefix = format!("{}/", collection);

        let inner = self.lock();
        let mut matched: Vec<Document> = inner
            .docs
            .iter()
            .filter(|(path, _)| {
                path.strip_prefix(&prefix)
                    .is_some_and(|rest| !rest.is_empty() && !rest.contains('/'))
            })
            .filter(|(_, doc)| {
                query
                    .r#where
                    .as_ref()
                    .map(|f| matches_filter(f, &doc.fields))
                    .unwrap_or(true)
            })
            .map(|(path, doc)| Self::to_document(path, doc))
            .collect();
        drop(inner);

        matched.sort_by(|a, b| a.name.cmp(&b.name));
        if let Some(orders) = &query.order_by {
            matched.sort_by(|a, b| {
                for order in orders {
                    let path = order.field.field_path.as_str();
                    let ord = compare_values(field_at(a, path), field_at(b, path));
                    let ord = if order.direction == "DESCENDING" {
                        ord.reverse()
                    } else {
                        ord
                    };
                    if ord != Ordering::Equal {
                        return ord;
                    }
                }
                Ordering::Equal
            });
        }
        if let Some(limit) = query.limit {
            matched.truncate(limit.max(0) as usize);
        }
        Ok(matched)
    }

    fn full_document_name(&self, collection: &str, doc_id: &str) -> String {
        format!("{}/{}/{}", ROOT, collection, doc_id)
    }
}

fn lookup<'a>(fields: &'a HashMap<String, Value>, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = fields.get(segments.next()?)?;
    for segment in segments {
        current = current.as_map()?.get(segment)?;
    }
    Some(current)
}

fn field_at<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    doc.fields.as_ref().and_then(|f| lookup(f, path))
}

fn matches_filter(filter: &Filter, fields: &HashMap<String, Value>) -> bool {
    if let Some(composite) = &filter.composite_filter {
        return composite.filters.iter().all(|f| matches_filter(f, fields));
    }
    let Some(field_filter) = &filter.field_filter else {
        return true;
    };
    let actual = lookup(fields, &field_filter.field.field_path);
    let ord = compare_values(actual, Some(&field_filter.value));
    match field_filter.op.as_str() {
        "EQUAL" => actual.is_some() && ord == Ordering::Equal,
        "NOT_EQUAL" => actual.is_some() && ord != Ordering::Equal,
        "LESS_THAN" => actual.is_some() && ord == Ordering::Less,
        "LESS_THAN_OR_EQUAL" => actual.is_some() && ord != Ordering::Greater,
        "GREATER_THAN" => actual.is_some() && ord == Ordering::Greater,
        "GREATER_THAN_OR_EQUAL" => actual.is_some() && ord != Ordering::Less,
        _ => false,
    }
}

/// Order values the way Firestore does for the types the gallery stores.
fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::NullValue(()) => 0,
            Value::BooleanValue(_) => 1,
            Value::IntegerValue(_) | Value::DoubleValue(_) => 2,
            Value::TimestampValue(_) => 3,
            Value::StringValue(_) => 4,
            Value::ArrayValue(_) => 5,
            Value::MapValue(_) => 6,
        }
    }

    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => match (a, b) {
            (Value::BooleanValue(x), Value::BooleanValue(y)) => x.cmp(y),
            (Value::StringValue(x), Value::StringValue(y)) => x.cmp(y),
            (Value::TimestampValue(_), Value::TimestampValue(_)) => {
                let x = DateTime::<Utc>::from_firestore_value(a);
                let y = DateTime::<Utc>::from_firestore_value(b);
                x.cmp(&y)
            }
            (
                Value::IntegerValue(_) | Value::DoubleValue(_),
                Value::IntegerValue(_) | Value::DoubleValue(_),
            ) => {
                let x = f64::from_firestore_value(a).unwrap_or(0.0);
                let y = f64::from_firestore_value(b).unwrap_or(0.0);
                x.partial_cmp(&y).unwrap_or(Ordering::Equal)
            }
            _ if rank(a) != rank(b) => rank(a).cmp(&rank(b)),
            _ if a == b => Ordering::Equal,
            _ => Ordering::Less,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ToFirestoreValue;

    fn fields(pairs: &[(&str, Value)]) -> HashMap<String, Value> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_then_conflicting_create() {
        let store = MemoryStore::new();
        let name = store.full_document_name("albums", "a1");

        store
            .commit(vec![Write::create(name.clone(), fields(&[("n", 1u64.to_firestore_value())]))])
            .await
            .unwrap();

        let err = store
            .commit(vec![Write::create(name, HashMap::new())])
            .await
            .unwrap_err();
        assert!(matches!(err, FirestoreError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_stale_update_time_is_rejected() {
        let store = MemoryStore::new();
        let name = store.full_document_name("albums", "a1");
        store
            .commit(vec![Write::create(name.clone(), HashMap::new())])
            .await
            .unwrap();

        let first = store.get_document("albums", "a1").await.unwrap().unwrap();
        let stale = first.update_time.clone().unwrap();

        store
            .commit(vec![Write::replace(name.clone(), HashMap::new(), Some(&stale))])
            .await
            .unwrap();

        let err = store
            .commit(vec![Write::replace(name, HashMap::new(), Some(&stale))])
            .await
            .unwrap_err();
        assert!(err.is_precondition_failed());
    }

    #[tokio::test]
    async fn test_commit_is_all_or_nothing() {
        let store = MemoryStore::new();
        let a = store.full_document_name("albums", "a");
        let b = store.full_document_name("albums", "b");
        store
            .commit(vec![Write::create(b.clone(), HashMap::new())])
            .await
            .unwrap();

        let result = store
            .commit(vec![
                Write::create(a, HashMap::new()),
                Write::create(b, HashMap::new()),
            ])
            .await;
        assert!(result.is_err());
        assert!(store.get_document("albums", "a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_only_touches_masked_fields() {
        let store = MemoryStore::new();
        let name = store.full_document_name("tokens", "t1");
        store
            .commit(vec![Write::create(
                name.clone(),
                fields(&[
                    ("status", "active".to_firestore_value()),
                    ("used_count", 0u32.to_firestore_value()),
                ]),
            )])
            .await
            .unwrap();

        store
            .commit(vec![Write::merge(
                name,
                fields(&[("status", "revoked".to_firestore_value())]),
                None,
            )])
            .await
            .unwrap();

        let doc = store.get_document("tokens", "t1").await.unwrap().unwrap();
        let f = doc.fields.unwrap();
        assert_eq!(f.get("status"), Some(&"revoked".to_firestore_value()));
        assert_eq!(f.get("used_count"), Some(&0u32.to_firestore_value()));
    }

    #[tokio::test]
    async fn test_query_filters_orders_and_limits() {
        let store = MemoryStore::new();
        for (id, status, n) in [("p1", "approved", 1u64), ("p2", "pending", 2), ("p3", "approved", 3)] {
            let name = store.full_document_name("weddings/w/albums/a/photos", id);
            store
                .commit(vec![Write::create(
                    name,
                    fields(&[
                        ("status", status.to_firestore_value()),
                        ("n", n.to_firestore_value()),
                    ]),
                )])
                .await
                .unwrap();
        }
        // Nested collection documents must not leak into the parent query.
        let nested = store.full_document_name("weddings/w/albums/a/photos/p1/comments", "c1");
        store
            .commit(vec![Write::create(nested, HashMap::new())])
            .await
            .unwrap();

        let query = StructuredQuery::collection("photos")
            .where_eq("status", "approved".to_firestore_value())
            .order_by("n", true)
            .limit(1);
        let docs = store.run_query("weddings/w/albums/a", query).await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].id(), Some("p3"));
        assert_eq!(store.count("weddings/w/albums/a/photos"), 3);
    }

    #[tokio::test]
    async fn test_injected_failures() {
        let store = MemoryStore::new();
        store.fail_next_commits(1);
        let name = store.full_document_name("albums", "a");
        assert!(store
            .commit(vec![Write::create(name.clone(), HashMap::new())])
            .await
            .is_err());
        assert!(store
            .commit(vec![Write::create(name, HashMap::new())])
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_scheduled_failure_after_successful_commits() {
        let store = MemoryStore::new();
        store.fail_commit_after(2);
        let write = |id: &str| Write::create(store.full_document_name("albums", id), HashMap::new());

        assert!(store.commit(vec![write("a")]).await.is_ok());
        assert!(store.commit(vec![write("b")]).await.is_ok());
        assert!(matches!(
            store.commit(vec![write("c")]).await,
            Err(FirestoreError::ServerError(503, _))
        ));
        assert!(store.commit(vec![write("c")]).await.is_ok());
        assert_eq!(store.count("albums"), 3);
    }
}
