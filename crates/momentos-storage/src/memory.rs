//! In-memory blob store for local development and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use crate::blob::{report, BlobStore, CancelSignal, ProgressFn};
use crate::error::{StorageError, StorageResult};

const CHUNK_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// Blob store keeping objects in a process-local map.
///
/// Transfers are chunked so progress callbacks and cancellation behave like a
/// real network upload.
pub struct MemoryBlobStore {
    objects: Mutex<HashMap<String, StoredObject>>,
    base_url: String,
    chunk_delay: Option<Duration>,
    failing_puts: AtomicUsize,
}

impl Default for MemoryBlobStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            base_url: "memory://".to_string(),
            chunk_delay: None,
            failing_puts: AtomicUsize::new(0),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Sleep between chunks to simulate a slow link.
    pub fn with_chunk_delay(mut self, delay: Duration) -> Self {
        self.chunk_delay = Some(delay);
        self
    }

    /// Make the next `n` puts fail with `UploadFailed`.
    pub fn fail_next_puts(&self, n: usize) {
        self.failing_puts.store(n, Ordering::SeqCst);
    }

    pub fn contains(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.lock().get(key).map(|o| o.content_type.clone())
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.lock().keys().cloned().collect();
        keys.sort();
        keys
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, StoredObject>> {
        self.objects.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn take_failure(&self) -> bool {
        self.failing_puts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        progress: Option<ProgressFn>,
        cancel: &CancelSignal,
    ) -> StorageResult<String> {
        if key.is_empty() || key.starts_with('/') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        if self.take_failure() {
            return Err(StorageError::upload_failed(format!("injected failure for {}", key)));
        }

        let total = bytes.len() as u64;
        let mut sent = 0u64;
        for chunk in bytes.chunks(CHUNK_SIZE.max(1)) {
            if cancel.is_cancelled() {
                debug!(key, sent, "Memory upload cancelled");
                return Err(StorageError::cancelled(key));
            }
            match self.chunk_delay {
                Some(delay) => {
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(StorageError::cancelled(key)),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                None => tokio::task::yield_now().await,
            }
            sent += chunk.len() as u64;
            report(&progress, sent, total);
        }
        if cancel.is_cancelled() {
            return Err(StorageError::cancelled(key));
        }
        if total == 0 {
            report(&progress, 0, 0);
        }

        self.lock().insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        self.url(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.lock()
            .get(key)
            .map(|o| o.bytes.clone())
            .ok_or_else(|| StorageError::not_found(key))
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.lock().remove(key);
        Ok(())
    }

    async fn url(&self, key: &str) -> StorageResult<String> {
        Ok(format!("{}{}", self.base_url, key))
    }
}
