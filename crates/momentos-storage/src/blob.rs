//! Blob store abstraction shared by the R2 and in-memory backends.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::StorageResult;

/// Bytes transferred so far for one object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadProgress {
    pub bytes_sent: u64,
    pub total_bytes: u64,
}

impl UploadProgress {
    pub fn percent(&self) -> f64 {
        if self.total_bytes == 0 {
            return 100.0;
        }
        self.bytes_sent as f64 * 100.0 / self.total_bytes as f64
    }
}

/// Progress callback invoked as parts of an object are transferred.
pub type ProgressFn = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Cooperative cancellation signal for blob transfers.
///
/// Wraps a `watch` receiver; the sender flips the value to `true` to cancel.
#[derive(Clone, Debug)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    pub fn new(rx: watch::Receiver<bool>) -> Self {
        Self { rx: Some(rx) }
    }

    /// Sender/signal pair.
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::new(rx))
    }

    pub fn is_cancelled(&self) -> bool {
        self.rx.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested. Pends forever when the signal
    /// can never fire, including after the sender is dropped uncancelled.
    pub async fn cancelled(&self) {
        let Some(rx) = self.rx.as_ref() else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

impl Default for CancelSignal {
    fn default() -> Self {
        Self::never()
    }
}

/// Object storage for gallery media.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes` at `key` and return a URL for reading it back.
    ///
    /// Fails with [`StorageError::Cancelled`](crate::StorageError::Cancelled)
    /// when `cancel` fires before the transfer completes; nothing is left
    /// behind at `key` in that case.
    async fn put(
        &self,
        key: &str,
        bytes: Vec<u8>,
        content_type: &str,
        progress: Option<ProgressFn>,
        cancel: &CancelSignal,
    ) -> StorageResult<String>;

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Readable URL for an existing key.
    async fn url(&self, key: &str) -> StorageResult<String>;
}

pub type SharedBlobStore = Arc<dyn BlobStore>;

pub(crate) fn report(progress: &Option<ProgressFn>, bytes_sent: u64, total_bytes: u64) {
    if let Some(cb) = progress {
        cb(UploadProgress {
            bytes_sent,
            total_bytes,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cancel_signal_fires() {
        let (tx, signal) = CancelSignal::channel();
        assert!(!signal.is_cancelled());

        let waiter = {
            let signal = signal.clone();
            tokio::spawn(async move { signal.cancelled().await })
        };
        tx.send(true).unwrap();
        waiter.await.unwrap();
        assert!(signal.is_cancelled());
    }

    #[tokio::test]
    async fn test_never_signal_pends() {
        let signal = CancelSignal::never();
        let res = tokio::time::timeout(std::time::Duration::from_millis(20), signal.cancelled()).await;
        assert!(res.is_err());
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_progress_percent() {
        let p = UploadProgress {
            bytes_sent: 25,
            total_bytes: 100,
        };
        assert_eq!(p.percent(), 25.0);
        let empty = UploadProgress {
            bytes_sent: 0,
            total_bytes: 0,
        };
        assert_eq!(empty.percent(), 100.0);
    }
}
