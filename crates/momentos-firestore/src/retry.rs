//! Retry policies.
//!
//! Two loops live here:
//! - [`with_retry`] re-sends a request after transport failures (network,
//!   429, 5xx), honoring the server's suggested delay.
//! - [`with_conflict_retry`] re-runs a whole read-modify-write transaction
//!   after a concurrent writer invalidated its precondition.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, info_span, warn, Instrument};

use crate::error::{FirestoreError, FirestoreResult};
use crate::metrics::{record_conflict, record_retry};

/// Retry policy configuration.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts after the first try.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 100,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            max_retries: env_or("FIRESTORE_RETRY_MAX_ATTEMPTS", 3),
            base_delay_ms: env_or("FIRESTORE_RETRY_BASE_MS", 100),
            max_delay_ms: env_or("FIRESTORE_RETRY_MAX_MS", 5000),
        }
    }

    /// Policy for optimistic transactions: more attempts, short delays.
    pub fn for_transactions() -> Self {
        Self {
            max_retries: env_or("FIRESTORE_TX_MAX_RETRIES", 10),
            base_delay_ms: env_or("FIRESTORE_TX_BASE_MS", 20),
            max_delay_ms: env_or("FIRESTORE_TX_MAX_MS", 1000),
        }
    }
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Execute an async operation with transport retry.
///
/// Retries on network errors, HTTP 429 (honoring the suggested delay) and
/// HTTP 5xx. Everything else is returned immediately.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    op: F,
) -> FirestoreResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = FirestoreResult<T>>,
{
    let mut attempt = 0;
    loop {
        let span = info_span!("firestore_retry", operation = %operation, attempt = attempt + 1);
        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = calculate_delay(config, attempt, e.retry_after_ms());
                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Firestore operation failed, retrying: {}",
                    e
                );
                record_retry(operation);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Errors that can tell a lost optimistic race apart from a real failure.
pub trait ConflictAware: Sized {
    fn is_conflict(&self) -> bool;

    /// Error reported once the retry budget is spent.
    fn conflict_exhausted(operation: &str, attempts: u32) -> Self;
}

impl ConflictAware for FirestoreError {
    fn is_conflict(&self) -> bool {
        FirestoreError::is_conflict(self)
    }

    fn conflict_exhausted(operation: &str, attempts: u32) -> Self {
        FirestoreError::ConflictRetriesExhausted {
            operation: operation.to_string(),
            attempts,
        }
    }
}

/// Run a read-modify-write transaction until it commits.
///
/// `op` receives the zero-based attempt number and must re-read every
/// document it writes. Conflicts back off with jitter and try again; any
/// other error is returned as-is.
pub async fn with_conflict_retry<T, E, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut op: F,
) -> Result<T, E>
where
    E: ConflictAware,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = config.max_retries + 1;
    for attempt in 0..attempts {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_conflict() => {
                record_conflict(operation);
                if attempt + 1 < attempts {
                    let delay = calculate_delay(config, attempt, None);
                    debug!(
                        operation = %operation,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Write conflict, retrying transaction"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
            Err(e) => return Err(e),
        }
    }

    warn!(operation = %operation, attempts, "Transaction retries exhausted");
    Err(E::conflict_exhausted(operation, attempts))
}

/// Calculate retry delay with exponential backoff and full jitter.
fn calculate_delay(config: &RetryConfig, attempt: u32, retry_after_ms: Option<u64>) -> Duration {
    if let Some(after) = retry_after_ms {
        return Duration::from_millis(after);
    }

    let exp_delay = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt.min(20)));
    let capped_delay = exp_delay.min(config.max_delay_ms);

    let jittered = if capped_delay > config.base_delay_ms {
        rand::rng().random_range(config.base_delay_ms..=capped_delay)
    } else {
        config.base_delay_ms
    };

    Duration::from_millis(jittered)
}
