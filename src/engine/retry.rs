//! Bounded retry for store calls.

use std::thread;

use crate::config::RetryConfig;
use crate::error::ResolutionError;
use crate::storage::StorageError;

/// Runs `call` until it succeeds, fails permanently, or runs out of attempts.
///
/// Only transient errors are retried. Exhaustion maps to
/// `ResolutionError::TransientStore`, anything else to `ResolutionError::Storage`.
pub(crate) fn with_retry<T, F>(
    policy: &RetryConfig,
    operation: &'static str,
    mut call: F,
) -> Result<T, ResolutionError>
where
    F: FnMut() -> Result<T, StorageError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let backoff = policy.backoff(attempt);
                tracing::warn!(
                    operation,
                    attempt,
                    backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                    error = %err,
                    "transient store failure, retrying"
                );
                if !backoff.is_zero() {
                    thread::sleep(backoff);
                }
                attempt += 1;
            }
            Err(err) if err.is_transient() => {
                return Err(ResolutionError::TransientStore {
                    attempts: attempt,
                    source: err,
                });
            }
            Err(err) => return Err(ResolutionError::Storage(err)),
        }
    }
}
