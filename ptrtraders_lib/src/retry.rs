//! Retry for store connection establishment.

use tokio::time::sleep;

use crate::config::RetryPolicy;
use crate::db::DbError;
use crate::error::IngestError;

/// Runs `operation` until it succeeds, fails with a non-transient error, or
/// `policy.max_attempts` attempts have been made.
///
/// Transient failures (see [`DbError::is_transient`]) sleep
/// `backoff_step * attempt` before the next try. Exhaustion surfaces as
/// [`IngestError::TransientStore`]; any other error as [`IngestError::Store`].
pub async fn with_store_retry<F, T>(policy: &RetryPolicy, mut operation: F) -> Result<T, IngestError>
where
    F: FnMut() -> Result<T, DbError>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0usize;
    loop {
        attempt += 1;
        match operation() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => {
                if attempt >= max_attempts {
                    tracing::error!("Store unavailable after {} attempts: {}", attempt, err);
                    return Err(IngestError::TransientStore {
                        attempts: attempt,
                        source: err,
                    });
                }
                let delay = policy.delay_for_attempt(attempt);
                tracing::warn!(
                    "Store connection failed (attempt {}/{}), retrying in {:.1}s: {}",
                    attempt,
                    max_attempts,
                    delay.as_secs_f64(),
                    err
                );
                sleep(delay).await;
            }
            Err(err) => return Err(IngestError::Store(err)),
        }
    }
}
