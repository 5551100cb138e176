//! Bounded exponential backoff for one-shot fetches.

use std::future::Future;

use bus_watch_transit::FetchError;

use crate::config::RetryPolicy;

/// Run `attempt` until it succeeds or the policy's attempts are spent.
///
/// Returns the last error once retries are exhausted.
pub(crate) async fn with_backoff<T, F, Fut>(policy: &RetryPolicy, mut attempt: F) -> Result<T, FetchError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut tries: u32 = 1;

    loop {
        match attempt().await {
            Ok(value) => return Ok(value),
            Err(e) if tries < max_attempts => {
                let delay = policy.delay_for(tries);
                tracing::debug!(
                    operation = %e.operation,
                    error = %e.cause,
                    attempt = tries,
                    delay_ms = delay.as_millis() as u64,
                    "Fetch failed, backing off"
                );
                tokio::time::sleep(delay).await;
                tries += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
