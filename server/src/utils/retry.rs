//! Async retry utilities with capped exponential backoff

use std::time::Duration;

/// Backoff delay for the given zero-based attempt: `min(2^attempt, cap)` seconds.
pub fn backoff_delay(attempt: u32, cap_secs: u64) -> Duration {
    let exp = 2_u64.saturating_pow(attempt);
    Duration::from_secs(exp.min(cap_secs))
}

/// Retry an async operation with capped exponential backoff.
///
/// Returns the operation's value on the first success, or the last error
/// once `max_attempts` is exhausted.
pub async fn retry_with_backoff<F, Fut, T, E>(
    max_attempts: u32,
    cap_secs: u64,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                attempt += 1;
                if attempt >= max_attempts {
                    return Err(e);
                }
                let delay = backoff_delay(attempt - 1, cap_secs);
                tracing::warn!(
                    error = %e,
                    attempt,
                    delay_secs = delay.as_secs(),
                    "Retrying after transient error"
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
