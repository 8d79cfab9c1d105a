//! Retry with exponential backoff.

use crate::ports::backend::BackendError;
use deliberation_domain::RateLimitConfig;
use std::future::Future;
use tokio::time::sleep;
use tracing::warn;

/// Run `action` until it succeeds or attempts run out.
///
/// `action` receives the 0-based attempt number. Rate-limit failures back off
/// for at least a minute; other failures back off for at most half the
/// configured maximum. Non-retryable errors and the last attempt's error are
/// returned unchanged. `config.max_retries` is the total attempt count.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &RateLimitConfig,
    label: &str,
    mut action: F,
) -> Result<T, BackendError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    let attempts = config.max_retries.max(1);
    let mut attempt = 0;

    loop {
        let error = match action(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) => error,
        };

        let remaining = attempts - attempt - 1;
        if !error.is_retryable() || remaining == 0 {
            if remaining == 0 && attempts > 1 {
                warn!("{}: all {} attempts failed", label, attempts);
            }
            return Err(error);
        }

        let delay = if error.is_rate_limit() {
            config.rate_limit_delay(attempt)
        } else {
            config.error_delay(attempt)
        };
        warn!(
            "{}: attempt {} failed: {}. Retrying in {:.1}s ({} attempts remaining)",
            label,
            attempt + 1,
            error,
            delay.as_secs_f64(),
            remaining
        );
        sleep(delay).await;
        attempt += 1;
    }
}
