//! Retry with exponential back-off and jitter for the analyzer client.
//!
//! [`retry_with_backoff`] wraps any fallible async operation and retries on
//! transient errors (timeouts, connection failures, 5xx). Application-level
//! errors and malformed responses are returned immediately.

use std::future::Future;
use std::time::Duration;

use crate::error::AnalyzerError;

/// Returns `true` for errors that are worth retrying after a back-off delay.
///
/// **Retriable:**
/// - [`AnalyzerError::Timeout`] — the deadline may simply have been tight.
/// - Network-level failures: connection refused/reset, transport timeout.
/// - HTTP 5xx responses: transient server/infrastructure errors.
///
/// **Not retriable (hard stop):**
/// - [`AnalyzerError::Api`] with a 4xx status — the request itself is bad.
/// - [`AnalyzerError::Deserialize`] — malformed response; retrying won't fix it.
pub(crate) fn is_retriable(err: &AnalyzerError) -> bool {
    match err {
        AnalyzerError::Timeout { .. } => true,
        AnalyzerError::Http(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        AnalyzerError::Api { status, .. } => *status >= 500,
        AnalyzerError::Deserialize { .. } => false,
    }
}

/// Runs `operation` with up to `max_retries` additional attempts on
/// transient errors.
///
/// Delay doubles per attempt from `backoff_base_ms`, capped at 30 s, with
/// ±25 % jitter so parallel workers don't hammer a recovering service in
/// lock-step. Non-retriable errors are returned immediately.
pub(crate) async fn retry_with_backoff<T, F, Fut>(
    max_retries: u32,
    backoff_base_ms: u64,
    mut operation: F,
) -> Result<T, AnalyzerError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AnalyzerError>>,
{
    const MAX_DELAY_MS: u64 = 30_000;
    let mut attempt = 0u32;
    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !is_retriable(&err) || attempt >= max_retries {
                    return Err(err);
                }
                attempt += 1;
                let computed = backoff_base_ms.saturating_mul(1u64 << (attempt - 1).min(10));
                let capped = computed.min(MAX_DELAY_MS);
                #[allow(
                    clippy::cast_possible_truncation,
                    clippy::cast_sign_loss,
                    clippy::cast_precision_loss
                )]
                let delay_ms = (capped as f64 * (rand::random::<f64>() * 0.5 + 0.75)) as u64;
                tracing::warn!(
                    attempt,
                    max_retries,
                    delay_ms,
                    error = %err,
                    "analyzer transient error, retrying after back-off"
                );
                tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            }
        }
    }
}
