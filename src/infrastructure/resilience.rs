//! Resilience policy for outbound calls
//!
//! Every remote call gets the same treatment: a bounded per-attempt timeout
//! and a small fixed number of attempts with fixed backoff.

use std::future::Future;
use std::time::Duration;

use crate::domain::report::errors::ReportError;

/// Fixed-attempt retry policy
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total number of attempts per call
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
    /// Per-attempt timeout
    pub timeout: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay: Duration::from_secs(1),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Check whether an error is worth another attempt.
pub fn is_retryable_error(error: &ReportError) -> bool {
    match error {
        ReportError::Network { .. } => true,
        ReportError::Timeout { .. } => true,
        // Server errors and rate limiting may clear up; client errors won't.
        ReportError::Http { status, .. } => *status >= 500 || *status == 429,
        _ => false,
    }
}

/// Execute an operation under the retry policy.
///
/// Each attempt runs under the configured timeout; a timed-out attempt
/// counts as a retryable failure.
pub async fn retry_with_fixed_backoff<F, Fut, T>(
    config: &RetryConfig,
    service: &str,
    mut operation: F,
) -> Result<T, ReportError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, ReportError>>,
{
    let mut attempts = 0;

    loop {
        attempts += 1;

        let outcome = match tokio::time::timeout(config.timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(ReportError::Timeout {
                service: service.to_string(),
                seconds: config.timeout.as_secs(),
            }),
        };

        match outcome {
            Ok(result) => return Ok(result),
            Err(error) => {
                if attempts >= config.max_attempts || !is_retryable_error(&error) {
                    return Err(error);
                }

                tracing::debug!(
                    attempt = attempts,
                    max_attempts = config.max_attempts,
                    delay_ms = config.delay.as_millis() as u64,
                    service = service,
                    error = %error,
                    "retrying operation"
                );
                tokio::time::sleep(config.delay).await;
            }
        }
    }
}
