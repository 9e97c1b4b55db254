//! Async utilities and patterns
//!
//! Provides retry logic, timeouts, and bounded concurrent processing

use crate::error::{ErrorContext, SleuthError, SleuthResult};
use futures::future::BoxFuture;
use futures::stream::{self, StreamExt};
use tokio::time::{sleep, timeout, Duration};
use tracing::{debug, error, warn};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_attempts: usize,
    /// Initial delay between retries in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_delay_ms: u64,
    /// Backoff multiplier (exponential backoff)
    pub backoff_multiplier: f64,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Retry an async operation with exponential backoff
///
/// Errors for which `should_retry` returns false are returned immediately.
pub async fn retry_async<F, T, P>(
    operation: F,
    config: RetryConfig,
    operation_name: &str,
    should_retry: P,
) -> SleuthResult<T>
where
    F: Fn() -> BoxFuture<'static, SleuthResult<T>>,
    P: Fn(&SleuthError) -> bool,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay_ms;

    loop {
        attempt += 1;

        debug!(
            operation = operation_name,
            attempt = attempt,
            max_attempts = config.max_attempts,
            "Attempting operation"
        );

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt = attempt,
                        "Operation succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                if attempt >= config.max_attempts || !should_retry(&err) {
                    error!(
                        operation = operation_name,
                        attempt = attempt,
                        error = %err,
                        "Operation failed"
                    );
                    return Err(err);
                }

                warn!(
                    operation = operation_name,
                    attempt = attempt,
                    error = %err,
                    delay_ms = delay,
                    "Operation failed, retrying"
                );

                let actual_delay = if config.jitter {
                    let jitter_factor = 0.1;
                    let jitter = (fastrand::f64() - 0.5) * 2.0 * jitter_factor;
                    ((delay as f64) * (1.0 + jitter)) as u64
                } else {
                    delay
                };

                sleep(Duration::from_millis(actual_delay)).await;

                delay = ((delay as f64) * config.backoff_multiplier) as u64;
                delay = delay.min(config.max_delay_ms);
            }
        }
    }
}

/// Timeout wrapper for async operations
pub async fn with_timeout<F, T>(future: F, timeout_ms: u64, operation_name: &str) -> SleuthResult<T>
where
    F: std::future::Future<Output = T>,
{
    match timeout(Duration::from_millis(timeout_ms), future).await {
        Ok(result) => Ok(result),
        Err(_) => Err(SleuthError::Timeout {
            operation: operation_name.to_string(),
            duration_ms: timeout_ms,
            context: ErrorContext::new("async_utils")
                .with_operation("timeout")
                .with_metadata("timeout_ms", &timeout_ms.to_string())
                .with_suggestion("Increase timeout duration")
                .with_suggestion("Verify service availability"),
        }),
    }
}

/// Concurrent processing with controlled parallelism
///
/// At most `max_concurrent` items are in flight at once, each bounded by
/// `timeout_ms`. Output order matches input order. Failed or timed-out items
/// are replaced by `fallback(item_index, error)` so a batch never fails as a whole.
pub async fn process_concurrently<T, R, F, Fut, D>(
    items: Vec<T>,
    max_concurrent: usize,
    timeout_ms: u64,
    operation_name: &str,
    processor: F,
    fallback: D,
) -> Vec<R>
where
    F: Fn(T) -> Fut,
    Fut: std::future::Future<Output = SleuthResult<R>>,
    D: Fn(usize, &SleuthError) -> R,
{
    let outcomes = stream::iter(items.into_iter().map(|item| {
        let fut = processor(item);
        async move { with_timeout(fut, timeout_ms, operation_name).await }
    }))
    .buffered(max_concurrent.max(1))
    .collect::<Vec<_>>()
    .await;

    outcomes
        .into_iter()
        .enumerate()
        .map(|(index, outcome)| match outcome.and_then(|inner| inner) {
            Ok(value) => value,
            Err(err) => {
                warn!(
                    operation = operation_name,
                    index = index,
                    error = %err,
                    "Concurrent task degraded to fallback"
                );
                fallback(index, &err)
            }
        })
        .collect()
}
