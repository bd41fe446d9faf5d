//! Retry utilities for backend operations with exponential backoff.
//!
//! This module provides retry logic for transient failures:
//! - Timeouts
//! - No response (connection refused/reset)
//! - 5xx server errors, 408 and 429
//!
//! It does NOT retry:
//! - 4xx client errors (bad requests, not found, etc.)
//! - Malformed responses
//!
//! Only search-class lookups (geocode, reverse geocode, current weather) are
//! retried. Report generation and downloads never go through here by default.

use std::future::Future;
use std::time::Duration;

use reqwest::StatusCode;
use wxhist_core::NetworkError;

/// Default retry configuration
pub const DEFAULT_MAX_RETRIES: u32 = 1;
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1000;
pub const DEFAULT_MAX_DELAY_MS: u64 = 30_000;

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay between retries (doubles each attempt)
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom settings
    pub fn new(max_retries: u32, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        Self {
            max_retries,
            initial_delay: Duration::from_millis(initial_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
        }
    }

    /// Default backoff with a different retry count
    pub fn with_retries(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    /// No retries at all
    pub fn none() -> Self {
        Self::with_retries(0)
    }

    /// Calculate the delay for a given attempt number
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        // Exponential backoff: initial_delay * 2^attempt
        let factor = 2u64.saturating_pow(attempt);
        let delay_ms = (self.initial_delay.as_millis() as u64).saturating_mul(factor);
        let capped = delay_ms.min(self.max_delay.as_millis() as u64);
        Duration::from_millis(capped)
    }
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Should retry the request
    Retry,
    /// Should not retry - permanent failure
    NoRetry,
}

/// Check if a normalized backend error is retryable
pub fn is_retryable_error(error: &NetworkError) -> RetryDecision {
    match error {
        NetworkError::Timeout => {
            tracing::debug!("Request timed out, will retry");
            RetryDecision::Retry
        }
        NetworkError::NoResponse(_) => {
            tracing::debug!("No response, will retry");
            RetryDecision::Retry
        }
        NetworkError::Server { status, .. } => match StatusCode::from_u16(*status) {
            Ok(status) => is_retryable_status(status),
            Err(_) => RetryDecision::NoRetry,
        },
        NetworkError::InvalidResponse(_) => RetryDecision::NoRetry,
    }
}

/// Check if a status code is retryable
pub fn is_retryable_status(status: StatusCode) -> RetryDecision {
    // 5xx server errors are retryable
    if status.is_server_error() {
        tracing::debug!("Server error ({}), will retry", status);
        return RetryDecision::Retry;
    }

    // 429 Too Many Requests - should retry with backoff
    if status == StatusCode::TOO_MANY_REQUESTS {
        tracing::debug!("Rate limited (429), will retry");
        return RetryDecision::Retry;
    }

    // 408 Request Timeout - retryable
    if status == StatusCode::REQUEST_TIMEOUT {
        tracing::debug!("Request timeout (408), will retry");
        return RetryDecision::Retry;
    }

    // Everything else (4xx, success, redirects) is final
    RetryDecision::NoRetry
}

/// Execute a backend operation with retry logic.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation` - Async closure that performs the call
///
/// # Returns
/// The successful value or the last error after all retries are exhausted
///
/// # Example
/// ```ignore
/// let places = with_retry(&RetryConfig::with_retries(2), || backend.geocode("London")).await?;
/// ```
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: F) -> Result<T, NetworkError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, NetworkError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 0 {
                    tracing::info!("Request succeeded after {} retries", attempt);
                }
                return Ok(value);
            }
            Err(e) => {
                if is_retryable_error(&e) == RetryDecision::NoRetry {
                    tracing::debug!("Non-retryable error: {}", e);
                    return Err(e);
                }

                if attempt >= config.max_retries {
                    if config.max_retries > 0 {
                        tracing::error!("All {} retry attempts exhausted", config.max_retries + 1);
                    }
                    return Err(e);
                }

                let delay = config.delay_for_attempt(attempt);
                attempt += 1;
                tracing::warn!(
                    "Retryable error on attempt {} of {}: {}; waiting {:?}",
                    attempt,
                    config.max_retries + 1,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
        }
    }
}
