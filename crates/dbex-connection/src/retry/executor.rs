//! Retry loop around a fallible async operation

use std::future::Future;

use async_trait::async_trait;
use dbex_core::{ExtractorError, Result};

use super::BackoffStrategy;

/// Step run between a failed attempt and the next one
#[async_trait]
pub trait BeforeRetry: Send + Sync {
    /// `attempt` is the 1-based number of the attempt that just failed
    async fn before_retry(&self, attempt: u32);
}

/// Hook that does nothing between attempts
#[derive(Debug, Clone, Copy, Default)]
pub struct NoReconnect;

#[async_trait]
impl BeforeRetry for NoReconnect {
    async fn before_retry(&self, _attempt: u32) {}
}

/// Re-runs an operation while it fails with a retryable error.
///
/// `max_retries` is the total number of attempts. Between attempts the
/// executor logs the failure, sleeps according to its [`BackoffStrategy`]
/// and runs the [`BeforeRetry`] hook. Errors for which
/// [`ExtractorError::is_retryable`] is false are returned on first
/// occurrence. Once every attempt failed the last error is reported as a
/// user error ending in `Tried N times.`
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    max_retries: u32,
    backoff: BackoffStrategy,
}

impl RetryExecutor {
    /// Executor with the default backoff; `max_retries` is at least 1.
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries: max_retries.max(1),
            backoff: BackoffStrategy::default(),
        }
    }

    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn backoff(&self) -> &BackoffStrategy {
        &self.backoff
    }

    pub async fn call<T, F, Fut>(&self, hook: &dyn BeforeRetry, mut operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let mut attempt = 1u32;

        loop {
            let err = match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if !err.is_retryable() => return Err(err),
                Err(err) => err,
            };

            let message = err.to_string();
            let message = message.trim_end_matches('.');

            if attempt >= self.max_retries {
                return Err(ExtractorError::User(format!(
                    "{}. Tried {} times.",
                    message, self.max_retries
                )));
            }

            tracing::info!("{}. Retrying... [{}x]", message, attempt);
            tokio::time::sleep(self.backoff.calculate_delay(attempt - 1)).await;
            hook.before_retry(attempt).await;

            attempt += 1;
        }
    }
}
