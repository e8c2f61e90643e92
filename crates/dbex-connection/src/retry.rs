//! Retry with exponential backoff
//!
//! This module provides the [`RetryExecutor`], which re-runs an operation on
//! transient failures, and the [`BackoffStrategy`] computing the pause
//! between attempts.
//!
//! # Example
//!
//! ```ignore
//! use dbex_connection::retry::{BackoffStrategy, NoReconnect, RetryExecutor};
//!
//! let executor = RetryExecutor::new(5).with_backoff(BackoffStrategy::new(500, 60_000));
//! let rows = executor.call(&NoReconnect, || async { fetch().await }).await?;
//! ```

mod backoff;
mod executor;

#[cfg(test)]
mod tests;

pub use backoff::{BackoffStrategy, DEFAULT_INITIAL_INTERVAL_MS};
pub use executor::{BeforeRetry, NoReconnect, RetryExecutor};
