//! DBEX Connection - Retrying access to one native client
//!
//! This crate wraps a [`dbex_core::Connector`] into a [`Connection`] that
//! connects lazily, retries transient failures with exponential backoff and
//! reconnects between attempts.

mod connection;
mod processor;
pub mod retry;

pub use connection::Connection;
pub use processor::{ResultProcessor, RowCollector};
pub use retry::{BackoffStrategy, BeforeRetry, NoReconnect, RetryExecutor};
