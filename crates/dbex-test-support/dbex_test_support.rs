//! DBEX Test Support
//!
//! Shared fixtures for the DBEX test suites:
//!
//! - **Log capture**: assert on the exact log lines the core emits
//! - **Scripted connector**: a native client whose connect and query outcomes
//!   are scripted per call, for retry and fallback tests
//! - **City fixture**: six Czech cities, in memory or as a SQLite file
//!
//! # Usage
//!
//! ```rust,ignore
//! use dbex_test_support::{LogCapture, ScriptedConnector, fixtures};
//!
//! let logs = LogCapture::new();
//! let _guard = logs.install();
//!
//! let connector = ScriptedConnector::new()
//!     .then_fail(ExtractorError::Connection("reset".into()))
//!     .then_rows(fixtures::city_metadata(), fixtures::city_rows());
//! ```

pub mod fixtures;
mod logging;
mod scripted;

pub use logging::LogCapture;
pub use scripted::{ScriptedClient, ScriptedConnector};
