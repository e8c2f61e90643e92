//! DBEX Core - Shared abstractions for database extraction
//!
//! This crate provides the types every other DBEX crate depends on:
//!
//! - `ExtractorError` - Error taxonomy with retry classification
//! - `Connector` / `NativeClient` - Seam to the per-database native client
//! - `QueryResult` - Single-pass streaming row source
//! - `ExportConfig` / `IncrementalFetchingState` / `ExportResult`
//! - `metadata` - Table and column descriptions with validating builders

mod config;
mod connector;
mod error;
pub mod metadata;
mod types;

pub use config::*;
pub use connector::*;
pub use error::*;
pub use types::*;
