//! DBEX Export - From export config to CSV file
//!
//! This crate turns an [`dbex_core::ExportConfig`] into a CSV file:
//!
//! - `QueryFactory` - Builds the full or incremental SELECT
//! - `ResultWriter` - Streams a query result into CSV, tracking the watermark
//! - `ExportAdapter` / `FallbackExportAdapter` - Export strategies with ordered fallback
//! - `Exporter` - Validates, runs the adapter chain and produces the next state

mod adapter;
mod encoding;
mod exporter;
mod fallback;
mod query_factory;
mod result_writer;

pub use adapter::{AdapterError, AdapterResult, ExportAdapter, QueryExportAdapter};
pub use encoding::EncodingPolicy;
pub use exporter::{ExportOutput, Exporter};
pub use fallback::FallbackExportAdapter;
pub use query_factory::{DefaultQueryFactory, QueryFactory};
pub use result_writer::{CsvProcessor, ResultWriter};
