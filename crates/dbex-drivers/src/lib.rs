//! DBEX Drivers - Data source variants and the export runner
//!
//! This crate selects a concrete driver for a [`DatabaseConfig`] and wires it
//! into a ready [`dbex_export::Exporter`].

#[cfg(feature = "postgres")]
pub use dbex_driver_postgres as postgres;
#[cfg(feature = "sqlite")]
pub use dbex_driver_sqlite as sqlite;

mod config;
mod registry;
pub mod runner;

pub use config::{DatabaseConfig, RetryConfig};
pub use registry::{DataSourceKind, create_exporter};

/// Re-export commonly used types from dbex-core and dbex-export
pub use dbex_core::{
    ExportConfig, ExportResult, ExtractorError, IncrementalFetchingState, Result, TableId,
    Watermark,
};
pub use dbex_export::{ExportOutput, Exporter};
