//! Export strategies

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use dbex_connection::Connection;
use dbex_core::{ExportConfig, ExportResult, ExtractorError, IncrementalFetchingState};
use thiserror::Error;

use crate::{QueryFactory, ResultWriter};

/// Why an adapter did not produce an export
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The adapter cannot serve this config; the next one should be tried
    #[error("{0}")]
    Skipped(String),

    #[error(transparent)]
    Failed(#[from] ExtractorError),
}

impl AdapterError {
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped(_))
    }

    pub fn into_extractor_error(self) -> ExtractorError {
        match self {
            Self::Skipped(message) => ExtractorError::AdapterSkipped(message),
            Self::Failed(err) => err,
        }
    }
}

pub type AdapterResult = std::result::Result<ExportResult, AdapterError>;

/// One way of exporting a config into a CSV file
#[async_trait]
pub trait ExportAdapter: Send + Sync {
    /// Name used in log messages
    fn name(&self) -> &str;

    async fn export(
        &self,
        config: &ExportConfig,
        state: &IncrementalFetchingState,
        csv_path: &Path,
    ) -> AdapterResult;
}

/// Generic export: builds the SELECT, runs it with retry and streams the
/// rows through a [`ResultWriter`].
pub struct QueryExportAdapter {
    connection: Arc<Connection>,
    query_factory: Arc<dyn QueryFactory>,
    writer: ResultWriter,
}

impl QueryExportAdapter {
    pub fn new(connection: Arc<Connection>, query_factory: Arc<dyn QueryFactory>) -> Self {
        Self {
            connection,
            query_factory,
            writer: ResultWriter::new(),
        }
    }

    pub fn with_writer(mut self, writer: ResultWriter) -> Self {
        self.writer = writer;
        self
    }
}

#[async_trait]
impl ExportAdapter for QueryExportAdapter {
    fn name(&self) -> &str {
        "query"
    }

    async fn export(
        &self,
        config: &ExportConfig,
        state: &IncrementalFetchingState,
        csv_path: &Path,
    ) -> AdapterResult {
        if config.has_query() && config.is_incremental_fetching() {
            return Err(AdapterError::Skipped(
                "Incremental fetching is not supported for advanced queries".into(),
            ));
        }

        let sql = self.query_factory.create(config, state, &self.connection)?;
        tracing::info!(adapter = self.name(), "Running query \"{}\".", sql);

        let processor = self.writer.processor(config, state, csv_path);
        let result = self
            .connection
            .query_and_process(&sql, config.max_retries, &processor)
            .await?;
        Ok(result)
    }
}
