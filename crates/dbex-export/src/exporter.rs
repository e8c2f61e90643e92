//! One export run: config in, CSV file and next state out

use std::borrow::Cow;
use std::path::Path;
use std::sync::Arc;

use dbex_connection::Connection;
use dbex_core::metadata::MetadataProvider;
use dbex_core::{
    ExportConfig, ExportResult, ExtractorError, IncrementalColumnKind, IncrementalFetchingState,
    Result, Value, Watermark,
};

use crate::{ExportAdapter, QueryFactory};

/// Result of [`Exporter::export`] together with the state to persist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOutput {
    pub result: ExportResult,
    pub state: IncrementalFetchingState,
}

/// Drives a single export over one connection.
///
/// Incremental fetching is checked against the table metadata first: the
/// column must exist and be numeric or a timestamp. The adapter then writes
/// `<output_dir>/<outputTable>.csv`. When the adapter exported rows but could
/// not report the watermark, the last-row query supplies it.
pub struct Exporter {
    connection: Arc<Connection>,
    query_factory: Arc<dyn QueryFactory>,
    adapter: Box<dyn ExportAdapter>,
    metadata: Arc<dyn MetadataProvider>,
}

impl Exporter {
    pub fn new(
        connection: Arc<Connection>,
        query_factory: Arc<dyn QueryFactory>,
        adapter: Box<dyn ExportAdapter>,
        metadata: Arc<dyn MetadataProvider>,
    ) -> Self {
        Self {
            connection,
            query_factory,
            adapter,
            metadata,
        }
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    pub fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }

    pub fn adapter_name(&self) -> &str {
        self.adapter.name()
    }

    /// Check that the database answers the liveness query
    pub async fn test_connection(&self, max_retries: u32) -> Result<()> {
        self.connection.test_connection(max_retries).await
    }

    /// Export `config` into `output_dir`.
    ///
    /// Errors carry the config's display name as context.
    pub async fn export(
        &self,
        config: &ExportConfig,
        state: &IncrementalFetchingState,
        output_dir: &Path,
    ) -> Result<ExportOutput> {
        let name = config.display_name();
        tracing::info!(
            config = %name,
            incremental = config.incremental,
            "Exporting to \"{}\".",
            config.output_table
        );

        let output = self
            .run(config, state, output_dir)
            .await
            .map_err(|err| err.with_context(&name))?;

        tracing::info!(
            config = %name,
            rows = output.result.rows_count,
            "Exported \"{}\" rows to \"{}\".",
            output.result.rows_count,
            output.result.csv_path.display()
        );
        Ok(output)
    }

    async fn run(
        &self,
        config: &ExportConfig,
        state: &IncrementalFetchingState,
        output_dir: &Path,
    ) -> Result<ExportOutput> {
        config.validate()?;
        let config = self.resolve_incremental(config).await?;

        tokio::fs::create_dir_all(output_dir).await.map_err(|e| {
            ExtractorError::Application(format!(
                "Failed to create output directory \"{}\": {}",
                output_dir.display(),
                e
            ))
        })?;
        let csv_path = output_dir.join(format!("{}.csv", config.output_table));

        let mut result = self
            .adapter
            .export(&config, state, &csv_path)
            .await
            .map_err(|err| err.into_extractor_error())?;

        if config.is_incremental_fetching()
            && result.rows_count > 0
            && result.inc_fetching_col_max_value.is_none()
        {
            result.inc_fetching_col_max_value = self.fetch_last_row(&config, state).await?;
        }

        let next_state = if config.is_incremental_fetching() {
            state.advance(&result)
        } else {
            IncrementalFetchingState::empty()
        };

        Ok(ExportOutput {
            result,
            state: next_state,
        })
    }

    /// Match the incremental column against the table metadata and record
    /// its kind. Configs without incremental fetching pass through untouched.
    async fn resolve_incremental<'a>(&self, config: &'a ExportConfig) -> Result<Cow<'a, ExportConfig>> {
        let (Some(table_id), Some(incremental)) =
            (config.table_id(), config.incremental_fetching.as_ref())
        else {
            return Ok(Cow::Borrowed(config));
        };

        let table = self.metadata.get_table(table_id).await.map_err(|err| match err {
            ExtractorError::NotFound(_) => {
                ExtractorError::User(format!("Table \"{}\" not found.", table_id))
            }
            other => other,
        })?;
        let column = table.columns()?.get_by_name(&incremental.column).map_err(|_| {
            ExtractorError::User(format!(
                "Column \"{}\" specified in \"incrementalFetchingColumn\" does not exist in the table \"{}\".",
                incremental.column, table_id
            ))
        })?;

        let kind = IncrementalColumnKind::from_declared_type(column.data_type());
        if kind == IncrementalColumnKind::Text {
            return Err(ExtractorError::User(format!(
                "Column \"{}\" specified in \"incrementalFetchingColumn\" must be numeric or timestamp, found \"{}\".",
                column.name(),
                column.data_type()
            )));
        }
        tracing::debug!(column = %column.name(), ?kind, "incremental column resolved");

        let mut resolved = config.clone();
        if let Some(incremental) = resolved.incremental_fetching.as_mut() {
            incremental.column = column.name().to_string();
            incremental.kind = kind;
        }
        Ok(Cow::Owned(resolved))
    }

    async fn fetch_last_row(
        &self,
        config: &ExportConfig,
        state: &IncrementalFetchingState,
    ) -> Result<Option<Watermark>> {
        let sql = self
            .query_factory
            .create_last_row_query(config, state, &self.connection)?;
        tracing::debug!(query = %sql, "fetching incremental watermark");

        let rows = self.connection.fetch_all(&sql, config.max_retries).await?;
        let value = rows
            .first()
            .and_then(|row| row.get(0))
            .filter(|value| !value.is_null())
            .map(|value: &Value| Watermark::Text(value.to_string()));
        Ok(value)
    }
}
