//! Streaming a query result into a CSV file

use std::fs::File;
use std::path::Path;

use async_trait::async_trait;
use dbex_connection::ResultProcessor;
use dbex_core::{
    ExportConfig, ExportResult, ExtractorError, IncrementalFetchingState, QueryResult, Result,
    Value, Watermark,
};

use crate::EncodingPolicy;

/// Writes query results as CSV: comma separated, every field quoted,
/// `\n` after each record.
///
/// Custom-query exports start with a header of the result's column names;
/// table exports carry no header. Rows are written one at a time as they
/// are fetched.
#[derive(Debug, Clone, Default)]
pub struct ResultWriter {
    encoding: EncodingPolicy,
}

impl ResultWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_encoding(mut self, encoding: EncodingPolicy) -> Self {
        self.encoding = encoding;
        self
    }

    pub fn encoding(&self) -> &EncodingPolicy {
        &self.encoding
    }

    /// Drain `result` into `path` and close it, on success and failure alike.
    ///
    /// With incremental fetching the value of the incremental column in the
    /// last written row becomes the result's watermark; when nothing was
    /// written the watermark of `state` is carried over.
    pub async fn write_to_csv(
        &self,
        result: &mut QueryResult,
        config: &ExportConfig,
        state: &IncrementalFetchingState,
        path: &Path,
    ) -> Result<ExportResult> {
        let written = self.write_rows(result, config, state, path).await;
        let closed = result.close().await;
        match (written, closed) {
            (Ok(export), Ok(())) => Ok(export),
            (Ok(_), Err(err)) | (Err(err), _) => Err(err),
        }
    }

    /// Processor running [`ResultWriter::write_to_csv`] inside a retried query
    pub fn processor<'a>(
        &'a self,
        config: &'a ExportConfig,
        state: &'a IncrementalFetchingState,
        path: &'a Path,
    ) -> CsvProcessor<'a> {
        CsvProcessor {
            writer: self,
            config,
            state,
            path,
        }
    }

    async fn write_rows(
        &self,
        result: &mut QueryResult,
        config: &ExportConfig,
        state: &IncrementalFetchingState,
        path: &Path,
    ) -> Result<ExportResult> {
        let incremental_position = match &config.incremental_fetching {
            Some(incremental) => Some(result.metadata().position_of(&incremental.column).ok_or_else(
                || {
                    ExtractorError::User(format!(
                        "Column \"{}\" specified in \"incrementalFetchingColumn\" is not present in the result.",
                        incremental.column
                    ))
                },
            )?),
            None => None,
        };

        let file = File::create(path).map_err(|e| write_error(path, e))?;
        let mut csv = csv::WriterBuilder::new()
            .quote_style(csv::QuoteStyle::Always)
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(file);

        if config.has_query() {
            let header = result
                .metadata()
                .column_names()
                .into_iter()
                .map(|name| self.encoding.apply(name.as_bytes().into()).into_owned())
                .collect::<Vec<_>>();
            csv.write_record(&header).map_err(|e| write_error(path, e))?;
        }

        let mut rows_count = 0u64;
        let mut last_value: Option<Watermark> = None;

        while let Some(row) = result.next_row().await? {
            let record = row
                .values
                .iter()
                .map(|value| self.encoding.apply(value.to_csv_bytes()));
            csv.write_record(record).map_err(|e| write_error(path, e))?;
            rows_count += 1;

            if let Some(position) = incremental_position {
                if let Some(value) = row.get(position).filter(|v| !v.is_null()) {
                    last_value = Some(watermark_of(value));
                }
            }
        }

        csv.flush().map_err(|e| write_error(path, e))?;

        let inc_fetching_col_max_value = if config.is_incremental_fetching() {
            last_value.or_else(|| state.last_fetched_row().cloned())
        } else {
            None
        };

        tracing::debug!(rows = rows_count, path = %path.display(), "CSV written");

        Ok(ExportResult {
            rows_count,
            csv_path: path.to_path_buf(),
            inc_fetching_col_max_value,
        })
    }
}

/// [`ResultProcessor`] writing the processed result to CSV
pub struct CsvProcessor<'a> {
    writer: &'a ResultWriter,
    config: &'a ExportConfig,
    state: &'a IncrementalFetchingState,
    path: &'a Path,
}

#[async_trait]
impl<'a> ResultProcessor for CsvProcessor<'a> {
    type Output = ExportResult;

    async fn process(&self, result: &mut QueryResult) -> Result<ExportResult> {
        self.writer
            .write_to_csv(result, self.config, self.state, self.path)
            .await
    }
}

fn watermark_of(value: &Value) -> Watermark {
    Watermark::Text(value.to_string())
}

fn write_error(path: &Path, err: impl std::fmt::Display) -> ExtractorError {
    ExtractorError::Application(format!(
        "Failed to write CSV file \"{}\": {}",
        path.display(),
        err
    ))
}
