//! Ordered chain of export adapters

use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use dbex_core::{ExportConfig, ExtractorError, IncrementalFetchingState};

use crate::{AdapterError, AdapterResult, ExportAdapter};

/// Tries adapters in order until one succeeds.
///
/// Any file left at the output path is removed before each attempt, so a
/// partial CSV of a failed adapter never survives. An adapter whose output
/// path cannot be cleared is not run and counts as failed. When every adapter
/// fails the error of the last one is returned.
pub struct FallbackExportAdapter {
    adapters: Vec<Box<dyn ExportAdapter>>,
}

impl FallbackExportAdapter {
    pub fn new(adapters: Vec<Box<dyn ExportAdapter>>) -> Self {
        Self { adapters }
    }

    pub fn adapter_names(&self) -> Vec<&str> {
        self.adapters.iter().map(|adapter| adapter.name()).collect()
    }
}

#[async_trait]
impl ExportAdapter for FallbackExportAdapter {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn export(
        &self,
        config: &ExportConfig,
        state: &IncrementalFetchingState,
        csv_path: &Path,
    ) -> AdapterResult {
        let mut last_error = None;

        for adapter in &self.adapters {
            if let Err(err) = remove_partial_output(csv_path).await {
                tracing::warn!(
                    "Export by \"{}\" adapter failed: {}.",
                    adapter.name(),
                    err.to_string().trim_end_matches('.')
                );
                last_error = Some(AdapterError::Failed(err));
                continue;
            }

            tracing::info!("Exporting by \"{}\" adapter.", adapter.name());
            match adapter.export(config, state, csv_path).await {
                Ok(result) => return Ok(result),
                Err(AdapterError::Skipped(message)) => {
                    tracing::info!(
                        "Adapter \"{}\" skipped: {}.",
                        adapter.name(),
                        message.trim_end_matches('.')
                    );
                    last_error = Some(AdapterError::Skipped(message));
                }
                Err(AdapterError::Failed(err)) => {
                    tracing::warn!(
                        "Export by \"{}\" adapter failed: {}.",
                        adapter.name(),
                        err.to_string().trim_end_matches('.')
                    );
                    last_error = Some(AdapterError::Failed(err));
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            AdapterError::Failed(ExtractorError::Application(
                "No export adapter configured.".into(),
            ))
        }))
    }
}

async fn remove_partial_output(path: &Path) -> Result<(), ExtractorError> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => {
            tracing::debug!(path = %path.display(), "removed partial output");
            Ok(())
        }
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(ExtractorError::Application(format!(
            "Failed to remove partial output \"{}\": {}",
            path.display(),
            err
        ))),
    }
}
