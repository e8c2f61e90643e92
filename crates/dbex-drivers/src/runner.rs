//! One export driven by a run directory.
//!
//! ```text
//! <data>/config.json           {"parameters": {"db": {...}, "retry": {...}, <export keys>}}
//! <data>/in/state.json         optional, {"lastFetchedRow": ...}
//! <data>/out/tables/<outputTable>.csv
//! <data>/out/state.json
//! ```

use std::path::Path;

use anyhow::{Context, Result};
use dbex_core::{ExportConfig, IncrementalFetchingState};
use dbex_export::ExportOutput;
use serde::Deserialize;
use tracing_subscriber::EnvFilter;

use crate::{DatabaseConfig, RetryConfig, create_exporter};

#[derive(Debug, Deserialize)]
struct RunConfig {
    parameters: serde_json::Value,
}

/// Install the fmt subscriber; `RUST_LOG` overrides the default `info` filter.
///
/// Does nothing when a global subscriber is already set.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .try_init();
}

/// Run the export described by `<data_dir>/config.json`.
///
/// Errors raised by the export itself are [`dbex_core::ExtractorError`]s and
/// can be recovered with `downcast_ref` to tell user errors apart.
pub async fn run(data_dir: &Path) -> Result<ExportOutput> {
    let config_path = data_dir.join("config.json");
    let raw = tokio::fs::read_to_string(&config_path)
        .await
        .with_context(|| format!("failed to read {}", config_path.display()))?;
    let run_config: RunConfig = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse {}", config_path.display()))?;
    let parameters = &run_config.parameters;

    let db = DatabaseConfig::from_value(parameters.get("db").unwrap_or(&serde_json::Value::Null))?;
    let retry: RetryConfig = match parameters.get("retry") {
        Some(value) => serde_json::from_value(value.clone()).context("invalid \"retry\" config")?,
        None => RetryConfig::default(),
    };
    let config = ExportConfig::from_value(parameters)?;
    let state = read_state(&data_dir.join("in").join("state.json")).await?;

    let exporter = create_exporter(&db, &retry)?;
    let exported = exporter
        .export(&config, &state, &data_dir.join("out").join("tables"))
        .await;
    if let Err(e) = exporter.connection().close().await {
        tracing::warn!(error = %e, "failed to close connection");
    }
    let output = exported?;

    let state_path = data_dir.join("out").join("state.json");
    let state_json = serde_json::to_string_pretty(&output.state)?;
    tokio::fs::write(&state_path, state_json)
        .await
        .with_context(|| format!("failed to write {}", state_path.display()))?;

    tracing::info!(
        rows = output.result.rows_count,
        csv = %output.result.csv_path.display(),
        "Export finished."
    );
    Ok(output)
}

async fn read_state(path: &Path) -> Result<IncrementalFetchingState> {
    match tokio::fs::read_to_string(path).await {
        Ok(raw) => serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display())),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(IncrementalFetchingState::empty()),
        Err(e) => Err(e).with_context(|| format!("failed to read {}", path.display())),
    }
}
