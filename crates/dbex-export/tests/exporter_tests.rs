//! End-to-end export runs over a scripted connection

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dbex_connection::Connection;
use dbex_core::metadata::{MetadataProvider, Table, TableBuilder, TableCollection};
use dbex_core::{
    ColumnMeta, ExportConfig, ExportResult, ExtractorError, IncrementalFetchingConfig,
    IncrementalFetchingState, QueryMetadata, Result, Row, TableId, Value, Watermark,
};
use dbex_export::{
    AdapterResult, DefaultQueryFactory, ExportAdapter, Exporter, FallbackExportAdapter,
    QueryExportAdapter,
};
use dbex_test_support::{ScriptedConnector, fixtures};
use pretty_assertions::assert_eq;

/// Metadata of a fixed set of tables
struct StaticMetadata {
    tables: Vec<Table>,
}

#[async_trait]
impl MetadataProvider for StaticMetadata {
    async fn list_tables(
        &self,
        whitelist: Option<&[TableId]>,
        _load_columns: bool,
    ) -> Result<TableCollection> {
        let tables = self
            .tables
            .iter()
            .filter(|table| match whitelist {
                Some(ids) => ids.iter().any(|id| id.name.eq_ignore_ascii_case(table.name())),
                None => true,
            })
            .cloned()
            .collect();
        Ok(TableCollection::new(tables))
    }
}

fn cities_table() -> Table {
    let mut builder = TableBuilder::new();
    builder.set_name("cities").set_schema("main");
    for (position, (name, data_type)) in [
        ("id", "INTEGER"),
        ("name", "TEXT"),
        ("population", "INTEGER"),
        ("founded_at", "TIMESTAMP"),
    ]
    .into_iter()
    .enumerate()
    {
        builder
            .add_column()
            .unwrap()
            .set_name(name)
            .set_type(data_type)
            .set_ordinal_position(position as u32 + 1);
    }
    builder.build().unwrap()
}

fn exporter(connector: &ScriptedConnector) -> Exporter {
    let connection = Arc::new(Connection::new(Arc::new(connector.clone())));
    let query_factory = Arc::new(DefaultQueryFactory);
    let adapter = FallbackExportAdapter::new(vec![Box::new(QueryExportAdapter::new(
        Arc::clone(&connection),
        query_factory.clone(),
    ))]);
    Exporter::new(
        connection,
        query_factory,
        Box::new(adapter),
        Arc::new(StaticMetadata {
            tables: vec![cities_table()],
        }),
    )
}

fn cities() -> ExportConfig {
    ExportConfig::table(TableId::new("main", "cities"), "cities")
}

fn incremental_cities() -> ExportConfig {
    cities().with_incremental_fetching(IncrementalFetchingConfig::new("id"))
}

#[tokio::test]
async fn test_full_export_writes_output_table_file() {
    let connector =
        ScriptedConnector::new().then_rows(fixtures::city_metadata(), fixtures::city_rows());
    let dir = tempfile::tempdir().unwrap();
    let output_dir = dir.path().join("out").join("tables");

    let output = exporter(&connector)
        .export(&cities(), &IncrementalFetchingState::empty(), &output_dir)
        .await
        .unwrap();

    assert_eq!(output.result.rows_count, 6);
    assert_eq!(output.result.csv_path, output_dir.join("cities.csv"));
    assert_eq!(output.state, IncrementalFetchingState::empty());
    let lines: Vec<String> = fs::read_to_string(output_dir.join("cities.csv"))
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(lines, fixtures::city_csv_lines());
}

#[tokio::test]
async fn test_incremental_state_flows_between_runs() {
    let connector = ScriptedConnector::new()
        .then_rows(fixtures::city_metadata(), fixtures::city_rows()[..4].to_vec())
        .then_rows(fixtures::city_metadata(), fixtures::city_rows_from(4));
    let exporter = exporter(&connector);
    let dir = tempfile::tempdir().unwrap();

    let first = exporter
        .export(&incremental_cities(), &IncrementalFetchingState::empty(), dir.path())
        .await
        .unwrap();
    assert_eq!(first.result.rows_count, 4);
    assert_eq!(first.state, IncrementalFetchingState::new("4"));

    let second = exporter
        .export(&incremental_cities(), &first.state, dir.path())
        .await
        .unwrap();
    assert_eq!(second.result.rows_count, 3);
    assert_eq!(second.state, IncrementalFetchingState::new("6"));

    assert_eq!(
        connector.executed_queries(),
        vec![
            "SELECT * FROM \"main\".\"cities\" ORDER BY \"id\"",
            "SELECT * FROM \"main\".\"cities\" WHERE \"id\" >= 4 ORDER BY \"id\"",
        ]
    );
}

#[tokio::test]
async fn test_empty_incremental_run_keeps_state() {
    let connector = ScriptedConnector::new().then_rows(fixtures::city_metadata(), Vec::new());
    let dir = tempfile::tempdir().unwrap();
    let state = IncrementalFetchingState::new(6i64);

    let output = exporter(&connector)
        .export(&incremental_cities(), &state, dir.path())
        .await
        .unwrap();

    assert_eq!(output.result.rows_count, 0);
    assert_eq!(output.state, state);
}

#[tokio::test]
async fn test_incremental_column_name_is_matched_case_insensitively() {
    let connector =
        ScriptedConnector::new().then_rows(fixtures::city_metadata(), fixtures::city_rows());
    let dir = tempfile::tempdir().unwrap();
    let config = cities().with_incremental_fetching(IncrementalFetchingConfig::new("ID"));

    exporter(&connector)
        .export(&config, &IncrementalFetchingState::empty(), dir.path())
        .await
        .unwrap();

    assert_eq!(
        connector.executed_queries(),
        vec!["SELECT * FROM \"main\".\"cities\" ORDER BY \"id\""]
    );
}

#[tokio::test]
async fn test_missing_incremental_column_is_user_error_with_context() {
    let connector = ScriptedConnector::new();
    let dir = tempfile::tempdir().unwrap();
    let config = cities().with_incremental_fetching(IncrementalFetchingConfig::new("updated_at"));

    let err = exporter(&connector)
        .export(&config, &IncrementalFetchingState::empty(), dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractorError::User(_)));
    assert!(err.to_string().starts_with("[main.cities]: Column \"updated_at\""));
    assert!(connector.executed_queries().is_empty());
}

#[tokio::test]
async fn test_text_incremental_column_is_rejected() {
    let connector = ScriptedConnector::new();
    let dir = tempfile::tempdir().unwrap();
    let config = cities().with_incremental_fetching(IncrementalFetchingConfig::new("name"));

    let err = exporter(&connector)
        .export(&config, &IncrementalFetchingState::empty(), dir.path())
        .await
        .unwrap_err();

    assert!(err.is_user_error());
    assert!(err.to_string().contains("must be numeric or timestamp"));
}

#[tokio::test]
async fn test_timestamp_incremental_column_is_quoted() {
    let metadata = QueryMetadata::new(vec![
        ColumnMeta::new("id", "INTEGER"),
        ColumnMeta::new("founded_at", "TIMESTAMP"),
    ]);
    let connector = ScriptedConnector::new().then_rows(
        metadata,
        vec![Row::new(vec![
            Value::Int64(1),
            Value::from("1992-01-01 00:00:00"),
        ])],
    );
    let dir = tempfile::tempdir().unwrap();
    let config =
        cities().with_incremental_fetching(IncrementalFetchingConfig::new("founded_at"));

    let output = exporter(&connector)
        .export(
            &config,
            &IncrementalFetchingState::new("1990-01-01 00:00:00"),
            dir.path(),
        )
        .await
        .unwrap();

    assert_eq!(
        connector.executed_queries(),
        vec![
            "SELECT * FROM \"main\".\"cities\" WHERE \"founded_at\" >= '1990-01-01 00:00:00' ORDER BY \"founded_at\""
        ]
    );
    assert_eq!(output.state, IncrementalFetchingState::new("1992-01-01 00:00:00"));
}

#[tokio::test]
async fn test_unknown_table_is_user_error() {
    let connector = ScriptedConnector::new();
    let dir = tempfile::tempdir().unwrap();
    let config = ExportConfig::table(TableId::new("main", "villages"), "villages")
        .with_incremental_fetching(IncrementalFetchingConfig::new("id"));

    let err = exporter(&connector)
        .export(&config, &IncrementalFetchingState::empty(), dir.path())
        .await
        .unwrap_err();

    assert!(err.is_user_error());
    assert!(err.to_string().contains("villages"));
}

#[tokio::test]
async fn test_invalid_config_is_rejected_before_querying() {
    let connector = ScriptedConnector::new();
    let dir = tempfile::tempdir().unwrap();
    let config = cities().with_max_retries(0);

    let err = exporter(&connector)
        .export(&config, &IncrementalFetchingState::empty(), dir.path())
        .await
        .unwrap_err();

    assert!(err.is_user_error());
    assert!(err.to_string().starts_with("[main.cities]: "));
    assert!(connector.executed_queries().is_empty());
}

/// Adapter that writes a file but cannot report the watermark
struct BlindAdapter;

#[async_trait]
impl ExportAdapter for BlindAdapter {
    fn name(&self) -> &str {
        "blind"
    }

    async fn export(
        &self,
        _config: &ExportConfig,
        _state: &IncrementalFetchingState,
        csv_path: &Path,
    ) -> AdapterResult {
        fs::write(csv_path, fixtures::city_csv_lines().join("\n") + "\n").unwrap();
        Ok(ExportResult {
            rows_count: 6,
            csv_path: PathBuf::from(csv_path),
            inc_fetching_col_max_value: None,
        })
    }
}

#[tokio::test]
async fn test_last_row_query_supplies_missing_watermark() {
    let connector = ScriptedConnector::new().then_rows(
        QueryMetadata::new(vec![ColumnMeta::new("max", "INTEGER")]),
        vec![Row::new(vec![Value::Int64(6)])],
    );
    let connection = Arc::new(Connection::new(Arc::new(connector.clone())));
    let exporter = Exporter::new(
        connection,
        Arc::new(DefaultQueryFactory),
        Box::new(BlindAdapter),
        Arc::new(StaticMetadata {
            tables: vec![cities_table()],
        }),
    );
    let dir = tempfile::tempdir().unwrap();

    let output = exporter
        .export(&incremental_cities(), &IncrementalFetchingState::empty(), dir.path())
        .await
        .unwrap();

    assert_eq!(output.result.inc_fetching_col_max_value, Some(Watermark::from("6")));
    assert_eq!(output.state, IncrementalFetchingState::new("6"));
    assert_eq!(
        connector.executed_queries(),
        vec!["SELECT MAX(\"id\") FROM (SELECT \"id\" FROM \"main\".\"cities\" ORDER BY \"id\") AS \"inc_fetching\""]
    );
}

#[tokio::test]
async fn test_adapter_failure_is_wrapped_with_config_name() {
    let connector = ScriptedConnector::new()
        .then_fail(ExtractorError::Query("no such table: cities".into()));
    let dir = tempfile::tempdir().unwrap();
    let config = cities().with_name("Cities");

    let err = exporter(&connector)
        .export(&config, &IncrementalFetchingState::empty(), dir.path())
        .await
        .unwrap_err();

    assert!(matches!(err, ExtractorError::User(_)));
    assert_eq!(err.to_string(), "[Cities]: no such table: cities");
}

#[tokio::test]
async fn test_connection_check_uses_liveness_query() {
    let connector = ScriptedConnector::new();

    exporter(&connector).test_connection(3).await.unwrap();

    assert_eq!(connector.executed_queries(), vec!["SELECT 1"]);
}
