#![cfg(feature = "sqlite")]

//! End-to-end runs over a SQLite file through the run-directory layout

use std::path::Path;

use dbex_drivers::{ExtractorError, Watermark, runner};
use dbex_test_support::fixtures;
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

/// Run directory with a cities database and the given export parameters
fn setup_run(parameters: serde_json::Value) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("cities.sqlite");
    fixtures::create_cities_database(&db_path).unwrap();

    let mut parameters = parameters;
    parameters["db"] = json!({"driver": "sqlite", "database": db_path.to_str().unwrap()});
    parameters["retry"] = json!({"initialIntervalMs": 0});
    write_json(&dir.path().join("config.json"), &json!({ "parameters": parameters }));
    dir
}

fn write_json(path: &Path, value: &serde_json::Value) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, serde_json::to_string(value).unwrap()).unwrap();
}

fn read_lines(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path)
        .unwrap()
        .lines()
        .map(str::to_string)
        .collect()
}

fn read_state(dir: &Path) -> serde_json::Value {
    let raw = std::fs::read_to_string(dir.join("out").join("state.json")).unwrap();
    serde_json::from_str(&raw).unwrap()
}

#[tokio::test]
async fn test_table_export_to_csv() {
    let dir = setup_run(json!({
        "table": {"schema": "main", "tableName": "cities"},
        "columns": ["id", "name", "population"],
        "outputTable": "in.c-main.cities"
    }));

    let output = runner::run(dir.path()).await.unwrap();

    let csv_path = dir.path().join("out").join("tables").join("in.c-main.cities.csv");
    assert_eq!(output.result.rows_count, 6);
    assert_eq!(output.result.csv_path, csv_path);
    assert_eq!(read_lines(&csv_path), fixtures::city_csv_lines());
    assert_eq!(read_state(dir.path()), json!({}));
}

#[tokio::test]
async fn test_query_export_has_header() {
    let dir = setup_run(json!({
        "query": "SELECT name FROM cities WHERE population > 300000 ORDER BY id;",
        "outputTable": "big-cities"
    }));

    runner::run(dir.path()).await.unwrap();

    let lines = read_lines(&dir.path().join("out").join("tables").join("big-cities.csv"));
    assert_eq!(lines, vec!["\"name\"", "\"Praha\"", "\"Brno\"", "\"Ostrava\""]);
}

#[tokio::test]
async fn test_incremental_fetching_across_runs() {
    let dir = setup_run(json!({
        "table": {"schema": "main", "tableName": "cities"},
        "columns": ["id", "name", "population"],
        "incrementalFetchingColumn": "id",
        "outputTable": "cities"
    }));

    let first = runner::run(dir.path()).await.unwrap();
    assert_eq!(first.result.rows_count, 6);
    assert_eq!(first.state.last_fetched_row(), Some(&Watermark::from("6")));
    assert_eq!(read_state(dir.path()), json!({"lastFetchedRow": "6"}));

    {
        let conn = rusqlite::Connection::open(dir.path().join("cities.sqlite")).unwrap();
        conn.execute(
            "INSERT INTO cities (id, name, population) VALUES (7, 'Ceske Budejovice', 94229)",
            [],
        )
        .unwrap();
    }
    write_json(
        &dir.path().join("in").join("state.json"),
        &read_state(dir.path()),
    );

    let second = runner::run(dir.path()).await.unwrap();
    assert_eq!(second.result.rows_count, 2);
    assert_eq!(second.state.last_fetched_row(), Some(&Watermark::from("7")));
    let lines = read_lines(&dir.path().join("out").join("tables").join("cities.csv"));
    assert_eq!(
        lines,
        vec![
            "\"6\",\"Liberec\",\"97770\"",
            "\"7\",\"Ceske Budejovice\",\"94229\"",
        ]
    );
}

#[tokio::test]
async fn test_numeric_state_from_previous_run() {
    let dir = setup_run(json!({
        "table": {"schema": "main", "tableName": "cities"},
        "columns": ["id", "name", "population"],
        "incrementalFetchingColumn": "id",
        "incrementalFetchingLimit": 2,
        "outputTable": "cities"
    }));
    write_json(
        &dir.path().join("in").join("state.json"),
        &json!({"lastFetchedRow": 3}),
    );

    let output = runner::run(dir.path()).await.unwrap();

    assert_eq!(output.result.rows_count, 2);
    assert_eq!(read_state(dir.path()), json!({"lastFetchedRow": "4"}));
}

#[tokio::test]
async fn test_unknown_driver_fails() {
    let dir = setup_run(json!({
        "table": {"schema": "main", "tableName": "cities"},
        "outputTable": "cities"
    }));
    write_json(
        &dir.path().join("config.json"),
        &json!({"parameters": {
            "db": {"driver": "oracle", "database": "orcl"},
            "table": {"schema": "main", "tableName": "cities"},
            "outputTable": "cities"
        }}),
    );

    let err = runner::run(dir.path()).await.unwrap_err();
    let err = err.downcast_ref::<ExtractorError>().unwrap();
    assert!(matches!(err, ExtractorError::Application(_)));
    assert_eq!(err.to_string(), "Driver \"oracle\" not found.");
}

#[tokio::test]
async fn test_missing_database_file_is_user_error() {
    let dir = tempfile::tempdir().unwrap();
    write_json(
        &dir.path().join("config.json"),
        &json!({"parameters": {
            "db": {"driver": "sqlite", "database": dir.path().join("nope.sqlite").to_str().unwrap()},
            "retry": {"initialIntervalMs": 0},
            "table": {"schema": "main", "tableName": "cities"},
            "incrementalFetchingColumn": "id",
            "outputTable": "cities",
            "retries": 2
        }}),
    );

    let err = runner::run(dir.path()).await.unwrap_err();
    let err = err.downcast_ref::<ExtractorError>().unwrap();
    assert!(err.is_user_error());
    assert!(err.to_string().starts_with("[main.cities]: "));
    assert!(err.to_string().contains("does not exist"));
    assert!(!dir.path().join("out").join("state.json").exists());
}

#[tokio::test]
async fn test_invalid_export_config() {
    let dir = setup_run(json!({
        "table": {"schema": "main", "tableName": "cities"},
        "outputTable": "cities",
        "retries": 0
    }));

    let err = runner::run(dir.path()).await.unwrap_err();
    let err = err.downcast_ref::<ExtractorError>().unwrap();
    assert!(matches!(err, ExtractorError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_incremental_fetching_without_schema() {
    let dir = setup_run(json!({
        "table": {"schema": "", "tableName": "cities"},
        "columns": ["id", "name", "population"],
        "incrementalFetchingColumn": "id",
        "outputTable": "cities"
    }));
    write_json(
        &dir.path().join("in").join("state.json"),
        &json!({"lastFetchedRow": 5}),
    );

    let output = runner::run(dir.path()).await.unwrap();

    assert_eq!(output.result.rows_count, 2);
    assert_eq!(read_state(dir.path()), json!({"lastFetchedRow": "6"}));
    let lines = read_lines(&dir.path().join("out").join("tables").join("cities.csv"));
    assert_eq!(lines, fixtures::city_csv_lines()[4..].to_vec());
}
