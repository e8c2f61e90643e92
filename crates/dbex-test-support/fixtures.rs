//! Sample data shared by the test suites

use std::path::Path;

use anyhow::{Context, Result};
use dbex_core::{ColumnMeta, QueryMetadata, Row, Value};

/// `(id, name, population)` of the six cities
pub const CITIES: [(i64, &str, i64); 6] = [
    (1, "Praha", 1_165_581),
    (2, "Brno", 369_559),
    (3, "Ostrava", 313_088),
    (4, "Plzen", 164_180),
    (5, "Olomouc", 100_378),
    (6, "Liberec", 97_770),
];

/// Projection of the cities table
pub fn city_metadata() -> QueryMetadata {
    QueryMetadata::new(vec![
        ColumnMeta::new("id", "INTEGER"),
        ColumnMeta::new("name", "TEXT"),
        ColumnMeta::new("population", "INTEGER"),
    ])
}

pub fn city_rows() -> Vec<Row> {
    CITIES
        .iter()
        .map(|(id, name, population)| {
            Row::new(vec![
                Value::Int64(*id),
                Value::String(name.to_string()),
                Value::Int64(*population),
            ])
        })
        .collect()
}

/// Rows of the cities with `id >= from_id`
pub fn city_rows_from(from_id: i64) -> Vec<Row> {
    city_rows()
        .into_iter()
        .filter(|row| row.get(0).and_then(|v| v.as_i64()).unwrap_or_default() >= from_id)
        .collect()
}

/// CSV lines the cities export to, without header
pub fn city_csv_lines() -> Vec<String> {
    CITIES
        .iter()
        .map(|(id, name, population)| format!("\"{}\",\"{}\",\"{}\"", id, name, population))
        .collect()
}

/// Create a SQLite database with `cities` and a `countries` table referenced
/// by `cities.country_id`.
pub fn create_cities_database(path: &Path) -> Result<()> {
    let conn = rusqlite::Connection::open(path)
        .with_context(|| format!("failed to create {}", path.display()))?;

    conn.execute_batch(
        "CREATE TABLE countries (
            id INTEGER PRIMARY KEY,
            code TEXT NOT NULL UNIQUE
        );
        INSERT INTO countries (id, code) VALUES (1, 'CZ');
        CREATE TABLE cities (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            population INTEGER,
            country_id INTEGER DEFAULT 1 REFERENCES countries(id)
        );",
    )
    .context("failed to create schema")?;

    for (id, name, population) in CITIES {
        conn.execute(
            "INSERT INTO cities (id, name, population) VALUES (?1, ?2, ?3)",
            rusqlite::params![id, name, population],
        )
        .with_context(|| format!("failed to insert {}", name))?;
    }

    Ok(())
}
