//! Table and column discovery from the SQLite catalog

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use dbex_connection::Connection;
use dbex_core::metadata::{MetadataProvider, TableBuilder, TableCollection};
use dbex_core::{DEFAULT_MAX_RETRIES, ExtractorError, Result, Row, TableId};

/// SQLite has a single schema per attached database file
const SCHEMA: &str = "main";

/// Reads `sqlite_master` and the table pragmas through a [`Connection`], so
/// catalog queries get the same retry treatment as exports.
pub struct SqliteMetadataProvider {
    connection: Arc<Connection>,
    max_retries: u32,
}

impl SqliteMetadataProvider {
    pub fn new(connection: Arc<Connection>) -> Self {
        Self {
            connection,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    async fn fetch(&self, sql: &str) -> Result<Vec<Row>> {
        self.connection.fetch_all(sql, self.max_retries).await
    }

    async fn load_columns(&self, builder: &mut TableBuilder, table: &str) -> Result<()> {
        let table_literal = self.connection.quote(table);
        let columns = self
            .fetch(&format!(
                "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info({})",
                table_literal
            ))
            .await?;
        let foreign_keys = self
            .fetch(&format!(
                "SELECT \"from\", \"table\", \"to\" FROM pragma_foreign_key_list({})",
                table_literal
            ))
            .await?;
        let unique = self.unique_columns(&table_literal).await?;
        let pk_count = columns
            .iter()
            .filter(|row| int(row, 5).is_ok_and(|pk| pk > 0))
            .count();

        for row in &columns {
            let position = int(row, 0)? + 1;
            let name = text(row, 1)?;
            let declared = optional_text(row, 2).unwrap_or_default();
            let (data_type, length) = split_declared_type(&declared);
            let primary_key = int(row, 5)? > 0;

            let column = builder.add_column()?;
            column
                .set_name(name.clone())
                .set_type(data_type)
                .set_ordinal_position(position as u32)
                .set_nullable(int(row, 3)? == 0 && !primary_key)
                .set_primary_key(primary_key)
                .set_unique_key(unique.contains(&name))
                // a lone INTEGER PRIMARY KEY aliases the rowid
                .set_auto_increment(
                    primary_key && pk_count == 1 && data_type.eq_ignore_ascii_case("INTEGER"),
                )
                .set_default(optional_text(row, 4));
            if let Some(length) = length {
                column.set_length(length);
            }
            if primary_key {
                column.add_constraint("PRIMARY KEY");
            }
            if unique.contains(&name) {
                column.add_constraint("UNIQUE");
            }

            let foreign_key = foreign_keys
                .iter()
                .find(|fk| optional_text(fk, 0).as_deref() == Some(name.as_str()));
            if let Some(fk) = foreign_key {
                // a reference without a column points at the parent's primary key
                if let Some(ref_column) = optional_text(fk, 2) {
                    column
                        .add_foreign_key()
                        .set_ref_schema(SCHEMA)
                        .set_ref_table(text(fk, 1)?)
                        .set_ref_column(ref_column);
                    column.add_constraint("FOREIGN KEY");
                }
            }
        }
        Ok(())
    }

    /// Columns covered on their own by a unique index
    async fn unique_columns(&self, table_literal: &str) -> Result<HashSet<String>> {
        let indexes = self
            .fetch(&format!(
                "SELECT name FROM pragma_index_list({}) WHERE \"unique\" = 1",
                table_literal
            ))
            .await?;

        let mut unique = HashSet::new();
        for index in &indexes {
            let index_name = text(index, 0)?;
            let columns = self
                .fetch(&format!(
                    "SELECT name FROM pragma_index_info({})",
                    self.connection.quote(&index_name)
                ))
                .await?;
            if let [column] = columns.as_slice() {
                if let Some(name) = optional_text(column, 0) {
                    unique.insert(name);
                }
            }
        }
        Ok(unique)
    }
}

#[async_trait]
impl MetadataProvider for SqliteMetadataProvider {
    #[tracing::instrument(skip(self, whitelist))]
    async fn list_tables(
        &self,
        whitelist: Option<&[TableId]>,
        load_columns: bool,
    ) -> Result<TableCollection> {
        let rows = self
            .fetch(
                "SELECT name, type FROM sqlite_master \
                 WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
                 ORDER BY name",
            )
            .await?;

        let mut tables = Vec::with_capacity(rows.len());
        for row in &rows {
            let name = text(row, 0)?;
            if let Some(whitelist) = whitelist {
                if !whitelist.iter().any(|id| is_listed(id, &name)) {
                    continue;
                }
            }

            let mut builder = TableBuilder::new();
            builder
                .set_name(name.clone())
                .set_schema(SCHEMA)
                .set_type(text(row, 1)?);
            if load_columns {
                self.load_columns(&mut builder, &name).await?;
            } else {
                builder.set_columns_not_expected()?;
            }
            tables.push(builder.build()?);
        }

        tracing::debug!(tables = tables.len(), "SQLite tables listed");
        Ok(TableCollection::new(tables))
    }
}

fn is_listed(id: &TableId, name: &str) -> bool {
    id.name.eq_ignore_ascii_case(name)
        && (id.schema.is_empty() || id.schema.eq_ignore_ascii_case(SCHEMA))
}

/// `VARCHAR(20)` -> (`VARCHAR`, `20`)
fn split_declared_type(declared: &str) -> (&str, Option<&str>) {
    match declared.split_once('(') {
        Some((base, rest)) => (
            base.trim(),
            rest.strip_suffix(')').map(str::trim).filter(|l| !l.is_empty()),
        ),
        None => (declared.trim(), None),
    }
}

fn optional_text(row: &Row, idx: usize) -> Option<String> {
    row.get(idx)
        .filter(|value| !value.is_null())
        .map(|value| value.to_string())
}

fn text(row: &Row, idx: usize) -> Result<String> {
    optional_text(row, idx).ok_or_else(|| {
        ExtractorError::Application(format!("Missing value in column {} of a catalog row.", idx))
    })
}

fn int(row: &Row, idx: usize) -> Result<i64> {
    row.get(idx).and_then(|value| value.as_i64()).ok_or_else(|| {
        ExtractorError::Application(format!("Expected an integer in column {} of a catalog row.", idx))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_declared_type() {
        assert_eq!(split_declared_type("VARCHAR(20)"), ("VARCHAR", Some("20")));
        assert_eq!(split_declared_type("DECIMAL(10, 2)"), ("DECIMAL", Some("10, 2")));
        assert_eq!(split_declared_type("INTEGER"), ("INTEGER", None));
        assert_eq!(split_declared_type(""), ("", None));
    }

    #[test]
    fn test_whitelist_matches_main_or_empty_schema() {
        assert!(is_listed(&TableId::new("main", "Cities"), "cities"));
        assert!(is_listed(&TableId::new("", "cities"), "cities"));
        assert!(!is_listed(&TableId::new("temp", "cities"), "cities"));
        assert!(!is_listed(&TableId::new("main", "towns"), "cities"));
    }
}
