//! Table and column discovery from `information_schema`

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use dbex_connection::Connection;
use dbex_core::metadata::{MetadataProvider, Table, TableBuilder, TableCollection};
use dbex_core::{DEFAULT_MAX_RETRIES, ExtractorError, Result, Row, TableId};

const TABLES_QUERY: &str = "\
SELECT t.table_schema::text, t.table_name::text, t.table_type::text, \
obj_description(format('%I.%I', t.table_schema, t.table_name)::regclass, 'pg_class') \
FROM information_schema.tables t \
WHERE t.table_schema NOT IN ('pg_catalog', 'information_schema') \
ORDER BY t.table_schema, t.table_name";

const COLUMNS_QUERY: &str = "\
SELECT c.table_schema::text, c.table_name::text, c.column_name::text, \
c.ordinal_position::int8, c.data_type::text, c.is_nullable::text, c.column_default::text, \
c.character_maximum_length::int8, c.numeric_precision::int8, c.numeric_scale::int8, \
c.is_identity::text \
FROM information_schema.columns c \
WHERE c.table_schema NOT IN ('pg_catalog', 'information_schema') \
ORDER BY c.table_schema, c.table_name, c.ordinal_position";

const KEYS_QUERY: &str = "\
SELECT kcu.table_schema::text, kcu.table_name::text, kcu.column_name::text, \
tc.constraint_type::text, tc.constraint_name::text \
FROM information_schema.table_constraints tc \
JOIN information_schema.key_column_usage kcu \
ON tc.constraint_schema = kcu.constraint_schema AND tc.constraint_name = kcu.constraint_name \
WHERE tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')";

const FOREIGN_KEYS_QUERY: &str = "\
SELECT kcu.table_schema::text, kcu.table_name::text, kcu.column_name::text, \
rc.constraint_name::text, ccu.table_schema::text, ccu.table_name::text, ccu.column_name::text \
FROM information_schema.referential_constraints rc \
JOIN information_schema.key_column_usage kcu \
ON rc.constraint_schema = kcu.constraint_schema AND rc.constraint_name = kcu.constraint_name \
JOIN information_schema.constraint_column_usage ccu \
ON rc.unique_constraint_schema = ccu.constraint_schema \
AND rc.unique_constraint_name = ccu.constraint_name";

/// `(schema, table, column)`
type ColumnKey = (String, String, String);

struct ForeignKeyRef {
    name: String,
    schema: String,
    table: String,
    column: String,
}

/// Catalog of one PostgreSQL database, read with a few bulk queries through
/// a [`Connection`].
pub struct PostgresMetadataProvider {
    connection: Arc<Connection>,
    max_retries: u32,
}

impl PostgresMetadataProvider {
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

    async fn key_columns(&self) -> Result<HashMap<ColumnKey, Vec<(String, String)>>> {
        column_constraints(&self.fetch(KEYS_QUERY).await?)
    }

    async fn foreign_keys(&self) -> Result<HashMap<ColumnKey, ForeignKeyRef>> {
        let mut foreign_keys = HashMap::new();
        for row in &self.fetch(FOREIGN_KEYS_QUERY).await? {
            foreign_keys.insert(
                column_key(row)?,
                ForeignKeyRef {
                    name: text(row, 3)?,
                    schema: text(row, 4)?,
                    table: text(row, 5)?,
                    column: text(row, 6)?,
                },
            );
        }
        Ok(foreign_keys)
    }

    async fn load_columns(
        &self,
        builders: &mut [(String, String, TableBuilder)],
    ) -> Result<()> {
        let keys = self.key_columns().await?;
        let foreign_keys = self.foreign_keys().await?;

        for row in &self.fetch(COLUMNS_QUERY).await? {
            let key = column_key(row)?;
            let Some((_, _, builder)) = builders
                .iter_mut()
                .find(|(schema, table, _)| *schema == key.0 && *table == key.1)
            else {
                continue;
            };

            let constraints = keys.get(&key).map(Vec::as_slice).unwrap_or_default();
            let primary_key = constraints.iter().any(|(kind, _)| kind == "PRIMARY KEY");
            let unique_key = constraints.iter().any(|(kind, _)| kind == "UNIQUE");
            let default = optional_text(row, 6);
            let auto_increment = optional_text(row, 10).as_deref() == Some("YES")
                || default.as_deref().is_some_and(|d| d.starts_with("nextval("));

            let column = builder.add_column()?;
            column
                .set_name(key.2.clone())
                .set_ordinal_position(int(row, 3)? as u32)
                .set_type(text(row, 4)?)
                .set_nullable(optional_text(row, 5).as_deref() == Some("YES"))
                .set_primary_key(primary_key)
                .set_unique_key(unique_key)
                .set_auto_increment(auto_increment)
                .set_default(default);
            if let Some(length) = column_length(row) {
                column.set_length(length);
            }
            for (kind, _) in constraints {
                column.add_constraint(kind.clone());
            }
            if let Some(fk) = foreign_keys.get(&key) {
                column
                    .add_foreign_key()
                    .set_name(fk.name.clone())
                    .set_ref_schema(fk.schema.clone())
                    .set_ref_table(fk.table.clone())
                    .set_ref_column(fk.column.clone());
                column.add_constraint("FOREIGN KEY");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl MetadataProvider for PostgresMetadataProvider {
    #[tracing::instrument(skip(self, whitelist))]
    async fn list_tables(
        &self,
        whitelist: Option<&[TableId]>,
        load_columns: bool,
    ) -> Result<TableCollection> {
        let mut builders = Vec::new();
        for row in &self.fetch(TABLES_QUERY).await? {
            let schema = text(row, 0)?;
            let name = text(row, 1)?;
            if let Some(whitelist) = whitelist {
                if !whitelist.iter().any(|id| is_listed(id, &schema, &name)) {
                    continue;
                }
            }

            let mut builder = TableBuilder::new();
            builder
                .set_name(name.clone())
                .set_schema(schema.clone())
                .set_type(text(row, 2)?);
            if let Some(description) = optional_text(row, 3) {
                builder.set_description(description);
            }
            if !load_columns {
                builder.set_columns_not_expected()?;
            }
            builders.push((schema, name, builder));
        }

        if load_columns && !builders.is_empty() {
            self.load_columns(&mut builders).await?;
        }

        let tables = build_tables(&mut builders)?;
        tracing::debug!(tables = tables.len(), "PostgreSQL tables listed");
        Ok(TableCollection::new(tables))
    }
}

/// Constraint types per column. A unique constraint counts only when it spans
/// a single column; constraint names are unique per schema, not per database.
fn column_constraints(rows: &[Row]) -> Result<HashMap<ColumnKey, Vec<(String, String)>>> {
    let mut sizes: HashMap<(String, String), usize> = HashMap::new();
    for row in rows {
        *sizes.entry((text(row, 0)?, text(row, 4)?)).or_default() += 1;
    }

    let mut keys: HashMap<ColumnKey, Vec<(String, String)>> = HashMap::new();
    for row in rows {
        let key = column_key(row)?;
        let constraint_type = text(row, 3)?;
        let constraint_name = text(row, 4)?;
        if constraint_type == "UNIQUE"
            && sizes.get(&(key.0.clone(), constraint_name.clone())) != Some(&1)
        {
            continue;
        }
        keys.entry(key)
            .or_default()
            .push((constraint_type, constraint_name));
    }
    Ok(keys)
}

/// Tables without any visible column are listed without columns
fn build_tables(builders: &mut [(String, String, TableBuilder)]) -> Result<Vec<Table>> {
    builders
        .iter_mut()
        .map(|(schema, name, builder)| {
            if !builder.has_columns() {
                tracing::debug!(schema = %schema, table = %name, "table has no columns");
                builder.set_columns_not_expected()?;
            }
            builder.build()
        })
        .collect()
}

/// An empty schema in the whitelist matches any schema
fn is_listed(id: &TableId, schema: &str, name: &str) -> bool {
    id.name.eq_ignore_ascii_case(name)
        && (id.schema.is_empty() || id.schema.eq_ignore_ascii_case(schema))
}

fn column_key(row: &Row) -> Result<ColumnKey> {
    Ok((text(row, 0)?, text(row, 1)?, text(row, 2)?))
}

/// Character length, or `precision[,scale]` for numeric types
fn column_length(row: &Row) -> Option<String> {
    if let Some(length) = row.get(7).and_then(|v| v.as_i64()) {
        return Some(length.to_string());
    }
    let precision = row.get(8).and_then(|v| v.as_i64())?;
    match row.get(9).and_then(|v| v.as_i64()) {
        Some(scale) if scale > 0 => Some(format!("{},{}", precision, scale)),
        _ => Some(precision.to_string()),
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
