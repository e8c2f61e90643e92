use serde::Serialize;

use super::{Column, Table};
use crate::{ExtractorError, Result};

/// Columns of a table, ordered by ordinal position
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ColumnCollection {
    columns: Vec<Column>,
}

impl ColumnCollection {
    /// Columns without a position sort after the positioned ones; the sort is
    /// stable, so equal positions keep their input order.
    pub fn new(mut columns: Vec<Column>) -> Self {
        columns.sort_by_key(|column| {
            (
                column.ordinal_position().is_none(),
                column.ordinal_position(),
            )
        });
        Self { columns }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Column> {
        self.columns.iter()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.columns.iter().map(Column::name).collect()
    }

    /// Case-insensitive lookup
    pub fn get_by_name(&self, name: &str) -> Result<&Column> {
        self.columns
            .iter()
            .find(|column| column.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ExtractorError::NotFound(format!("Column \"{}\" not found.", name)))
    }

    pub fn into_vec(self) -> Vec<Column> {
        self.columns
    }
}

impl<'a> IntoIterator for &'a ColumnCollection {
    type Item = &'a Column;
    type IntoIter = std::slice::Iter<'a, Column>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

/// Tables in the order the provider listed them
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct TableCollection {
    tables: Vec<Table>,
}

impl TableCollection {
    pub fn new(tables: Vec<Table>) -> Self {
        Self { tables }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Table> {
        self.tables.iter()
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// First table with the name in any schema, case-insensitive
    pub fn get_by_name(&self, name: &str) -> Result<&Table> {
        self.tables
            .iter()
            .find(|table| table.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| ExtractorError::NotFound(format!("Table \"{}\" not found.", name)))
    }

    /// Case-insensitive lookup by name and schema; a table without a schema
    /// matches an empty schema.
    pub fn get_by_name_and_schema(&self, name: &str, schema: &str) -> Result<&Table> {
        self.tables
            .iter()
            .find(|table| {
                table.name().eq_ignore_ascii_case(name)
                    && table.schema().unwrap_or_default().eq_ignore_ascii_case(schema)
            })
            .ok_or_else(|| {
                ExtractorError::NotFound(format!(
                    "Table \"{}\".\"{}\" not found.",
                    schema, name
                ))
            })
    }

    pub fn into_vec(self) -> Vec<Table> {
        self.tables
    }
}

impl<'a> IntoIterator for &'a TableCollection {
    type Item = &'a Table;
    type IntoIter = std::slice::Iter<'a, Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.iter()
    }
}

impl IntoIterator for TableCollection {
    type Item = Table;
    type IntoIter = std::vec::IntoIter<Table>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.into_iter()
    }
}
