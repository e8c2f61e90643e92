//! Core types for DBEX

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use std::borrow::Cow;
use std::collections::VecDeque;

use crate::Result;

/// A database value as read from a native client
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// NULL value
    Null,
    /// Boolean
    Bool(bool),
    /// 64-bit signed integer
    Int64(i64),
    /// 64-bit floating point
    Float64(f64),
    /// Decimal/Numeric (stored as string for precision)
    Decimal(String),
    /// UTF-8 string
    String(String),
    /// Raw bytes, including text the database handed out in a non UTF-8 form
    Bytes(Vec<u8>),
    /// Date (year, month, day)
    Date(NaiveDate),
    /// Time (hour, minute, second, nanosecond)
    Time(NaiveTime),
    /// DateTime without timezone
    DateTime(NaiveDateTime),
    /// DateTime with timezone (UTC)
    DateTimeUtc(DateTime<Utc>),
    /// JSON value
    Json(serde_json::Value),
}

impl Value {
    /// Check if the value is NULL
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Try to get as a string
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Decimal(s) => Some(s),
            _ => None,
        }
    }

    /// Try to get as i64
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int64(v) => Some(*v),
            Value::Bool(v) => Some(*v as i64),
            Value::String(s) => s.parse::<i64>().ok(),
            _ => None,
        }
    }

    /// Try to get as bool
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(v) => Some(*v),
            Value::Int64(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Bytes written into a CSV cell. NULL becomes an empty cell; raw bytes
    /// pass through untouched so the encoding policy can decide about them.
    pub fn to_csv_bytes(&self) -> Cow<'_, [u8]> {
        match self {
            Value::Null => Cow::Borrowed(&[]),
            Value::String(s) | Value::Decimal(s) => Cow::Borrowed(s.as_bytes()),
            Value::Bytes(b) => Cow::Borrowed(b.as_slice()),
            Value::Bool(v) => Cow::Borrowed(if *v { b"1" } else { b"0" }),
            other => Cow::Owned(other.to_string().into_bytes()),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => write!(f, "NULL"),
            Value::Bool(v) => write!(f, "{}", v),
            Value::Int64(v) => write!(f, "{}", v),
            Value::Float64(v) => write!(f, "{}", v),
            Value::Decimal(v) => write!(f, "{}", v),
            Value::String(v) => write!(f, "{}", v),
            Value::Bytes(v) => write!(f, "{}", String::from_utf8_lossy(v)),
            Value::Date(v) => write!(f, "{}", v),
            Value::Time(v) => write!(f, "{}", v),
            Value::DateTime(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f")),
            Value::DateTimeUtc(v) => write!(f, "{}", v.format("%Y-%m-%d %H:%M:%S%.f%:z")),
            Value::Json(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int64(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float64(value)
    }
}

/// A row from a query result, in projection order
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    /// Column values
    pub values: Vec<Value>,
}

impl Row {
    /// Create a new row
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    /// Get a value by column index
    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Column of a result set projection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,
    /// Data type (database-specific string, empty when the driver cannot tell)
    pub data_type: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Ordered description of a result set's projection
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryMetadata {
    columns: Vec<ColumnMeta>,
}

impl QueryMetadata {
    pub fn new(columns: Vec<ColumnMeta>) -> Self {
        Self { columns }
    }

    pub fn columns(&self) -> &[ColumnMeta] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    /// Position of a column; exact match first, then case-insensitive.
    pub fn position_of(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.name == name)
            .or_else(|| {
                self.columns
                    .iter()
                    .position(|c| c.name.eq_ignore_ascii_case(name))
            })
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

/// Forward-only cursor over the rows of one executed query
#[async_trait]
pub trait RowCursor: Send {
    /// Fetch the next row, `None` once the stream is exhausted
    async fn next_row(&mut self) -> Result<Option<Row>>;

    /// Release the native cursor
    async fn close(&mut self) -> Result<()>;
}

/// A single-pass streaming query result.
///
/// The underlying cursor is closed at most once; calling [`QueryResult::close`]
/// again is a no-op. Reading after close yields no rows.
pub struct QueryResult {
    metadata: QueryMetadata,
    cursor: Box<dyn RowCursor>,
    closed: bool,
}

impl QueryResult {
    pub fn new(metadata: QueryMetadata, cursor: Box<dyn RowCursor>) -> Self {
        Self {
            metadata,
            cursor,
            closed: false,
        }
    }

    /// In-memory result, for static sources and tests
    pub fn from_rows(metadata: QueryMetadata, rows: Vec<Row>) -> Self {
        Self::new(metadata, Box::new(MemoryCursor::new(rows)))
    }

    pub fn metadata(&self) -> &QueryMetadata {
        &self.metadata
    }

    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        if self.closed {
            return Ok(None);
        }
        self.cursor.next_row().await
    }

    pub async fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.cursor.close().await
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Drain every remaining row. Only for small results such as catalog queries.
    pub async fn fetch_all(&mut self) -> Result<Vec<Row>> {
        let mut rows = Vec::new();
        while let Some(row) = self.next_row().await? {
            rows.push(row);
        }
        Ok(rows)
    }
}

impl std::fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("metadata", &self.metadata)
            .field("closed", &self.closed)
            .finish()
    }
}

impl Drop for QueryResult {
    fn drop(&mut self) {
        if !self.closed {
            tracing::warn!("query result dropped without being closed");
        }
    }
}

/// Cursor over rows already held in memory
pub struct MemoryCursor {
    rows: VecDeque<Row>,
}

impl MemoryCursor {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows: rows.into() }
    }
}

#[async_trait]
impl RowCursor for MemoryCursor {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        Ok(self.rows.pop_front())
    }

    async fn close(&mut self) -> Result<()> {
        self.rows.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_csv_bytes() {
        assert_eq!(Value::Null.to_csv_bytes().as_ref(), b"");
        assert_eq!(Value::Int64(42).to_csv_bytes().as_ref(), b"42");
        assert_eq!(Value::Bool(true).to_csv_bytes().as_ref(), b"1");
        assert_eq!(
            Value::Bytes(vec![0x61, 0xff, 0x62]).to_csv_bytes().as_ref(),
            &[0x61, 0xff, 0x62]
        );
    }

    #[test]
    fn test_position_of_prefers_exact_match() {
        let meta = QueryMetadata::new(vec![
            ColumnMeta::new("ID", "INTEGER"),
            ColumnMeta::new("id", "INTEGER"),
            ColumnMeta::new("Name", "TEXT"),
        ]);
        assert_eq!(meta.position_of("id"), Some(1));
        assert_eq!(meta.position_of("name"), Some(2));
        assert_eq!(meta.position_of("missing"), None);
    }

    #[tokio::test]
    async fn test_query_result_close_is_idempotent() {
        let meta = QueryMetadata::new(vec![ColumnMeta::new("id", "INTEGER")]);
        let mut result = QueryResult::from_rows(
            meta,
            vec![Row::new(vec![Value::Int64(1)]), Row::new(vec![Value::Int64(2)])],
        );

        assert_eq!(result.next_row().await.unwrap(), Some(Row::new(vec![Value::Int64(1)])));
        result.close().await.unwrap();
        result.close().await.unwrap();
        assert!(result.is_closed());
        assert_eq!(result.next_row().await.unwrap(), None);
    }
}
