//! SQLite session with a streaming row cursor

use std::sync::Arc;

use async_trait::async_trait;
use dbex_core::{
    ColumnMeta, ExtractorError, NativeClient, QueryMetadata, QueryResult, Result, Row, RowCursor,
    Value,
};
use parking_lot::Mutex;
use rusqlite::ErrorCode;
use rusqlite::types::ValueRef;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

/// Rows buffered between the blocking reader and the consumer
const ROW_BUFFER: usize = 256;

/// One open SQLite database.
///
/// rusqlite is synchronous, so every statement runs on the blocking pool.
/// Queries stream: a blocking task steps the statement and hands rows to the
/// cursor through a bounded channel, holding the connection until the cursor
/// is closed or drained.
pub struct SqliteClient {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteClient {
    pub fn new(conn: rusqlite::Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }
}

#[async_trait]
impl NativeClient for SqliteClient {
    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let (metadata_tx, metadata_rx) = oneshot::channel();
        let (row_tx, row_rx) = mpsc::channel(ROW_BUFFER);

        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let task = tokio::task::spawn_blocking(move || {
            stream_rows(&conn, &sql, metadata_tx, row_tx);
        });

        let metadata = match metadata_rx.await {
            Ok(metadata) => metadata?,
            // the reader ended without reporting, surface its panic
            Err(_) => return Err(join_error(task.await.err())),
        };

        Ok(QueryResult::new(
            metadata,
            Box::new(SqliteCursor {
                rows: row_rx,
                task: Some(task),
            }),
        ))
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        let conn = Arc::clone(&self.conn);
        let sql = sql.to_string();
        let affected = tokio::task::spawn_blocking(move || conn.lock().execute(&sql, []))
            .await
            .map_err(|e| join_error(Some(e)))?
            .map_err(map_sqlite_error)?;
        Ok(affected as u64)
    }

    async fn close(&self) -> Result<()> {
        tracing::debug!("closing SQLite database");
        Ok(())
    }
}

fn stream_rows(
    conn: &Mutex<rusqlite::Connection>,
    sql: &str,
    metadata_tx: oneshot::Sender<Result<QueryMetadata>>,
    row_tx: mpsc::Sender<Result<Row>>,
) {
    let conn = conn.lock();
    let mut stmt = match conn.prepare(sql) {
        Ok(stmt) => stmt,
        Err(e) => {
            let _ = metadata_tx.send(Err(map_sqlite_error(e)));
            return;
        }
    };

    let columns: Vec<ColumnMeta> = stmt
        .columns()
        .iter()
        .map(|column| ColumnMeta::new(column.name(), column.decl_type().unwrap_or("")))
        .collect();
    let column_count = columns.len();
    if metadata_tx.send(Ok(QueryMetadata::new(columns))).is_err() {
        return;
    }

    let mut rows = match stmt.query([]) {
        Ok(rows) => rows,
        Err(e) => {
            let _ = row_tx.blocking_send(Err(map_sqlite_error(e)));
            return;
        }
    };

    loop {
        let item = match rows.next() {
            Ok(Some(row)) => (0..column_count)
                .map(|idx| sqlite_to_value(row, idx))
                .collect::<Result<Vec<_>>>()
                .map(Row::new),
            Ok(None) => return,
            Err(e) => Err(map_sqlite_error(e)),
        };
        let failed = item.is_err();
        // a send error means the cursor was closed early
        if row_tx.blocking_send(item).is_err() || failed {
            return;
        }
    }
}

struct SqliteCursor {
    rows: mpsc::Receiver<Result<Row>>,
    task: Option<JoinHandle<()>>,
}

#[async_trait]
impl RowCursor for SqliteCursor {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        match self.rows.recv().await {
            Some(row) => row.map(Some),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.rows.close();
        match self.task.take() {
            Some(task) => task.await.map_err(|e| join_error(Some(e))),
            None => Ok(()),
        }
    }
}

fn sqlite_to_value(row: &rusqlite::Row<'_>, idx: usize) -> Result<Value> {
    let value = match row.get_ref(idx).map_err(map_sqlite_error)? {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Int64(i),
        ValueRef::Real(f) => Value::Float64(f),
        // TEXT is not guaranteed to be valid UTF-8; keep the raw bytes then
        ValueRef::Text(text) => match std::str::from_utf8(text) {
            Ok(s) => Value::String(s.to_string()),
            Err(_) => Value::Bytes(text.to_vec()),
        },
        ValueRef::Blob(blob) => Value::Bytes(blob.to_vec()),
    };
    Ok(value)
}

/// Classify a rusqlite error: lock contention is transient, an unusable file
/// is a connection problem and everything else is about the statement.
pub(crate) fn map_sqlite_error(err: rusqlite::Error) -> ExtractorError {
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
            ExtractorError::Driver(err.to_string())
        }
        Some(
            ErrorCode::CannotOpen
            | ErrorCode::NotADatabase
            | ErrorCode::DatabaseCorrupt
            | ErrorCode::SystemIoFailure,
        ) => ExtractorError::Connection(err.to_string()),
        _ => ExtractorError::Query(err.to_string()),
    }
}

fn join_error(err: Option<tokio::task::JoinError>) -> ExtractorError {
    match err {
        Some(err) => ExtractorError::Application(format!("SQLite reader task failed: {}", err)),
        None => ExtractorError::Application("SQLite reader task ended without a result".into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> SqliteClient {
        let conn = rusqlite::Connection::open_in_memory().unwrap();
        conn.execute_batch(
            "CREATE TABLE t (id INTEGER PRIMARY KEY, name VARCHAR(20), data BLOB);
             INSERT INTO t VALUES (1, 'one', NULL), (2, 'two', x'00ff'), (3, NULL, NULL);",
        )
        .unwrap();
        SqliteClient::new(conn)
    }

    #[tokio::test]
    async fn test_query_streams_rows_with_declared_types() {
        let client = client();
        let mut result = client.query("SELECT id, name, data FROM t ORDER BY id").await.unwrap();

        let columns = result.metadata().columns().to_vec();
        assert_eq!(columns[0], ColumnMeta::new("id", "INTEGER"));
        assert_eq!(columns[1], ColumnMeta::new("name", "VARCHAR(20)"));

        let rows = result.fetch_all().await.unwrap();
        result.close().await.unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].values, vec![Value::Int64(1), Value::from("one"), Value::Null]);
        assert_eq!(rows[1].values[2], Value::Bytes(vec![0x00, 0xff]));
        assert_eq!(rows[2].values[1], Value::Null);
    }

    #[tokio::test]
    async fn test_closing_early_releases_connection() {
        let client = client();
        let mut result = client.query("SELECT id FROM t").await.unwrap();
        assert!(result.next_row().await.unwrap().is_some());
        result.close().await.unwrap();

        // the connection lock is free again
        let affected = client.execute("UPDATE t SET name = 'x' WHERE id = 3").await.unwrap();
        assert_eq!(affected, 1);
    }

    #[tokio::test]
    async fn test_syntax_error_is_query_error() {
        let client = client();
        let err = client.query("SELEC id FROM t").await.unwrap_err();
        assert!(matches!(err, ExtractorError::Query(_)));

        let err = client.query("SELECT id FROM missing").await.unwrap_err();
        assert!(matches!(err, ExtractorError::Query(_)));
        assert!(err.to_string().contains("no such table"));
    }
}
