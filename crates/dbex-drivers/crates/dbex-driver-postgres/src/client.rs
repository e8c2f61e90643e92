//! PostgreSQL session with a streaming row cursor

use std::pin::Pin;

use async_trait::async_trait;
use dbex_core::{
    ColumnMeta, ExtractorError, NativeClient, QueryMetadata, QueryResult, Result, Row, RowCursor,
};
use futures::StreamExt;
use tokio_postgres::{Client, RowStream};

use crate::value::pg_to_value;

/// One open PostgreSQL session.
///
/// Queries are prepared first so the result metadata is known before any
/// row arrives, then read through [`Client::query_raw`], which streams rows
/// instead of buffering the whole result.
pub struct PostgresClient {
    client: Client,
}

impl PostgresClient {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl NativeClient for PostgresClient {
    #[tracing::instrument(skip(self, sql), fields(sql_preview = %sql.chars().take(100).collect::<String>()))]
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let statement = self.client.prepare(sql).await.map_err(map_pg_error)?;
        let metadata = QueryMetadata::new(
            statement
                .columns()
                .iter()
                .map(|column| ColumnMeta::new(column.name(), column.type_().name()))
                .collect(),
        );

        let stream = self
            .client
            .query_raw(&statement, std::iter::empty::<&str>())
            .await
            .map_err(map_pg_error)?;

        Ok(QueryResult::new(
            metadata,
            Box::new(PostgresCursor {
                stream: Some(Box::pin(stream)),
            }),
        ))
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        self.client.execute(sql, &[]).await.map_err(map_pg_error)
    }

    async fn close(&self) -> Result<()> {
        // the session ends once the last handle to the client is dropped
        tracing::debug!("closing PostgreSQL session");
        Ok(())
    }
}

struct PostgresCursor {
    stream: Option<Pin<Box<RowStream>>>,
}

#[async_trait]
impl RowCursor for PostgresCursor {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };
        match stream.next().await {
            Some(Ok(row)) => {
                let values = (0..row.len())
                    .map(|idx| pg_to_value(&row, idx))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Some(Row::new(values)))
            }
            Some(Err(e)) => Err(map_pg_error(e)),
            None => Ok(None),
        }
    }

    async fn close(&mut self) -> Result<()> {
        // dropping the stream discards the rest of the result
        self.stream = None;
        Ok(())
    }
}

/// Classify a tokio-postgres error by its SQLSTATE.
pub(crate) fn map_pg_error(err: tokio_postgres::Error) -> ExtractorError {
    let message = format_pg_error(&err);
    match err.code() {
        Some(code) => classify_sqlstate(code.code(), message),
        // no SQLSTATE: socket, TLS or protocol failure
        None => ExtractorError::Connection(message),
    }
}

pub(crate) fn classify_sqlstate(code: &str, message: String) -> ExtractorError {
    match code {
        // serialization failure, deadlock, lock not available, statement cancelled
        "40001" | "40P01" | "55P03" | "57014" => ExtractorError::Driver(message),
        // admin shutdown, crash shutdown, cannot connect now
        "57P01" | "57P02" | "57P03" => ExtractorError::Connection(message),
        c if c.starts_with("08") => ExtractorError::Connection(message),
        c if c.starts_with("53") => ExtractorError::Driver(message),
        // bad credentials or unknown database
        c if c.starts_with("28") || c == "3D000" => ExtractorError::User(message),
        _ => ExtractorError::Query(message),
    }
}

fn format_pg_error(err: &tokio_postgres::Error) -> String {
    let Some(db_error) = err.as_db_error() else {
        return err.to_string();
    };

    let mut message = db_error.message().to_string();
    if let Some(detail) = db_error.detail().filter(|d| !d.trim().is_empty()) {
        message.push_str(&format!(" (detail: {})", detail));
    }
    if let Some(hint) = db_error.hint().filter(|h| !h.trim().is_empty()) {
        message.push_str(&format!(" (hint: {})", hint));
    }
    format!("{} (code: {})", message, db_error.code().code())
}
