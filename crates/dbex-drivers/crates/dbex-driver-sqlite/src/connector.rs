//! Opening SQLite database files

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbex_core::{Connector, ExtractorError, NativeClient, Result};
use rusqlite::OpenFlags;

use crate::SqliteClient;

const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connector for a single SQLite database file.
///
/// The file is opened read-only; a missing file is a connect failure rather
/// than an empty new database.
#[derive(Debug, Clone)]
pub struct SqliteConnector {
    path: PathBuf,
    busy_timeout: Duration,
}

impl SqliteConnector {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout: DEFAULT_BUSY_TIMEOUT,
        }
    }

    /// How long SQLite waits on a locked database before reporting busy
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl Connector for SqliteConnector {
    fn name(&self) -> &str {
        "sqlite"
    }

    #[tracing::instrument(skip(self), fields(path = %self.path.display()))]
    async fn connect(&self) -> Result<Arc<dyn NativeClient>> {
        if !self.path.is_file() {
            return Err(ExtractorError::Connection(format!(
                "Database file \"{}\" does not exist.",
                self.path.display()
            )));
        }

        let path = self.path.clone();
        let busy_timeout = self.busy_timeout;
        let conn = tokio::task::spawn_blocking(move || {
            let flags = OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX;
            let conn = rusqlite::Connection::open_with_flags(&path, flags)?;
            conn.busy_timeout(busy_timeout)?;
            Ok::<_, rusqlite::Error>(conn)
        })
        .await
        .map_err(|e| ExtractorError::Application(format!("SQLite open task failed: {}", e)))?
        .map_err(|e| {
            ExtractorError::Connection(format!(
                "Failed to open SQLite database \"{}\": {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!("SQLite database opened");
        Ok(Arc::new(SqliteClient::new(conn)))
    }
}
