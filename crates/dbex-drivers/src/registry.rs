//! Closed set of supported data sources and the exporter factory

use std::str::FromStr;
use std::sync::Arc;

use dbex_connection::Connection;
use dbex_core::metadata::MetadataProvider;
use dbex_core::{Connector, ExtractorError, Result};
use dbex_export::{DefaultQueryFactory, Exporter, FallbackExportAdapter, QueryExportAdapter};

use crate::{DatabaseConfig, RetryConfig};

/// Database a [`DatabaseConfig`] points at
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataSourceKind {
    Sqlite,
    Postgres,
}

impl DataSourceKind {
    pub fn name(&self) -> &'static str {
        match self {
            DataSourceKind::Sqlite => "sqlite",
            DataSourceKind::Postgres => "postgresql",
        }
    }
}

impl FromStr for DataSourceKind {
    type Err = ExtractorError;

    fn from_str(driver: &str) -> Result<Self> {
        match driver.trim().to_ascii_lowercase().as_str() {
            "sqlite" | "sqlite3" => Ok(DataSourceKind::Sqlite),
            "postgres" | "postgresql" | "pgsql" => Ok(DataSourceKind::Postgres),
            _ => {
                tracing::warn!(driver = %driver, "driver not found");
                Err(ExtractorError::Application(format!(
                    "Driver \"{}\" not found.",
                    driver
                )))
            }
        }
    }
}

/// Wire the connector, query factory, adapter chain and metadata provider of
/// the configured data source into an [`Exporter`].
pub fn create_exporter(db: &DatabaseConfig, retry: &RetryConfig) -> Result<Exporter> {
    let kind: DataSourceKind = db.driver.parse()?;
    tracing::info!(driver = kind.name(), "creating exporter");

    let connector = connector(kind, db)?;
    let connection = Arc::new(Connection::new(connector).with_backoff(retry.backoff()));
    let metadata = metadata_provider(kind, connection.clone())?;
    let query_factory = Arc::new(DefaultQueryFactory::new());
    let adapter = FallbackExportAdapter::new(vec![Box::new(QueryExportAdapter::new(
        connection.clone(),
        query_factory.clone(),
    ))]);

    Ok(Exporter::new(
        connection,
        query_factory,
        Box::new(adapter),
        metadata,
    ))
}

fn connector(kind: DataSourceKind, db: &DatabaseConfig) -> Result<Arc<dyn Connector>> {
    match kind {
        #[cfg(feature = "sqlite")]
        DataSourceKind::Sqlite => Ok(Arc::new(crate::sqlite::SqliteConnector::new(
            db.database.clone(),
        ))),
        #[cfg(feature = "postgres")]
        DataSourceKind::Postgres => {
            let host = db.host.as_deref().unwrap_or("localhost");
            let port = db.port.unwrap_or(crate::postgres::DEFAULT_PORT);
            let mut connector = crate::postgres::PostgresConnector::new(host, port, &db.database);
            if let Some(user) = &db.user {
                connector = connector.with_user(user);
            }
            if let Some(password) = &db.password {
                connector = connector.with_password(password);
            }
            if let Some(timeout) = db.connect_timeout() {
                connector = connector.with_connect_timeout(timeout);
            }
            Ok(Arc::new(connector))
        }
        #[allow(unreachable_patterns)]
        _ => Err(not_compiled(kind)),
    }
}

fn metadata_provider(
    kind: DataSourceKind,
    connection: Arc<Connection>,
) -> Result<Arc<dyn MetadataProvider>> {
    match kind {
        #[cfg(feature = "sqlite")]
        DataSourceKind::Sqlite => Ok(Arc::new(crate::sqlite::SqliteMetadataProvider::new(
            connection,
        ))),
        #[cfg(feature = "postgres")]
        DataSourceKind::Postgres => Ok(Arc::new(
            crate::postgres::PostgresMetadataProvider::new(connection),
        )),
        #[allow(unreachable_patterns)]
        _ => Err(not_compiled(kind)),
    }
}

#[allow(dead_code)]
fn not_compiled(kind: DataSourceKind) -> ExtractorError {
    ExtractorError::Application(format!(
        "Driver \"{}\" is not enabled in this build.",
        kind.name()
    ))
}
