//! Connecting to PostgreSQL

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dbex_core::{Connector, NativeClient, Result};
use tokio_postgres::{Config, NoTls};

use crate::PostgresClient;
use crate::client::map_pg_error;

pub const DEFAULT_PORT: u16 = 5432;

/// Connector for one PostgreSQL database.
///
/// Each [`Connector::connect`] opens a new session and spawns the task
/// driving its socket; the task ends when the client is dropped.
#[derive(Debug, Clone)]
pub struct PostgresConnector {
    config: Config,
}

impl PostgresConnector {
    pub fn new(host: &str, port: u16, database: &str) -> Self {
        let mut config = Config::new();
        config
            .host(host)
            .port(port)
            .dbname(database)
            .application_name("dbex");
        Self { config }
    }

    pub fn from_config(config: Config) -> Self {
        Self { config }
    }

    pub fn with_user(mut self, user: &str) -> Self {
        self.config.user(user);
        self
    }

    pub fn with_password(mut self, password: &str) -> Self {
        self.config.password(password);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout(timeout);
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}

#[async_trait]
impl Connector for PostgresConnector {
    fn name(&self) -> &str {
        "postgresql"
    }

    #[tracing::instrument(skip(self), fields(dbname = self.config.get_dbname()))]
    async fn connect(&self) -> Result<Arc<dyn NativeClient>> {
        let (client, connection) = self.config.connect(NoTls).await.map_err(|e| {
            tracing::debug!(error = %e, "PostgreSQL connect failed");
            map_pg_error(e)
        })?;

        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::error!(error = %e, "PostgreSQL connection error");
            }
        });

        tracing::debug!("PostgreSQL connection established");
        Ok(Arc::new(PostgresClient::new(client)))
    }
}
