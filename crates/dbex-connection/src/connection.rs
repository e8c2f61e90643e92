//! Connection owning one lazily created native client

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use dbex_core::{Connector, ExtractorError, LimitSyntax, NativeClient, QueryResult, Result, Row};
use tokio::sync::Mutex;

use crate::processor::{ResultProcessor, RowCollector};
use crate::retry::{BackoffStrategy, BeforeRetry, RetryExecutor};

/// A database session with retry and reconnect.
///
/// The native client is created on first use and cached. Every retried call
/// reconnects between attempts: the cached client is dropped and the
/// connector is asked for a new one. A failure of that reconnect is only
/// logged; the next attempt connects again and surfaces its own error.
///
/// Not meant for concurrent use; callers that extract in parallel need one
/// `Connection` each.
///
/// # Example
///
/// ```ignore
/// use dbex_connection::{Connection, RowCollector};
///
/// let connection = Connection::new(connector);
/// let rows = connection.query_and_process("SELECT 1", 5, &RowCollector).await?;
/// ```
pub struct Connection {
    connector: Arc<dyn Connector>,
    /// Cached native client, `None` until the first call or after a reconnect
    client: Mutex<Option<Arc<dyn NativeClient>>>,
    backoff: BackoffStrategy,
    reconnects: AtomicU32,
}

impl Connection {
    pub fn new(connector: Arc<dyn Connector>) -> Self {
        Self {
            connector,
            client: Mutex::new(None),
            backoff: BackoffStrategy::default(),
            reconnects: AtomicU32::new(0),
        }
    }

    /// Set the pause strategy between retried attempts
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn connector_name(&self) -> &str {
        self.connector.name()
    }

    pub fn limit_syntax(&self) -> LimitSyntax {
        self.connector.limit_syntax()
    }

    /// Number of reconnects performed between retried attempts
    pub fn reconnect_count(&self) -> u32 {
        self.reconnects.load(Ordering::SeqCst)
    }

    pub fn quote(&self, value: &str) -> String {
        self.connector.quote(value)
    }

    pub fn quote_identifier(&self, identifier: &str) -> String {
        self.connector.quote_identifier(identifier)
    }

    /// Run a query, retrying transient failures.
    ///
    /// The caller owns the returned result and must close it.
    pub async fn query(&self, sql: &str, max_retries: u32) -> Result<QueryResult> {
        self.executor(max_retries)
            .call(&Reconnect { connection: self }, move || async move {
                let client = self.client().await?;
                client.query(sql).await
            })
            .await
    }

    /// Run a query and hand the open result to `processor`.
    ///
    /// Query and processing form one retried unit. The result is closed
    /// before returning, also when processing fails; a processing error takes
    /// precedence over a close error.
    pub async fn query_and_process<P: ResultProcessor>(
        &self,
        sql: &str,
        max_retries: u32,
        processor: &P,
    ) -> Result<P::Output> {
        self.executor(max_retries)
            .call(&Reconnect { connection: self }, move || async move {
                let client = self.client().await?;
                let mut result = client.query(sql).await?;
                let outcome = processor.process(&mut result).await;
                let closed = result.close().await;
                match (outcome, closed) {
                    (Ok(output), Ok(())) => Ok(output),
                    (Ok(_), Err(err)) | (Err(err), _) => Err(err),
                }
            })
            .await
    }

    /// Run a statement that returns no rows, retrying transient failures
    pub async fn execute(&self, sql: &str, max_retries: u32) -> Result<u64> {
        self.executor(max_retries)
            .call(&Reconnect { connection: self }, move || async move {
                let client = self.client().await?;
                client.execute(sql).await
            })
            .await
    }

    /// Fetch every row of a small result
    pub async fn fetch_all(&self, sql: &str, max_retries: u32) -> Result<Vec<Row>> {
        self.query_and_process(sql, max_retries, &RowCollector).await
    }

    /// Issue the liveness query through the retry path
    pub async fn test_connection(&self, max_retries: u32) -> Result<()> {
        self.fetch_all(self.connector.liveness_query(), max_retries)
            .await
            .map(|_| ())
    }

    /// Check the connection once, without retry or reconnect.
    ///
    /// Any failure is reported as [`ExtractorError::DeadConnection`].
    pub async fn is_alive(&self) -> Result<()> {
        let ping = async {
            let client = self.client().await?;
            let mut result = client.query(self.connector.liveness_query()).await?;
            result.close().await
        };
        ping.await.map_err(|err| {
            tracing::warn!(connector = %self.connector.name(), error = %err, "liveness check failed");
            ExtractorError::DeadConnection(err.to_string())
        })
    }

    /// Close the native client, if one is open
    pub async fn close(&self) -> Result<()> {
        let client = self.client.lock().await.take();
        match client {
            Some(client) => client.close().await,
            None => Ok(()),
        }
    }

    fn executor(&self, max_retries: u32) -> RetryExecutor {
        RetryExecutor::new(max_retries).with_backoff(self.backoff.clone())
    }

    async fn client(&self) -> Result<Arc<dyn NativeClient>> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref() {
            return Ok(Arc::clone(client));
        }

        let client = self.connector.connect().await?;
        tracing::debug!(connector = %self.connector.name(), "connected");
        *guard = Some(Arc::clone(&client));
        Ok(client)
    }

    async fn reconnect(&self, attempt: u32) {
        self.reconnects.fetch_add(1, Ordering::SeqCst);
        tracing::info!("Reconnecting before retry [{}x]", attempt);

        let mut guard = self.client.lock().await;
        if let Some(old) = guard.take() {
            let _ = old.close().await;
        }

        match self.connector.connect().await {
            Ok(client) => *guard = Some(client),
            Err(err) => {
                tracing::debug!(connector = %self.connector.name(), error = %err, "reconnect failed");
            }
        }
    }
}

/// Retry hook forcing a new native client before the next attempt
struct Reconnect<'a> {
    connection: &'a Connection,
}

#[async_trait]
impl<'a> BeforeRetry for Reconnect<'a> {
    async fn before_retry(&self, attempt: u32) {
        self.connection.reconnect(attempt).await;
    }
}
