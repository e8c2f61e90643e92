//! Consumers of an open query result

use async_trait::async_trait;
use dbex_core::{QueryResult, Result, Row};

/// Consumes an open [`QueryResult`] inside [`crate::Connection::query_and_process`].
///
/// The processor may be invoked once per attempt; it must not assume a
/// previous invocation ran to completion.
#[async_trait]
pub trait ResultProcessor: Send + Sync {
    type Output: Send;

    async fn process(&self, result: &mut QueryResult) -> Result<Self::Output>;
}

/// Materializes every row. Meant for small results such as catalog queries.
#[derive(Debug, Clone, Copy, Default)]
pub struct RowCollector;

#[async_trait]
impl ResultProcessor for RowCollector {
    type Output = Vec<Row>;

    async fn process(&self, result: &mut QueryResult) -> Result<Vec<Row>> {
        result.fetch_all().await
    }
}
