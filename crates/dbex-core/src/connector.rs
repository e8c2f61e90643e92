//! Native client seam: the per-database pieces a [`Connector`] supplies

use crate::{QueryResult, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// How a dialect caps the number of returned rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LimitSyntax {
    /// `... LIMIT n` (SQLite, PostgreSQL, MySQL)
    #[default]
    Limit,
    /// `SELECT TOP n ...` (SQL Server)
    Top,
    /// `... FETCH FIRST n ROWS ONLY` (Oracle, DB2)
    FetchFirst,
}

/// Creates native client handles and knows the dialect's quoting rules.
///
/// A connector is cheap to keep around; [`Connector::connect`] is the only
/// call that talks to the database. Returning `ExtractorError::Application`
/// from `connect` marks the failure as fatal (missing driver); every other
/// error is treated as a connect failure the retry layer may absorb.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Driver name (e.g., "sqlite", "postgresql")
    fn name(&self) -> &str;

    /// Open a new native handle
    async fn connect(&self) -> Result<Arc<dyn NativeClient>>;

    /// Quote a string literal
    fn quote(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    /// Quote an identifier (column, table, schema name)
    fn quote_identifier(&self, identifier: &str) -> String {
        format!("\"{}\"", identifier.replace('"', "\"\""))
    }

    /// Cheapest statement the database answers, used for liveness probing
    fn liveness_query(&self) -> &str {
        "SELECT 1"
    }

    fn limit_syntax(&self) -> LimitSyntax {
        LimitSyntax::Limit
    }
}

/// One open database session
#[async_trait]
pub trait NativeClient: Send + Sync {
    /// Execute a query that returns rows, streaming them back
    async fn query(&self, sql: &str) -> Result<QueryResult>;

    /// Execute a command, returning the number of affected rows
    async fn execute(&self, sql: &str) -> Result<u64>;

    /// Close the session
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct AnsiConnector;

    #[async_trait]
    impl Connector for AnsiConnector {
        fn name(&self) -> &str {
            "ansi"
        }

        async fn connect(&self) -> Result<Arc<dyn NativeClient>> {
            Err(crate::ExtractorError::Application("no driver".into()))
        }
    }

    #[test]
    fn test_default_quoting() {
        let connector = AnsiConnector;
        assert_eq!(connector.quote("O'Brien"), "'O''Brien'");
        assert_eq!(connector.quote_identifier("my \"col\""), "\"my \"\"col\"\"\"");
        assert_eq!(connector.liveness_query(), "SELECT 1");
        assert_eq!(connector.limit_syntax(), LimitSyntax::Limit);
    }
}
