//! SELECT construction for table and custom-query exports

use std::fmt::Write as _;

use dbex_connection::Connection;
use dbex_core::{
    ExportConfig, ExportSource, ExtractorError, IncrementalFetchingConfig,
    IncrementalFetchingState, LimitSyntax, Result, TableId,
};

/// Builds the statement an export runs
pub trait QueryFactory: Send + Sync {
    /// Statement producing the exported rows
    fn create(
        &self,
        config: &ExportConfig,
        state: &IncrementalFetchingState,
        connection: &Connection,
    ) -> Result<String>;

    /// Statement returning the single maximum of the incremental column
    /// among the rows [`QueryFactory::create`] selects
    fn create_last_row_query(
        &self,
        config: &ExportConfig,
        state: &IncrementalFetchingState,
        connection: &Connection,
    ) -> Result<String>;
}

/// ANSI-style SELECT using the connection's quoting and limit syntax.
///
/// Custom queries are returned as given, minus trailing `;` and whitespace.
/// Table exports select the configured columns (or `*`); with incremental
/// fetching they filter `>=` the last fetched value, order by the
/// incremental column and apply the fetch limit.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultQueryFactory;

impl DefaultQueryFactory {
    pub fn new() -> Self {
        Self
    }

    fn select(
        &self,
        table: &TableId,
        projection: &str,
        incremental: Option<&IncrementalFetchingConfig>,
        state: &IncrementalFetchingState,
        connection: &Connection,
    ) -> Result<String> {
        let syntax = connection.limit_syntax();
        let limit = incremental.and_then(|inc| inc.limit);

        let mut sql = String::from("SELECT ");
        if let (Some(limit), LimitSyntax::Top) = (limit, syntax) {
            let _ = write!(sql, "TOP {} ", limit);
        }
        let _ = write!(sql, "{} FROM {}", projection, quote_table(table, connection));

        let Some(incremental) = incremental else {
            return Ok(sql);
        };

        let column = connection.quote_identifier(&incremental.column);
        if let Some(value) = state.last_fetched_row() {
            let literal = if incremental.is_numeric() {
                if !value.is_numeric() {
                    return Err(ExtractorError::User(format!(
                        "Value \"{}\" of the last fetched row is not numeric, but the incremental fetching column \"{}\" is.",
                        value, incremental.column
                    )));
                }
                value.to_string().trim().to_string()
            } else {
                connection.quote(&value.to_string())
            };
            let _ = write!(sql, " WHERE {} >= {}", column, literal);
        }
        let _ = write!(sql, " ORDER BY {}", column);

        match (limit, syntax) {
            (Some(limit), LimitSyntax::Limit) => {
                let _ = write!(sql, " LIMIT {}", limit);
            }
            (Some(limit), LimitSyntax::FetchFirst) => {
                let _ = write!(sql, " FETCH FIRST {} ROWS ONLY", limit);
            }
            _ => {}
        }

        Ok(sql)
    }
}

impl QueryFactory for DefaultQueryFactory {
    fn create(
        &self,
        config: &ExportConfig,
        state: &IncrementalFetchingState,
        connection: &Connection,
    ) -> Result<String> {
        match &config.source {
            ExportSource::Query(query) => Ok(trim_query(query).to_string()),
            ExportSource::Table(table) => {
                let projection = if config.columns.is_empty() {
                    "*".to_string()
                } else {
                    config
                        .columns
                        .iter()
                        .map(|column| connection.quote_identifier(column))
                        .collect::<Vec<_>>()
                        .join(", ")
                };
                self.select(
                    table,
                    &projection,
                    config.incremental_fetching.as_ref(),
                    state,
                    connection,
                )
            }
        }
    }

    fn create_last_row_query(
        &self,
        config: &ExportConfig,
        state: &IncrementalFetchingState,
        connection: &Connection,
    ) -> Result<String> {
        let (Some(table), Some(incremental)) =
            (config.table_id(), config.incremental_fetching.as_ref())
        else {
            return Err(ExtractorError::InvalidConfig(
                "The last row query requires a table export with incremental fetching.".into(),
            ));
        };

        let column = connection.quote_identifier(&incremental.column);
        let inner = self.select(table, &column, Some(incremental), state, connection)?;
        Ok(format!(
            "SELECT MAX({}) FROM ({}) AS {}",
            column,
            inner,
            connection.quote_identifier("inc_fetching")
        ))
    }
}

fn quote_table(table: &TableId, connection: &Connection) -> String {
    if table.schema.is_empty() {
        connection.quote_identifier(&table.name)
    } else {
        format!(
            "{}.{}",
            connection.quote_identifier(&table.schema),
            connection.quote_identifier(&table.name)
        )
    }
}

fn trim_query(query: &str) -> &str {
    query.trim_end_matches(|c: char| c == ';' || c.is_whitespace())
}
