//! Native client with scripted outcomes

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use dbex_core::{
    ColumnMeta, Connector, ExtractorError, LimitSyntax, MemoryCursor, NativeClient, QueryMetadata,
    QueryResult, Result, Row, RowCursor, Value,
};
use parking_lot::Mutex;

enum QueryOutcome {
    Rows(QueryMetadata, Vec<Row>),
    Fail(ExtractorError),
    /// Yields the rows, then fails the next fetch
    FailAfter(QueryMetadata, Vec<Row>, ExtractorError),
}

struct ScriptState {
    connect_outcomes: Mutex<VecDeque<ExtractorError>>,
    query_outcomes: Mutex<VecDeque<QueryOutcome>>,
    default_result: Mutex<(QueryMetadata, Vec<Row>)>,
    limit_syntax: Mutex<LimitSyntax>,
    queries: Mutex<Vec<String>>,
    connects: AtomicU32,
    cursor_closes: AtomicU32,
}

/// Connector whose outcomes are consumed in order, one per call.
///
/// Connect calls succeed unless a failure was queued with
/// [`ScriptedConnector::fail_connect`]. Queries consume the queued outcomes;
/// once the queue is empty every query returns the default result (a single
/// row `1`). Clones share the same script and counters.
#[derive(Clone)]
pub struct ScriptedConnector {
    state: Arc<ScriptState>,
}

impl ScriptedConnector {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ScriptState {
                connect_outcomes: Mutex::new(VecDeque::new()),
                query_outcomes: Mutex::new(VecDeque::new()),
                default_result: Mutex::new((
                    QueryMetadata::new(vec![ColumnMeta::new("1", "INTEGER")]),
                    vec![Row::new(vec![Value::Int64(1)])],
                )),
                limit_syntax: Mutex::new(LimitSyntax::Limit),
                queries: Mutex::new(Vec::new()),
                connects: AtomicU32::new(0),
                cursor_closes: AtomicU32::new(0),
            }),
        }
    }

    /// Fail the next connect attempt
    pub fn fail_connect(self, error: ExtractorError) -> Self {
        self.state.connect_outcomes.lock().push_back(error);
        self
    }

    /// Answer the next query with these rows
    pub fn then_rows(self, metadata: QueryMetadata, rows: Vec<Row>) -> Self {
        self.state
            .query_outcomes
            .lock()
            .push_back(QueryOutcome::Rows(metadata, rows));
        self
    }

    /// Fail the next query
    pub fn then_fail(self, error: ExtractorError) -> Self {
        self.state
            .query_outcomes
            .lock()
            .push_back(QueryOutcome::Fail(error));
        self
    }

    /// Answer the next query with these rows, then fail while streaming
    pub fn then_fail_after(self, metadata: QueryMetadata, rows: Vec<Row>, error: ExtractorError) -> Self {
        self.state
            .query_outcomes
            .lock()
            .push_back(QueryOutcome::FailAfter(metadata, rows, error));
        self
    }

    /// Result returned once the script is exhausted
    pub fn with_default(self, metadata: QueryMetadata, rows: Vec<Row>) -> Self {
        *self.state.default_result.lock() = (metadata, rows);
        self
    }

    pub fn with_limit_syntax(self, syntax: LimitSyntax) -> Self {
        *self.state.limit_syntax.lock() = syntax;
        self
    }

    /// Every SQL statement received, in order
    pub fn executed_queries(&self) -> Vec<String> {
        self.state.queries.lock().clone()
    }

    /// Number of successful connects
    pub fn connect_count(&self) -> u32 {
        self.state.connects.load(Ordering::SeqCst)
    }

    /// Number of cursors closed by their consumers
    pub fn closed_cursor_count(&self) -> u32 {
        self.state.cursor_closes.load(Ordering::SeqCst)
    }
}

impl Default for ScriptedConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn connect(&self) -> Result<Arc<dyn NativeClient>> {
        if let Some(error) = self.state.connect_outcomes.lock().pop_front() {
            return Err(error);
        }
        self.state.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Arc::new(ScriptedClient {
            state: Arc::clone(&self.state),
        }))
    }

    fn limit_syntax(&self) -> LimitSyntax {
        *self.state.limit_syntax.lock()
    }
}

pub struct ScriptedClient {
    state: Arc<ScriptState>,
}

impl ScriptedClient {
    fn next_outcome(&self, sql: &str) -> QueryOutcome {
        self.state.queries.lock().push(sql.to_string());
        match self.state.query_outcomes.lock().pop_front() {
            Some(outcome) => outcome,
            None => {
                let (metadata, rows) = self.state.default_result.lock().clone();
                QueryOutcome::Rows(metadata, rows)
            }
        }
    }
}

#[async_trait]
impl NativeClient for ScriptedClient {
    async fn query(&self, sql: &str) -> Result<QueryResult> {
        let (metadata, rows, error) = match self.next_outcome(sql) {
            QueryOutcome::Rows(metadata, rows) => (metadata, rows, None),
            QueryOutcome::Fail(error) => return Err(error),
            QueryOutcome::FailAfter(metadata, rows, error) => (metadata, rows, Some(error)),
        };
        let cursor = ScriptedCursor {
            rows: MemoryCursor::new(rows),
            error,
            state: Arc::clone(&self.state),
        };
        Ok(QueryResult::new(metadata, Box::new(cursor)))
    }

    async fn execute(&self, sql: &str) -> Result<u64> {
        match self.next_outcome(sql) {
            QueryOutcome::Rows(_, rows) => Ok(rows.len() as u64),
            QueryOutcome::Fail(error) | QueryOutcome::FailAfter(_, _, error) => Err(error),
        }
    }
}

struct ScriptedCursor {
    rows: MemoryCursor,
    error: Option<ExtractorError>,
    state: Arc<ScriptState>,
}

#[async_trait]
impl RowCursor for ScriptedCursor {
    async fn next_row(&mut self) -> Result<Option<Row>> {
        match self.rows.next_row().await? {
            Some(row) => Ok(Some(row)),
            None => match self.error.take() {
                Some(error) => Err(error),
                None => Ok(None),
            },
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.state.cursor_closes.fetch_add(1, Ordering::SeqCst);
        self.rows.close().await
    }
}
