//! Export configuration, incremental fetching state and export results

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::{ExtractorError, Result};

/// Retries used when the config does not say otherwise
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Fully qualified table reference
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TableId {
    pub schema: String,
    #[serde(rename = "tableName")]
    pub name: String,
}

impl TableId {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }
}

impl std::fmt::Display for TableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// What an export reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportSource {
    /// Free-form query, returned verbatim by the query factory
    Query(String),
    /// Whole table, optionally restricted to explicit columns
    Table(TableId),
}

/// How the incremental column compares, resolved from its declared type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IncrementalColumnKind {
    Numeric,
    Timestamp,
    #[default]
    Text,
}

impl IncrementalColumnKind {
    /// Classify a declared database type name.
    pub fn from_declared_type(data_type: &str) -> Self {
        let normalized = data_type.trim().to_ascii_lowercase();
        let base = normalized
            .split(|c: char| c == '(' || c.is_whitespace())
            .next()
            .unwrap_or_default();

        const NUMERIC: &[&str] = &[
            "int", "integer", "tinyint", "smallint", "mediumint", "bigint", "int2", "int4",
            "int8", "serial", "bigserial", "smallserial", "decimal", "numeric", "number",
            "real", "float", "float4", "float8", "double", "money",
        ];
        const TIMESTAMP: &[&str] = &[
            "timestamp", "timestamptz", "datetime", "datetime2", "date", "smalldatetime",
            "datetimeoffset",
        ];

        if NUMERIC.contains(&base) || normalized == "double precision" {
            IncrementalColumnKind::Numeric
        } else if TIMESTAMP.contains(&base) {
            IncrementalColumnKind::Timestamp
        } else {
            IncrementalColumnKind::Text
        }
    }
}

/// Incremental fetching settings of one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncrementalFetchingConfig {
    pub column: String,
    pub limit: Option<u64>,
    pub kind: IncrementalColumnKind,
}

impl IncrementalFetchingConfig {
    pub fn new(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            limit: None,
            kind: IncrementalColumnKind::default(),
        }
    }

    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_kind(mut self, kind: IncrementalColumnKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn is_numeric(&self) -> bool {
        self.kind == IncrementalColumnKind::Numeric
    }
}

/// One export job, immutable once built
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportConfig {
    pub config_id: Option<String>,
    pub config_name: Option<String>,
    pub source: ExportSource,
    pub columns: Vec<String>,
    pub incremental_fetching: Option<IncrementalFetchingConfig>,
    pub primary_key: Vec<String>,
    pub output_table: String,
    pub max_retries: u32,
    /// Load mode requested for the destination table. Not used to build the
    /// export; callers writing the output manifest read it from here.
    pub incremental: bool,
}

impl ExportConfig {
    /// Export of a whole table
    pub fn table(table: TableId, output_table: impl Into<String>) -> Self {
        Self::with_source(ExportSource::Table(table), output_table.into())
    }

    /// Export of a custom query
    pub fn query(query: impl Into<String>, output_table: impl Into<String>) -> Self {
        Self::with_source(ExportSource::Query(query.into()), output_table.into())
    }

    fn with_source(source: ExportSource, output_table: String) -> Self {
        Self {
            config_id: None,
            config_name: None,
            source,
            columns: Vec::new(),
            incremental_fetching: None,
            primary_key: Vec::new(),
            output_table,
            max_retries: DEFAULT_MAX_RETRIES,
            incremental: false,
        }
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_incremental_fetching(mut self, config: IncrementalFetchingConfig) -> Self {
        self.incremental_fetching = Some(config);
        self
    }

    pub fn with_primary_key<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.primary_key = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.config_name = Some(name.into());
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.config_id = Some(id.into());
        self
    }

    /// Build from the generic key-value structure callers hand over.
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let raw: RawExportConfig = serde_json::from_value(value.clone())
            .map_err(|e| ExtractorError::InvalidConfig(e.to_string()))?;
        raw.try_into()
    }

    pub fn has_query(&self) -> bool {
        matches!(self.source, ExportSource::Query(_))
    }

    pub fn has_table(&self) -> bool {
        matches!(self.source, ExportSource::Table(_))
    }

    pub fn custom_query(&self) -> Option<&str> {
        match &self.source {
            ExportSource::Query(query) => Some(query),
            ExportSource::Table(_) => None,
        }
    }

    pub fn table_id(&self) -> Option<&TableId> {
        match &self.source {
            ExportSource::Table(table) => Some(table),
            ExportSource::Query(_) => None,
        }
    }

    pub fn is_incremental_fetching(&self) -> bool {
        self.incremental_fetching.is_some()
    }

    pub fn has_columns(&self) -> bool {
        !self.columns.is_empty()
    }

    /// Name used in log lines and error messages
    pub fn display_name(&self) -> String {
        if let Some(name) = &self.config_name {
            return name.clone();
        }
        match &self.source {
            ExportSource::Table(table) => table.to_string(),
            ExportSource::Query(_) => self
                .config_id
                .clone()
                .unwrap_or_else(|| self.output_table.clone()),
        }
    }

    /// Check the invariants between the fields.
    pub fn validate(&self) -> Result<()> {
        if self.output_table.trim().is_empty() {
            return Err(ExtractorError::InvalidConfig(
                "The \"outputTable\" must be configured.".into(),
            ));
        }
        if self.max_retries == 0 {
            return Err(ExtractorError::InvalidConfig(
                "The \"retries\" must be at least 1.".into(),
            ));
        }
        match &self.source {
            ExportSource::Query(query) => {
                if query.trim().is_empty() {
                    return Err(ExtractorError::InvalidConfig("The \"query\" is empty.".into()));
                }
                if self.is_incremental_fetching() {
                    return Err(ExtractorError::InvalidConfig(
                        "Incremental fetching is not supported for advanced queries.".into(),
                    ));
                }
                if self.has_columns() {
                    return Err(ExtractorError::InvalidConfig(
                        "Both \"columns\" and \"query\" cannot be configured together.".into(),
                    ));
                }
            }
            ExportSource::Table(table) => {
                if table.name.trim().is_empty() {
                    return Err(ExtractorError::InvalidConfig(
                        "The \"table.tableName\" is empty.".into(),
                    ));
                }
            }
        }
        if let Some(incremental) = &self.incremental_fetching {
            if incremental.column.trim().is_empty() {
                return Err(ExtractorError::InvalidConfig(
                    "The \"incrementalFetchingColumn\" is empty.".into(),
                ));
            }
            if incremental.limit == Some(0) {
                return Err(ExtractorError::InvalidConfig(
                    "The \"incrementalFetchingLimit\" must be greater than 0.".into(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawExportConfig {
    #[serde(default)]
    id: Option<serde_json::Value>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    query: Option<String>,
    #[serde(default)]
    table: Option<TableId>,
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    incremental_fetching_column: Option<String>,
    #[serde(default)]
    incremental_fetching_limit: Option<u64>,
    #[serde(default)]
    primary_key: Vec<String>,
    #[serde(default)]
    retries: Option<u32>,
    #[serde(default)]
    output_table: Option<String>,
    #[serde(default)]
    incremental: bool,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl TryFrom<RawExportConfig> for ExportConfig {
    type Error = ExtractorError;

    fn try_from(raw: RawExportConfig) -> Result<Self> {
        let source = match (non_empty(raw.query), raw.table) {
            (Some(_), Some(_)) => {
                return Err(ExtractorError::InvalidConfig(
                    "Both \"table\" and \"query\" cannot be configured together.".into(),
                ));
            }
            (Some(query), None) => ExportSource::Query(query),
            (None, Some(table)) => ExportSource::Table(table),
            (None, None) => {
                return Err(ExtractorError::InvalidConfig(
                    "One of \"table\" or \"query\" must be configured.".into(),
                ));
            }
        };

        let incremental_fetching = match non_empty(raw.incremental_fetching_column) {
            Some(column) => Some(IncrementalFetchingConfig {
                column,
                limit: raw.incremental_fetching_limit,
                kind: IncrementalColumnKind::default(),
            }),
            None if raw.incremental_fetching_limit.is_some() => {
                return Err(ExtractorError::InvalidConfig(
                    "The \"incrementalFetchingLimit\" requires \"incrementalFetchingColumn\"."
                        .into(),
                ));
            }
            None => None,
        };

        let config_id = raw.id.map(|id| match id {
            serde_json::Value::String(s) => s,
            other => other.to_string(),
        });

        let config = ExportConfig {
            config_id,
            config_name: non_empty(raw.name),
            source,
            columns: raw.columns,
            incremental_fetching,
            primary_key: raw.primary_key,
            output_table: raw.output_table.unwrap_or_default(),
            max_retries: raw.retries.unwrap_or(DEFAULT_MAX_RETRIES),
            incremental: raw.incremental,
        };
        config.validate()?;
        Ok(config)
    }
}

/// Opaque comparable watermark of the incremental column
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Watermark {
    Number(serde_json::Number),
    Text(String),
}

impl Watermark {
    /// Whether the value can be written into SQL without quotes
    pub fn is_numeric(&self) -> bool {
        match self {
            Watermark::Number(_) => true,
            Watermark::Text(text) => {
                let text = text.trim();
                !text.is_empty() && text.parse::<f64>().is_ok_and(f64::is_finite)
            }
        }
    }
}

impl std::fmt::Display for Watermark {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Watermark::Number(n) => write!(f, "{}", n),
            Watermark::Text(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for Watermark {
    fn from(value: &str) -> Self {
        Watermark::Text(value.to_string())
    }
}

impl From<String> for Watermark {
    fn from(value: String) -> Self {
        Watermark::Text(value)
    }
}

impl From<i64> for Watermark {
    fn from(value: i64) -> Self {
        Watermark::Number(value.into())
    }
}

/// Persisted incremental fetching state, `{"lastFetchedRow": <scalar>}`.
///
/// Owned by the caller; every export receives it by reference and hands back
/// a new value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncrementalFetchingState {
    #[serde(
        rename = "lastFetchedRow",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    last_fetched_row: Option<Watermark>,
}

impl IncrementalFetchingState {
    /// State of a first run
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn new(last_fetched_row: impl Into<Watermark>) -> Self {
        Self {
            last_fetched_row: Some(last_fetched_row.into()),
        }
    }

    pub fn last_fetched_row(&self) -> Option<&Watermark> {
        self.last_fetched_row.as_ref()
    }

    /// State to persist after an export; never regresses to absent.
    pub fn advance(&self, result: &ExportResult) -> Self {
        match &result.inc_fetching_col_max_value {
            Some(value) => Self {
                last_fetched_row: Some(value.clone()),
            },
            None => self.clone(),
        }
    }
}

/// Outcome of one successful export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportResult {
    pub rows_count: u64,
    pub csv_path: PathBuf,
    pub inc_fetching_col_max_value: Option<Watermark>,
}
