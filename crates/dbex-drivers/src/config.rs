//! Database connection settings from the `db` block of the run config

use std::time::Duration;

use dbex_connection::BackoffStrategy;
use dbex_connection::retry::DEFAULT_INITIAL_INTERVAL_MS;
use dbex_core::{ExtractorError, Result};
use serde::Deserialize;

const MAX_INTERVAL_MS: u64 = 300_000;

/// Where and how to connect
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DatabaseConfig {
    pub driver: String,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub port: Option<u16>,
    /// Database name, or the file path for SQLite
    pub database: String,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default, rename = "#password", alias = "password")]
    pub password: Option<String>,
    /// Seconds
    #[serde(default)]
    pub connect_timeout: Option<u64>,
}

impl DatabaseConfig {
    pub fn new(driver: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            driver: driver.into(),
            host: None,
            port: None,
            database: database.into(),
            user: None,
            password: None,
            connect_timeout: None,
        }
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let config: Self = serde_json::from_value(value.clone())
            .map_err(|e| ExtractorError::InvalidConfig(format!("Invalid \"db\" config: {}", e)))?;
        if config.database.trim().is_empty() {
            return Err(ExtractorError::InvalidConfig(
                "The \"db.database\" must be configured.".into(),
            ));
        }
        Ok(config)
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout.map(Duration::from_secs)
    }
}

/// Pause between retried attempts
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RetryConfig {
    #[serde(default = "default_initial_interval")]
    pub initial_interval_ms: u64,
}

fn default_initial_interval() -> u64 {
    DEFAULT_INITIAL_INTERVAL_MS
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval_ms: DEFAULT_INITIAL_INTERVAL_MS,
        }
    }
}

impl RetryConfig {
    pub fn backoff(&self) -> BackoffStrategy {
        BackoffStrategy::new(self.initial_interval_ms, MAX_INTERVAL_MS)
    }
}
