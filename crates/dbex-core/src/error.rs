//! Error types for DBEX

use thiserror::Error;

/// Core error type for extraction operations
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// Condition the user can fix: bad credentials, malformed config,
    /// exhausted retries.
    #[error("{0}")]
    User(String),

    /// Environment or programming defect. Never retried.
    #[error("{0}")]
    Application(String),

    /// Raised only by the liveness check.
    #[error("Dead connection: {0}")]
    DeadConnection(String),

    /// An export adapter declined the config before doing any work.
    #[error("{0}")]
    AdapterSkipped(String),

    /// Transient connection failure (refused, reset, timed out)
    #[error("{0}")]
    Connection(String),

    /// Transient driver failure (busy, locked, serialization)
    #[error("{0}")]
    Driver(String),

    /// The database rejected the statement itself
    #[error("{0}")]
    Query(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Property \"{property}\" is not set in \"{object}\".")]
    PropertyNotSet {
        property: &'static str,
        object: &'static str,
    },

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    InvalidState(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ExtractorError {
    /// Failures worth another attempt after reconnecting.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection(_) | Self::Driver(_))
    }

    /// Failures the user can act on, as opposed to defects of the environment.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::User(_)
                | Self::Query(_)
                | Self::InvalidConfig(_)
                | Self::NotFound(_)
                | Self::DeadConnection(_)
                | Self::Connection(_)
                | Self::Driver(_)
                | Self::PropertyNotSet { .. }
        )
    }

    pub fn is_application_error(&self) -> bool {
        !self.is_user_error() && !matches!(self, Self::AdapterSkipped(_))
    }

    /// Wrap the message with diagnostic context, keeping the error class.
    pub fn with_context(self, context: &str) -> Self {
        let message = format!("[{}]: {}", context, self);
        if self.is_user_error() {
            Self::User(message)
        } else if matches!(self, Self::AdapterSkipped(_)) {
            Self::AdapterSkipped(message)
        } else {
            Self::Application(message)
        }
    }
}

/// Result type alias for extraction operations
pub type Result<T> = std::result::Result<T, ExtractorError>;
