//! SQLite native client for DBEX

mod client;
mod connector;
mod metadata;

pub use client::SqliteClient;
pub use connector::SqliteConnector;
pub use metadata::SqliteMetadataProvider;
