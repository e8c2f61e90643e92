//! PostgreSQL native client for DBEX

mod client;
mod connector;
mod metadata;
mod value;

pub use client::PostgresClient;
pub use connector::{DEFAULT_PORT, PostgresConnector};
pub use metadata::PostgresMetadataProvider;
