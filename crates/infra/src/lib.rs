//! Infrastructure layer: durable mutation storage and its configuration.

pub mod config;
pub mod mutation_store;

pub use config::{ConfigError, PostgresConfig, TableName};
pub use mutation_store::PostgresMutationStore;
