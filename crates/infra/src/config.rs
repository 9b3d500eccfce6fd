//! Configuration loading for the PostgreSQL-backed ledger.
//!
//! Settings come from the environment:
//!
//! | variable | default |
//! |---|---|
//! | `STOCK_DATABASE_URL` (falls back to `DATABASE_URL`) | required |
//! | `STOCK_MUTATIONS_TABLE` | `stock_mutations` |
//! | `STOCK_DB_MAX_CONNECTIONS` | `5` |

use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use stockledger_core::PersistenceError;

use crate::mutation_store::map_sqlx_error;

pub const DEFAULT_TABLE: &str = "stock_mutations";
pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),

    #[error("invalid {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// SQL table name for mutations, optionally schema-qualified.
///
/// Interpolated into statements, so only `[A-Za-z_][A-Za-z0-9_]*` segments
/// (at most `schema.table`) are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TableName(String);

impl TableName {
    pub fn parse(name: &str) -> Result<Self, ConfigError> {
        let invalid = |reason: &str| ConfigError::Invalid {
            key: "STOCK_MUTATIONS_TABLE",
            reason: format!("{name:?} {reason}"),
        };

        let segments: Vec<&str> = name.split('.').collect();
        if segments.len() > 2 {
            return Err(invalid("has more than one schema qualifier"));
        }

        for segment in segments {
            let mut chars = segment.chars();
            match chars.next() {
                Some(c) if c == '_' || c.is_ascii_alphabetic() => {}
                _ => return Err(invalid("must start with a letter or underscore")),
            }
            if !chars.all(|c| c == '_' || c.is_ascii_alphanumeric()) {
                return Err(invalid("may only contain letters, digits and underscores"));
            }
        }

        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Name usable inside index names (`schema.table` -> `schema_table`).
    pub(crate) fn index_prefix(&self) -> String {
        self.0.replace('.', "_")
    }
}

impl Default for TableName {
    fn default() -> Self {
        Self(DEFAULT_TABLE.to_string())
    }
}

impl core::fmt::Display for TableName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for TableName {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<TableName> for String {
    fn from(value: TableName) -> Self {
        value.0
    }
}

/// Connection settings for [`PostgresMutationStore`](crate::PostgresMutationStore).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostgresConfig {
    pub database_url: String,
    #[serde(default)]
    pub table: TableName,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_max_connections() -> u32 {
    DEFAULT_MAX_CONNECTIONS
}

impl PostgresConfig {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            table: TableName::default(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
        }
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup (tests, layered config sources).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("STOCK_DATABASE_URL")
            .or_else(|| lookup("DATABASE_URL"))
            .filter(|url| !url.trim().is_empty())
            .ok_or(ConfigError::Missing("STOCK_DATABASE_URL"))?;

        let table = match lookup("STOCK_MUTATIONS_TABLE") {
            Some(name) => TableName::parse(name.trim())?,
            None => TableName::default(),
        };

        let max_connections = match lookup("STOCK_DB_MAX_CONNECTIONS") {
            Some(raw) => match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => n,
                _ => {
                    return Err(ConfigError::Invalid {
                        key: "STOCK_DB_MAX_CONNECTIONS",
                        reason: format!("{raw:?} is not a positive integer"),
                    });
                }
            },
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url,
            table,
            max_connections,
        })
    }

    /// Open a connection pool.
    pub async fn connect(&self) -> Result<PgPool, PersistenceError> {
        PgPoolOptions::new()
            .max_connections(self.max_connections)
            .connect(&self.database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))
    }
}
