//! Durable `MutationStore` implementations.

pub mod postgres;
mod scope_sql;

pub use postgres::PostgresMutationStore;

use stockledger_core::PersistenceError;

/// Map SQLx errors to `PersistenceError`.
///
/// | SQLx error | SQLSTATE | PersistenceError |
/// |---|---|---|
/// | Database | class `23` (integrity constraint) | `Constraint` |
/// | Database | anything else | `Backend` |
/// | PoolClosed / PoolTimedOut / Io / Tls | n/a | `Unavailable` |
/// | other | n/a | `Backend` |
pub(crate) fn map_sqlx_error(operation: &str, err: sqlx::Error) -> PersistenceError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code() {
                Some(code) if code.starts_with("23") => PersistenceError::Constraint(msg),
                _ => PersistenceError::Backend(msg),
            }
        }
        sqlx::Error::PoolClosed => {
            PersistenceError::unavailable(format!("connection pool closed in {operation}"))
        }
        sqlx::Error::PoolTimedOut => {
            PersistenceError::unavailable(format!("connection pool timed out in {operation}"))
        }
        sqlx::Error::Io(e) => {
            PersistenceError::unavailable(format!("io error in {operation}: {e}"))
        }
        sqlx::Error::Tls(e) => {
            PersistenceError::unavailable(format!("tls error in {operation}: {e}"))
        }
        _ => PersistenceError::backend(format!("sqlx error in {operation}: {err}")),
    }
}
