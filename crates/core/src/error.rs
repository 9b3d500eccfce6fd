//! Error model shared by the ledger, its stores and the stock facade.

use thiserror::Error;

/// Result type used across the stock layer.
pub type StockResult<T> = Result<T, StockError>;

/// Storage-level failure.
///
/// Raised by `MutationStore` implementations when an insert, sum, delete or
/// filter could not be completed. The ledger never retries; these surface to
/// the caller unchanged (wrapped in [`StockError::Persistence`]).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PersistenceError {
    /// The store could not be reached (closed pool, network, missing runtime).
    #[error("storage unavailable: {0}")]
    Unavailable(String),

    /// The store rejected the write (unique / check / not-null constraint).
    #[error("constraint violation: {0}")]
    Constraint(String),

    /// Any other backend failure (decode errors, poisoned locks, ...).
    #[error("storage failure: {0}")]
    Backend(String),
}

impl PersistenceError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn constraint(msg: impl Into<String>) -> Self {
        Self::Constraint(msg.into())
    }

    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }
}

/// Stock-level error.
///
/// Semantically odd but well-formed input (zero amounts, negative levels,
/// zero-delta absolute sets) is never an error here; business rules such as
/// "stock may not go negative" belong to the calling layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StockError {
    /// The underlying store failed.
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    /// A reference object lacks a resolvable kind or identifier.
    #[error("invalid reference: {0}")]
    InvalidReference(String),

    /// An as-of timestamp could not be parsed.
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// An identifier was invalid (e.g. parse failure).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A derived quantity does not fit in an `i64`.
    #[error("amount overflow: {0}")]
    AmountOverflow(String),
}

impl StockError {
    pub fn invalid_reference(msg: impl Into<String>) -> Self {
        Self::InvalidReference(msg.into())
    }

    pub fn invalid_timestamp(msg: impl Into<String>) -> Self {
        Self::InvalidTimestamp(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn amount_overflow(msg: impl Into<String>) -> Self {
        Self::AmountOverflow(msg.into())
    }

    /// True when the failure came from the storage layer.
    pub fn is_persistence(&self) -> bool {
        matches!(self, Self::Persistence(_))
    }
}
