//! Storage boundary for the mutation ledger.
//!
//! The ledger only needs five primitives from its host store: insert a row,
//! sum a filtered column, delete an owner's rows, list an owner's rows and
//! classify a set of owners. Everything else (query DSLs, model lifecycle)
//! stays on the host side.

use std::sync::Arc;

use stockledger_core::{EntityKey, PersistenceError, StockOwner};

use crate::mutation::{MutationFilter, NewStockMutation, StockMutation};
use crate::scope::StockScope;

/// Append-only mutation storage.
///
/// Implementations must:
/// - insert each mutation atomically and assign its `MutationId`
/// - sum over a consistent snapshot, returning `0` (never "nothing") for an
///   empty selection
/// - make `delete_owner` idempotent
/// - evaluate [`StockScope`]s with the explicit "aggregate OR no history"
///   semantics, not by relying on NULL handling
pub trait MutationStore: Send + Sync {
    fn insert(&self, mutation: NewStockMutation) -> Result<StockMutation, PersistenceError>;

    fn sum(&self, filter: &MutationFilter) -> Result<i64, PersistenceError>;

    /// Delete every mutation of `owner`, across all warehouses.
    ///
    /// Returns the number of rows removed.
    fn delete_owner(&self, owner: &StockOwner) -> Result<u64, PersistenceError>;

    /// All mutations of `owner`, oldest first (ties in insertion order).
    fn list_owner(&self, owner: &StockOwner) -> Result<Vec<StockMutation>, PersistenceError>;

    /// The subset of `candidates` (owners of kind `kind`) satisfying every
    /// scope, in candidate order.
    fn filter_owners(
        &self,
        kind: &str,
        candidates: &[EntityKey],
        scopes: &[StockScope],
    ) -> Result<Vec<EntityKey>, PersistenceError>;
}

impl<S> MutationStore for Arc<S>
where
    S: MutationStore + ?Sized,
{
    fn insert(&self, mutation: NewStockMutation) -> Result<StockMutation, PersistenceError> {
        (**self).insert(mutation)
    }

    fn sum(&self, filter: &MutationFilter) -> Result<i64, PersistenceError> {
        (**self).sum(filter)
    }

    fn delete_owner(&self, owner: &StockOwner) -> Result<u64, PersistenceError> {
        (**self).delete_owner(owner)
    }

    fn list_owner(&self, owner: &StockOwner) -> Result<Vec<StockMutation>, PersistenceError> {
        (**self).list_owner(owner)
    }

    fn filter_owners(
        &self,
        kind: &str,
        candidates: &[EntityKey],
        scopes: &[StockScope],
    ) -> Result<Vec<EntityKey>, PersistenceError> {
        (**self).filter_owners(kind, candidates, scopes)
    }
}
