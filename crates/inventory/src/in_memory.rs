use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use stockledger_core::{EntityKey, MutationId, PersistenceError, StockOwner};

use crate::mutation::{MutationFilter, NewStockMutation, StockMutation};
use crate::scope::{OwnerHistory, StockScope};
use crate::store::MutationStore;

/// In-memory mutation store.
///
/// Intended for tests/dev. Not optimized for performance: sums scan the
/// owner's rows.
#[derive(Debug, Default)]
pub struct InMemoryMutationStore {
    owners: RwLock<HashMap<StockOwner, Vec<StockMutation>>>,
}

impl InMemoryMutationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows across all owners.
    ///
    /// Still counts after a writer panicked; rows are only ever pushed or
    /// removed whole, so a poisoned map is not torn.
    pub fn len(&self) -> usize {
        let owners = self.owners.read().unwrap_or_else(PoisonError::into_inner);
        owners.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned() -> PersistenceError {
    PersistenceError::backend("lock poisoned")
}

impl MutationStore for InMemoryMutationStore {
    fn insert(&self, mutation: NewStockMutation) -> Result<StockMutation, PersistenceError> {
        let mut owners = self.owners.write().map_err(|_| poisoned())?;

        let stored = mutation.into_stored(MutationId::new());
        owners
            .entry(stored.owner.clone())
            .or_default()
            .push(stored.clone());

        Ok(stored)
    }

    fn sum(&self, filter: &MutationFilter) -> Result<i64, PersistenceError> {
        let owners = self.owners.read().map_err(|_| poisoned())?;

        let Some(rows) = owners.get(&filter.owner) else {
            return Ok(0);
        };

        rows.iter()
            .filter(|m| filter.matches(m))
            .try_fold(0_i64, |total, m| total.checked_add(m.amount))
            .ok_or_else(|| PersistenceError::backend(format!("sum overflow for {}", filter.owner)))
    }

    fn delete_owner(&self, owner: &StockOwner) -> Result<u64, PersistenceError> {
        let mut owners = self.owners.write().map_err(|_| poisoned())?;
        Ok(owners.remove(owner).map(|rows| rows.len() as u64).unwrap_or(0))
    }

    fn list_owner(&self, owner: &StockOwner) -> Result<Vec<StockMutation>, PersistenceError> {
        let owners = self.owners.read().map_err(|_| poisoned())?;

        let mut rows = owners.get(owner).cloned().unwrap_or_default();
        // Stable sort keeps insertion order for equal timestamps.
        rows.sort_by_key(|m| m.created_at);
        Ok(rows)
    }

    fn filter_owners(
        &self,
        kind: &str,
        candidates: &[EntityKey],
        scopes: &[StockScope],
    ) -> Result<Vec<EntityKey>, PersistenceError> {
        let owners = self.owners.read().map_err(|_| poisoned())?;

        let matched = candidates
            .iter()
            .filter(|key| {
                let owner = StockOwner::new(kind, (*key).clone());
                let history = owners
                    .get(&owner)
                    .map(|rows| OwnerHistory::from_mutations(rows))
                    .unwrap_or_default();
                scopes.iter().all(|s| s.matches(&history))
            })
            .cloned()
            .collect();

        Ok(matched)
    }
}
