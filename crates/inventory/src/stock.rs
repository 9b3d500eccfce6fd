//! Stock facade: derived stock operations expressed purely in terms of the
//! ledger. Holds no state of its own.

use chrono::{DateTime, Utc};

use stockledger_core::{
    Clock, EntityKey, StockError, StockResult, Stockable, SystemClock, WarehouseId,
};

use crate::ledger::Ledger;
use crate::mutation::{MutationArgs, StockMutation};
use crate::scope::StockQuery;
use crate::store::MutationStore;

/// Stock operations for any [`Stockable`] entity.
#[derive(Debug, Clone)]
pub struct StockService<S, C = SystemClock> {
    ledger: Ledger<S, C>,
}

impl<S> StockService<S, SystemClock>
where
    S: MutationStore,
{
    pub fn new(store: S) -> Self {
        Self::from_ledger(Ledger::new(store))
    }
}

impl<S, C> StockService<S, C>
where
    S: MutationStore,
    C: Clock,
{
    pub fn from_ledger(ledger: Ledger<S, C>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &Ledger<S, C> {
        &self.ledger
    }

    /// Stock level at `as_of` (default: now), optionally within one warehouse.
    ///
    /// May be negative: the ledger records history, it does not enforce
    /// floors.
    pub fn current_stock<E>(
        &self,
        entity: &E,
        as_of: Option<DateTime<Utc>>,
        warehouse: Option<WarehouseId>,
    ) -> StockResult<i64>
    where
        E: Stockable + ?Sized,
    {
        self.ledger.sum(entity, as_of, warehouse)
    }

    /// Current stock across all warehouses.
    pub fn stock<E>(&self, entity: &E) -> StockResult<i64>
    where
        E: Stockable + ?Sized,
    {
        self.current_stock(entity, None, None)
    }

    /// Append `amount` as given.
    ///
    /// The sign is *not* forced positive: a negative amount decreases the
    /// stock. This differs from [`decrease`](Self::decrease), which always
    /// subtracts.
    pub fn increase<E>(
        &self,
        entity: &E,
        amount: i64,
        args: MutationArgs,
    ) -> StockResult<StockMutation>
    where
        E: Stockable + ?Sized,
    {
        self.ledger.append(entity, amount, args)
    }

    /// Append `-|amount|`, whatever sign was supplied.
    pub fn decrease<E>(
        &self,
        entity: &E,
        amount: i64,
        args: MutationArgs,
    ) -> StockResult<StockMutation>
    where
        E: Stockable + ?Sized,
    {
        self.ledger.append(entity, -amount.saturating_abs(), args)
    }

    /// Append an arbitrary signed delta.
    pub fn mutate<E>(
        &self,
        entity: &E,
        amount: i64,
        args: MutationArgs,
    ) -> StockResult<StockMutation>
    where
        E: Stockable + ?Sized,
    {
        self.ledger.append(entity, amount, args)
    }

    /// Wipe the entity's history; with `new_amount`, leave a single baseline
    /// mutation behind.
    ///
    /// Returns the baseline mutation, if one was written.
    pub fn clear<E>(
        &self,
        entity: &E,
        new_amount: Option<i64>,
        args: MutationArgs,
    ) -> StockResult<Option<StockMutation>>
    where
        E: Stockable + ?Sized,
    {
        self.ledger.delete_all(entity)?;

        match new_amount {
            Some(amount) => self.ledger.append(entity, amount, args).map(Some),
            None => Ok(None),
        }
    }

    /// Bring the stock (in `args.warehouse`, if any) to `new_amount` by
    /// appending the difference.
    ///
    /// Returns `None` without writing when the level already matches.
    ///
    /// This is a read-then-write with no isolation: if another writer appends
    /// between the read and the append, the final level drifts from
    /// `new_amount`. Callers needing an exact absolute level under concurrency
    /// must serialize writers per entity at the storage layer.
    pub fn set_absolute<E>(
        &self,
        entity: &E,
        new_amount: i64,
        args: MutationArgs,
    ) -> StockResult<Option<StockMutation>>
    where
        E: Stockable + ?Sized,
    {
        let current = self.current_stock(entity, None, args.warehouse)?;
        let delta = new_amount.checked_sub(current).ok_or_else(|| {
            StockError::amount_overflow(format!(
                "cannot move {} from {current} to {new_amount}",
                entity.stock_owner()
            ))
        })?;

        if delta == 0 {
            tracing::debug!(owner = %entity.stock_owner(), current, "stock already at target");
            return Ok(None);
        }

        self.ledger.append(entity, delta, args).map(Some)
    }

    /// True when the level is positive and covers `amount`.
    ///
    /// The level is read once, so both conditions see the same value.
    pub fn is_in_stock<E>(
        &self,
        entity: &E,
        amount: i64,
        warehouse: Option<WarehouseId>,
    ) -> StockResult<bool>
    where
        E: Stockable + ?Sized,
    {
        let level = self.current_stock(entity, None, warehouse)?;
        Ok(level > 0 && level >= amount)
    }

    pub fn is_out_of_stock<E>(
        &self,
        entity: &E,
        warehouse: Option<WarehouseId>,
    ) -> StockResult<bool>
    where
        E: Stockable + ?Sized,
    {
        Ok(self.current_stock(entity, None, warehouse)? <= 0)
    }

    pub fn warehouse_enabled<E>(&self, entity: &E) -> bool
    where
        E: Stockable + ?Sized,
    {
        entity.warehouse_enabled()
    }

    /// The entity's mutation history, oldest first.
    pub fn mutations<E>(&self, entity: &E) -> StockResult<Vec<StockMutation>>
    where
        E: Stockable + ?Sized,
    {
        self.ledger.history(entity)
    }

    /// Candidates of `kind` satisfying every scope of `query`.
    pub fn filter(
        &self,
        kind: &str,
        candidates: &[EntityKey],
        query: &StockQuery,
    ) -> StockResult<Vec<EntityKey>> {
        self.ledger.filter(kind, candidates, query)
    }

    pub fn where_in_stock(
        &self,
        kind: &str,
        candidates: &[EntityKey],
    ) -> StockResult<Vec<EntityKey>> {
        self.filter(kind, candidates, &StockQuery::new().in_stock())
    }

    /// Includes candidates that have never had a mutation.
    pub fn where_out_of_stock(
        &self,
        kind: &str,
        candidates: &[EntityKey],
    ) -> StockResult<Vec<EntityKey>> {
        self.filter(kind, candidates, &StockQuery::new().out_of_stock())
    }

    /// Includes candidates that have never had a mutation.
    pub fn where_warehouse(
        &self,
        kind: &str,
        candidates: &[EntityKey],
        warehouse: WarehouseId,
    ) -> StockResult<Vec<EntityKey>> {
        self.filter(kind, candidates, &StockQuery::new().warehouse(warehouse))
    }

    pub fn where_in_stock_at(
        &self,
        kind: &str,
        candidates: &[EntityKey],
        warehouse: WarehouseId,
    ) -> StockResult<Vec<EntityKey>> {
        self.filter(kind, candidates, &StockQuery::new().in_stock_at(warehouse))
    }

    pub fn where_out_of_stock_at(
        &self,
        kind: &str,
        candidates: &[EntityKey],
        warehouse: WarehouseId,
    ) -> StockResult<Vec<EntityKey>> {
        self.filter(kind, candidates, &StockQuery::new().out_of_stock_at(warehouse))
    }
}
