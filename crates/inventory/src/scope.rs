//! Bulk stock classification.
//!
//! A [`StockScope`] is a predicate over one owner's aggregated history. Scopes
//! compose through [`StockQuery`] (logical AND) and are evaluated by the store:
//! in memory against an [`OwnerHistory`], in SQL as `EXISTS ... HAVING` /
//! `NOT EXISTS` clauses with the same two-branch shape.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use stockledger_core::WarehouseId;

use crate::mutation::StockMutation;

/// One classification predicate.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StockScope {
    /// Has mutations and their sum is positive.
    InStock,
    /// Sum is zero or negative, or there is no history at all.
    OutOfStock,
    /// Has a mutation in the warehouse, or there is no history at all.
    Warehouse(WarehouseId),
    /// Has mutations in the warehouse and their sum is positive.
    InStockAt(WarehouseId),
    /// Sum within the warehouse is zero or negative, or nothing was ever
    /// booked there.
    OutOfStockAt(WarehouseId),
}

/// Count + sum of a set of mutations.
///
/// `total` is widened to `i128`: at most `u64::MAX` amounts of magnitude at
/// most `2^63` cannot overflow it, so classification never fails.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub struct Tally {
    pub count: u64,
    pub total: i128,
}

impl Tally {
    fn record(&mut self, amount: i64) {
        self.count += 1;
        self.total += i128::from(amount);
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

/// Aggregated history of one owner, across all time.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OwnerHistory {
    pub overall: Tally,
    pub by_warehouse: BTreeMap<WarehouseId, Tally>,
}

impl OwnerHistory {
    pub fn from_mutations<'a>(mutations: impl IntoIterator<Item = &'a StockMutation>) -> Self {
        let mut history = Self::default();
        for m in mutations {
            history.record(m);
        }
        history
    }

    pub fn record(&mut self, mutation: &StockMutation) {
        self.overall.record(mutation.amount);
        if let Some(warehouse) = mutation.warehouse_id {
            self.by_warehouse
                .entry(warehouse)
                .or_default()
                .record(mutation.amount);
        }
    }

    pub fn warehouse(&self, warehouse: WarehouseId) -> Tally {
        self.by_warehouse.get(&warehouse).copied().unwrap_or_default()
    }
}

impl StockScope {
    pub fn matches(&self, history: &OwnerHistory) -> bool {
        let all = history.overall;
        match *self {
            StockScope::InStock => !all.is_empty() && all.total > 0,
            StockScope::OutOfStock => (!all.is_empty() && all.total <= 0) || all.is_empty(),
            StockScope::Warehouse(w) => !history.warehouse(w).is_empty() || all.is_empty(),
            StockScope::InStockAt(w) => {
                let at = history.warehouse(w);
                !at.is_empty() && at.total > 0
            }
            StockScope::OutOfStockAt(w) => {
                let at = history.warehouse(w);
                (!at.is_empty() && at.total <= 0) || at.is_empty()
            }
        }
    }
}

/// A conjunction of scopes.
///
/// `InStock` / `OutOfStock` aggregate across every warehouse, so
/// `warehouse(w).out_of_stock()` is not a per-warehouse classification; use
/// `out_of_stock_at(w)` for that.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockQuery {
    scopes: Vec<StockScope>,
}

impl StockQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn scope(mut self, scope: StockScope) -> Self {
        self.scopes.push(scope);
        self
    }

    pub fn in_stock(self) -> Self {
        self.scope(StockScope::InStock)
    }

    pub fn out_of_stock(self) -> Self {
        self.scope(StockScope::OutOfStock)
    }

    pub fn warehouse(self, warehouse: impl Into<WarehouseId>) -> Self {
        self.scope(StockScope::Warehouse(warehouse.into()))
    }

    pub fn in_stock_at(self, warehouse: impl Into<WarehouseId>) -> Self {
        self.scope(StockScope::InStockAt(warehouse.into()))
    }

    pub fn out_of_stock_at(self, warehouse: impl Into<WarehouseId>) -> Self {
        self.scope(StockScope::OutOfStockAt(warehouse.into()))
    }

    pub fn scopes(&self) -> &[StockScope] {
        &self.scopes
    }

    /// An empty query matches everything.
    pub fn matches(&self, history: &OwnerHistory) -> bool {
        self.scopes.iter().all(|s| s.matches(history))
    }
}
