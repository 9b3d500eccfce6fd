use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockledger_core::{
    EntityKey, MutationId, Reference, Referenceable, StockOwner, StockResult, WarehouseId,
};

/// One immutable, signed quantity delta in the ledger.
///
/// There is no update path: a mutation is created by `Ledger::append` and
/// only ever removed by bulk deletion of its owner's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockMutation {
    pub id: MutationId,
    pub owner: StockOwner,
    /// Positive = increase, negative = decrease.
    pub amount: i64,
    /// Only ever set for warehouse-partitioned owners.
    pub warehouse_id: Option<WarehouseId>,
    pub description: Option<String>,
    pub reference: Option<Reference>,
    /// Whole-second precision; the as-of cutoff key.
    pub created_at: DateTime<Utc>,
}

/// A mutation ready to be inserted (not yet assigned an id).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockMutation {
    pub owner: StockOwner,
    pub amount: i64,
    pub warehouse_id: Option<WarehouseId>,
    pub description: Option<String>,
    pub reference: Option<Reference>,
    pub created_at: DateTime<Utc>,
}

impl NewStockMutation {
    /// Attach the store-assigned identifier.
    pub fn into_stored(self, id: MutationId) -> StockMutation {
        StockMutation {
            id,
            owner: self.owner,
            amount: self.amount,
            warehouse_id: self.warehouse_id,
            description: self.description,
            reference: self.reference,
            created_at: self.created_at,
        }
    }
}

/// Selection for an aggregate sum over one owner's mutations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationFilter {
    pub owner: StockOwner,
    /// Inclusive upper bound on `created_at`.
    pub created_until: DateTime<Utc>,
    pub warehouse_id: Option<WarehouseId>,
}

impl MutationFilter {
    pub fn matches(&self, mutation: &StockMutation) -> bool {
        mutation.owner == self.owner
            && mutation.created_at <= self.created_until
            && self
                .warehouse_id
                .is_none_or(|w| mutation.warehouse_id == Some(w))
    }
}

/// Unresolved reference captured by [`MutationArgs`].
///
/// Resolution is deferred to append time so an unresolvable reference fails
/// the write before anything reaches the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingReference {
    kind: String,
    key: Option<EntityKey>,
}

impl PendingReference {
    pub fn of<R>(source: &R) -> Self
    where
        R: Referenceable + ?Sized,
    {
        Self {
            kind: source.reference_kind().to_string(),
            key: source.reference_key(),
        }
    }

    pub fn resolve(&self) -> StockResult<Reference> {
        Reference::resolve(self)
    }
}

impl Referenceable for PendingReference {
    fn reference_kind(&self) -> &str {
        &self.kind
    }

    fn reference_key(&self) -> Option<EntityKey> {
        self.key.clone()
    }
}

impl From<Reference> for PendingReference {
    fn from(value: Reference) -> Self {
        Self {
            kind: value.kind,
            key: Some(value.id),
        }
    }
}

/// Optional arguments bundled with a write.
///
/// ```ignore
/// let args = MutationArgs::new()
///     .warehouse(WarehouseId::new(1))
///     .description("cycle count")
///     .reference(&order_line);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MutationArgs {
    pub warehouse: Option<WarehouseId>,
    pub description: Option<String>,
    pub reference: Option<PendingReference>,
}

impl MutationArgs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Target warehouse; ignored for owners without warehouse partitioning.
    pub fn warehouse(mut self, warehouse: impl Into<WarehouseId>) -> Self {
        self.warehouse = Some(warehouse.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn reference<R>(mut self, source: &R) -> Self
    where
        R: Referenceable + ?Sized,
    {
        self.reference = Some(PendingReference::of(source));
        self
    }
}
