//! Polymorphic ownership: which entity a mutation belongs to, and which
//! business object caused it.

use serde::{Deserialize, Serialize};

use crate::error::{StockError, StockResult};
use crate::id::EntityKey;

/// Owner tag stored on every mutation row: entity kind + entity key.
///
/// The ledger never needs the concrete entity type; it only compares kinds
/// and keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StockOwner {
    pub kind: String,
    pub id: EntityKey,
}

impl StockOwner {
    pub fn new(kind: impl Into<String>, id: impl Into<EntityKey>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

impl core::fmt::Display for StockOwner {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Pointer to the business object that caused a mutation (e.g. an order line).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
    pub kind: String,
    pub id: EntityKey,
}

impl Reference {
    pub fn new(kind: impl Into<String>, id: impl Into<EntityKey>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Resolve a reference from any referenceable object.
    ///
    /// Fails with [`StockError::InvalidReference`] when the object has a blank
    /// kind or no key yet (e.g. it was never persisted).
    pub fn resolve<R>(source: &R) -> StockResult<Self>
    where
        R: Referenceable + ?Sized,
    {
        let kind = source.reference_kind();
        if kind.trim().is_empty() {
            return Err(StockError::invalid_reference("reference kind is blank"));
        }

        let id = source
            .reference_key()
            .ok_or_else(|| StockError::invalid_reference(format!("{kind} has no key")))?;
        if id.is_blank() {
            return Err(StockError::invalid_reference(format!("{kind} has a blank key")));
        }

        Ok(Self {
            kind: kind.to_string(),
            id,
        })
    }
}

/// An entity whose inventory level is tracked by the ledger.
pub trait Stockable {
    /// Polymorphic kind tag (e.g. `"product"`).
    fn stockable_kind(&self) -> &str;

    /// Stable key of this entity within its kind.
    fn stockable_key(&self) -> EntityKey;

    /// Whether this entity's stock is split per warehouse.
    ///
    /// When `false`, mutations never carry a warehouse and warehouse read
    /// filters are ignored.
    fn warehouse_enabled(&self) -> bool {
        false
    }

    fn stock_owner(&self) -> StockOwner {
        StockOwner::new(self.stockable_kind(), self.stockable_key())
    }
}

/// A business object a mutation may point back at.
pub trait Referenceable {
    fn reference_kind(&self) -> &str;

    /// `None` when the object has no resolvable identifier.
    fn reference_key(&self) -> Option<EntityKey>;
}

impl Referenceable for Reference {
    fn reference_kind(&self) -> &str {
        &self.kind
    }

    fn reference_key(&self) -> Option<EntityKey> {
        Some(self.id.clone())
    }
}
