//! The mutation ledger: the single append primitive and the single sum
//! primitive every stock operation is built on.

use chrono::{DateTime, Utc};
use tracing::instrument;

use stockledger_core::{
    Clock, EntityKey, StockResult, Stockable, SystemClock, WarehouseId, to_ledger_precision,
};

use crate::mutation::{MutationArgs, MutationFilter, NewStockMutation, StockMutation};
use crate::scope::StockQuery;
use crate::store::MutationStore;

/// Append-only ledger of signed quantity changes.
///
/// The stock of an entity at `T` is the sum of its mutations with
/// `created_at <= T`, optionally restricted to one warehouse. Nothing is
/// cached: every read aggregates the store.
#[derive(Debug, Clone)]
pub struct Ledger<S, C = SystemClock> {
    store: S,
    clock: C,
}

impl<S> Ledger<S, SystemClock>
where
    S: MutationStore,
{
    pub fn new(store: S) -> Self {
        Self::with_clock(store, SystemClock)
    }
}

impl<S, C> Ledger<S, C>
where
    S: MutationStore,
    C: Clock,
{
    pub fn with_clock(store: S, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Persist one immutable mutation.
    ///
    /// The reference is resolved before anything is written. The warehouse
    /// is only attached when the entity is warehouse-partitioned. `amount`
    /// is not validated; zero is accepted.
    #[instrument(
        skip(self, entity, args),
        fields(owner = %entity.stock_owner(), warehouse = ?args.warehouse),
        err
    )]
    pub fn append<E>(
        &self,
        entity: &E,
        amount: i64,
        args: MutationArgs,
    ) -> StockResult<StockMutation>
    where
        E: Stockable + ?Sized,
    {
        let reference = args
            .reference
            .as_ref()
            .map(|pending| pending.resolve())
            .transpose()?;

        let warehouse_id = if entity.warehouse_enabled() {
            args.warehouse
        } else {
            None
        };

        let mutation = NewStockMutation {
            owner: entity.stock_owner(),
            amount,
            warehouse_id,
            description: args.description,
            reference,
            created_at: to_ledger_precision(self.clock.now()),
        };

        let stored = self.store.insert(mutation)?;
        tracing::debug!(mutation_id = %stored.id, "stock mutation appended");
        Ok(stored)
    }

    /// Sum of the entity's mutations created at or before `as_of`
    /// (default: now, read from the clock on every call).
    ///
    /// `warehouse` only narrows the sum for warehouse-partitioned entities.
    #[instrument(skip(self, entity), fields(owner = %entity.stock_owner()), err)]
    pub fn sum<E>(
        &self,
        entity: &E,
        as_of: Option<DateTime<Utc>>,
        warehouse: Option<WarehouseId>,
    ) -> StockResult<i64>
    where
        E: Stockable + ?Sized,
    {
        let created_until = to_ledger_precision(as_of.unwrap_or_else(|| self.clock.now()));
        let warehouse_id = warehouse.filter(|_| entity.warehouse_enabled());

        let filter = MutationFilter {
            owner: entity.stock_owner(),
            created_until,
            warehouse_id,
        };

        Ok(self.store.sum(&filter)?)
    }

    /// Delete every mutation of the entity, across all warehouses.
    ///
    /// Idempotent; returns how many rows were removed.
    #[instrument(skip(self, entity), fields(owner = %entity.stock_owner()), err)]
    pub fn delete_all<E>(&self, entity: &E) -> StockResult<u64>
    where
        E: Stockable + ?Sized,
    {
        let removed = self.store.delete_owner(&entity.stock_owner())?;
        tracing::debug!(removed, "stock mutations deleted");
        Ok(removed)
    }

    /// The entity's full mutation history, oldest first.
    #[instrument(skip(self, entity), fields(owner = %entity.stock_owner()), err)]
    pub fn history<E>(&self, entity: &E) -> StockResult<Vec<StockMutation>>
    where
        E: Stockable + ?Sized,
    {
        Ok(self.store.list_owner(&entity.stock_owner())?)
    }

    /// Keys of the `kind` owners among `candidates` that satisfy `query`.
    #[instrument(skip(self, candidates, query), fields(candidates = candidates.len()), err)]
    pub fn filter(
        &self,
        kind: &str,
        candidates: &[EntityKey],
        query: &StockQuery,
    ) -> StockResult<Vec<EntityKey>> {
        Ok(self.store.filter_owners(kind, candidates, query.scopes())?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use chrono::{Duration, TimeZone};
    use proptest::prelude::*;
    use stockledger_core::{
        ManualClock, PersistenceError, Reference, StockError, StockOwner,
    };

    use crate::in_memory::InMemoryMutationStore;
    use crate::scope::StockScope;

    struct Item {
        id: i64,
        partitioned: bool,
    }

    impl Stockable for Item {
        fn stockable_kind(&self) -> &str {
            "item"
        }

        fn stockable_key(&self) -> EntityKey {
            EntityKey::from(self.id)
        }

        fn warehouse_enabled(&self) -> bool {
            self.partitioned
        }
    }

    fn plain() -> Item {
        Item {
            id: 1,
            partitioned: false,
        }
    }

    fn partitioned() -> Item {
        Item {
            id: 2,
            partitioned: true,
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap()
    }

    fn ledger() -> Ledger<InMemoryMutationStore, Arc<ManualClock>> {
        Ledger::with_clock(InMemoryMutationStore::new(), Arc::new(ManualClock::new(start())))
    }

    /// Store whose every operation fails.
    struct BrokenStore;

    impl MutationStore for BrokenStore {
        fn insert(&self, _: NewStockMutation) -> Result<StockMutation, PersistenceError> {
            Err(PersistenceError::unavailable("connection refused"))
        }

        fn sum(&self, _: &MutationFilter) -> Result<i64, PersistenceError> {
            Err(PersistenceError::unavailable("connection refused"))
        }

        fn delete_owner(&self, _: &StockOwner) -> Result<u64, PersistenceError> {
            Err(PersistenceError::unavailable("connection refused"))
        }

        fn list_owner(&self, _: &StockOwner) -> Result<Vec<StockMutation>, PersistenceError> {
            Err(PersistenceError::unavailable("connection refused"))
        }

        fn filter_owners(
            &self,
            _: &str,
            _: &[EntityKey],
            _: &[StockScope],
        ) -> Result<Vec<EntityKey>, PersistenceError> {
            Err(PersistenceError::unavailable("connection refused"))
        }
    }

    #[test]
    fn append_records_all_fields() {
        let ledger = ledger();
        let args = MutationArgs::new()
            .description("initial count")
            .reference(&Reference::new("purchase_order", 77_i64));

        let m = ledger.append(&plain(), 12, args).unwrap();

        assert_eq!(m.owner, StockOwner::new("item", 1_i64));
        assert_eq!(m.amount, 12);
        assert_eq!(m.description.as_deref(), Some("initial count"));
        assert_eq!(m.reference, Some(Reference::new("purchase_order", 77_i64)));
        assert_eq!(m.created_at, start());
        assert_eq!(m.warehouse_id, None);
    }

    #[test]
    fn append_accepts_zero() {
        let ledger = ledger();
        let m = ledger.append(&plain(), 0, MutationArgs::new()).unwrap();
        assert_eq!(m.amount, 0);
        assert_eq!(ledger.history(&plain()).unwrap().len(), 1);
    }

    #[test]
    fn warehouse_is_dropped_for_unpartitioned_entities() {
        let ledger = ledger();

        let m = ledger
            .append(&plain(), 3, MutationArgs::new().warehouse(9))
            .unwrap();
        assert_eq!(m.warehouse_id, None);

        // ... and ignored when reading.
        assert_eq!(ledger.sum(&plain(), None, Some(WarehouseId::new(9))).unwrap(), 3);
        assert_eq!(ledger.sum(&plain(), None, Some(WarehouseId::new(5))).unwrap(), 3);
    }

    #[test]
    fn warehouse_sums_are_isolated_for_partitioned_entities() {
        let ledger = ledger();
        let item = partitioned();

        ledger.append(&item, 10, MutationArgs::new().warehouse(1)).unwrap();
        ledger.append(&item, 4, MutationArgs::new().warehouse(2)).unwrap();

        assert_eq!(ledger.sum(&item, None, Some(WarehouseId::new(1))).unwrap(), 10);
        assert_eq!(ledger.sum(&item, None, Some(WarehouseId::new(2))).unwrap(), 4);
        assert_eq!(ledger.sum(&item, None, Some(WarehouseId::new(3))).unwrap(), 0);
        assert_eq!(ledger.sum(&item, None, None).unwrap(), 14);
    }

    #[test]
    fn invalid_reference_fails_before_writing() {
        let ledger = ledger();
        let args = MutationArgs::new().reference(&Reference::new("order", ""));

        let err = ledger.append(&plain(), 5, args).unwrap_err();

        assert!(matches!(err, StockError::InvalidReference(_)));
        assert!(ledger.store().is_empty());
    }

    #[test]
    fn as_of_cutoff_is_inclusive() {
        let ledger = ledger();
        let item = plain();

        ledger.append(&item, 5, MutationArgs::new()).unwrap();
        ledger.clock().advance(Duration::minutes(10));
        ledger.append(&item, 7, MutationArgs::new()).unwrap();

        let boundary = start() + Duration::minutes(10);
        assert_eq!(ledger.sum(&item, Some(start() - Duration::seconds(1)), None).unwrap(), 0);
        assert_eq!(ledger.sum(&item, Some(start()), None).unwrap(), 5);
        assert_eq!(ledger.sum(&item, Some(boundary - Duration::seconds(1)), None).unwrap(), 5);
        assert_eq!(ledger.sum(&item, Some(boundary), None).unwrap(), 12);
    }

    #[test]
    fn default_cutoff_is_evaluated_per_call() {
        let ledger = ledger();
        let item = plain();

        ledger.append(&item, 5, MutationArgs::new()).unwrap();
        assert_eq!(ledger.sum(&item, None, None).unwrap(), 5);

        ledger.clock().advance(Duration::seconds(1));
        ledger.append(&item, 2, MutationArgs::new()).unwrap();
        assert_eq!(ledger.sum(&item, None, None).unwrap(), 7);
    }

    #[test]
    fn future_dated_mutations_are_excluded_from_now() {
        let ledger = ledger();
        let item = plain();

        ledger.clock().advance(Duration::hours(1));
        ledger.append(&item, 9, MutationArgs::new()).unwrap();
        ledger.clock().set(start());

        assert_eq!(ledger.sum(&item, None, None).unwrap(), 0);
    }

    #[test]
    fn subsecond_cutoffs_use_whole_seconds() {
        let ledger = ledger();
        let item = plain();

        ledger.clock().advance(Duration::milliseconds(700));
        let m = ledger.append(&item, 1, MutationArgs::new()).unwrap();

        assert_eq!(m.created_at, start());
        assert_eq!(
            ledger.sum(&item, Some(start() + Duration::milliseconds(200)), None).unwrap(),
            1
        );
    }

    #[test]
    fn delete_all_is_idempotent_and_ignores_warehouses() {
        let ledger = ledger();
        let item = partitioned();

        ledger.append(&item, 1, MutationArgs::new().warehouse(1)).unwrap();
        ledger.append(&item, 1, MutationArgs::new().warehouse(2)).unwrap();

        assert_eq!(ledger.delete_all(&item).unwrap(), 2);
        assert_eq!(ledger.delete_all(&item).unwrap(), 0);
        assert_eq!(ledger.sum(&item, None, None).unwrap(), 0);
    }

    #[test]
    fn persistence_errors_surface_unchanged() {
        let ledger = Ledger::new(BrokenStore);
        let expected = StockError::Persistence(PersistenceError::unavailable("connection refused"));

        assert_eq!(ledger.append(&plain(), 1, MutationArgs::new()).unwrap_err(), expected);
        assert_eq!(ledger.sum(&plain(), None, None).unwrap_err(), expected);
        assert_eq!(ledger.delete_all(&plain()).unwrap_err(), expected);
    }

    proptest! {
        #![proptest_config(ProptestConfig {
            cases: 128,
            ..ProptestConfig::default()
        })]

        /// Property: the stock equals the sum of appended amounts, whatever
        /// order they were appended in.
        #[test]
        fn sum_is_order_independent(
            amounts in prop::collection::vec(-1_000i64..1_000i64, 0..40)
        ) {
            let forward = ledger();
            let backward = ledger();
            let item = plain();

            for a in &amounts {
                forward.append(&item, *a, MutationArgs::new()).unwrap();
            }
            for a in amounts.iter().rev() {
                backward.append(&item, *a, MutationArgs::new()).unwrap();
            }

            let expected: i64 = amounts.iter().sum();
            prop_assert_eq!(forward.sum(&item, None, None).unwrap(), expected);
            prop_assert_eq!(backward.sum(&item, None, None).unwrap(), expected);
        }
    }
}
