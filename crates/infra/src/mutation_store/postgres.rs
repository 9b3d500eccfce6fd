//! Postgres-backed mutation store.
//!
//! One row per mutation in a single table (default `stock_mutations`). Sums
//! and classification run as aggregate queries; nothing is cached.
//!
//! ## Thread Safety
//!
//! `PostgresMutationStore` is `Send + Sync` and cheap to clone; all
//! operations go through the SQLx connection pool.
//!
//! ## Sync bridge
//!
//! The async methods are the primary API. The synchronous `MutationStore`
//! impl blocks on the ambient tokio runtime and therefore needs a
//! multi-threaded runtime (or a thread that has entered one without being a
//! worker). Without a runtime, or on a current-thread runtime, it fails with
//! `PersistenceError::Unavailable`.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool, Row};
use tokio::runtime::{Handle, RuntimeFlavor};
use tracing::{Span, instrument};

use stockledger_core::{
    EntityKey, MutationId, PersistenceError, Reference, StockOwner, WarehouseId,
};
use stockledger_inventory::{
    MutationFilter, MutationStore, NewStockMutation, StockMutation, StockScope,
};

use super::map_sqlx_error;
use super::scope_sql::filter_owners_sql;
use crate::config::{PostgresConfig, TableName};

const COLUMNS: &str = "id, stockable_type, stockable_id, reference_type, reference_id, \
                       warehouse_id, amount, description, created_at";

#[derive(Debug, Clone)]
pub struct PostgresMutationStore {
    pool: Arc<PgPool>,
    table: TableName,
}

impl PostgresMutationStore {
    /// Store over the default `stock_mutations` table.
    pub fn new(pool: PgPool) -> Self {
        Self::with_table(pool, TableName::default())
    }

    pub fn with_table(pool: PgPool, table: TableName) -> Self {
        Self {
            pool: Arc::new(pool),
            table,
        }
    }

    /// Connect using `config` (pool size and table name included).
    pub async fn connect(config: &PostgresConfig) -> Result<Self, PersistenceError> {
        let pool = config.connect().await?;
        Ok(Self::with_table(pool, config.table.clone()))
    }

    pub fn table(&self) -> &TableName {
        &self.table
    }

    /// Create the table and its indexes if they do not exist.
    #[instrument(skip(self), fields(table = %self.table), err)]
    pub async fn ensure_schema(&self) -> Result<(), PersistenceError> {
        let table = &self.table;
        let prefix = self.table.index_prefix();

        let statements = [
            format!(
                r#"
                CREATE TABLE IF NOT EXISTS {table} (
                    id              UUID PRIMARY KEY,
                    stockable_type  TEXT        NOT NULL,
                    stockable_id    TEXT        NOT NULL,
                    reference_type  TEXT        NULL,
                    reference_id    TEXT        NULL,
                    warehouse_id    BIGINT      NULL,
                    amount          BIGINT      NOT NULL,
                    description     TEXT        NULL,
                    created_at      TIMESTAMPTZ NOT NULL,
                    CHECK ((reference_type IS NULL) = (reference_id IS NULL))
                )
                "#
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {prefix}_owner_created_idx \
                 ON {table} (stockable_type, stockable_id, created_at)"
            ),
            format!(
                "CREATE INDEX IF NOT EXISTS {prefix}_owner_warehouse_idx \
                 ON {table} (stockable_type, stockable_id, warehouse_id)"
            ),
        ];

        for statement in &statements {
            sqlx::query(statement)
                .execute(&*self.pool)
                .await
                .map_err(|e| map_sqlx_error("ensure_schema", e))?;
        }

        Ok(())
    }

    #[instrument(
        skip(self, mutation),
        fields(owner = %mutation.owner, amount = mutation.amount),
        err
    )]
    pub async fn insert_mutation(
        &self,
        mutation: NewStockMutation,
    ) -> Result<StockMutation, PersistenceError> {
        let id = MutationId::new();
        let (reference_type, reference_id) = match &mutation.reference {
            Some(r) => (Some(r.kind.as_str()), Some(r.id.as_str())),
            None => (None, None),
        };

        let sql = format!(
            "INSERT INTO {} ({COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
            self.table
        );

        sqlx::query(&sql)
            .bind(id.as_uuid())
            .bind(&mutation.owner.kind)
            .bind(mutation.owner.id.as_str())
            .bind(reference_type)
            .bind(reference_id)
            .bind(mutation.warehouse_id.map(i64::from))
            .bind(mutation.amount)
            .bind(mutation.description.as_deref())
            .bind(mutation.created_at)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("insert_mutation", e))?;

        Ok(mutation.into_stored(id))
    }

    #[instrument(skip(self, filter), fields(owner = %filter.owner), err)]
    pub async fn sum_amount(&self, filter: &MutationFilter) -> Result<i64, PersistenceError> {
        let sql = format!(
            r#"
            SELECT COALESCE(SUM(amount), 0)::BIGINT AS total
            FROM {}
            WHERE stockable_type = $1
                AND stockable_id = $2
                AND created_at <= $3
                AND ($4::BIGINT IS NULL OR warehouse_id = $4)
            "#,
            self.table
        );

        let row = sqlx::query(&sql)
            .bind(&filter.owner.kind)
            .bind(filter.owner.id.as_str())
            .bind(filter.created_until)
            .bind(filter.warehouse_id.map(i64::from))
            .fetch_one(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("sum_amount", e))?;

        row.try_get::<i64, _>("total")
            .map_err(|e| PersistenceError::backend(format!("failed to read total: {e}")))
    }

    #[instrument(skip(self, owner), fields(owner = %owner), err)]
    pub async fn delete_owner_rows(&self, owner: &StockOwner) -> Result<u64, PersistenceError> {
        let sql = format!(
            "DELETE FROM {} WHERE stockable_type = $1 AND stockable_id = $2",
            self.table
        );

        let result = sqlx::query(&sql)
            .bind(&owner.kind)
            .bind(owner.id.as_str())
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete_owner_rows", e))?;

        Ok(result.rows_affected())
    }

    /// Oldest first; ties fall back to id order (UUIDv7, i.e. insertion order
    /// within one writer).
    #[instrument(skip(self, owner), fields(owner = %owner, rows = tracing::field::Empty), err)]
    pub async fn list_owner_rows(
        &self,
        owner: &StockOwner,
    ) -> Result<Vec<StockMutation>, PersistenceError> {
        let sql = format!(
            "SELECT {COLUMNS} FROM {} WHERE stockable_type = $1 AND stockable_id = $2 \
             ORDER BY created_at ASC, id ASC",
            self.table
        );

        let rows = sqlx::query(&sql)
            .bind(&owner.kind)
            .bind(owner.id.as_str())
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("list_owner_rows", e))?;

        let mut mutations = Vec::with_capacity(rows.len());
        for row in rows {
            let stored = MutationRow::from_row(&row).map_err(|e| {
                PersistenceError::backend(format!("failed to deserialize mutation row: {e}"))
            })?;
            mutations.push(stored.into());
        }

        Span::current().record("rows", mutations.len());
        Ok(mutations)
    }

    #[instrument(skip(self, candidates), fields(candidates = candidates.len()), err)]
    pub async fn filter_owner_keys(
        &self,
        kind: &str,
        candidates: &[EntityKey],
        scopes: &[StockScope],
    ) -> Result<Vec<EntityKey>, PersistenceError> {
        if candidates.is_empty() {
            return Ok(vec![]);
        }

        let rendered = filter_owners_sql(self.table.as_str(), scopes);
        let keys: Vec<String> = candidates.iter().map(|k| k.as_str().to_string()).collect();

        let mut query = sqlx::query(&rendered.sql).bind(kind).bind(keys);
        for warehouse in &rendered.warehouses {
            query = query.bind(*warehouse);
        }

        let rows = query
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("filter_owner_keys", e))?;

        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("key")
                    .map(EntityKey::from)
                    .map_err(|e| PersistenceError::backend(format!("failed to read key: {e}")))
            })
            .collect()
    }

    fn block_on<F>(&self, fut: F) -> Result<F::Output, PersistenceError>
    where
        F: Future,
    {
        let handle = Handle::try_current().map_err(|_| {
            PersistenceError::unavailable(
                "PostgresMutationStore requires a tokio runtime; \
                 call from within a runtime context",
            )
        })?;

        // block_in_place panics on a current-thread runtime.
        if handle.runtime_flavor() == RuntimeFlavor::CurrentThread {
            return Err(PersistenceError::unavailable(
                "PostgresMutationStore requires a multi-thread tokio runtime",
            ));
        }

        Ok(tokio::task::block_in_place(|| handle.block_on(fut)))
    }
}

// SQLx row types

#[derive(Debug)]
struct MutationRow {
    id: uuid::Uuid,
    stockable_type: String,
    stockable_id: String,
    reference_type: Option<String>,
    reference_id: Option<String>,
    warehouse_id: Option<i64>,
    amount: i64,
    description: Option<String>,
    created_at: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for MutationRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(MutationRow {
            id: row.try_get("id")?,
            stockable_type: row.try_get("stockable_type")?,
            stockable_id: row.try_get("stockable_id")?,
            reference_type: row.try_get("reference_type")?,
            reference_id: row.try_get("reference_id")?,
            warehouse_id: row.try_get("warehouse_id")?,
            amount: row.try_get("amount")?,
            description: row.try_get("description")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

impl From<MutationRow> for StockMutation {
    fn from(row: MutationRow) -> Self {
        let reference = match (row.reference_type, row.reference_id) {
            (Some(kind), Some(id)) => Some(Reference::new(kind, id)),
            _ => None,
        };

        StockMutation {
            id: MutationId::from_uuid(row.id),
            owner: StockOwner::new(row.stockable_type, row.stockable_id),
            amount: row.amount,
            warehouse_id: row.warehouse_id.map(WarehouseId::new),
            description: row.description,
            reference,
            created_at: row.created_at,
        }
    }
}

// Implement MutationStore trait

impl MutationStore for PostgresMutationStore {
    fn insert(&self, mutation: NewStockMutation) -> Result<StockMutation, PersistenceError> {
        self.block_on(self.insert_mutation(mutation))?
    }

    fn sum(&self, filter: &MutationFilter) -> Result<i64, PersistenceError> {
        self.block_on(self.sum_amount(filter))?
    }

    fn delete_owner(&self, owner: &StockOwner) -> Result<u64, PersistenceError> {
        self.block_on(self.delete_owner_rows(owner))?
    }

    fn list_owner(&self, owner: &StockOwner) -> Result<Vec<StockMutation>, PersistenceError> {
        self.block_on(self.list_owner_rows(owner))?
    }

    fn filter_owners(
        &self,
        kind: &str,
        candidates: &[EntityKey],
        scopes: &[StockScope],
    ) -> Result<Vec<EntityKey>, PersistenceError> {
        self.block_on(self.filter_owner_keys(kind, candidates, scopes))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use sqlx::postgres::PgPoolOptions;
    use stockledger_core::StockOwner;

    fn lazy_store() -> PostgresMutationStore {
        let pool = PgPoolOptions::new()
            .connect_lazy("postgres://stock@localhost/stock")
            .unwrap();
        PostgresMutationStore::new(pool)
    }

    fn filter() -> MutationFilter {
        MutationFilter {
            owner: StockOwner::new("product", 1_i64),
            created_until: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
            warehouse_id: None,
        }
    }

    #[test]
    fn current_thread_runtime_is_unavailable() {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        let _guard = rt.enter();
        let store = lazy_store();

        let err = MutationStore::sum(&store, &filter()).unwrap_err();
        assert!(matches!(err, PersistenceError::Unavailable(msg) if msg.contains("multi-thread")));

        let owner = StockOwner::new("product", 1_i64);
        assert!(matches!(
            store.delete_owner(&owner),
            Err(PersistenceError::Unavailable(_))
        ));
    }

    #[test]
    fn rows_with_both_reference_columns_become_references() {
        let row = MutationRow {
            id: uuid::Uuid::now_v7(),
            stockable_type: "product".into(),
            stockable_id: "1".into(),
            reference_type: Some("order_line".into()),
            reference_id: Some("55".into()),
            warehouse_id: Some(2),
            amount: -3,
            description: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        };

        let m: StockMutation = row.into();
        assert_eq!(m.owner, StockOwner::new("product", 1_i64));
        assert_eq!(m.reference, Some(Reference::new("order_line", 55_i64)));
        assert_eq!(m.warehouse_id, Some(WarehouseId::new(2)));
        assert_eq!(m.amount, -3);
    }
}
