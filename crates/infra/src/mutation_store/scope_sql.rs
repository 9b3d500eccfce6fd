//! SQL rendering of [`StockScope`] predicates.
//!
//! Every "no history passes" scope is rendered as an explicit
//! `EXISTS (...) OR NOT EXISTS (...)` pair instead of leaning on NULL
//! semantics of an outer join, so the result does not depend on how a given
//! engine aggregates empty groups.

use stockledger_inventory::StockScope;

/// Rendered owner filter.
///
/// Parameters: `$1` = owner kind, `$2` = candidate keys (`text[]`), then one
/// `BIGINT` per entry of `warehouses`, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FilterSql {
    pub sql: String,
    pub warehouses: Vec<i64>,
}

/// Build the candidate-filtering query for `table`.
pub(crate) fn filter_owners_sql(table: &str, scopes: &[StockScope]) -> FilterSql {
    let owned = "m.stockable_type = $1 AND m.stockable_id = c.key";
    let mut warehouses = Vec::new();
    let mut clauses = Vec::with_capacity(scopes.len());

    let mut bind_warehouse = |w: i64| {
        warehouses.push(w);
        format!("${}", warehouses.len() + 2)
    };

    for scope in scopes {
        let clause = match *scope {
            StockScope::InStock => format!(
                "EXISTS (SELECT 1 FROM {table} m WHERE {owned} \
                 GROUP BY m.stockable_id HAVING SUM(m.amount) > 0)"
            ),
            StockScope::OutOfStock => format!(
                "(EXISTS (SELECT 1 FROM {table} m WHERE {owned} \
                 GROUP BY m.stockable_id HAVING SUM(m.amount) <= 0) \
                 OR NOT EXISTS (SELECT 1 FROM {table} m WHERE {owned}))"
            ),
            StockScope::Warehouse(w) => {
                let p = bind_warehouse(w.get());
                format!(
                    "(EXISTS (SELECT 1 FROM {table} m WHERE {owned} AND m.warehouse_id = {p}) \
                     OR NOT EXISTS (SELECT 1 FROM {table} m WHERE {owned}))"
                )
            }
            StockScope::InStockAt(w) => {
                let p = bind_warehouse(w.get());
                format!(
                    "EXISTS (SELECT 1 FROM {table} m WHERE {owned} AND m.warehouse_id = {p} \
                     GROUP BY m.stockable_id HAVING SUM(m.amount) > 0)"
                )
            }
            StockScope::OutOfStockAt(w) => {
                let p = bind_warehouse(w.get());
                format!(
                    "(EXISTS (SELECT 1 FROM {table} m WHERE {owned} AND m.warehouse_id = {p} \
                     GROUP BY m.stockable_id HAVING SUM(m.amount) <= 0) \
                     OR NOT EXISTS (SELECT 1 FROM {table} m \
                     WHERE {owned} AND m.warehouse_id = {p}))"
                )
            }
        };
        clauses.push(clause);
    }

    // `$1` must appear even without scopes, or Postgres cannot type it.
    let predicate = if clauses.is_empty() {
        "$1::text IS NOT NULL".to_string()
    } else {
        clauses.join(" AND ")
    };

    FilterSql {
        sql: format!(
            "SELECT c.key FROM UNNEST($2::text[]) WITH ORDINALITY AS c(key, ord) \
             WHERE {predicate} ORDER BY c.ord"
        ),
        warehouses,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stockledger_core::WarehouseId;

    #[test]
    fn empty_scope_list_keeps_every_candidate() {
        let rendered = filter_owners_sql("stock_mutations", &[]);
        assert!(rendered.sql.contains("WHERE $1::text IS NOT NULL ORDER BY c.ord"));
        assert!(rendered.warehouses.is_empty());
    }

    #[test]
    fn out_of_stock_renders_both_branches() {
        let rendered = filter_owners_sql("stock_mutations", &[StockScope::OutOfStock]);

        assert!(rendered.sql.contains("HAVING SUM(m.amount) <= 0"));
        assert!(rendered.sql.contains("OR NOT EXISTS (SELECT 1 FROM stock_mutations m"));
    }

    #[test]
    fn warehouse_parameters_are_numbered_after_fixed_ones() {
        let rendered = filter_owners_sql(
            "inv.stock_mutations",
            &[
                StockScope::Warehouse(WarehouseId::new(7)),
                StockScope::InStock,
                StockScope::OutOfStockAt(WarehouseId::new(9)),
            ],
        );

        assert_eq!(rendered.warehouses, vec![7, 9]);
        assert!(rendered.sql.contains("m.warehouse_id = $3)"));
        assert!(rendered.sql.contains("m.warehouse_id = $4 GROUP BY"));
        assert!(!rendered.sql.contains("$5"));
        assert_eq!(rendered.sql.matches(" AND (EXISTS").count(), 1);
    }
}
