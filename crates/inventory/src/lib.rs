//! Inventory stock ledger.
//!
//! Stock is never stored as a counter: every change is an immutable signed
//! [`StockMutation`], and every level (current, historical, per warehouse) is
//! an aggregate over them. [`Ledger`] owns the append/sum/delete primitives;
//! [`StockService`] derives the stock operations from them.

pub mod in_memory;
pub mod ledger;
pub mod mutation;
pub mod scope;
pub mod stock;
pub mod store;

pub use in_memory::InMemoryMutationStore;
pub use ledger::Ledger;
pub use mutation::{
    MutationArgs, MutationFilter, NewStockMutation, PendingReference, StockMutation,
};
pub use scope::{OwnerHistory, StockQuery, StockScope, Tally};
pub use stock::StockService;
pub use store::MutationStore;
