//! `stockledger-core`: foundation types for the stock ledger.
//!
//! This crate contains **pure** primitives (no storage concerns): identifiers,
//! the polymorphic owner/reference model, the injectable clock and the error
//! taxonomy.

pub mod clock;
pub mod error;
pub mod id;
pub mod stockable;

pub use clock::{Clock, ManualClock, SystemClock, parse_as_of, to_ledger_precision};
pub use error::{PersistenceError, StockError, StockResult};
pub use id::{EntityKey, MutationId, WarehouseId};
pub use stockable::{Reference, Referenceable, StockOwner, Stockable};
