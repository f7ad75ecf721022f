//! Developer Tooling: read-only inspection of the ledger and its worlds.
//!
//! # Invariants
//! - Tools never mutate the ledger.

mod inspector;

pub use inspector::{LedgerInspector, LedgerSummary, WorldInfo};
