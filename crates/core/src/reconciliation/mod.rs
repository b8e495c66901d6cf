//! Ledger reconciliation.
//!
//! Recomputes balances from the append-only records and compares them with
//! the stored aggregates. A mismatch is never auto-corrected.

pub mod error;
pub mod service;

pub use error::ReconciliationError;
pub use service::{AccountReconciliation, ReconciliationService};
