//! Mutual-aid fund ledger (kardex).
//!
//! One fund per calendar month. Totals are always recomputed from the
//! movement set, never incremented in place.

pub mod error;
pub mod period;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::FundError;
pub use period::PeriodKey;
pub use service::{FundService, PeriodBounds};
pub use types::{
    AidKind, AidStatus, ContributionKind, FundSnapshot, FundStatus, FundTotals, MovementKind,
    MovementPlan, MovementSnapshot,
};
