//! Daily delinquency penalty (mora) and reminder timing.
//!
//! Penalties are always re-derived from the due date, so running the accrual
//! twice for the same day changes nothing.

pub mod service;

#[cfg(test)]
mod service_props;

pub use service::{Accrual, DelinquencyService, DEFAULT_DAILY_RATE_PCT};
