//! French (annuity) amortization.
//!
//! Fixed monthly payment, interest on the running balance, rounding
//! absorbed by the final row.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::AmortizationError;
pub use service::AmortizationService;
pub use types::{Schedule, ScheduleRow};
