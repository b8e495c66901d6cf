//! Yearly dividend distribution.
//!
//! One period per calendar year. Closing a period fixes the loan interest
//! earned during the year; that amount is the pool shared among qualifying
//! members in proportion to their average fixed-savings balance. Each
//! member is credited at most once per period.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::DividendError;
pub use service::{DividendService, MIN_QUALIFYING_LOANS};
pub use types::{
    BalancePoint, DividendAllocation, DividendPeriodSnapshot, DividendPeriodStatus,
    MemberEligibility,
};
