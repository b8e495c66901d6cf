//! Savings account ledger rules.
//!
//! Every balance mutation produces a [`BalanceChange`] carrying the prior and
//! new balance; repositories persist the account update and the matching
//! ledger entry in one transaction.

pub mod error;
pub mod service;
pub mod types;

#[cfg(test)]
mod service_props;

pub use error::SavingsError;
pub use service::SavingsService;
pub use types::{
    AccountSnapshot, AccountStatus, BalanceChange, EntrySnapshot, EntryStatus, EntryType,
    OpenAccountCheck,
};
