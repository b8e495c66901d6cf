//! Core business logic for Coopbank.
//!
//! This crate contains pure business logic with ZERO web or database dependencies.
//! Repositories load snapshots, call into these services, and persist the plans
//! they return inside one database transaction.
//!
//! # Modules
//!
//! - `amortization` - French (annuity) payment and schedule generation
//! - `savings` - Savings account ledger rules (deposit, withdraw, reverse)
//! - `loan` - Loan lifecycle state machine, guarantors, payment allocation
//! - `delinquency` - Daily penalty (mora) accrual and reminder timing
//! - `fund` - Mutual-aid fund periods, contributions and aid requests
//! - `dividend` - Yearly dividend periods and their pro-rata allocation
//! - `reconciliation` - Ledger-derived balance checks
//! - `audit` - Audit records emitted by state-changing operations
//! - `notification` - Member notification drafts and delivery policy
//! - `numbering` - Human-facing document numbers

mod macros;

pub mod amortization;
pub mod audit;
pub mod delinquency;
pub mod dividend;
pub mod fund;
pub mod loan;
pub mod notification;
pub mod numbering;
pub mod reconciliation;
pub mod savings;
