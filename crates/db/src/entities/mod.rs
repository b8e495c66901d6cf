//! `SeaORM` entities.

pub mod account_types;
pub mod accounts;
pub mod aid_requests;
pub mod audit_log;
mod convert;
pub mod dividend_periods;
pub mod dividends;
pub mod fund_movements;
pub mod guarantors;
pub mod installments;
pub mod ledger_entries;
pub mod loan_types;
pub mod loans;
pub mod members;
pub mod mutual_funds;
pub mod notifications;
pub mod payments;
pub mod sea_orm_active_enums;
