//! Reconciliation error types.

use coopbank_shared::ErrorCategory;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Integrity failures found while reconciling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReconciliationError {
    /// Stored account balance differs from the ledger-derived balance.
    #[error("Account {account_id}: stored balance {stored} != ledger balance {derived}")]
    BalanceMismatch {
        /// Account id.
        account_id: Uuid,
        /// Balance on the account row.
        stored: Decimal,
        /// Balance derived from entries.
        derived: Decimal,
    },

    /// An entry's prior balance does not follow the previous entry.
    #[error("Entry {entry_id}: prior balance {found} does not continue from {expected}")]
    BrokenChain {
        /// Offending entry.
        entry_id: Uuid,
        /// Expected prior balance.
        expected: Decimal,
        /// Recorded prior balance.
        found: Decimal,
    },

    /// `|new - prior|` differs from the entry amount.
    #[error("Entry {0}: balance delta does not match amount")]
    AmountMismatch(Uuid),

    /// Reversal points at an entry outside the reconciled set.
    #[error("Reversal {0} references an unknown entry")]
    OrphanReversal(Uuid),

    /// Stored fund totals differ from the movement-derived totals.
    #[error("Fund {fund_id}: stored available {stored} != movement total {derived}")]
    FundTotalsMismatch {
        /// Fund period id.
        fund_id: Uuid,
        /// Stored available balance.
        stored: Decimal,
        /// Available balance derived from movements.
        derived: Decimal,
    },
}

impl ReconciliationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::BalanceMismatch { .. } => "BALANCE_MISMATCH",
            Self::BrokenChain { .. } => "BROKEN_BALANCE_CHAIN",
            Self::AmountMismatch(_) => "AMOUNT_MISMATCH",
            Self::OrphanReversal(_) => "ORPHAN_REVERSAL",
            Self::FundTotalsMismatch { .. } => "FUND_TOTALS_MISMATCH",
        }
    }

    /// Always an integrity violation.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::IntegrityViolation
    }
}
