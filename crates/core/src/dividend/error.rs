//! Dividend error types.

use coopbank_shared::ErrorCategory;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::types::DividendPeriodStatus;

/// Errors raised by dividend operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DividendError {
    /// Year outside 2000..=2100.
    #[error("Invalid dividend year: {0}")]
    InvalidYear(i32),

    /// A period for the year already exists.
    #[error("Dividend period {0} already exists")]
    DuplicatePeriod(i32),

    /// Operation not allowed in the period's status.
    #[error("Invalid dividend period transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: DividendPeriodStatus,
        /// Requested status.
        to: DividendPeriodStatus,
    },

    /// Shares were already calculated for the period.
    #[error("Dividends for period {0} were already calculated")]
    AlreadyCalculated(i32),

    /// Negative or sub-cent amount.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Crediting would distribute more than the interest generated.
    #[error("Dividend {amount} exceeds the remaining pool {remaining}")]
    ExceedsPool {
        /// Interest generated minus what was already distributed.
        remaining: Decimal,
        /// Amount being credited.
        amount: Decimal,
    },

    /// The dividend was credited before.
    #[error("Dividend {0} was already credited")]
    AlreadyCredited(Uuid),

    /// Shares were never calculated for the period.
    #[error("Dividends for period {0} were not calculated")]
    NotCalculated(i32),

    /// Shares still waiting to be credited.
    #[error("{0} dividends are still pending")]
    PendingCredits(u64),

    /// Member has no open fixed account to receive the credit.
    #[error("Member {0} has no account to receive the dividend")]
    NoCreditAccount(Uuid),

    /// Period not found.
    #[error("Dividend period {0} not found")]
    PeriodNotFound(Uuid),

    /// Dividend not found.
    #[error("Dividend {0} not found")]
    DividendNotFound(Uuid),
}

impl DividendError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidYear(_) => "INVALID_YEAR",
            Self::DuplicatePeriod(_) => "DUPLICATE_PERIOD",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::AlreadyCalculated(_) => "ALREADY_CALCULATED",
            Self::NotCalculated(_) => "NOT_CALCULATED",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::ExceedsPool { .. } => "EXCEEDS_POOL",
            Self::AlreadyCredited(_) => "ALREADY_CREDITED",
            Self::PendingCredits(_) => "PENDING_CREDITS",
            Self::NoCreditAccount(_) => "NO_CREDIT_ACCOUNT",
            Self::PeriodNotFound(_) => "DIVIDEND_PERIOD_NOT_FOUND",
            Self::DividendNotFound(_) => "DIVIDEND_NOT_FOUND",
        }
    }

    /// Returns the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidYear(_) | Self::InvalidAmount(_) => ErrorCategory::Validation,
            Self::InvalidTransition { .. }
            | Self::AlreadyCalculated(_)
            | Self::NotCalculated(_)
            | Self::AlreadyCredited(_)
            | Self::PendingCredits(_)
            | Self::NoCreditAccount(_) => ErrorCategory::StateConflict,
            Self::ExceedsPool { .. } => ErrorCategory::InsufficientFunds,
            Self::DuplicatePeriod(_) => ErrorCategory::Conflict,
            Self::PeriodNotFound(_) | Self::DividendNotFound(_) => ErrorCategory::NotFound,
        }
    }
}
