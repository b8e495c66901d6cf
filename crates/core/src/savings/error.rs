//! Savings ledger error types.

use coopbank_shared::ErrorCategory;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::types::EntryType;

/// Errors raised by savings operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SavingsError {
    /// Amount must be positive with at most two decimals.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Account is closed.
    #[error("Account is closed")]
    AccountClosed,

    /// Account type only allows liquidation on close.
    #[error("Account type does not allow withdrawals")]
    NotWithdrawable,

    /// Balance lower than the requested withdrawal.
    #[error("Insufficient funds: balance {balance}, requested {requested}")]
    InsufficientFunds {
        /// Current balance.
        balance: Decimal,
        /// Requested amount.
        requested: Decimal,
    },

    /// Entry was already reversed.
    #[error("Entry {0} is already reversed")]
    AlreadyReversed(Uuid),

    /// Entry is older than the reversal window.
    #[error("Entry is {age_days} days old; reversal window is {window_days} days")]
    TooOld {
        /// Entry age in whole days.
        age_days: i64,
        /// Configured window.
        window_days: u32,
    },

    /// Only deposits and withdrawals on an account can be reversed.
    #[error("Entries of type {0} cannot be reversed")]
    UnsupportedReversal(EntryType),

    /// Entry type cannot be used for this movement.
    #[error("Entry type {0} is not a credit")]
    UnsupportedEntryType(EntryType),

    /// Reversal would take the balance below zero.
    #[error("Reversal would leave a negative balance: balance {balance}, amount {amount}")]
    WouldGoNegative {
        /// Current balance.
        balance: Decimal,
        /// Amount being removed.
        amount: Decimal,
    },

    /// Reversal reason is required.
    #[error("Reversal reason is required")]
    ReasonRequired,

    /// Account can only close at zero balance.
    #[error("Account balance must be zero to close, found {0}")]
    NonZeroBalance(Decimal),

    /// Member already has an open account of this type.
    #[error("Member already has an open account of this type")]
    DuplicateOpenAccount,

    /// Opening deposit below the account type minimum.
    #[error("Opening deposit {amount} is below the minimum {minimum}")]
    BelowMinimumBalance {
        /// Required minimum.
        minimum: Decimal,
        /// Offered amount.
        amount: Decimal,
    },

    /// Member is inactive.
    #[error("Member is not active")]
    MemberInactive,

    /// Account type is not offered.
    #[error("Account type is not active")]
    AccountTypeInactive,

    /// Account not found.
    #[error("Account {0} not found")]
    AccountNotFound(Uuid),

    /// Ledger entry not found.
    #[error("Ledger entry {0} not found")]
    EntryNotFound(Uuid),
}

impl SavingsError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::AccountClosed => "ACCOUNT_CLOSED",
            Self::NotWithdrawable => "NOT_WITHDRAWABLE",
            Self::InsufficientFunds { .. } => "INSUFFICIENT_FUNDS",
            Self::AlreadyReversed(_) => "ALREADY_REVERSED",
            Self::TooOld { .. } => "REVERSAL_TOO_OLD",
            Self::UnsupportedReversal(_) => "UNSUPPORTED_REVERSAL",
            Self::UnsupportedEntryType(_) => "UNSUPPORTED_ENTRY_TYPE",
            Self::WouldGoNegative { .. } => "WOULD_GO_NEGATIVE",
            Self::ReasonRequired => "REASON_REQUIRED",
            Self::NonZeroBalance(_) => "NON_ZERO_BALANCE",
            Self::DuplicateOpenAccount => "DUPLICATE_OPEN_ACCOUNT",
            Self::BelowMinimumBalance { .. } => "BELOW_MINIMUM_BALANCE",
            Self::MemberInactive => "MEMBER_INACTIVE",
            Self::AccountTypeInactive => "ACCOUNT_TYPE_INACTIVE",
            Self::AccountNotFound(_) => "ACCOUNT_NOT_FOUND",
            Self::EntryNotFound(_) => "ENTRY_NOT_FOUND",
        }
    }

    /// Returns the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAmount(_)
            | Self::ReasonRequired
            | Self::BelowMinimumBalance { .. }
            | Self::UnsupportedReversal(_)
            | Self::UnsupportedEntryType(_) => ErrorCategory::Validation,
            Self::AccountClosed
            | Self::NotWithdrawable
            | Self::AlreadyReversed(_)
            | Self::TooOld { .. }
            | Self::NonZeroBalance(_)
            | Self::MemberInactive
            | Self::AccountTypeInactive => ErrorCategory::StateConflict,
            Self::InsufficientFunds { .. } | Self::WouldGoNegative { .. } => {
                ErrorCategory::InsufficientFunds
            }
            Self::DuplicateOpenAccount => ErrorCategory::Conflict,
            Self::AccountNotFound(_) | Self::EntryNotFound(_) => ErrorCategory::NotFound,
        }
    }
}
