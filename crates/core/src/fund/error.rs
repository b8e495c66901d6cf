//! Fund error types.

use coopbank_shared::ErrorCategory;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::types::AidStatus;

/// Errors raised by mutual fund operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FundError {
    /// Period key is not a valid `YYYYMM`.
    #[error("Invalid period key: {0}")]
    InvalidPeriodKey(String),

    /// A fund for the period already exists.
    #[error("Fund period {0} already exists")]
    DuplicatePeriod(String),

    /// Fund period is closed.
    #[error("Fund period is closed")]
    PeriodClosed,

    /// Amount must be positive.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Contribution not above the configured minimum.
    #[error("Contribution {amount} must exceed the minimum {minimum}")]
    BelowMinimumContribution {
        /// Configured minimum.
        minimum: Decimal,
        /// Offered amount.
        amount: Decimal,
    },

    /// Aid request above the configured maximum.
    #[error("Requested aid {amount} exceeds the maximum {maximum}")]
    ExceedsMaximumAid {
        /// Configured maximum.
        maximum: Decimal,
        /// Requested amount.
        amount: Decimal,
    },

    /// Member already has an unresolved aid request.
    #[error("Member already has a pending aid request")]
    PendingRequestExists,

    /// Invalid aid request transition.
    #[error("Invalid aid request transition from {from} to {to}")]
    InvalidTransition {
        /// Current status.
        from: AidStatus,
        /// Requested status.
        to: AidStatus,
    },

    /// Fund cannot cover the approved amount.
    #[error("Insufficient fund balance: available {available}, requested {requested}")]
    InsufficientFund {
        /// Available balance.
        available: Decimal,
        /// Requested amount.
        requested: Decimal,
    },

    /// Requests still awaiting a decision block the close.
    #[error("{0} aid requests are still unresolved")]
    UnresolvedRequests(u64),

    /// Rejection reason is required.
    #[error("Rejection reason is required")]
    ReasonRequired,

    /// Justification is required.
    #[error("Justification is required")]
    JustificationRequired,

    /// Member is inactive.
    #[error("Member is not active")]
    MemberInactive,

    /// Fund not found.
    #[error("Fund {0} not found")]
    FundNotFound(Uuid),

    /// Aid request not found.
    #[error("Aid request {0} not found")]
    AidRequestNotFound(Uuid),
}

impl FundError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidPeriodKey(_) => "INVALID_PERIOD_KEY",
            Self::DuplicatePeriod(_) => "DUPLICATE_PERIOD",
            Self::PeriodClosed => "PERIOD_CLOSED",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::BelowMinimumContribution { .. } => "BELOW_MINIMUM_CONTRIBUTION",
            Self::ExceedsMaximumAid { .. } => "EXCEEDS_MAXIMUM_AID",
            Self::PendingRequestExists => "PENDING_REQUEST_EXISTS",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InsufficientFund { .. } => "INSUFFICIENT_FUND",
            Self::UnresolvedRequests(_) => "UNRESOLVED_REQUESTS",
            Self::ReasonRequired => "REASON_REQUIRED",
            Self::JustificationRequired => "JUSTIFICATION_REQUIRED",
            Self::MemberInactive => "MEMBER_INACTIVE",
            Self::FundNotFound(_) => "FUND_NOT_FOUND",
            Self::AidRequestNotFound(_) => "AID_REQUEST_NOT_FOUND",
        }
    }

    /// Returns the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidPeriodKey(_)
            | Self::InvalidAmount(_)
            | Self::BelowMinimumContribution { .. }
            | Self::ExceedsMaximumAid { .. }
            | Self::ReasonRequired
            | Self::JustificationRequired => ErrorCategory::Validation,
            Self::PeriodClosed
            | Self::PendingRequestExists
            | Self::InvalidTransition { .. }
            | Self::UnresolvedRequests(_)
            | Self::MemberInactive => ErrorCategory::StateConflict,
            Self::InsufficientFund { .. } => ErrorCategory::InsufficientFunds,
            Self::DuplicatePeriod(_) => ErrorCategory::Conflict,
            Self::FundNotFound(_) | Self::AidRequestNotFound(_) => ErrorCategory::NotFound,
        }
    }
}
