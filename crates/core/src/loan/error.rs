//! Loan error types.

use coopbank_shared::ErrorCategory;
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use super::types::LoanStatus;
use crate::amortization::AmortizationError;

/// Errors raised by loan operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoanError {
    /// Attempted an invalid status transition.
    #[error("Invalid loan transition from {from} to {to}")]
    InvalidTransition {
        /// The current status.
        from: LoanStatus,
        /// The attempted target status.
        to: LoanStatus,
    },

    /// Amount must be positive.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    /// Term outside the loan type bounds.
    #[error("Term {term} months outside allowed range {min}-{max}")]
    TermOutOfBounds {
        /// Requested term.
        term: i32,
        /// Minimum term.
        min: i32,
        /// Maximum term.
        max: i32,
    },

    /// Loan type is not offered.
    #[error("Loan type is not active")]
    LoanTypeInactive,

    /// Member is inactive.
    #[error("Member is not active")]
    MemberInactive,

    /// Rejection reason is required.
    #[error("Rejection reason is required")]
    ReasonRequired,

    /// Borrower cannot guarantee their own loan.
    #[error("A member cannot guarantee their own loan")]
    SelfGuarantee,

    /// Member already guarantees this loan.
    #[error("Member already guarantees this loan")]
    DuplicateGuarantor,

    /// Guarantor is not an active member.
    #[error("Guarantor is not an active member")]
    GuarantorInactive,

    /// Approval blocked until enough guarantors accept.
    #[error("Loan requires {required} guarantors, has {actual}")]
    GuarantorsRequired {
        /// Required count.
        required: i32,
        /// Active guarantors.
        actual: i32,
    },

    /// Loan can no longer be edited or deleted.
    #[error("Loan in status {0} cannot be modified")]
    NotEditable(LoanStatus),

    /// Loan does not accept payments in this status.
    #[error("Loan in status {0} does not accept payments")]
    PaymentNotAllowed(LoanStatus),

    /// Installment is already settled.
    #[error("Installment {0} is already paid")]
    InstallmentAlreadyPaid(i32),

    /// Installment does not belong to the loan.
    #[error("Installment {0} does not belong to this loan")]
    InstallmentMismatch(Uuid),

    /// Schedule computation failed.
    #[error(transparent)]
    Amortization(#[from] AmortizationError),

    /// Loan not found.
    #[error("Loan {0} not found")]
    LoanNotFound(Uuid),

    /// Loan type not found.
    #[error("Loan type {0} not found")]
    LoanTypeNotFound(Uuid),

    /// Installment not found.
    #[error("Installment {0} not found")]
    InstallmentNotFound(Uuid),
}

impl LoanError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::TermOutOfBounds { .. } => "TERM_OUT_OF_BOUNDS",
            Self::LoanTypeInactive => "LOAN_TYPE_INACTIVE",
            Self::MemberInactive => "MEMBER_INACTIVE",
            Self::ReasonRequired => "REASON_REQUIRED",
            Self::SelfGuarantee => "SELF_GUARANTEE",
            Self::DuplicateGuarantor => "DUPLICATE_GUARANTOR",
            Self::GuarantorInactive => "GUARANTOR_INACTIVE",
            Self::GuarantorsRequired { .. } => "GUARANTORS_REQUIRED",
            Self::NotEditable(_) => "LOAN_NOT_EDITABLE",
            Self::PaymentNotAllowed(_) => "PAYMENT_NOT_ALLOWED",
            Self::InstallmentAlreadyPaid(_) => "INSTALLMENT_ALREADY_PAID",
            Self::InstallmentMismatch(_) => "INSTALLMENT_MISMATCH",
            Self::Amortization(e) => e.error_code(),
            Self::LoanNotFound(_) => "LOAN_NOT_FOUND",
            Self::LoanTypeNotFound(_) => "LOAN_TYPE_NOT_FOUND",
            Self::InstallmentNotFound(_) => "INSTALLMENT_NOT_FOUND",
        }
    }

    /// Returns the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidAmount(_)
            | Self::TermOutOfBounds { .. }
            | Self::ReasonRequired
            | Self::SelfGuarantee
            | Self::InstallmentMismatch(_) => ErrorCategory::Validation,
            Self::InvalidTransition { .. }
            | Self::LoanTypeInactive
            | Self::MemberInactive
            | Self::GuarantorInactive
            | Self::GuarantorsRequired { .. }
            | Self::NotEditable(_)
            | Self::PaymentNotAllowed(_)
            | Self::InstallmentAlreadyPaid(_) => ErrorCategory::StateConflict,
            Self::DuplicateGuarantor => ErrorCategory::Conflict,
            Self::Amortization(e) => e.category(),
            Self::LoanNotFound(_) | Self::LoanTypeNotFound(_) | Self::InstallmentNotFound(_) => {
                ErrorCategory::NotFound
            }
        }
    }
}
