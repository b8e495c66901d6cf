//! Amortization error types.

use coopbank_shared::ErrorCategory;
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors raised while computing payments or schedules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AmortizationError {
    /// Term must be at least one month.
    #[error("Invalid term: {0} months")]
    InvalidTerm(i32),

    /// Principal must be positive.
    #[error("Invalid principal: {0}")]
    InvalidPrincipal(Decimal),

    /// Rate cannot be negative.
    #[error("Invalid annual rate: {0}%")]
    InvalidRate(Decimal),

    /// Intermediate value exceeded decimal range.
    #[error("Arithmetic overflow computing payment")]
    Overflow,

    /// Due date fell outside the supported calendar.
    #[error("Due date out of range")]
    DateOutOfRange,
}

impl AmortizationError {
    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidTerm(_) => "INVALID_TERM",
            Self::InvalidPrincipal(_) => "INVALID_PRINCIPAL",
            Self::InvalidRate(_) => "INVALID_RATE",
            Self::Overflow => "AMORTIZATION_OVERFLOW",
            Self::DateOutOfRange => "DATE_OUT_OF_RANGE",
        }
    }

    /// Returns the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        ErrorCategory::Validation
    }
}
