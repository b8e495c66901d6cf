//! Application-wide error types.
//!
//! Every domain error in the workspace maps onto one [`ErrorCategory`], which
//! is what callers outside the engine branch on.

use std::fmt;

use thiserror::Error;

/// Result type alias using `AppError`.
pub type AppResult<T> = Result<T, AppError>;

/// Coarse classification shared by all domain errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Input failed validation (bad amount, bad term, malformed key).
    Validation,
    /// The entity is in a state that does not allow the operation.
    StateConflict,
    /// Not enough money in the account or fund.
    InsufficientFunds,
    /// Stored data disagrees with what the ledger derives. Fatal.
    IntegrityViolation,
    /// Referenced entity does not exist.
    NotFound,
    /// Uniqueness rule violated (duplicate period, duplicate guarantor).
    Conflict,
    /// Storage or unexpected failure.
    Internal,
}

impl ErrorCategory {
    /// Returns the string representation of the category.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::StateConflict => "state_conflict",
            Self::InsufficientFunds => "insufficient_funds",
            Self::IntegrityViolation => "integrity_violation",
            Self::NotFound => "not_found",
            Self::Conflict => "conflict",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Application error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Validation error.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Operation not allowed in the current state.
    #[error("State conflict: {0}")]
    StateConflict(String),

    /// Balance too low for the operation.
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),

    /// Ledger integrity violated.
    #[error("Integrity violation: {0}")]
    IntegrityViolation(String),

    /// Conflict (e.g., duplicate entry).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Builds an error of the given category.
    #[must_use]
    pub fn from_category(category: ErrorCategory, message: impl Into<String>) -> Self {
        let message = message.into();
        match category {
            ErrorCategory::Validation => Self::Validation(message),
            ErrorCategory::StateConflict => Self::StateConflict(message),
            ErrorCategory::InsufficientFunds => Self::InsufficientFunds(message),
            ErrorCategory::IntegrityViolation => Self::IntegrityViolation(message),
            ErrorCategory::NotFound => Self::NotFound(message),
            ErrorCategory::Conflict => Self::Conflict(message),
            ErrorCategory::Internal => Self::Internal(message),
        }
    }

    /// Returns the category of this error.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::NotFound(_) => ErrorCategory::NotFound,
            Self::Validation(_) => ErrorCategory::Validation,
            Self::StateConflict(_) => ErrorCategory::StateConflict,
            Self::InsufficientFunds(_) => ErrorCategory::InsufficientFunds,
            Self::IntegrityViolation(_) => ErrorCategory::IntegrityViolation,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::Database(_) | Self::Internal(_) => ErrorCategory::Internal,
        }
    }

    /// Returns the HTTP-equivalent status code for this error.
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::StateConflict(_) | Self::InsufficientFunds(_) => 422,
            Self::Conflict(_) => 409,
            Self::IntegrityViolation(_) | Self::Database(_) | Self::Internal(_) => 500,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub const fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::StateConflict(_) => "STATE_CONFLICT",
            Self::InsufficientFunds(_) => "INSUFFICIENT_FUNDS",
            Self::IntegrityViolation(_) => "INTEGRITY_VIOLATION",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
