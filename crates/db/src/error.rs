//! Repository error type.
//!
//! Wraps the domain errors raised while planning an operation together with
//! storage failures, and maps both onto the shared [`ErrorCategory`].

use coopbank_core::dividend::DividendError;
use coopbank_core::fund::FundError;
use coopbank_core::loan::LoanError;
use coopbank_core::reconciliation::ReconciliationError;
use coopbank_core::savings::SavingsError;
use coopbank_shared::{AppError, ErrorCategory};
use sea_orm::{DbErr, SqlErr};
use thiserror::Error;
use uuid::Uuid;

/// Errors returned by repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Savings rule violated.
    #[error(transparent)]
    Savings(#[from] SavingsError),

    /// Loan rule violated.
    #[error(transparent)]
    Loan(#[from] LoanError),

    /// Fund rule violated.
    #[error(transparent)]
    Fund(#[from] FundError),

    /// Dividend rule violated.
    #[error(transparent)]
    Dividend(#[from] DividendError),

    /// Stored aggregate disagrees with its ledger.
    #[error(transparent)]
    Reconciliation(#[from] ReconciliationError),

    /// Referenced row does not exist.
    #[error("{entity} {id} not found")]
    NotFound {
        /// Table or aggregate name.
        entity: &'static str,
        /// Requested id.
        id: Uuid,
    },

    /// A unique constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database error.
    #[error("Database error: {0}")]
    Database(DbErr),
}

impl From<DbErr> for RepositoryError {
    fn from(err: DbErr) -> Self {
        match err.sql_err() {
            Some(SqlErr::UniqueConstraintViolation(detail)) => Self::Conflict(detail),
            _ => Self::Database(err),
        }
    }
}

impl RepositoryError {
    /// Shorthand for [`RepositoryError::NotFound`].
    #[must_use]
    pub const fn not_found(entity: &'static str, id: Uuid) -> Self {
        Self::NotFound { entity, id }
    }

    /// Turns a violation of the unique index `constraint` into `domain`.
    ///
    /// Pre-insert existence checks are plain reads, so two concurrent
    /// writers can both pass them; the loser lands here.
    #[must_use]
    pub fn unique_as(self, constraint: &str, domain: impl Into<Self>) -> Self {
        match self {
            Self::Conflict(detail) if detail.contains(constraint) => domain.into(),
            other => other,
        }
    }

    /// Returns the error code for API responses.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Savings(err) => err.error_code(),
            Self::Loan(err) => err.error_code(),
            Self::Fund(err) => err.error_code(),
            Self::Dividend(err) => err.error_code(),
            Self::Reconciliation(err) => err.error_code(),
            Self::NotFound { .. } => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }

    /// Returns the error category.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Savings(err) => err.category(),
            Self::Loan(err) => err.category(),
            Self::Fund(err) => err.category(),
            Self::Dividend(err) => err.category(),
            Self::Reconciliation(err) => err.category(),
            Self::NotFound { .. } => ErrorCategory::NotFound,
            Self::Conflict(_) => ErrorCategory::Conflict,
            Self::Database(_) => ErrorCategory::Internal,
        }
    }
}

impl From<RepositoryError> for AppError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Database(db) => Self::Database(db.to_string()),
            other => Self::from_category(other.category(), other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coopbank_core::savings::SavingsError;
    use rust_decimal_macros::dec;

    #[test]
    fn test_domain_errors_keep_their_category() {
        let err: RepositoryError = SavingsError::InsufficientFunds {
            balance: dec!(10),
            requested: dec!(20),
        }
        .into();
        assert_eq!(err.category(), ErrorCategory::InsufficientFunds);
        assert_eq!(err.error_code(), "INSUFFICIENT_FUNDS");

        let app: AppError = err.into();
        assert_eq!(app.status_code(), 422);
    }

    #[test]
    fn test_not_found_maps_to_404() {
        let app: AppError = RepositoryError::not_found("account", Uuid::nil()).into();
        assert_eq!(app.status_code(), 404);
        assert!(app.to_string().contains("account"));
    }

    #[test]
    fn test_unique_as_maps_named_constraint_only() {
        let detail = r#"duplicate key value violates unique constraint "uq_accounts_open_per_type""#;
        let err = RepositoryError::Conflict(detail.to_string())
            .unique_as("uq_accounts_open_per_type", SavingsError::DuplicateOpenAccount);
        assert!(matches!(err, RepositoryError::Savings(SavingsError::DuplicateOpenAccount)));
        assert_eq!(err.error_code(), "DUPLICATE_OPEN_ACCOUNT");

        let other = RepositoryError::Conflict(detail.to_string())
            .unique_as("uq_fund_period", SavingsError::DuplicateOpenAccount);
        assert!(matches!(other, RepositoryError::Conflict(_)));

        let untouched = RepositoryError::not_found("account", Uuid::nil())
            .unique_as("uq_accounts_open_per_type", SavingsError::DuplicateOpenAccount);
        assert!(matches!(untouched, RepositoryError::NotFound { .. }));
    }

    #[test]
    fn test_plain_db_error_is_internal() {
        let err: RepositoryError = DbErr::Custom("boom".into()).into();
        assert!(matches!(err, RepositoryError::Database(_)));
        assert_eq!(err.category(), ErrorCategory::Internal);
    }
}
