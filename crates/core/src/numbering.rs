//! Human-facing document numbers.
//!
//! Numbers combine a prefix, the year (or year and month) of the document
//! and a database sequence value, e.g. `PRE-2026-000042`.

use chrono::{Datelike, NaiveDate};

use crate::macros::labeled_enum;

labeled_enum! {
    /// Numbered document kinds.
    pub enum DocumentKind {
        /// Savings account, `CA-YYYY-NNNNNN`.
        Account => "CA",
        /// Loan, `PRE-YYYY-NNNNNN`.
        Loan => "PRE",
        /// Loan payment receipt, `REC-YYYY-NNNNNN`.
        Receipt => "REC",
        /// Fund movement, `FM-YYYYMM-NNNNNN`.
        FundMovement => "FM",
        /// Aid request, `SA-YYYYMM-NNNNNN`.
        AidRequest => "SA",
    }
}

impl DocumentKind {
    /// Postgres sequence feeding this kind.
    #[must_use]
    pub const fn sequence_name(&self) -> &'static str {
        match self {
            Self::Account => "account_number_seq",
            Self::Loan => "loan_number_seq",
            Self::Receipt => "receipt_number_seq",
            Self::FundMovement => "fund_movement_number_seq",
            Self::AidRequest => "aid_request_number_seq",
        }
    }

    /// Fund documents carry the month as well as the year.
    #[must_use]
    pub const fn is_monthly(&self) -> bool {
        matches!(self, Self::FundMovement | Self::AidRequest)
    }
}

/// Formats a document number for `date` and sequence value `seq`.
#[must_use]
pub fn document_number(kind: DocumentKind, date: NaiveDate, seq: i64) -> String {
    if kind.is_monthly() {
        format!("{}-{:04}{:02}-{seq:06}", kind.as_str(), date.year(), date.month())
    } else {
        format!("{}-{:04}-{seq:06}", kind.as_str(), date.year())
    }
}
