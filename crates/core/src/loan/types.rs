//! Loan domain types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::macros::labeled_enum;

labeled_enum! {
    /// Loan lifecycle state.
    ///
    /// ```text
    /// REQUESTED -> IN_REVIEW -> APPROVED | REJECTED
    /// APPROVED -> DISBURSED -> IN_REPAYMENT -> PAID | DEFAULTED | CANCELLED
    /// ```
    pub enum LoanStatus {
        /// Submitted by the member.
        Requested => "REQUESTED",
        /// Under credit committee review.
        InReview => "IN_REVIEW",
        /// Approved with a schedule.
        Approved => "APPROVED",
        /// Rejected.
        Rejected => "REJECTED",
        /// Principal handed over.
        Disbursed => "DISBURSED",
        /// At least one payment received.
        InRepayment => "IN_REPAYMENT",
        /// Fully repaid.
        Paid => "PAID",
        /// Written off as defaulted.
        Defaulted => "DEFAULTED",
        /// Cancelled after disbursement.
        Cancelled => "CANCELLED",
    }
}

impl LoanStatus {
    /// Returns true if the loan may still be edited or deleted.
    #[must_use]
    pub fn is_editable(&self) -> bool {
        matches!(self, Self::Requested | Self::InReview | Self::Rejected)
    }

    /// Returns true if payments may be applied.
    #[must_use]
    pub fn accepts_payments(&self) -> bool {
        matches!(self, Self::Disbursed | Self::InRepayment)
    }

    /// Returns true if the transition `self -> next` is part of the lifecycle.
    #[must_use]
    pub fn can_transition_to(&self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::InReview)
                | (Self::Requested | Self::InReview, Self::Approved | Self::Rejected)
                | (Self::Approved, Self::Disbursed)
                | (Self::Disbursed, Self::InRepayment | Self::Paid)
                | (
                    Self::InRepayment,
                    Self::Paid | Self::Defaulted | Self::Cancelled
                )
        )
    }
}

labeled_enum! {
    /// Installment state. Transitions only move forward.
    pub enum InstallmentStatus {
        /// Not yet due or not yet processed.
        Pending => "PENDING",
        /// Past due with penalty accruing.
        Overdue => "OVERDUE",
        /// Paid on time.
        Paid => "PAID",
        /// Paid after the due date.
        PaidLate => "PAID_LATE",
    }
}

impl InstallmentStatus {
    /// Returns true once the installment is settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Paid | Self::PaidLate)
    }
}

labeled_enum! {
    /// How a loan payment was made.
    pub enum PaymentMethod {
        /// Cash at the counter.
        Cash => "CASH",
        /// Bank transfer.
        Transfer => "TRANSFER",
        /// Payroll deduction.
        Payroll => "PAYROLL",
        /// Cheque.
        Check => "CHECK",
    }
}

/// Loan type parameters relevant to the lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoanTypeTerms {
    /// Annual rate in percent.
    pub annual_rate_pct: Decimal,
    /// Fixed-savings multiplier for the no-guarantor ceiling.
    pub savings_multiplier: Decimal,
    /// Shortest allowed term.
    pub min_term_months: i32,
    /// Longest allowed term.
    pub max_term_months: i32,
    /// Whether guarantors are required above the savings ceiling.
    pub requires_guarantors: bool,
    /// Number of guarantors required.
    pub required_guarantors: i32,
    /// Whether the type is currently offered.
    pub active: bool,
}

/// A member's loan request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoanRequestInput {
    /// Borrower.
    pub member_id: Uuid,
    /// Requested principal.
    pub amount: Decimal,
    /// Requested term.
    pub term_months: i32,
    /// Whether the borrower is an active member.
    pub member_active: bool,
}

/// Installment state loaded under lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallmentSnapshot {
    /// Installment id.
    pub id: Uuid,
    /// Number within the loan, 1-based.
    pub number: i32,
    /// Scheduled payment.
    pub payment: Decimal,
    /// Scheduled principal.
    pub principal: Decimal,
    /// Scheduled interest.
    pub interest: Decimal,
    /// Penalty accrued so far.
    pub penalty: Decimal,
    /// Principal already paid.
    pub principal_paid: Decimal,
    /// Interest already paid.
    pub interest_paid: Decimal,
    /// Penalty already paid.
    pub penalty_paid: Decimal,
    /// Due date.
    pub due_date: NaiveDate,
    /// Days late at the last accrual or payment.
    pub days_late: i32,
    /// Current state.
    pub status: InstallmentStatus,
}

impl InstallmentSnapshot {
    /// Penalty still owed.
    #[must_use]
    pub fn penalty_due(&self) -> Decimal {
        (self.penalty - self.penalty_paid).max(Decimal::ZERO)
    }

    /// Interest still owed.
    #[must_use]
    pub fn interest_due(&self) -> Decimal {
        (self.interest - self.interest_paid).max(Decimal::ZERO)
    }

    /// Principal still owed.
    #[must_use]
    pub fn principal_due(&self) -> Decimal {
        (self.principal - self.principal_paid).max(Decimal::ZERO)
    }

    /// Everything still owed on this installment.
    #[must_use]
    pub fn total_due(&self) -> Decimal {
        self.penalty_due() + self.interest_due() + self.principal_due()
    }
}
