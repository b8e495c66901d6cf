//! Loan lifecycle state machine.
//!
//! Every method takes the current status and returns either the next status
//! (or a plan containing it) or `LoanError::InvalidTransition`.

use chrono::NaiveDate;
use coopbank_shared::types::is_whole_cents;
use rust_decimal::Decimal;
use serde::Serialize;

use super::error::LoanError;
use super::guarantor::GuarantorCheck;
use super::types::{LoanRequestInput, LoanStatus, LoanTypeTerms};
use crate::amortization::{AmortizationService, Schedule};

/// Everything `approve` writes to the loan and its schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApprovalPlan {
    /// Always `Approved`.
    pub status: LoanStatus,
    /// Approved principal.
    pub approved_amount: Decimal,
    /// Rate frozen at request time.
    pub annual_rate_pct: Decimal,
    /// Fixed monthly payment.
    pub monthly_payment: Decimal,
    /// Sum of all payments.
    pub total_payable: Decimal,
    /// Initial outstanding balance (= total payable).
    pub outstanding_balance: Decimal,
    /// Installment schedule replacing any previous one.
    pub schedule: Schedule,
}

/// Loan balance and status after a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoanBalanceUpdate {
    /// New outstanding balance, floored at zero.
    pub outstanding_balance: Decimal,
    /// New status.
    pub status: LoanStatus,
}

/// Stateless service for loan state transitions.
pub struct LoanService;

impl LoanService {
    /// Validates a new request and returns the rate to freeze on the loan.
    pub fn validate_request(
        terms: &LoanTypeTerms,
        input: &LoanRequestInput,
    ) -> Result<Decimal, LoanError> {
        if !terms.active {
            return Err(LoanError::LoanTypeInactive);
        }
        if !input.member_active {
            return Err(LoanError::MemberInactive);
        }
        Self::require_amount(input.amount)?;
        if input.term_months < terms.min_term_months || input.term_months > terms.max_term_months {
            return Err(LoanError::TermOutOfBounds {
                term: input.term_months,
                min: terms.min_term_months,
                max: terms.max_term_months,
            });
        }
        Ok(terms.annual_rate_pct)
    }

    /// REQUESTED -> IN_REVIEW.
    pub fn start_review(status: LoanStatus) -> Result<LoanStatus, LoanError> {
        Self::transition(status, LoanStatus::InReview)
    }

    /// Approves a loan and builds its schedule.
    ///
    /// `guarantors` is `Some` only when approval is gated on the guarantor
    /// count; otherwise the check is left to the caller.
    pub fn approve(
        status: LoanStatus,
        approved_amount: Decimal,
        annual_rate_pct: Decimal,
        term_months: i32,
        first_payment_date: NaiveDate,
        guarantors: Option<&GuarantorCheck>,
    ) -> Result<ApprovalPlan, LoanError> {
        let next = Self::transition(status, LoanStatus::Approved)?;
        Self::require_amount(approved_amount)?;
        if let Some(check) = guarantors {
            if !check.satisfied {
                return Err(LoanError::GuarantorsRequired {
                    required: check.required_count,
                    actual: check.guarantor_count,
                });
            }
        }

        let schedule = AmortizationService::generate_schedule(
            approved_amount,
            annual_rate_pct,
            term_months,
            first_payment_date,
        )?;

        Ok(ApprovalPlan {
            status: next,
            approved_amount,
            annual_rate_pct,
            monthly_payment: schedule.monthly_payment,
            total_payable: schedule.total_payable,
            outstanding_balance: schedule.total_payable,
            schedule,
        })
    }

    /// REQUESTED/IN_REVIEW -> REJECTED. Returns the notes with the reason
    /// appended.
    pub fn reject(
        status: LoanStatus,
        reason: &str,
        notes: Option<&str>,
    ) -> Result<(LoanStatus, String), LoanError> {
        if reason.trim().is_empty() {
            return Err(LoanError::ReasonRequired);
        }
        let next = Self::transition(status, LoanStatus::Rejected)?;
        let line = format!("Rejected: {}", reason.trim());
        let notes = match notes.map(str::trim).filter(|n| !n.is_empty()) {
            Some(existing) => format!("{existing}\n{line}"),
            None => line,
        };
        Ok((next, notes))
    }

    /// APPROVED -> DISBURSED.
    pub fn disburse(status: LoanStatus) -> Result<LoanStatus, LoanError> {
        Self::transition(status, LoanStatus::Disbursed)
    }

    /// IN_REPAYMENT -> CANCELLED.
    pub fn cancel(status: LoanStatus) -> Result<LoanStatus, LoanError> {
        Self::transition(status, LoanStatus::Cancelled)
    }

    /// IN_REPAYMENT -> DEFAULTED.
    pub fn mark_defaulted(status: LoanStatus) -> Result<LoanStatus, LoanError> {
        Self::transition(status, LoanStatus::Defaulted)
    }

    /// Fails unless the loan is still editable.
    pub fn ensure_editable(status: LoanStatus) -> Result<(), LoanError> {
        if status.is_editable() {
            Ok(())
        } else {
            Err(LoanError::NotEditable(status))
        }
    }

    /// Applies `amount_paid` to the outstanding balance.
    ///
    /// PAID once the balance reaches zero; otherwise the first payment moves
    /// a DISBURSED loan into repayment.
    pub fn settle(
        status: LoanStatus,
        outstanding_balance: Decimal,
        amount_paid: Decimal,
    ) -> Result<LoanBalanceUpdate, LoanError> {
        if !status.accepts_payments() {
            return Err(LoanError::PaymentNotAllowed(status));
        }
        Self::require_amount(amount_paid)?;

        let remaining = outstanding_balance - amount_paid;
        if remaining <= Decimal::ZERO {
            return Ok(LoanBalanceUpdate {
                outstanding_balance: Decimal::ZERO,
                status: LoanStatus::Paid,
            });
        }

        Ok(LoanBalanceUpdate {
            outstanding_balance: remaining,
            status: LoanStatus::InRepayment,
        })
    }

    fn transition(from: LoanStatus, to: LoanStatus) -> Result<LoanStatus, LoanError> {
        if from.can_transition_to(to) {
            Ok(to)
        } else {
            Err(LoanError::InvalidTransition { from, to })
        }
    }

    /// Positive and expressible in cents.
    pub fn require_amount(amount: Decimal) -> Result<(), LoanError> {
        if amount <= Decimal::ZERO || !is_whole_cents(amount) {
            return Err(LoanError::InvalidAmount(amount));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn terms() -> LoanTypeTerms {
        LoanTypeTerms {
            annual_rate_pct: dec!(18),
            savings_multiplier: dec!(3),
            min_term_months: 6,
            max_term_months: 36,
            requires_guarantors: true,
            required_guarantors: 2,
            active: true,
        }
    }

    fn request(amount: Decimal, term: i32) -> LoanRequestInput {
        LoanRequestInput {
            member_id: Uuid::new_v4(),
            amount,
            term_months: term,
            member_active: true,
        }
    }

    fn first_payment() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 11, 15).unwrap()
    }

    #[test]
    fn test_validate_request_freezes_rate() {
        assert_eq!(
            LoanService::validate_request(&terms(), &request(dec!(15000), 12)).unwrap(),
            dec!(18)
        );
    }

    #[rstest]
    #[case(5)]
    #[case(37)]
    fn test_term_bounds(#[case] term: i32) {
        assert!(matches!(
            LoanService::validate_request(&terms(), &request(dec!(1000), term)),
            Err(LoanError::TermOutOfBounds { .. })
        ));
    }

    #[test]
    fn test_validate_request_rejects_bad_input() {
        assert_eq!(
            LoanService::validate_request(&terms(), &request(dec!(0), 12)).unwrap_err(),
            LoanError::InvalidAmount(dec!(0))
        );
        assert_eq!(
            LoanService::validate_request(&terms(), &request(dec!(1000.005), 12)).unwrap_err(),
            LoanError::InvalidAmount(dec!(1000.005))
        );
        let inactive = LoanTypeTerms { active: false, ..terms() };
        assert_eq!(
            LoanService::validate_request(&inactive, &request(dec!(10), 12)).unwrap_err(),
            LoanError::LoanTypeInactive
        );
    }

    #[test]
    fn test_approve_builds_schedule() {
        let plan = LoanService::approve(
            LoanStatus::InReview,
            dec!(15000),
            dec!(18),
            12,
            first_payment(),
            None,
        )
        .unwrap();

        assert_eq!(plan.status, LoanStatus::Approved);
        assert_eq!(plan.monthly_payment, dec!(1375.20));
        assert_eq!(plan.total_payable, dec!(16502.40));
        assert_eq!(plan.outstanding_balance, plan.total_payable);
        assert_eq!(plan.schedule.rows.len(), 12);
        assert_eq!(plan.schedule.rows[11].balance, Decimal::ZERO);
    }

    #[rstest]
    #[case(LoanStatus::Approved)]
    #[case(LoanStatus::Rejected)]
    #[case(LoanStatus::Disbursed)]
    #[case(LoanStatus::Paid)]
    fn test_approve_invalid_states(#[case] status: LoanStatus) {
        let err = LoanService::approve(status, dec!(1000), dec!(12), 12, first_payment(), None)
            .unwrap_err();
        assert!(matches!(err, LoanError::InvalidTransition { .. }));
    }

    #[test]
    fn test_approve_gated_on_guarantors() {
        let check = GuarantorCheck {
            requires_guarantors: true,
            guarantor_count: 1,
            required_count: 2,
            satisfied: false,
        };
        assert_eq!(
            LoanService::approve(
                LoanStatus::Requested,
                dec!(1000),
                dec!(12),
                12,
                first_payment(),
                Some(&check)
            )
            .unwrap_err(),
            LoanError::GuarantorsRequired { required: 2, actual: 1 }
        );
    }

    #[test]
    fn test_reject_appends_reason() {
        let (status, notes) =
            LoanService::reject(LoanStatus::Requested, "low capacity", Some("first loan")).unwrap();
        assert_eq!(status, LoanStatus::Rejected);
        assert_eq!(notes, "first loan\nRejected: low capacity");

        assert_eq!(
            LoanService::reject(LoanStatus::Requested, "", None).unwrap_err(),
            LoanError::ReasonRequired
        );
        assert!(LoanService::reject(LoanStatus::Approved, "late", None).is_err());
    }

    #[test]
    fn test_disburse_and_close_out() {
        assert_eq!(
            LoanService::disburse(LoanStatus::Approved).unwrap(),
            LoanStatus::Disbursed
        );
        assert!(LoanService::disburse(LoanStatus::Requested).is_err());
        assert_eq!(
            LoanService::cancel(LoanStatus::InRepayment).unwrap(),
            LoanStatus::Cancelled
        );
        assert_eq!(
            LoanService::mark_defaulted(LoanStatus::InRepayment).unwrap(),
            LoanStatus::Defaulted
        );
        assert!(LoanService::ensure_editable(LoanStatus::Approved).is_err());
    }

    #[test]
    fn test_settle() {
        let first = LoanService::settle(LoanStatus::Disbursed, dec!(1000), dec!(100)).unwrap();
        assert_eq!(first.status, LoanStatus::InRepayment);
        assert_eq!(first.outstanding_balance, dec!(900));

        let last = LoanService::settle(LoanStatus::InRepayment, dec!(50), dec!(60)).unwrap();
        assert_eq!(last.status, LoanStatus::Paid);
        assert_eq!(last.outstanding_balance, Decimal::ZERO);

        assert_eq!(
            LoanService::settle(LoanStatus::Approved, dec!(50), dec!(10)).unwrap_err(),
            LoanError::PaymentNotAllowed(LoanStatus::Approved)
        );
    }
}
