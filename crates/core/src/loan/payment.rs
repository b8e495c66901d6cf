//! Loan payment allocation.
//!
//! A payment first settles the installment's penalty (re-derived for the
//! payment date), then interest and principal. A payment covering everything
//! still owed on the installment settles it; any excess becomes extra
//! principal.

use chrono::NaiveDate;
use coopbank_shared::types::round_money;
use rust_decimal::Decimal;
use serde::Serialize;

use super::error::LoanError;
use super::service::{LoanBalanceUpdate, LoanService};
use super::types::{InstallmentSnapshot, InstallmentStatus, LoanStatus};
use crate::delinquency::DelinquencyService;

/// New installment state after a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct InstallmentUpdate {
    /// Penalty as re-derived on the payment date.
    pub penalty: Decimal,
    /// Days late on the payment date.
    pub days_late: i32,
    /// Cumulative penalty paid.
    pub penalty_paid: Decimal,
    /// Cumulative interest paid.
    pub interest_paid: Decimal,
    /// Cumulative principal paid.
    pub principal_paid: Decimal,
    /// Resulting state.
    pub status: InstallmentStatus,
    /// Set when the installment is settled.
    pub paid_on: Option<NaiveDate>,
}

/// How a payment splits into penalty, interest and principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentAllocation {
    /// Penalty portion.
    pub penalty: Decimal,
    /// Interest portion.
    pub interest: Decimal,
    /// Principal portion, including `extra_principal`.
    pub principal: Decimal,
    /// Amount paid beyond what the installment owed.
    pub extra_principal: Decimal,
    /// Installment changes, if an installment was targeted.
    pub installment: Option<InstallmentUpdate>,
}

impl PaymentAllocation {
    /// Sum of all portions; equals the amount paid.
    #[must_use]
    pub fn total(&self) -> Decimal {
        self.penalty + self.interest + self.principal
    }
}

/// Allocation plus the resulting loan balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentPlan {
    /// Split of the payment.
    pub allocation: PaymentAllocation,
    /// Loan balance and status after the payment.
    pub loan: LoanBalanceUpdate,
}

/// Stateless payment allocation.
pub struct PaymentService;

impl PaymentService {
    /// Oldest unsettled installment, used when the caller names none.
    #[must_use]
    pub fn target(installments: &[InstallmentSnapshot]) -> Option<&InstallmentSnapshot> {
        installments
            .iter()
            .filter(|i| !i.status.is_settled())
            .min_by_key(|i| i.number)
    }

    /// Plans a payment against a loan and, optionally, one installment.
    pub fn plan(
        status: LoanStatus,
        outstanding_balance: Decimal,
        installment: Option<&InstallmentSnapshot>,
        amount: Decimal,
        as_of: NaiveDate,
        daily_rate_pct: Decimal,
    ) -> Result<PaymentPlan, LoanError> {
        if !status.accepts_payments() {
            return Err(LoanError::PaymentNotAllowed(status));
        }
        let allocation = Self::allocate(installment, amount, as_of, daily_rate_pct)?;
        let loan = LoanService::settle(status, outstanding_balance, amount)?;
        Ok(PaymentPlan { allocation, loan })
    }

    /// Splits `amount` over the installment's dues.
    pub fn allocate(
        installment: Option<&InstallmentSnapshot>,
        amount: Decimal,
        as_of: NaiveDate,
        daily_rate_pct: Decimal,
    ) -> Result<PaymentAllocation, LoanError> {
        LoanService::require_amount(amount)?;

        let Some(current) = installment else {
            return Ok(PaymentAllocation {
                penalty: Decimal::ZERO,
                interest: Decimal::ZERO,
                principal: amount,
                extra_principal: Decimal::ZERO,
                installment: None,
            });
        };

        if current.status.is_settled() {
            return Err(LoanError::InstallmentAlreadyPaid(current.number));
        }

        let mut inst = current.clone();
        if let Some(accrual) = DelinquencyService::refresh(current, as_of, daily_rate_pct) {
            inst.penalty = accrual.penalty;
            inst.days_late = accrual.days_late;
            inst.status = accrual.status;
        }

        let owed = inst.total_due();
        if amount >= owed {
            let extra = amount - owed;
            let status = if inst.days_late > 0 {
                InstallmentStatus::PaidLate
            } else {
                InstallmentStatus::Paid
            };
            return Ok(PaymentAllocation {
                penalty: inst.penalty_due(),
                interest: inst.interest_due(),
                principal: inst.principal_due() + extra,
                extra_principal: extra,
                installment: Some(InstallmentUpdate {
                    penalty: inst.penalty,
                    days_late: inst.days_late,
                    penalty_paid: inst.penalty.max(inst.penalty_paid),
                    interest_paid: inst.interest.max(inst.interest_paid),
                    principal_paid: inst.principal.max(inst.principal_paid),
                    status,
                    paid_on: Some(as_of),
                }),
            });
        }

        let penalty = amount.min(inst.penalty_due());
        let rest = amount - penalty;
        let interest_due = inst.interest_due();
        let principal_due = inst.principal_due();

        let proportional = if inst.payment > Decimal::ZERO {
            round_money(rest * inst.interest / inst.payment)
        } else {
            Decimal::ZERO
        };
        let floor = (rest - principal_due).max(Decimal::ZERO);
        let ceiling = interest_due.min(rest);
        let interest = proportional.max(floor).min(ceiling);
        let principal = rest - interest;

        Ok(PaymentAllocation {
            penalty,
            interest,
            principal,
            extra_principal: Decimal::ZERO,
            installment: Some(InstallmentUpdate {
                penalty: inst.penalty,
                days_late: inst.days_late,
                penalty_paid: inst.penalty_paid + penalty,
                interest_paid: inst.interest_paid + interest,
                principal_paid: inst.principal_paid + principal,
                status: inst.status,
                paid_on: None,
            }),
        })
    }
}
