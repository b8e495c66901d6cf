//! Guarantor rules, borrowing ceiling and payment capacity.

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::error::LoanError;
use super::types::{LoanStatus, LoanTypeTerms};

/// Guarantor coverage of a loan, exposed to the approval caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GuarantorCheck {
    /// Loan type requires guarantors.
    pub requires_guarantors: bool,
    /// Active guarantors on the loan.
    pub guarantor_count: i32,
    /// Guarantors required by the loan type.
    pub required_count: i32,
    /// `!requires_guarantors || guarantor_count >= required_count`.
    pub satisfied: bool,
}

/// Outcome of the borrowing ceiling check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum Eligibility {
    /// Member has no open fixed-savings account.
    NoFixedSavings,
    /// Amount fits under the savings ceiling; no guarantors needed.
    WithinSavings {
        /// Fixed savings balance times the type multiplier.
        max_without_guarantors: Decimal,
    },
    /// Amount exceeds the ceiling; guarantors make it eligible.
    RequiresGuarantors {
        /// Ceiling without guarantors.
        max_without_guarantors: Decimal,
        /// Guarantors needed.
        required: i32,
    },
    /// Amount exceeds the ceiling and the type takes no guarantors.
    ExceedsLimit {
        /// Ceiling without guarantors.
        max_without_guarantors: Decimal,
    },
}

impl Eligibility {
    /// Returns true if the request may proceed.
    #[must_use]
    pub fn is_eligible(&self) -> bool {
        matches!(self, Self::WithinSavings { .. } | Self::RequiresGuarantors { .. })
    }
}

/// Result of the payroll capacity check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PaymentCapacity {
    /// Monthly installments including the new one.
    pub total_installments: Decimal,
    /// Estimated capacity.
    pub estimated_capacity: Decimal,
    /// `total_installments <= estimated_capacity`.
    pub can_pay: bool,
}

/// Stateless guarantor and eligibility rules.
pub struct GuarantorService;

impl GuarantorService {
    /// Validates adding `guarantor_id` to a loan of `borrower_id`.
    pub fn validate_add(
        status: LoanStatus,
        borrower_id: Uuid,
        guarantor_id: Uuid,
        guarantor_active: bool,
        existing: &[Uuid],
    ) -> Result<(), LoanError> {
        if !status.is_editable() {
            return Err(LoanError::NotEditable(status));
        }
        if borrower_id == guarantor_id {
            return Err(LoanError::SelfGuarantee);
        }
        if existing.contains(&guarantor_id) {
            return Err(LoanError::DuplicateGuarantor);
        }
        if !guarantor_active {
            return Err(LoanError::GuarantorInactive);
        }
        Ok(())
    }

    /// Guarantor coverage for a loan type and active guarantor count.
    #[must_use]
    pub fn check(terms: &LoanTypeTerms, guarantor_count: i32) -> GuarantorCheck {
        let requires_guarantors = terms.requires_guarantors && terms.required_guarantors > 0;
        GuarantorCheck {
            requires_guarantors,
            guarantor_count,
            required_count: terms.required_guarantors,
            satisfied: !requires_guarantors || guarantor_count >= terms.required_guarantors,
        }
    }

    /// Borrowing ceiling: fixed savings balance times the type multiplier.
    #[must_use]
    pub fn eligibility(
        fixed_savings_balance: Option<Decimal>,
        terms: &LoanTypeTerms,
        requested: Decimal,
    ) -> Eligibility {
        let Some(balance) = fixed_savings_balance else {
            return Eligibility::NoFixedSavings;
        };

        let max_without_guarantors = balance * terms.savings_multiplier;
        if requested <= max_without_guarantors {
            Eligibility::WithinSavings {
                max_without_guarantors,
            }
        } else if terms.requires_guarantors {
            Eligibility::RequiresGuarantors {
                max_without_guarantors,
                required: terms.required_guarantors,
            }
        } else {
            Eligibility::ExceedsLimit {
                max_without_guarantors,
            }
        }
    }

    /// Installments may not exceed 40% of an income estimated as ten times
    /// the member's monthly payroll savings.
    #[must_use]
    pub fn payment_capacity(
        current_installments: Decimal,
        new_installment: Decimal,
        monthly_payroll_savings: Decimal,
    ) -> PaymentCapacity {
        let total_installments = current_installments + new_installment;
        let estimated_capacity = monthly_payroll_savings * Decimal::TEN * Decimal::new(40, 2);
        PaymentCapacity {
            total_installments,
            estimated_capacity,
            can_pay: total_installments <= estimated_capacity,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn terms(requires: bool) -> LoanTypeTerms {
        LoanTypeTerms {
            annual_rate_pct: dec!(12),
            savings_multiplier: dec!(3),
            min_term_months: 1,
            max_term_months: 60,
            requires_guarantors: requires,
            required_guarantors: if requires { 2 } else { 0 },
            active: true,
        }
    }

    #[test]
    fn test_validate_add() {
        let borrower = Uuid::new_v4();
        let guarantor = Uuid::new_v4();
        assert!(GuarantorService::validate_add(LoanStatus::Requested, borrower, guarantor, true, &[]).is_ok());
        assert_eq!(
            GuarantorService::validate_add(LoanStatus::Requested, borrower, borrower, true, &[])
                .unwrap_err(),
            LoanError::SelfGuarantee
        );
        assert_eq!(
            GuarantorService::validate_add(LoanStatus::Requested, borrower, guarantor, true, &[guarantor])
                .unwrap_err(),
            LoanError::DuplicateGuarantor
        );
        assert_eq!(
            GuarantorService::validate_add(LoanStatus::Approved, borrower, guarantor, true, &[])
                .unwrap_err(),
            LoanError::NotEditable(LoanStatus::Approved)
        );
        assert_eq!(
            GuarantorService::validate_add(LoanStatus::InReview, borrower, guarantor, false, &[])
                .unwrap_err(),
            LoanError::GuarantorInactive
        );
    }

    #[test]
    fn test_check() {
        let check = GuarantorService::check(&terms(true), 1);
        assert!(check.requires_guarantors);
        assert!(!check.satisfied);
        assert!(GuarantorService::check(&terms(true), 2).satisfied);
        assert!(GuarantorService::check(&terms(false), 0).satisfied);
    }

    #[test]
    fn test_eligibility() {
        assert_eq!(
            GuarantorService::eligibility(None, &terms(true), dec!(100)),
            Eligibility::NoFixedSavings
        );
        assert_eq!(
            GuarantorService::eligibility(Some(dec!(1000)), &terms(true), dec!(3000)),
            Eligibility::WithinSavings {
                max_without_guarantors: dec!(3000)
            }
        );
        assert_eq!(
            GuarantorService::eligibility(Some(dec!(1000)), &terms(true), dec!(3000.01)),
            Eligibility::RequiresGuarantors {
                max_without_guarantors: dec!(3000),
                required: 2
            }
        );
        let over = GuarantorService::eligibility(Some(dec!(1000)), &terms(false), dec!(5000));
        assert!(!over.is_eligible());
    }

    #[test]
    fn test_payment_capacity() {
        let capacity = GuarantorService::payment_capacity(dec!(300), dec!(500), dec!(200));
        assert_eq!(capacity.estimated_capacity, dec!(800));
        assert!(capacity.can_pay);
        assert!(!GuarantorService::payment_capacity(dec!(300), dec!(500.01), dec!(200)).can_pay);
    }
}
