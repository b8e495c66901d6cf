//! Property tests for penalty accrual.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::service::DelinquencyService;
use crate::loan::{InstallmentSnapshot, InstallmentStatus};

fn installment(payment_cents: i64, due: NaiveDate) -> InstallmentSnapshot {
    InstallmentSnapshot {
        id: Uuid::nil(),
        number: 1,
        payment: Decimal::new(payment_cents, 2),
        principal: Decimal::new(payment_cents, 2),
        interest: Decimal::ZERO,
        penalty: Decimal::ZERO,
        principal_paid: Decimal::ZERO,
        interest_paid: Decimal::ZERO,
        penalty_paid: Decimal::ZERO,
        due_date: due,
        days_late: 0,
        status: InstallmentStatus::Pending,
    }
}

proptest! {
    /// Accruing, then re-running for the same day, yields the same state.
    #[test]
    fn prop_accrual_is_idempotent(
        payment_cents in 100i64..10_000_000,
        days in 1u64..720,
        rate_bp in 1i64..100,
    ) {
        let due = NaiveDate::from_ymd_opt(2025, 1, 15).unwrap();
        let as_of = due.checked_add_days(Days::new(days)).unwrap();
        let rate = Decimal::new(rate_bp, 2);

        let mut inst = installment(payment_cents, due);
        let first = DelinquencyService::accrue_penalty(&inst, as_of, rate).unwrap();
        inst.status = first.status;
        inst.penalty = first.penalty;
        inst.days_late = first.days_late;

        prop_assert!(DelinquencyService::accrue_penalty(&inst, as_of, rate).is_none());
        let again = DelinquencyService::recalculate_penalty(&inst, as_of, rate).unwrap();
        prop_assert_eq!(again, first);
    }

    /// The penalty never shrinks as the day count grows.
    #[test]
    fn prop_penalty_monotonic(
        payment_cents in 100i64..10_000_000,
        days in 0i32..1000,
    ) {
        let payment = Decimal::new(payment_cents, 2);
        let rate = Decimal::new(10, 2);
        prop_assert!(
            DelinquencyService::penalty_for(payment, rate, days + 1)
                >= DelinquencyService::penalty_for(payment, rate, days)
        );
    }
}
