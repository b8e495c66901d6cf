//! Property tests for payment allocation.

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::payment::PaymentService;
use super::types::{InstallmentSnapshot, InstallmentStatus};

fn installment(payment_cents: i64, interest_pct: i64, due: NaiveDate) -> InstallmentSnapshot {
    let payment = Decimal::new(payment_cents, 2);
    let interest = Decimal::new(payment_cents * interest_pct / 100, 2);
    InstallmentSnapshot {
        id: Uuid::nil(),
        number: 1,
        payment,
        principal: payment - interest,
        interest,
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
    /// Portions always sum to the amount paid and never go negative.
    #[test]
    fn prop_allocation_sums_to_amount(
        payment_cents in 1_000i64..5_000_000,
        interest_pct in 0i64..90,
        amount_cents in 1i64..6_000_000,
        days in 0u64..120,
    ) {
        let due = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let as_of = due.checked_add_days(Days::new(days)).unwrap();
        let inst = installment(payment_cents, interest_pct, due);
        let amount = Decimal::new(amount_cents, 2);

        let allocation = PaymentService::allocate(Some(&inst), amount, as_of, Decimal::new(10, 2)).unwrap();
        prop_assert_eq!(allocation.total(), amount);
        prop_assert!(allocation.penalty >= Decimal::ZERO);
        prop_assert!(allocation.interest >= Decimal::ZERO);
        prop_assert!(allocation.principal >= Decimal::ZERO);
        prop_assert!(allocation.interest <= inst.interest);
    }

    /// Repeated partial payments eventually settle the installment without
    /// overpaying any component.
    #[test]
    fn prop_partials_settle(
        payment_cents in 1_000i64..500_000,
        interest_pct in 0i64..90,
        slices in 2usize..8,
    ) {
        let due = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
        let mut inst = installment(payment_cents, interest_pct, due);
        let slices_i64 = i64::try_from(slices).unwrap();
        let slice = Decimal::new(payment_cents / slices_i64 + 1, 2);

        for _ in 0..=slices {
            if inst.status.is_settled() {
                break;
            }
            let allocation = PaymentService::allocate(Some(&inst), slice, due, Decimal::new(10, 2)).unwrap();
            let update = allocation.installment.unwrap();
            prop_assert!(update.interest_paid <= inst.interest);
            prop_assert!(update.principal_paid <= inst.principal);
            inst.interest_paid = update.interest_paid;
            inst.principal_paid = update.principal_paid;
            inst.penalty_paid = update.penalty_paid;
            inst.status = update.status;
        }
        prop_assert_eq!(inst.status, InstallmentStatus::Paid);
    }
}
