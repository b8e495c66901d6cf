//! Property-based tests for AmortizationService.
//!
//! - Principal column sums to the loan principal
//! - Payment column sums to payment * n == total payable
//! - Balances never go negative and end at zero

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use super::service::AmortizationService;

/// Principal between 100.00 and 500,000.00.
fn principal_strategy() -> impl Strategy<Value = Decimal> {
    (10_000i64..50_000_000i64).prop_map(|cents| Decimal::new(cents, 2))
}

/// Annual rate between 0.00% and 36.00%.
fn rate_strategy() -> impl Strategy<Value = Decimal> {
    (0i64..=3_600i64).prop_map(|bp| Decimal::new(bp, 2))
}

fn first_due() -> impl Strategy<Value = NaiveDate> {
    (2024i32..2030, 1u32..=12, 1u32..=31).prop_map(|(y, m, d)| {
        NaiveDate::from_ymd_opt(y, m, d)
            .or_else(|| NaiveDate::from_ymd_opt(y, m, 28))
            .unwrap()
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(200))]

    #[test]
    fn prop_principal_sums_to_loan(
        principal in principal_strategy(),
        rate in rate_strategy(),
        term in 1i32..=120,
        due in first_due(),
    ) {
        let schedule = AmortizationService::generate_schedule(principal, rate, term, due).unwrap();
        let diff = (schedule.total_principal() - principal).abs();
        prop_assert!(diff <= Decimal::new(1, 2), "principal drift {}", diff);
    }

    #[test]
    fn prop_payments_sum_to_total_payable(
        principal in principal_strategy(),
        rate in rate_strategy(),
        term in 1i32..=120,
        due in first_due(),
    ) {
        let schedule = AmortizationService::generate_schedule(principal, rate, term, due).unwrap();
        let paid: Decimal = schedule.rows.iter().map(|r| r.payment).sum();
        prop_assert_eq!(paid, schedule.monthly_payment * Decimal::from(term));
        prop_assert_eq!(paid, schedule.total_payable);
    }

    #[test]
    fn prop_balances_non_negative_and_closed(
        principal in principal_strategy(),
        rate in rate_strategy(),
        term in 1i32..=120,
        due in first_due(),
    ) {
        let schedule = AmortizationService::generate_schedule(principal, rate, term, due).unwrap();
        for row in &schedule.rows {
            prop_assert!(row.balance >= Decimal::ZERO);
            prop_assert!(row.interest >= Decimal::ZERO);
        }
        prop_assert_eq!(schedule.rows.last().unwrap().balance, Decimal::ZERO);
        let len = usize::try_from(term).unwrap();
        prop_assert_eq!(schedule.rows.len(), len);
    }

    #[test]
    fn prop_due_dates_strictly_increase(
        principal in principal_strategy(),
        term in 2i32..=60,
        due in first_due(),
    ) {
        let schedule = AmortizationService::generate_schedule(principal, Decimal::new(12, 0), term, due).unwrap();
        for pair in schedule.rows.windows(2) {
            prop_assert!(pair[0].due_date < pair[1].due_date);
        }
    }
}
