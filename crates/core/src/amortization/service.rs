//! Annuity payment and schedule computation.

use chrono::{Months, NaiveDate};
use coopbank_shared::types::round_money;
use rust_decimal::Decimal;

use super::error::AmortizationError;
use super::types::{Schedule, ScheduleRow};

/// Stateless amortization calculator.
///
/// All arithmetic is `Decimal`; the only rounding step is cents, half-up,
/// applied to the payment and to each row's interest.
pub struct AmortizationService;

impl AmortizationService {
    /// Monthly rate for an annual percentage rate (`18` -> `0.015`).
    #[must_use]
    pub fn monthly_rate(annual_rate_pct: Decimal) -> Decimal {
        annual_rate_pct / Decimal::ONE_HUNDRED / Decimal::from(12)
    }

    /// Computes the fixed monthly payment `P*r*(1+r)^n / ((1+r)^n - 1)`.
    ///
    /// A zero rate degenerates to `P / n`.
    pub fn compute_monthly_payment(
        principal: Decimal,
        annual_rate_pct: Decimal,
        term_months: i32,
    ) -> Result<Decimal, AmortizationError> {
        Self::validate(principal, annual_rate_pct, term_months)?;

        let r = Self::monthly_rate(annual_rate_pct);
        let n = Decimal::from(term_months);
        if r.is_zero() {
            return Ok(round_money(principal / n));
        }

        let factor = Self::compound(r, term_months)?;
        let numerator = principal
            .checked_mul(r)
            .and_then(|v| v.checked_mul(factor))
            .ok_or(AmortizationError::Overflow)?;
        let payment = numerator
            .checked_div(factor - Decimal::ONE)
            .ok_or(AmortizationError::Overflow)?;

        Ok(round_money(payment))
    }

    /// Generates the full schedule starting at `first_due_date`.
    ///
    /// Row `k` falls due `k - 1` calendar months after the first due date,
    /// clamped to the end of shorter months. The final row takes whatever
    /// principal remains so the principal column sums to `principal`.
    pub fn generate_schedule(
        principal: Decimal,
        annual_rate_pct: Decimal,
        term_months: i32,
        first_due_date: NaiveDate,
    ) -> Result<Schedule, AmortizationError> {
        let payment = Self::compute_monthly_payment(principal, annual_rate_pct, term_months)?;
        let r = Self::monthly_rate(annual_rate_pct);

        let mut rows = Vec::with_capacity(usize::try_from(term_months).unwrap_or_default());
        let mut balance = principal;

        for number in 1..=term_months {
            let due_date = Self::due_date(first_due_date, number)?;
            let mut interest = round_money(balance * r);
            let mut principal_part = payment - interest;

            if number == term_months {
                principal_part = balance;
                interest = (payment - principal_part).max(Decimal::ZERO);
                balance = Decimal::ZERO;
            } else {
                balance = (balance - principal_part).max(Decimal::ZERO);
            }

            rows.push(ScheduleRow {
                number,
                due_date,
                payment,
                principal: principal_part,
                interest,
                balance,
            });
        }

        let total_payable = payment * Decimal::from(term_months);
        Ok(Schedule {
            monthly_payment: payment,
            rows,
            total_payable,
            total_interest: (total_payable - principal).max(Decimal::ZERO),
        })
    }

    /// Due date of installment `number` given the first due date.
    pub fn due_date(first_due_date: NaiveDate, number: i32) -> Result<NaiveDate, AmortizationError> {
        let offset = u32::try_from(number - 1).map_err(|_| AmortizationError::InvalidTerm(number))?;
        first_due_date
            .checked_add_months(Months::new(offset))
            .ok_or(AmortizationError::DateOutOfRange)
    }

    fn validate(
        principal: Decimal,
        annual_rate_pct: Decimal,
        term_months: i32,
    ) -> Result<(), AmortizationError> {
        if term_months <= 0 {
            return Err(AmortizationError::InvalidTerm(term_months));
        }
        if principal <= Decimal::ZERO {
            return Err(AmortizationError::InvalidPrincipal(principal));
        }
        if annual_rate_pct < Decimal::ZERO {
            return Err(AmortizationError::InvalidRate(annual_rate_pct));
        }
        Ok(())
    }

    fn compound(r: Decimal, n: i32) -> Result<Decimal, AmortizationError> {
        let base = Decimal::ONE + r;
        let mut acc = Decimal::ONE;
        for _ in 0..n {
            acc = acc.checked_mul(base).ok_or(AmortizationError::Overflow)?;
        }
        Ok(acc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_payment_eighteen_percent_twelve_months() {
        let payment =
            AmortizationService::compute_monthly_payment(dec!(15000), dec!(18), 12).unwrap();
        assert_eq!(payment, dec!(1375.20));
    }

    #[test]
    fn test_payment_zero_rate() {
        let payment = AmortizationService::compute_monthly_payment(dec!(1200), dec!(0), 12).unwrap();
        assert_eq!(payment, dec!(100.00));
    }

    #[rstest]
    #[case(0)]
    #[case(-3)]
    fn test_invalid_term(#[case] term: i32) {
        let err = AmortizationService::compute_monthly_payment(dec!(1000), dec!(12), term).unwrap_err();
        assert_eq!(err, AmortizationError::InvalidTerm(term));
        assert_eq!(err.error_code(), "INVALID_TERM");
    }

    #[test]
    fn test_invalid_principal_and_rate() {
        assert_eq!(
            AmortizationService::compute_monthly_payment(dec!(0), dec!(12), 12).unwrap_err(),
            AmortizationError::InvalidPrincipal(dec!(0))
        );
        assert_eq!(
            AmortizationService::compute_monthly_payment(dec!(100), dec!(-1), 12).unwrap_err(),
            AmortizationError::InvalidRate(dec!(-1))
        );
    }

    #[test]
    fn test_schedule_scenario() {
        let schedule =
            AmortizationService::generate_schedule(dec!(15000), dec!(18), 12, date(2026, 2, 15))
                .unwrap();

        assert_eq!(schedule.rows.len(), 12);
        assert_eq!(schedule.monthly_payment, dec!(1375.20));
        assert_eq!(schedule.total_payable, dec!(16502.40));
        assert_eq!(schedule.total_interest, dec!(1502.40));
        assert_eq!(schedule.total_principal(), dec!(15000));

        let first = &schedule.rows[0];
        assert_eq!(first.interest, dec!(225.00));
        assert_eq!(first.principal, dec!(1150.20));
        assert_eq!(first.balance, dec!(13849.80));
        assert_eq!(first.due_date, date(2026, 2, 15));

        let last = schedule.rows.last().unwrap();
        assert_eq!(last.balance, Decimal::ZERO);
        assert_eq!(last.due_date, date(2027, 1, 15));
    }

    #[test]
    fn test_due_dates_clamp_to_month_end() {
        let schedule =
            AmortizationService::generate_schedule(dec!(3000), dec!(12), 4, date(2028, 1, 31))
                .unwrap();
        let dates: Vec<_> = schedule.rows.iter().map(|r| r.due_date).collect();
        assert_eq!(
            dates,
            vec![date(2028, 1, 31), date(2028, 2, 29), date(2028, 3, 31), date(2028, 4, 30)]
        );
    }

    #[test]
    fn test_zero_rate_final_row_absorbs_remainder() {
        let schedule =
            AmortizationService::generate_schedule(dec!(100), dec!(0), 3, date(2026, 1, 10)).unwrap();
        assert_eq!(schedule.monthly_payment, dec!(33.33));
        assert_eq!(schedule.rows[2].principal, dec!(33.34));
        assert_eq!(schedule.rows[2].interest, Decimal::ZERO);
        assert_eq!(schedule.total_principal(), dec!(100));

        assert_eq!(schedule.total_payable, dec!(99.99));
        assert_eq!(schedule.total_interest, Decimal::ZERO);
        for row in &schedule.rows[..2] {
            assert_eq!(row.principal + row.interest, row.payment);
        }
    }
}
