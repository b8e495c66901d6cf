//! Dividend period service.

use chrono::NaiveDate;
use coopbank_shared::types::{is_whole_cents, round_money};
use rust_decimal::{Decimal, RoundingStrategy};
use uuid::Uuid;

use super::error::DividendError;
use super::types::{
    BalancePoint, DividendAllocation, DividendPeriodSnapshot, DividendPeriodStatus,
    MemberEligibility,
};
use crate::fund::PeriodBounds;

/// Loans a member must have held during the year to share in the pool.
pub const MIN_QUALIFYING_LOANS: u32 = 2;

const FIRST_YEAR: i32 = 2000;
const LAST_YEAR: i32 = 2100;

/// Stateless service for dividend periods.
pub struct DividendService;

impl DividendService {
    /// Validates a new period and returns January 1 to December 31.
    pub fn open_period(year: i32, already_exists: bool) -> Result<PeriodBounds, DividendError> {
        if !(FIRST_YEAR..=LAST_YEAR).contains(&year) {
            return Err(DividendError::InvalidYear(year));
        }
        if already_exists {
            return Err(DividendError::DuplicatePeriod(year));
        }
        let start_date = NaiveDate::from_ymd_opt(year, 1, 1).ok_or(DividendError::InvalidYear(year))?;
        let end_date = NaiveDate::from_ymd_opt(year, 12, 31).ok_or(DividendError::InvalidYear(year))?;
        Ok(PeriodBounds { start_date, end_date })
    }

    /// OPEN -> CLOSED, fixing the interest generated during the year.
    pub fn close_period(
        period: &DividendPeriodSnapshot,
        interest_generated: Decimal,
    ) -> Result<DividendPeriodStatus, DividendError> {
        Self::require_status(period, DividendPeriodStatus::Open, DividendPeriodStatus::Closed)?;
        if interest_generated < Decimal::ZERO || !is_whole_cents(interest_generated) {
            return Err(DividendError::InvalidAmount(interest_generated));
        }
        Ok(DividendPeriodStatus::Closed)
    }

    /// Splits what is left of the pool among `members`.
    ///
    /// A member qualifies with at least `min_loans` loans and a positive
    /// average fixed balance. Qualifying members share pro rata to that
    /// balance; every amount is truncated to the cent, so the sum never
    /// exceeds the pool.
    pub fn allocate(
        period: &DividendPeriodSnapshot,
        members: &[MemberEligibility],
        min_loans: u32,
    ) -> Result<Vec<DividendAllocation>, DividendError> {
        Self::require_status(period, DividendPeriodStatus::Closed, DividendPeriodStatus::Distributed)?;

        let pool = period.remaining();
        let qualifies =
            |m: &MemberEligibility| m.loan_count >= min_loans && m.average_fixed_balance > Decimal::ZERO;
        let weight: Decimal = members
            .iter()
            .filter(|m| qualifies(m))
            .map(|m| m.average_fixed_balance)
            .sum();

        Ok(members
            .iter()
            .map(|m| {
                let qualifies = qualifies(m) && weight > Decimal::ZERO;
                let (share_pct, amount) = if qualifies {
                    let ratio = m.average_fixed_balance / weight;
                    (
                        round_money(ratio * Decimal::ONE_HUNDRED),
                        (pool * ratio).round_dp_with_strategy(2, RoundingStrategy::ToZero),
                    )
                } else {
                    (Decimal::ZERO, Decimal::ZERO)
                };
                DividendAllocation {
                    member_id: m.member_id,
                    average_fixed_balance: m.average_fixed_balance,
                    loan_count: m.loan_count,
                    qualifies,
                    share_pct,
                    amount,
                }
            })
            .collect())
    }

    /// Day-weighted average balance between `start` and `end`, inclusive.
    ///
    /// `opening` is the balance at the start of `start`. Each point is the
    /// balance after a change on that day; the last point of a day is what
    /// counts for the day. Points outside the range are ignored.
    #[must_use]
    pub fn average_balance(
        opening: Decimal,
        points: &[BalancePoint],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Decimal {
        if end < start {
            return Decimal::ZERO;
        }
        let mut points: Vec<_> = points
            .iter()
            .filter(|p| p.on >= start && p.on <= end)
            .collect();
        points.sort_by_key(|p| p.on);

        let mut balance = opening;
        let mut day = start;
        let mut weighted = Decimal::ZERO;
        for point in points {
            if point.on > day {
                weighted += balance * Decimal::from((point.on - day).num_days());
                day = point.on;
            }
            balance = point.balance;
        }
        weighted += balance * Decimal::from((end - day).num_days() + 1);

        round_money(weighted / Decimal::from((end - start).num_days() + 1))
    }

    /// Validates crediting dividend `dividend_id` and returns the new
    /// distributed total.
    pub fn credit(
        period: &DividendPeriodSnapshot,
        dividend_id: Uuid,
        amount: Decimal,
        already_credited: bool,
    ) -> Result<Decimal, DividendError> {
        Self::require_status(period, DividendPeriodStatus::Closed, DividendPeriodStatus::Distributed)?;
        if already_credited {
            return Err(DividendError::AlreadyCredited(dividend_id));
        }
        if amount < Decimal::ZERO || !is_whole_cents(amount) {
            return Err(DividendError::InvalidAmount(amount));
        }
        if amount > period.remaining() {
            return Err(DividendError::ExceedsPool {
                remaining: period.remaining(),
                amount,
            });
        }
        Ok(period.total_distributed + amount)
    }

    /// CLOSED -> DISTRIBUTED once shares exist and none is pending.
    pub fn finish(
        period: &DividendPeriodSnapshot,
        calculated: u64,
        pending: u64,
    ) -> Result<DividendPeriodStatus, DividendError> {
        Self::require_status(period, DividendPeriodStatus::Closed, DividendPeriodStatus::Distributed)?;
        if calculated == 0 {
            return Err(DividendError::NotCalculated(period.year));
        }
        if pending > 0 {
            return Err(DividendError::PendingCredits(pending));
        }
        Ok(DividendPeriodStatus::Distributed)
    }

    fn require_status(
        period: &DividendPeriodSnapshot,
        expected: DividendPeriodStatus,
        to: DividendPeriodStatus,
    ) -> Result<(), DividendError> {
        if period.status == expected {
            Ok(())
        } else {
            Err(DividendError::InvalidTransition {
                from: period.status,
                to,
            })
        }
    }
}
