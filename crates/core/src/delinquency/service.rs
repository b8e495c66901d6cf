//! Delinquency service.

use chrono::NaiveDate;
use coopbank_shared::types::round_money;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::loan::{InstallmentSnapshot, InstallmentStatus};

/// Default daily penalty rate, in percent of the installment payment.
pub const DEFAULT_DAILY_RATE_PCT: Decimal = Decimal::from_parts(10, 0, 0, false, 2);

/// Penalty state derived for one installment on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Accrual {
    /// Days past the due date.
    pub days_late: i32,
    /// Total penalty owed as of the day (not an increment).
    pub penalty: Decimal,
    /// Always `Overdue`.
    pub status: InstallmentStatus,
}

/// Stateless service for penalty accrual.
pub struct DelinquencyService;

impl DelinquencyService {
    /// Whole days between `due_date` and `as_of`, zero when not yet late.
    #[must_use]
    pub fn days_late(due_date: NaiveDate, as_of: NaiveDate) -> i32 {
        let days = (as_of - due_date).num_days().max(0);
        i32::try_from(days).unwrap_or(i32::MAX)
    }

    /// `round(payment * rate / 100 * days)`.
    #[must_use]
    pub fn penalty_for(payment: Decimal, daily_rate_pct: Decimal, days_late: i32) -> Decimal {
        if days_late <= 0 {
            return Decimal::ZERO;
        }
        round_money(payment * daily_rate_pct / Decimal::ONE_HUNDRED * Decimal::from(days_late))
    }

    /// Moves a PENDING installment past its due date to OVERDUE.
    ///
    /// Returns `None` for any other installment.
    #[must_use]
    pub fn accrue_penalty(
        installment: &InstallmentSnapshot,
        as_of: NaiveDate,
        daily_rate_pct: Decimal,
    ) -> Option<Accrual> {
        if installment.status != InstallmentStatus::Pending {
            return None;
        }
        Self::derive(installment, as_of, daily_rate_pct)
    }

    /// Re-derives the penalty of an installment already OVERDUE.
    #[must_use]
    pub fn recalculate_penalty(
        installment: &InstallmentSnapshot,
        as_of: NaiveDate,
        daily_rate_pct: Decimal,
    ) -> Option<Accrual> {
        if installment.status != InstallmentStatus::Overdue {
            return None;
        }
        Self::derive(installment, as_of, daily_rate_pct)
    }

    /// Accrues or recalculates, whichever applies to the installment state.
    #[must_use]
    pub fn refresh(
        installment: &InstallmentSnapshot,
        as_of: NaiveDate,
        daily_rate_pct: Decimal,
    ) -> Option<Accrual> {
        Self::accrue_penalty(installment, as_of, daily_rate_pct)
            .or_else(|| Self::recalculate_penalty(installment, as_of, daily_rate_pct))
    }

    /// True for a PENDING installment due within the next `window_days`.
    #[must_use]
    pub fn is_due_soon(
        status: InstallmentStatus,
        due_date: NaiveDate,
        as_of: NaiveDate,
        window_days: u32,
    ) -> bool {
        if status != InstallmentStatus::Pending {
            return false;
        }
        let ahead = (due_date - as_of).num_days();
        ahead >= 0 && ahead <= i64::from(window_days)
    }

    /// Overdue reminders go out on day 1 and every `interval_days` after.
    #[must_use]
    pub fn overdue_reminder_due(days_late: i32, interval_days: u32) -> bool {
        if days_late < 1 {
            return false;
        }
        if interval_days == 0 {
            return days_late == 1;
        }
        i64::from(days_late - 1) % i64::from(interval_days) == 0
    }

    fn derive(
        installment: &InstallmentSnapshot,
        as_of: NaiveDate,
        daily_rate_pct: Decimal,
    ) -> Option<Accrual> {
        if installment.due_date >= as_of {
            return None;
        }
        let days_late = Self::days_late(installment.due_date, as_of);
        Some(Accrual {
            days_late,
            penalty: Self::penalty_for(installment.payment, daily_rate_pct, days_late),
            status: InstallmentStatus::Overdue,
        })
    }
}
