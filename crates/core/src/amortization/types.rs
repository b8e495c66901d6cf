//! Amortization schedule types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One row of an amortization schedule.
///
/// `principal + interest == payment` on every row except possibly the last.
/// The last row carries the leftover balance as principal, which can exceed
/// the payment by the cents lost to rounding (e.g. 100.00 over 3 months at
/// 0% pays 33.33 but the last row's principal is 33.34).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScheduleRow {
    /// Installment number, 1-based.
    pub number: i32,
    /// Due date.
    pub due_date: NaiveDate,
    /// Scheduled payment (constant across rows).
    pub payment: Decimal,
    /// Principal portion.
    pub principal: Decimal,
    /// Interest portion.
    pub interest: Decimal,
    /// Balance remaining after this row.
    pub balance: Decimal,
}

/// A complete schedule with its totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule {
    /// Fixed monthly payment.
    pub monthly_payment: Decimal,
    /// Rows in due-date order.
    pub rows: Vec<ScheduleRow>,
    /// `monthly_payment * term`.
    pub total_payable: Decimal,
    /// `total_payable - principal`, floored at zero when rounding leaves
    /// `total_payable` a few cents under the principal.
    pub total_interest: Decimal,
}

impl Schedule {
    /// Sum of the principal column.
    #[must_use]
    pub fn total_principal(&self) -> Decimal {
        self.rows.iter().map(|r| r.principal).sum()
    }
}
