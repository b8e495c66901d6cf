//! Dividend domain types.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::macros::labeled_enum;

labeled_enum! {
    /// Status of a dividend period.
    pub enum DividendPeriodStatus {
        /// Year in progress.
        Open => "OPEN",
        /// Interest pool fixed; shares may be calculated and credited.
        Closed => "CLOSED",
        /// Every share credited.
        Distributed => "DISTRIBUTED",
    }
}

/// Period state handed to the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendPeriodSnapshot {
    /// Calendar year.
    pub year: i32,
    /// Current status.
    pub status: DividendPeriodStatus,
    /// Loan interest collected during the year.
    pub total_interest_generated: Decimal,
    /// Sum of credited dividends.
    pub total_distributed: Decimal,
}

impl DividendPeriodSnapshot {
    /// What is left to distribute.
    #[must_use]
    pub fn remaining(&self) -> Decimal {
        self.total_interest_generated - self.total_distributed
    }
}

/// Balance of an account after a change on `on`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalancePoint {
    /// Day of the change.
    pub on: NaiveDate,
    /// Balance after it.
    pub balance: Decimal,
}

/// What the allocation needs to know about one member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemberEligibility {
    /// Member.
    pub member_id: Uuid,
    /// Day-weighted average balance of the member's fixed accounts.
    pub average_fixed_balance: Decimal,
    /// Loans the member held during the year.
    pub loan_count: u32,
}

/// One member's share of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DividendAllocation {
    /// Member.
    pub member_id: Uuid,
    /// Day-weighted average balance of the member's fixed accounts.
    pub average_fixed_balance: Decimal,
    /// Loans the member held during the year.
    pub loan_count: u32,
    /// Met the loan requirement.
    pub qualifies: bool,
    /// Share of the pool, in percent.
    pub share_pct: Decimal,
    /// Amount to credit; zero for members that do not qualify.
    pub amount: Decimal,
}
