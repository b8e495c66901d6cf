//! Fund period keys (`YYYYMM`).

use std::fmt;

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

use super::error::FundError;

/// Calendar month a fund covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeriodKey {
    year: i32,
    month: u32,
}

impl PeriodKey {
    /// Earliest accepted year.
    pub const MIN_YEAR: i32 = 2000;
    /// Latest accepted year.
    pub const MAX_YEAR: i32 = 2100;

    /// Builds a key from its parts.
    pub fn new(year: i32, month: u32) -> Result<Self, FundError> {
        if !(Self::MIN_YEAR..=Self::MAX_YEAR).contains(&year) || !(1..=12).contains(&month) {
            return Err(FundError::InvalidPeriodKey(format!("{year:04}{month:02}")));
        }
        Ok(Self { year, month })
    }

    /// Parses a six-digit `YYYYMM` string.
    pub fn parse(key: &str) -> Result<Self, FundError> {
        let invalid = || FundError::InvalidPeriodKey(key.to_string());
        if key.len() != 6 || !key.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }
        let year: i32 = key[..4].parse().map_err(|_| invalid())?;
        let month: u32 = key[4..].parse().map_err(|_| invalid())?;
        Self::new(year, month).map_err(|_| invalid())
    }

    /// Key of the month containing `date`.
    pub fn containing(date: NaiveDate) -> Result<Self, FundError> {
        Self::new(date.year(), date.month())
    }

    /// Year.
    #[must_use]
    pub const fn year(&self) -> i32 {
        self.year
    }

    /// Month, 1-12.
    #[must_use]
    pub const fn month(&self) -> u32 {
        self.month
    }

    /// First day of the month.
    pub fn start_date(&self) -> Result<NaiveDate, FundError> {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .ok_or_else(|| FundError::InvalidPeriodKey(self.to_string()))
    }

    /// Last day of the month.
    pub fn end_date(&self) -> Result<NaiveDate, FundError> {
        self.start_date()?
            .checked_add_months(Months::new(1))
            .and_then(|next| next.pred_opt())
            .ok_or_else(|| FundError::InvalidPeriodKey(self.to_string()))
    }
}

impl fmt::Display for PeriodKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}", self.year, self.month)
    }
}
