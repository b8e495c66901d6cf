//! Fund ledger service.

use chrono::NaiveDate;
use coopbank_shared::types::is_whole_cents;
use rust_decimal::Decimal;

use super::error::FundError;
use super::period::PeriodKey;
use super::types::{
    AidStatus, FundSnapshot, FundStatus, FundTotals, MovementKind, MovementPlan, MovementSnapshot,
};

/// Calendar bounds of a new period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeriodBounds {
    /// First day.
    pub start_date: NaiveDate,
    /// Last day.
    pub end_date: NaiveDate,
}

/// Stateless service for fund operations.
pub struct FundService;

impl FundService {
    /// Validates a new period and returns its calendar bounds.
    pub fn open_period(key: PeriodKey, already_exists: bool) -> Result<PeriodBounds, FundError> {
        if already_exists {
            return Err(FundError::DuplicatePeriod(key.to_string()));
        }
        Ok(PeriodBounds {
            start_date: key.start_date()?,
            end_date: key.end_date()?,
        })
    }

    /// Zero-amount marker appended when a period opens.
    #[must_use]
    pub fn opening_movement() -> MovementPlan {
        MovementPlan {
            kind: MovementKind::Open,
            amount: Decimal::ZERO,
            prior_balance: Decimal::ZERO,
            new_balance: Decimal::ZERO,
        }
    }

    /// Plans a member contribution.
    ///
    /// The amount must be strictly greater than `minimum`.
    pub fn contribute(
        fund: &FundSnapshot,
        amount: Decimal,
        minimum: Decimal,
        member_active: bool,
    ) -> Result<MovementPlan, FundError> {
        Self::require_open(fund)?;
        Self::require_amount(amount)?;
        if amount <= minimum {
            return Err(FundError::BelowMinimumContribution { minimum, amount });
        }
        if !member_active {
            return Err(FundError::MemberInactive);
        }

        Ok(MovementPlan {
            kind: MovementKind::Inflow,
            amount,
            prior_balance: fund.totals.available,
            new_balance: fund.totals.available + amount,
        })
    }

    /// Validates a new aid request.
    pub fn submit_aid(
        fund: &FundSnapshot,
        amount: Decimal,
        maximum: Option<Decimal>,
        justification: &str,
        has_open_request: bool,
        member_active: bool,
    ) -> Result<(), FundError> {
        Self::require_open(fund)?;
        if !member_active {
            return Err(FundError::MemberInactive);
        }
        Self::require_amount(amount)?;
        if let Some(maximum) = maximum {
            if amount > maximum {
                return Err(FundError::ExceedsMaximumAid { maximum, amount });
            }
        }
        if justification.trim().is_empty() {
            return Err(FundError::JustificationRequired);
        }
        if has_open_request {
            return Err(FundError::PendingRequestExists);
        }
        Ok(())
    }

    /// PENDING -> IN_REVIEW.
    pub fn start_aid_review(status: AidStatus) -> Result<AidStatus, FundError> {
        Self::transition(status, AidStatus::InReview, &[AidStatus::Pending])
    }

    /// Plans the payout of an approved aid request.
    pub fn approve_aid(
        fund: &FundSnapshot,
        status: AidStatus,
        approved_amount: Decimal,
    ) -> Result<MovementPlan, FundError> {
        Self::require_open(fund)?;
        Self::transition(status, AidStatus::Approved, &[AidStatus::Pending, AidStatus::InReview])?;
        Self::require_amount(approved_amount)?;
        if fund.totals.available < approved_amount {
            return Err(FundError::InsufficientFund {
                available: fund.totals.available,
                requested: approved_amount,
            });
        }

        Ok(MovementPlan {
            kind: MovementKind::Outflow,
            amount: approved_amount,
            prior_balance: fund.totals.available,
            new_balance: fund.totals.available - approved_amount,
        })
    }

    /// PENDING/IN_REVIEW -> REJECTED.
    pub fn reject_aid(status: AidStatus, reason: &str) -> Result<AidStatus, FundError> {
        if reason.trim().is_empty() {
            return Err(FundError::ReasonRequired);
        }
        Self::transition(status, AidStatus::Rejected, &[AidStatus::Pending, AidStatus::InReview])
    }

    /// PENDING/IN_REVIEW -> CANCELLED.
    pub fn cancel_aid(status: AidStatus) -> Result<AidStatus, FundError> {
        Self::transition(status, AidStatus::Cancelled, &[AidStatus::Pending, AidStatus::InReview])
    }

    /// APPROVED -> DISBURSED.
    pub fn mark_aid_disbursed(status: AidStatus) -> Result<AidStatus, FundError> {
        Self::transition(status, AidStatus::Disbursed, &[AidStatus::Approved])
    }

    /// Plans the CLOSE marker. `fund.totals` must already be recomputed.
    pub fn close_period(fund: &FundSnapshot, unresolved_requests: u64) -> Result<MovementPlan, FundError> {
        Self::require_open(fund)?;
        if unresolved_requests > 0 {
            return Err(FundError::UnresolvedRequests(unresolved_requests));
        }
        Ok(MovementPlan {
            kind: MovementKind::Close,
            amount: fund.totals.available,
            prior_balance: fund.totals.available,
            new_balance: fund.totals.available,
        })
    }

    /// Recomputes totals from the full movement set.
    ///
    /// Only inflows and outflows count; OPEN, CLOSE and ADJUSTMENT rows are
    /// markers.
    #[must_use]
    pub fn recompute_totals(movements: &[MovementSnapshot]) -> FundTotals {
        let (total_inflow, total_outflow) =
            movements
                .iter()
                .fold((Decimal::ZERO, Decimal::ZERO), |(inflow, outflow), m| match m.kind {
                    MovementKind::Inflow => (inflow + m.amount, outflow),
                    MovementKind::Outflow => (inflow, outflow + m.amount),
                    MovementKind::Adjustment | MovementKind::Close | MovementKind::Open => {
                        (inflow, outflow)
                    }
                });

        FundTotals {
            total_inflow,
            total_outflow,
            available: total_inflow - total_outflow,
        }
    }

    fn require_open(fund: &FundSnapshot) -> Result<(), FundError> {
        if fund.status == FundStatus::Closed {
            return Err(FundError::PeriodClosed);
        }
        Ok(())
    }

    fn transition(from: AidStatus, to: AidStatus, allowed: &[AidStatus]) -> Result<AidStatus, FundError> {
        if allowed.contains(&from) {
            Ok(to)
        } else {
            Err(FundError::InvalidTransition { from, to })
        }
    }

    fn require_amount(amount: Decimal) -> Result<(), FundError> {
        if amount <= Decimal::ZERO || !is_whole_cents(amount) {
            return Err(FundError::InvalidAmount(amount));
        }
        Ok(())
    }
}
