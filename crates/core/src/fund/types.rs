//! Fund domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::period::PeriodKey;
use crate::macros::labeled_enum;

labeled_enum! {
    /// Status of a fund period.
    pub enum FundStatus {
        /// Accepting movements.
        Open => "OPEN",
        /// Closed; append-only history only.
        Closed => "CLOSED",
    }
}

labeled_enum! {
    /// Direction of a kardex row.
    pub enum MovementKind {
        /// Member contribution.
        Inflow => "INFLOW",
        /// Aid paid out.
        Outflow => "OUTFLOW",
        /// Manual correction (informational, excluded from totals).
        Adjustment => "ADJUSTMENT",
        /// Period close marker carrying the closing balance.
        Close => "CLOSE",
        /// Period open marker.
        Open => "OPEN",
    }
}

labeled_enum! {
    /// Kind of contribution.
    pub enum ContributionKind {
        /// Regular monthly contribution.
        Monthly => "MONTHLY",
        /// One-off extra contribution.
        Extraordinary => "EXTRAORDINARY",
        /// Donation.
        Donation => "DONATION",
    }
}

labeled_enum! {
    /// Reason for an aid request.
    pub enum AidKind {
        /// Medical emergency.
        MedicalEmergency => "MEDICAL_EMERGENCY",
        /// Death of a family member.
        Bereavement => "BEREAVEMENT",
        /// Natural disaster or similar calamity.
        Calamity => "CALAMITY",
        /// Anything else.
        Other => "OTHER",
    }
}

labeled_enum! {
    /// Aid request workflow state.
    pub enum AidStatus {
        /// Submitted.
        Pending => "PENDING",
        /// Under committee review.
        InReview => "IN_REVIEW",
        /// Approved and paid from the fund.
        Approved => "APPROVED",
        /// Rejected with a reason.
        Rejected => "REJECTED",
        /// Money handed to the member.
        Disbursed => "DISBURSED",
        /// Withdrawn by the member.
        Cancelled => "CANCELLED",
    }
}

impl AidStatus {
    /// Returns true while the request still awaits a decision.
    #[must_use]
    pub fn is_unresolved(&self) -> bool {
        matches!(self, Self::Pending | Self::InReview)
    }
}

/// Fund totals derived from movements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundTotals {
    /// Sum of inflows.
    pub total_inflow: Decimal,
    /// Sum of outflows.
    pub total_outflow: Decimal,
    /// `total_inflow - total_outflow`.
    pub available: Decimal,
}

/// Fund state loaded under lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FundSnapshot {
    /// Fund id.
    pub id: Uuid,
    /// Period key.
    pub period: PeriodKey,
    /// Status.
    pub status: FundStatus,
    /// Stored totals.
    pub totals: FundTotals,
}

/// The part of a movement that totals depend on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementSnapshot {
    /// Direction.
    pub kind: MovementKind,
    /// Non-negative amount.
    pub amount: Decimal,
}

/// A validated kardex row ready to append.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovementPlan {
    /// Direction.
    pub kind: MovementKind,
    /// Amount.
    pub amount: Decimal,
    /// Available balance before.
    pub prior_balance: Decimal,
    /// Available balance after.
    pub new_balance: Decimal,
}
