//! Audit record types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::macros::labeled_enum;

/// Actor recorded for scheduled jobs.
pub const SYSTEM_ACTOR: Uuid = Uuid::nil();

labeled_enum! {
    /// What was done.
    pub enum AuditAction {
        /// Entity created.
        Create => "CREATE",
        /// Entity updated.
        Update => "UPDATE",
        /// Approval.
        Approve => "APPROVE",
        /// Rejection.
        Reject => "REJECT",
        /// Ledger reversal.
        Reverse => "REVERSE",
        /// Account or fund period closed.
        Close => "CLOSE",
        /// Funds handed over.
        Disburse => "DISBURSE",
        /// Payment received.
        Pay => "PAY",
        /// Penalty accrual.
        Accrue => "ACCRUE",
    }
}

labeled_enum! {
    /// Kind of entity an audit record refers to.
    pub enum AuditEntity {
        /// Savings account.
        Account => "ACCOUNT",
        /// Ledger entry.
        LedgerEntry => "LEDGER_ENTRY",
        /// Loan.
        Loan => "LOAN",
        /// Loan installment.
        Installment => "INSTALLMENT",
        /// Loan payment.
        Payment => "PAYMENT",
        /// Loan guarantor.
        Guarantor => "GUARANTOR",
        /// Mutual fund period.
        Fund => "FUND",
        /// Fund movement.
        FundMovement => "FUND_MOVEMENT",
        /// Aid request.
        AidRequest => "AID_REQUEST",
        /// Dividend period.
        DividendPeriod => "DIVIDEND_PERIOD",
        /// One member's dividend.
        Dividend => "DIVIDEND",
    }
}

/// One audit trail row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Who performed the action.
    pub actor: Uuid,
    /// What was done.
    pub action: AuditAction,
    /// Entity kind.
    pub entity: AuditEntity,
    /// Entity id.
    pub entity_id: Uuid,
    /// Human-readable summary.
    pub description: String,
    /// State before the change.
    pub before: Option<Value>,
    /// State after the change.
    pub after: Option<Value>,
    /// When the change committed.
    pub occurred_at: DateTime<Utc>,
}

impl AuditRecord {
    /// Starts a record without snapshots.
    pub fn new(
        actor: Uuid,
        action: AuditAction,
        entity: AuditEntity,
        entity_id: Uuid,
        description: impl Into<String>,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            actor,
            action,
            entity,
            entity_id,
            description: description.into(),
            before: None,
            after: None,
            occurred_at,
        }
    }

    /// Attaches the pre-change snapshot.
    #[must_use]
    pub fn with_before<T: Serialize>(mut self, before: &T) -> Self {
        self.before = serde_json::to_value(before).ok();
        self
    }

    /// Attaches the post-change snapshot.
    #[must_use]
    pub fn with_after<T: Serialize>(mut self, after: &T) -> Self {
        self.after = serde_json::to_value(after).ok();
        self
    }

    /// True when the record was produced by a scheduled job.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.actor == SYSTEM_ACTOR
    }
}
