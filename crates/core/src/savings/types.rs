//! Savings domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::macros::labeled_enum;

labeled_enum! {
    /// Lifecycle status of a savings account.
    pub enum AccountStatus {
        /// Open for movements.
        Active => "ACTIVE",
        /// Closed with zero balance; no further movements.
        Closed => "CLOSED",
    }
}

labeled_enum! {
    /// Kind of ledger entry.
    ///
    /// Account entries move the savings balance; `LoanPayment` and
    /// `LoanDisbursement` belong to a loan and carry no balance.
    pub enum EntryType {
        /// Money in.
        Deposit => "DEPOSIT",
        /// Money out.
        Withdraw => "WITHDRAW",
        /// Interest credited by the cooperative.
        Interest => "INTEREST",
        /// Installment payment on a loan.
        LoanPayment => "LOAN_PAYMENT",
        /// Loan principal handed to the borrower.
        LoanDisbursement => "LOAN_DISBURSEMENT",
        /// Dividend credited to the account.
        Dividend => "DIVIDEND",
        /// Manual correction.
        Adjustment => "ADJUSTMENT",
        /// Inverse of an earlier deposit or withdrawal.
        Reversal => "REVERSAL",
    }
}

impl EntryType {
    /// Direction of the balance change for account entries.
    ///
    /// `None` for types whose sign depends on context (`Adjustment`,
    /// `Reversal`) or that never touch a savings balance.
    #[must_use]
    pub fn balance_sign(&self) -> Option<Decimal> {
        match self {
            Self::Deposit | Self::Interest | Self::Dividend => Some(Decimal::ONE),
            Self::Withdraw => Some(Decimal::NEGATIVE_ONE),
            Self::LoanPayment | Self::LoanDisbursement | Self::Adjustment | Self::Reversal => None,
        }
    }

    /// Returns true if entries of this type may be reversed.
    #[must_use]
    pub fn is_reversible(&self) -> bool {
        matches!(self, Self::Deposit | Self::Withdraw)
    }
}

labeled_enum! {
    /// Posting status of a ledger entry.
    pub enum EntryStatus {
        /// Live entry.
        Posted => "POSTED",
        /// Cancelled by a later reversal entry.
        Reversed => "REVERSED",
    }
}

/// Account state loaded under lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    /// Account id.
    pub id: Uuid,
    /// Current balance.
    pub balance: Decimal,
    /// Current status.
    pub status: AccountStatus,
    /// Whether the account type allows ordinary withdrawals.
    pub withdrawable: bool,
}

/// Ledger entry state needed for reversal and reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySnapshot {
    /// Entry id.
    pub id: Uuid,
    /// Entry type.
    pub entry_type: EntryType,
    /// Positive amount.
    pub amount: Decimal,
    /// Balance before the entry (account entries only).
    pub prior_balance: Option<Decimal>,
    /// Balance after the entry (account entries only).
    pub new_balance: Option<Decimal>,
    /// Owning account, if any.
    pub account_id: Option<Uuid>,
    /// Entry this one reverses.
    pub reversal_of: Option<Uuid>,
    /// Posting status.
    pub status: EntryStatus,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// A validated balance mutation ready to persist.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceChange {
    /// Entry type to append.
    pub entry_type: EntryType,
    /// Positive amount.
    pub amount: Decimal,
    /// Balance before.
    pub prior_balance: Decimal,
    /// Balance after.
    pub new_balance: Decimal,
}

/// Facts gathered before opening an account.
#[derive(Debug, Clone)]
pub struct OpenAccountCheck {
    /// Owner is an active member.
    pub member_active: bool,
    /// Account type is offered.
    pub account_type_active: bool,
    /// Owner already has an open account of this type.
    pub has_open_account_of_type: bool,
    /// Minimum opening balance for the type.
    pub minimum_balance: Decimal,
    /// Opening deposit (may be zero).
    pub initial_deposit: Decimal,
}
