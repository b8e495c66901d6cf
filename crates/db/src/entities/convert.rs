//! Conversions between database rows and enums and their domain counterparts.

use chrono::Utc;
use coopbank_core::audit as audit_core;
use coopbank_core::dividend as dividend_core;
use coopbank_core::fund as fund_core;
use coopbank_core::loan as loan_core;
use coopbank_core::notification as notification_core;
use coopbank_core::savings as savings_core;

use super::sea_orm_active_enums as db;

/// Implements `From` in both directions for enums with identical variants.
macro_rules! bridge {
    ($db:ident <=> $domain:ident::$ty:ident { $($variant:ident),+ $(,)? }) => {
        impl From<$domain::$ty> for db::$db {
            fn from(value: $domain::$ty) -> Self {
                match value {
                    $($domain::$ty::$variant => Self::$variant),+
                }
            }
        }

        impl From<db::$db> for $domain::$ty {
            fn from(value: db::$db) -> Self {
                match value {
                    $(db::$db::$variant => Self::$variant),+
                }
            }
        }
    };
}

bridge!(AccountStatus <=> savings_core::AccountStatus { Active, Closed });
bridge!(EntryType <=> savings_core::EntryType {
    Deposit,
    Withdraw,
    Interest,
    LoanPayment,
    LoanDisbursement,
    Dividend,
    Adjustment,
    Reversal,
});
bridge!(EntryStatus <=> savings_core::EntryStatus { Posted, Reversed });
bridge!(LoanStatus <=> loan_core::LoanStatus {
    Requested,
    InReview,
    Approved,
    Rejected,
    Disbursed,
    InRepayment,
    Paid,
    Defaulted,
    Cancelled,
});
bridge!(InstallmentStatus <=> loan_core::InstallmentStatus { Pending, Overdue, Paid, PaidLate });
bridge!(PaymentMethod <=> loan_core::PaymentMethod { Cash, Transfer, Payroll, Check });
bridge!(FundStatus <=> fund_core::FundStatus { Open, Closed });
bridge!(DividendPeriodStatus <=> dividend_core::DividendPeriodStatus { Open, Closed, Distributed });
bridge!(MovementKind <=> fund_core::MovementKind { Inflow, Outflow, Adjustment, Close, Open });
bridge!(ContributionKind <=> fund_core::ContributionKind { Monthly, Extraordinary, Donation });
bridge!(AidKind <=> fund_core::AidKind { MedicalEmergency, Bereavement, Calamity, Other });
bridge!(AidStatus <=> fund_core::AidStatus {
    Pending,
    InReview,
    Approved,
    Rejected,
    Disbursed,
    Cancelled,
});
bridge!(AuditAction <=> audit_core::AuditAction {
    Create,
    Update,
    Approve,
    Reject,
    Reverse,
    Close,
    Disburse,
    Pay,
    Accrue,
});
bridge!(AuditEntity <=> audit_core::AuditEntity {
    Account,
    LedgerEntry,
    Loan,
    Installment,
    Payment,
    Guarantor,
    Fund,
    FundMovement,
    AidRequest,
    DividendPeriod,
    Dividend,
});
bridge!(NotificationKind <=> notification_core::NotificationKind {
    InstallmentDueSoon,
    InstallmentOverdue,
    Deposit,
    Withdrawal,
    LoanPayment,
    LoanApproved,
    LoanRejected,
    Dividend,
    AidApproved,
    AidRejected,
    Alert,
});
bridge!(NotificationChannel <=> notification_core::NotificationChannel { Email, Sms, InApp, WhatsApp });
bridge!(NotificationPriority <=> notification_core::NotificationPriority { Low, Normal, High, Urgent });

// Row to snapshot conversions used when handing locked rows to the
// domain services.

impl From<&super::ledger_entries::Model> for savings_core::EntrySnapshot {
    fn from(row: &super::ledger_entries::Model) -> Self {
        Self {
            id: row.id,
            entry_type: row.entry_type.into(),
            amount: row.amount,
            prior_balance: row.prior_balance,
            new_balance: row.new_balance,
            account_id: row.account_id,
            reversal_of: row.reversal_of,
            status: row.status.into(),
            created_at: row.created_at.with_timezone(&Utc),
        }
    }
}

impl From<&super::installments::Model> for loan_core::InstallmentSnapshot {
    fn from(row: &super::installments::Model) -> Self {
        Self {
            id: row.id,
            number: row.number,
            payment: row.payment,
            principal: row.principal,
            interest: row.interest,
            penalty: row.penalty,
            principal_paid: row.principal_paid,
            interest_paid: row.interest_paid,
            penalty_paid: row.penalty_paid,
            due_date: row.due_date,
            days_late: row.days_late,
            status: row.status.into(),
        }
    }
}

impl From<&super::loan_types::Model> for loan_core::LoanTypeTerms {
    fn from(row: &super::loan_types::Model) -> Self {
        Self {
            annual_rate_pct: row.annual_rate_pct,
            savings_multiplier: row.savings_multiplier,
            min_term_months: row.min_term_months,
            max_term_months: row.max_term_months,
            requires_guarantors: row.requires_guarantors,
            required_guarantors: row.required_guarantors,
            active: row.active,
        }
    }
}

impl From<&super::fund_movements::Model> for fund_core::MovementSnapshot {
    fn from(row: &super::fund_movements::Model) -> Self {
        Self {
            kind: row.kind.into(),
            amount: row.amount,
        }
    }
}

impl From<&super::dividend_periods::Model> for dividend_core::DividendPeriodSnapshot {
    fn from(row: &super::dividend_periods::Model) -> Self {
        Self {
            year: row.year,
            status: row.status.into(),
            total_interest_generated: row.total_interest_generated,
            total_distributed: row.total_distributed,
        }
    }
}
