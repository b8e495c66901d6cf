//! Message templates for every notification kind.

use chrono::NaiveDate;
use coopbank_shared::types::format_money;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::types::{NotificationDraft, NotificationKind, NotificationPriority};

/// Builds notification drafts.
pub struct NotificationTemplates;

impl NotificationTemplates {
    /// Reminder for an installment due within the window. One per
    /// installment per day.
    #[must_use]
    pub fn installment_due_soon(
        member_id: Uuid,
        installment_id: Uuid,
        loan_number: &str,
        installment_number: i32,
        amount: Decimal,
        due_date: NaiveDate,
        as_of: NaiveDate,
    ) -> NotificationDraft {
        NotificationDraft::new(
            member_id,
            NotificationKind::InstallmentDueSoon,
            format!("Installment {installment_number} of loan {loan_number} is due soon"),
            format!(
                "Your installment {installment_number} of {} for loan {loan_number} is due on {due_date}.",
                format_money(amount)
            ),
        )
        .about(installment_id)
        .dedupe(format!("due_soon:{installment_id}:{as_of}"))
    }

    /// Overdue notice, sent on a reminder day.
    #[must_use]
    pub fn installment_overdue(
        member_id: Uuid,
        installment_id: Uuid,
        loan_number: &str,
        installment_number: i32,
        days_late: i32,
        penalty: Decimal,
        as_of: NaiveDate,
    ) -> NotificationDraft {
        NotificationDraft::new(
            member_id,
            NotificationKind::InstallmentOverdue,
            format!("Installment {installment_number} of loan {loan_number} is overdue"),
            format!(
                "Installment {installment_number} of loan {loan_number} is {days_late} days late. Accrued penalty: {}.",
                format_money(penalty)
            ),
        )
        .priority(NotificationPriority::High)
        .about(installment_id)
        .dedupe(format!("overdue:{installment_id}:{as_of}"))
    }

    /// Deposit confirmation.
    #[must_use]
    pub fn deposit(
        member_id: Uuid,
        entry_id: Uuid,
        account_number: &str,
        amount: Decimal,
        new_balance: Decimal,
    ) -> NotificationDraft {
        NotificationDraft::new(
            member_id,
            NotificationKind::Deposit,
            format!("Deposit to account {account_number}"),
            format!(
                "A deposit of {} was posted to account {account_number}. New balance: {}.",
                format_money(amount),
                format_money(new_balance)
            ),
        )
        .about(entry_id)
    }

    /// Withdrawal confirmation.
    #[must_use]
    pub fn withdrawal(
        member_id: Uuid,
        entry_id: Uuid,
        account_number: &str,
        amount: Decimal,
        new_balance: Decimal,
    ) -> NotificationDraft {
        NotificationDraft::new(
            member_id,
            NotificationKind::Withdrawal,
            format!("Withdrawal from account {account_number}"),
            format!(
                "A withdrawal of {} was posted to account {account_number}. New balance: {}.",
                format_money(amount),
                format_money(new_balance)
            ),
        )
        .about(entry_id)
    }

    /// Dividend credit.
    #[must_use]
    pub fn dividend(
        member_id: Uuid,
        entry_id: Uuid,
        account_number: &str,
        amount: Decimal,
    ) -> NotificationDraft {
        NotificationDraft::new(
            member_id,
            NotificationKind::Dividend,
            "Dividend credited",
            format!(
                "A dividend of {} was credited to account {account_number}.",
                format_money(amount)
            ),
        )
        .about(entry_id)
    }

    /// Payment receipt.
    #[must_use]
    pub fn loan_payment(
        member_id: Uuid,
        payment_id: Uuid,
        loan_number: &str,
        receipt_number: &str,
        amount: Decimal,
        outstanding: Decimal,
    ) -> NotificationDraft {
        NotificationDraft::new(
            member_id,
            NotificationKind::LoanPayment,
            format!("Payment received for loan {loan_number}"),
            format!(
                "We received {} for loan {loan_number} (receipt {receipt_number}). Outstanding balance: {}.",
                format_money(amount),
                format_money(outstanding)
            ),
        )
        .about(payment_id)
    }

    /// Loan approval.
    #[must_use]
    pub fn loan_approved(
        member_id: Uuid,
        loan_id: Uuid,
        loan_number: &str,
        approved_amount: Decimal,
        monthly_payment: Decimal,
    ) -> NotificationDraft {
        NotificationDraft::new(
            member_id,
            NotificationKind::LoanApproved,
            format!("Loan {loan_number} approved"),
            format!(
                "Your loan {loan_number} was approved for {} with a monthly payment of {}.",
                format_money(approved_amount),
                format_money(monthly_payment)
            ),
        )
        .priority(NotificationPriority::High)
        .about(loan_id)
    }

    /// Loan rejection.
    #[must_use]
    pub fn loan_rejected(
        member_id: Uuid,
        loan_id: Uuid,
        loan_number: &str,
        reason: &str,
    ) -> NotificationDraft {
        NotificationDraft::new(
            member_id,
            NotificationKind::LoanRejected,
            format!("Loan {loan_number} rejected"),
            format!("Your loan request {loan_number} was rejected: {reason}"),
        )
        .priority(NotificationPriority::High)
        .about(loan_id)
    }

    /// Aid approval.
    #[must_use]
    pub fn aid_approved(
        member_id: Uuid,
        request_id: Uuid,
        request_number: &str,
        approved_amount: Decimal,
    ) -> NotificationDraft {
        NotificationDraft::new(
            member_id,
            NotificationKind::AidApproved,
            format!("Aid request {request_number} approved"),
            format!(
                "Your aid request {request_number} was approved for {}.",
                format_money(approved_amount)
            ),
        )
        .priority(NotificationPriority::High)
        .about(request_id)
    }

    /// Aid rejection.
    #[must_use]
    pub fn aid_rejected(
        member_id: Uuid,
        request_id: Uuid,
        request_number: &str,
        reason: &str,
    ) -> NotificationDraft {
        NotificationDraft::new(
            member_id,
            NotificationKind::AidRejected,
            format!("Aid request {request_number} rejected"),
            format!("Your aid request {request_number} was rejected: {reason}"),
        )
        .about(request_id)
    }

    /// Free-form alert.
    #[must_use]
    pub fn alert(member_id: Uuid, subject: &str, body: &str) -> NotificationDraft {
        NotificationDraft::new(member_id, NotificationKind::Alert, subject, body)
            .priority(NotificationPriority::Urgent)
    }
}
