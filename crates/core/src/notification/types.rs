//! Notification types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::macros::labeled_enum;

labeled_enum! {
    /// Event a notification reports.
    pub enum NotificationKind {
        /// Installment due within the reminder window.
        InstallmentDueSoon => "INSTALLMENT_DUE_SOON",
        /// Installment past due.
        InstallmentOverdue => "INSTALLMENT_OVERDUE",
        /// Deposit posted.
        Deposit => "DEPOSIT",
        /// Withdrawal posted.
        Withdrawal => "WITHDRAWAL",
        /// Loan payment received.
        LoanPayment => "LOAN_PAYMENT",
        /// Loan approved.
        LoanApproved => "LOAN_APPROVED",
        /// Loan rejected.
        LoanRejected => "LOAN_REJECTED",
        /// Dividend credited.
        Dividend => "DIVIDEND",
        /// Aid request approved.
        AidApproved => "AID_APPROVED",
        /// Aid request rejected.
        AidRejected => "AID_REJECTED",
        /// Anything else worth telling the member.
        Alert => "ALERT",
    }
}

labeled_enum! {
    /// Delivery channel.
    pub enum NotificationChannel {
        /// Email.
        Email => "EMAIL",
        /// Text message.
        Sms => "SMS",
        /// In-app inbox.
        InApp => "IN_APP",
        /// WhatsApp.
        WhatsApp => "WHATSAPP",
    }
}

labeled_enum! {
    /// Delivery priority.
    pub enum NotificationPriority {
        /// Informational.
        Low => "LOW",
        /// Default.
        Normal => "NORMAL",
        /// Needs attention.
        High => "HIGH",
        /// Needs attention now.
        Urgent => "URGENT",
    }
}

/// A notification ready for the outbox.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationDraft {
    /// Recipient.
    pub member_id: Uuid,
    /// Event.
    pub kind: NotificationKind,
    /// Channel.
    pub channel: NotificationChannel,
    /// Priority.
    pub priority: NotificationPriority,
    /// Subject line.
    pub subject: String,
    /// Message body.
    pub body: String,
    /// Entity the notification is about.
    pub reference_id: Option<Uuid>,
    /// Rows sharing a key are stored once.
    pub dedupe_key: Option<String>,
    /// Earliest delivery time; immediate when `None`.
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl NotificationDraft {
    /// In-app, normal-priority draft.
    pub fn new(
        member_id: Uuid,
        kind: NotificationKind,
        subject: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            member_id,
            kind,
            channel: NotificationChannel::InApp,
            priority: NotificationPriority::Normal,
            subject: subject.into(),
            body: body.into(),
            reference_id: None,
            dedupe_key: None,
            scheduled_for: None,
        }
    }

    /// Sets the channel.
    #[must_use]
    pub fn via(mut self, channel: NotificationChannel) -> Self {
        self.channel = channel;
        self
    }

    /// Sets the priority.
    #[must_use]
    pub fn priority(mut self, priority: NotificationPriority) -> Self {
        self.priority = priority;
        self
    }

    /// Sets the referenced entity.
    #[must_use]
    pub fn about(mut self, reference_id: Uuid) -> Self {
        self.reference_id = Some(reference_id);
        self
    }

    /// Sets the dedupe key.
    #[must_use]
    pub fn dedupe(mut self, key: impl Into<String>) -> Self {
        self.dedupe_key = Some(key.into());
        self
    }
}

/// Retry limits for outbox delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryPolicy {
    /// Attempts after which a row is abandoned.
    pub max_attempts: i32,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self { max_attempts: 5 }
    }
}

impl DeliveryPolicy {
    /// True if a row with `attempts` failed deliveries may be tried again.
    #[must_use]
    pub fn should_attempt(&self, attempts: i32) -> bool {
        attempts < self.max_attempts
    }

    /// True once the row is out of attempts.
    #[must_use]
    pub fn is_exhausted(&self, attempts: i32) -> bool {
        !self.should_attempt(attempts)
    }
}
