//! Post-commit side effects.
//!
//! Audit records and notifications are collected while an operation runs
//! and written only after its transaction commits. A failure here is logged
//! and swallowed; the financial change already stands.

use coopbank_core::audit::AuditRecord;
use coopbank_core::notification::NotificationDraft;
use sea_orm::DatabaseConnection;
use tracing::warn;

use super::audit::AuditRepository;
use super::notification::NotificationRepository;

/// Side effects of one committed operation.
#[derive(Debug, Default)]
pub(crate) struct SideEffects {
    audit: Vec<AuditRecord>,
    notifications: Vec<NotificationDraft>,
}

impl SideEffects {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn audit(&mut self, record: AuditRecord) -> &mut Self {
        self.audit.push(record);
        self
    }

    pub(crate) fn notify(&mut self, draft: NotificationDraft) -> &mut Self {
        self.notifications.push(draft);
        self
    }

    /// Writes everything collected. Call only after `commit`.
    pub(crate) async fn publish(self, db: &DatabaseConnection) {
        let audit = AuditRepository::new(db.clone());
        for record in self.audit {
            if let Err(err) = audit.record(&record).await {
                warn!(
                    action = %record.action,
                    entity = %record.entity,
                    entity_id = %record.entity_id,
                    error = %err,
                    "failed to write audit record"
                );
            }
        }

        let outbox = NotificationRepository::new(db.clone());
        for draft in self.notifications {
            if let Err(err) = outbox.enqueue(&draft).await {
                warn!(
                    member_id = %draft.member_id,
                    kind = %draft.kind,
                    error = %err,
                    "failed to enqueue notification"
                );
            }
        }
    }
}
