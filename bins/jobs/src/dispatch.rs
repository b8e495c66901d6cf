//! Notification delivery for the jobs runner.

use async_trait::async_trait;
use coopbank_db::entities::notifications;
use coopbank_db::repositories::{DispatchError, NotificationDispatcher};
use tracing::info;

/// Writes each notification to the log instead of a real channel.
///
/// Stands in until an email or SMS gateway is wired up.
pub struct LogDispatcher;

#[async_trait]
impl NotificationDispatcher for LogDispatcher {
    async fn dispatch(&self, notification: &notifications::Model) -> Result<(), DispatchError> {
        info!(
            notification_id = %notification.id,
            member_id = %notification.member_id,
            kind = ?notification.kind,
            channel = ?notification.channel,
            subject = %notification.subject,
            "notification delivered"
        );
        Ok(())
    }
}
