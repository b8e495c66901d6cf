//! Notification outbox.
//!
//! Drafts are queued here after a financial operation commits. Delivery is
//! someone else's job: [`NotificationRepository::flush`] hands unsent rows
//! to a [`NotificationDispatcher`] and records the outcome.

use async_trait::async_trait;
use chrono::Utc;
use coopbank_core::notification::{DeliveryPolicy, NotificationDraft};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, QuerySelect, Set, TryInsertResult,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::entities::notifications;
use crate::error::RepositoryError;

/// Delivery failure reported by a dispatcher.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct DispatchError(pub String);

/// Sends one notification through its channel.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    /// Delivers `notification`. An error leaves the row queued for retry.
    async fn dispatch(&self, notification: &notifications::Model) -> Result<(), DispatchError>;
}

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FlushReport {
    /// Rows handed to the dispatcher.
    pub attempted: usize,
    /// Rows delivered and marked sent.
    pub sent: usize,
    /// Rows that failed this time.
    pub failed: usize,
    /// Failed rows that reached the attempt limit.
    pub abandoned: usize,
}

/// Outbox repository.
#[derive(Debug, Clone)]
pub struct NotificationRepository {
    db: DatabaseConnection,
}

impl NotificationRepository {
    /// Creates a new notification repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Queues a draft. Returns `false` when a row with the same dedupe key
    /// already exists.
    pub async fn enqueue(&self, draft: &NotificationDraft) -> Result<bool, RepositoryError> {
        let row = notifications::ActiveModel {
            id: Set(Uuid::new_v4()),
            member_id: Set(draft.member_id),
            kind: Set(draft.kind.into()),
            channel: Set(draft.channel.into()),
            priority: Set(draft.priority.into()),
            subject: Set(draft.subject.clone()),
            body: Set(draft.body.clone()),
            reference_id: Set(draft.reference_id),
            dedupe_key: Set(draft.dedupe_key.clone()),
            scheduled_for: Set(draft.scheduled_for.map(Into::into)),
            created_at: Set(Utc::now().into()),
            ..Default::default()
        };

        let result = notifications::Entity::insert(row)
            .on_conflict(
                OnConflict::column(notifications::Column::DedupeKey)
                    .do_nothing()
                    .to_owned(),
            )
            .do_nothing()
            .exec(&self.db)
            .await?;

        Ok(matches!(result, TryInsertResult::Inserted(_)))
    }

    /// Unsent rows that are due and still have attempts left, oldest first.
    pub async fn pending(
        &self,
        policy: DeliveryPolicy,
        batch: u64,
    ) -> Result<Vec<notifications::Model>, RepositoryError> {
        let now = Utc::now();
        let rows = notifications::Entity::find()
            .filter(notifications::Column::Sent.eq(false))
            .filter(notifications::Column::Attempts.lt(policy.max_attempts))
            .filter(
                Condition::any()
                    .add(notifications::Column::ScheduledFor.is_null())
                    .add(notifications::Column::ScheduledFor.lte(now)),
            )
            .order_by_asc(notifications::Column::CreatedAt)
            .limit(batch)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Notifications of one member, newest first.
    pub async fn for_member(
        &self,
        member_id: Uuid,
        limit: u64,
    ) -> Result<Vec<notifications::Model>, RepositoryError> {
        let rows = notifications::Entity::find()
            .filter(notifications::Column::MemberId.eq(member_id))
            .order_by_desc(notifications::Column::CreatedAt)
            .limit(limit)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Hands up to `batch` pending rows to `dispatcher`.
    pub async fn flush(
        &self,
        dispatcher: &dyn NotificationDispatcher,
        policy: DeliveryPolicy,
        batch: u64,
    ) -> Result<FlushReport, RepositoryError> {
        let mut report = FlushReport::default();

        for row in self.pending(policy, batch).await? {
            report.attempted += 1;
            let attempts = row.attempts + 1;
            let id = row.id;

            match dispatcher.dispatch(&row).await {
                Ok(()) => {
                    let mut active: notifications::ActiveModel = row.into();
                    active.sent = Set(true);
                    active.sent_at = Set(Some(Utc::now().into()));
                    active.attempts = Set(attempts);
                    active.last_error = Set(None);
                    active.update(&self.db).await?;
                    report.sent += 1;
                }
                Err(err) => {
                    notifications::Entity::update_many()
                        .col_expr(notifications::Column::Attempts, Expr::value(attempts))
                        .col_expr(
                            notifications::Column::LastError,
                            Expr::value(Some(err.to_string())),
                        )
                        .filter(notifications::Column::Id.eq(id))
                        .exec(&self.db)
                        .await?;
                    report.failed += 1;

                    if policy.is_exhausted(attempts) {
                        report.abandoned += 1;
                        warn!(notification_id = %id, attempts, error = %err, "notification abandoned");
                    }
                }
            }
        }

        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                sent = report.sent,
                failed = report.failed,
                "notification flush finished"
            );
        }
        Ok(report)
    }
}
