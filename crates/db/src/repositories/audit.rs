//! Audit log repository.

use coopbank_core::audit::{AuditEntity, AuditRecord};
use coopbank_shared::types::{PageRequest, PageResponse};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::entities::{audit_log, sea_orm_active_enums as db};
use crate::error::RepositoryError;

/// Append-only audit trail.
#[derive(Debug, Clone)]
pub struct AuditRepository {
    db: DatabaseConnection,
}

impl AuditRepository {
    /// Creates a new audit repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Persists one audit record.
    pub async fn record(&self, record: &AuditRecord) -> Result<audit_log::Model, RepositoryError> {
        let row = audit_log::ActiveModel {
            id: Set(Uuid::new_v4()),
            actor: Set(record.actor),
            action: Set(record.action.into()),
            entity: Set(record.entity.into()),
            entity_id: Set(record.entity_id),
            description: Set(record.description.clone()),
            before: Set(record.before.clone()),
            after: Set(record.after.clone()),
            occurred_at: Set(record.occurred_at.into()),
        };
        Ok(row.insert(&self.db).await?)
    }

    /// History of one entity, oldest first.
    pub async fn history(
        &self,
        entity: AuditEntity,
        entity_id: Uuid,
    ) -> Result<Vec<audit_log::Model>, RepositoryError> {
        let rows = audit_log::Entity::find()
            .filter(audit_log::Column::Entity.eq(db::AuditEntity::from(entity)))
            .filter(audit_log::Column::EntityId.eq(entity_id))
            .order_by_asc(audit_log::Column::OccurredAt)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Everything an actor did, newest first.
    pub async fn by_actor(
        &self,
        actor: Uuid,
        page: PageRequest,
    ) -> Result<PageResponse<audit_log::Model>, RepositoryError> {
        let query = audit_log::Entity::find().filter(audit_log::Column::Actor.eq(actor));
        let total = query.clone().count(&self.db).await?;
        let rows = query
            .order_by_desc(audit_log::Column::OccurredAt)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?;
        Ok(PageResponse::new(rows, page, total))
    }
}
