//! `SeaORM` Entity for notifications table (the delivery outbox).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{NotificationChannel, NotificationKind, NotificationPriority};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "notifications")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub member_id: Uuid,
    pub kind: NotificationKind,
    pub channel: NotificationChannel,
    pub priority: NotificationPriority,
    pub subject: String,
    pub body: String,
    pub reference_id: Option<Uuid>,
    #[sea_orm(unique)]
    pub dedupe_key: Option<String>,
    pub sent: bool,
    pub sent_at: Option<DateTimeWithTimeZone>,
    pub attempts: i32,
    pub last_error: Option<String>,
    pub scheduled_for: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::members::Entity",
        from = "Column::MemberId",
        to = "super::members::Column::Id"
    )]
    Members,
}

impl Related<super::members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
