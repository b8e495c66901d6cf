//! `SeaORM` Entity for aid_requests table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{AidKind, AidStatus};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "aid_requests")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub request_number: String,
    pub member_id: Uuid,
    pub fund_id: Uuid,
    pub kind: AidKind,
    pub requested_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub justification: String,
    pub status: AidStatus,
    pub reviewed_by: Option<Uuid>,
    pub decided_at: Option<DateTimeWithTimeZone>,
    pub comments: Option<String>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::mutual_funds::Entity",
        from = "Column::FundId",
        to = "super::mutual_funds::Column::Id"
    )]
    MutualFunds,
}

impl Related<super::mutual_funds::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::MutualFunds.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
