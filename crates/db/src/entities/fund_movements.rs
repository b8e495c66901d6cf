//! `SeaORM` Entity for fund_movements table (the kardex).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::{ContributionKind, MovementKind};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "fund_movements")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub fund_id: Uuid,
    pub member_id: Option<Uuid>,
    pub kind: MovementKind,
    pub contribution_kind: Option<ContributionKind>,
    pub amount: Decimal,
    pub prior_balance: Decimal,
    pub new_balance: Decimal,
    #[sea_orm(unique)]
    pub movement_number: String,
    pub aid_request_id: Option<Uuid>,
    pub concept: String,
    pub created_at: DateTimeWithTimeZone,
    pub created_by: Uuid,
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
