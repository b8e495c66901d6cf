//! `SeaORM` Entity for dividend_periods table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::DividendPeriodStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "dividend_periods")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub year: i32,
    pub start_date: Date,
    pub end_date: Date,
    pub status: DividendPeriodStatus,
    pub total_interest_generated: Decimal,
    pub total_distributed: Decimal,
    pub closed_on: Option<Date>,
    pub closed_by: Option<Uuid>,
    pub distributed_on: Option<Date>,
    pub created_at: DateTimeWithTimeZone,
    pub created_by: Uuid,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::dividends::Entity")]
    Dividends,
}

impl Related<super::dividends::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Dividends.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
