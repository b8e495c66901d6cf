//! `SeaORM` Entity for mutual_funds table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::FundStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "mutual_funds")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub period_key: String,
    pub start_date: Date,
    pub end_date: Date,
    pub status: FundStatus,
    pub total_inflow: Decimal,
    pub total_outflow: Decimal,
    pub available: Decimal,
    pub closed_on: Option<Date>,
    pub closed_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub created_by: Uuid,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
