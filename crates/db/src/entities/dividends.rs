//! `SeaORM` Entity for dividends table.
//!
//! One row per (period, member). `credited` flips once, together with the
//! ledger entry that paid it.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "dividends")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub period_id: Uuid,
    pub member_id: Uuid,
    pub account_id: Option<Uuid>,
    pub average_fixed_balance: Decimal,
    pub loan_count: i32,
    pub qualifies: bool,
    pub share_pct: Decimal,
    pub amount: Decimal,
    pub credited: bool,
    pub credited_on: Option<Date>,
    pub entry_id: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::dividend_periods::Entity",
        from = "Column::PeriodId",
        to = "super::dividend_periods::Column::Id"
    )]
    DividendPeriods,
    #[sea_orm(
        belongs_to = "super::members::Entity",
        from = "Column::MemberId",
        to = "super::members::Column::Id"
    )]
    Members,
}

impl Related<super::dividend_periods::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::DividendPeriods.def()
    }
}

impl Related<super::members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
