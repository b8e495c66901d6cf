//! `SeaORM` Entity for loans table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

use super::sea_orm_active_enums::LoanStatus;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "loans")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub loan_number: String,
    pub member_id: Uuid,
    pub loan_type_id: Uuid,
    pub requested_amount: Decimal,
    pub approved_amount: Option<Decimal>,
    pub annual_rate_pct: Decimal,
    pub term_months: i32,
    pub monthly_payment: Option<Decimal>,
    pub total_payable: Decimal,
    pub outstanding_balance: Decimal,
    pub status: LoanStatus,
    pub payroll_deduction: bool,
    pub notes: Option<String>,
    pub approved_by: Option<Uuid>,
    pub requested_on: Date,
    pub approved_on: Option<Date>,
    pub disbursed_on: Option<Date>,
    pub first_payment_on: Option<Date>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::members::Entity",
        from = "Column::MemberId",
        to = "super::members::Column::Id"
    )]
    Members,
    #[sea_orm(
        belongs_to = "super::loan_types::Entity",
        from = "Column::LoanTypeId",
        to = "super::loan_types::Column::Id"
    )]
    LoanTypes,
}

impl Related<super::members::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::loan_types::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LoanTypes.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
