//! Database seeder for Coopbank development and testing.
//!
//! Seeds the savings and loan catalogs, a demo member with a fixed-savings
//! account, and the mutual fund period of the current month. Safe to run
//! repeatedly.
//!
//! Usage: cargo run --bin coopbank-seeder

use chrono::Utc;
use coopbank_core::audit::SYSTEM_ACTOR;
use coopbank_core::fund::PeriodKey;
use coopbank_db::entities::{account_types, loan_types, members};
use coopbank_db::repositories::OpenAccountInput;
use coopbank_db::{FundRepository, SavingsRepository};
use coopbank_shared::PolicyConfig;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

/// Demo member id (consistent for all seeds)
const DEMO_MEMBER_ID: Uuid = Uuid::from_u128(0x0000_0000_0000_0000_0000_0000_0000_0001);

/// Savings catalog: code, name, annual rate %, minimum balance, withdrawable, payroll.
const ACCOUNT_TYPES: [(&str, &str, i64, i64, bool, bool); 3] = [
    ("AHO-VOL", "Voluntary savings", 300, 0, true, false),
    ("AHO-FIJ", "Fixed savings (payroll)", 500, 10_000, false, true),
    ("AHO-NAV", "Christmas savings", 400, 0, false, false),
];

/// Loan catalog: code, name, annual rate %, multiplier, min term, max term, guarantors.
const LOAN_TYPES: [(&str, &str, i64, i64, i32, i32, i32); 3] = [
    ("PRE-ORD", "Ordinary loan", 1800, 300, 6, 60, 2),
    ("PRE-EMG", "Emergency loan", 1200, 100, 1, 12, 0),
    ("PRE-EDU", "Education loan", 1000, 200, 6, 36, 1),
];

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let database_url = std::env::var("DATABASE_URL")
        .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set in environment"))?;

    println!("Connecting to database...");
    let db = coopbank_db::connect(&database_url).await?;

    println!("Seeding account types...");
    seed_account_types(&db).await?;

    println!("Seeding loan types...");
    seed_loan_types(&db).await?;

    println!("Seeding demo member...");
    seed_demo_member(&db).await?;

    println!("Opening current fund period...");
    seed_fund_period(&db).await?;

    println!("Seeding complete!");
    Ok(())
}

/// Seeds the savings account catalog.
async fn seed_account_types(db: &DatabaseConnection) -> anyhow::Result<()> {
    for (code, name, rate_bp, minimum_cents, withdrawable, payroll) in ACCOUNT_TYPES {
        let exists = account_types::Entity::find()
            .filter(account_types::Column::Code.eq(code))
            .one(db)
            .await?
            .is_some();
        if exists {
            println!("  {code} already exists, skipping...");
            continue;
        }

        account_types::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            annual_rate_pct: Set(Decimal::new(rate_bp, 2)),
            minimum_balance: Set(Decimal::new(minimum_cents, 2)),
            withdrawable: Set(withdrawable),
            payroll_deduction: Set(payroll),
            active: Set(true),
            created_at: Set(Utc::now().into()),
        }
        .insert(db)
        .await?;
        println!("  Created account type: {code}");
    }
    Ok(())
}

/// Seeds the loan catalog.
async fn seed_loan_types(db: &DatabaseConnection) -> anyhow::Result<()> {
    for (code, name, rate_bp, multiplier_cents, min_term, max_term, guarantors) in LOAN_TYPES {
        let exists = loan_types::Entity::find()
            .filter(loan_types::Column::Code.eq(code))
            .one(db)
            .await?
            .is_some();
        if exists {
            println!("  {code} already exists, skipping...");
            continue;
        }

        loan_types::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code.to_string()),
            name: Set(name.to_string()),
            annual_rate_pct: Set(Decimal::new(rate_bp, 2)),
            savings_multiplier: Set(Decimal::new(multiplier_cents, 2)),
            min_term_months: Set(min_term),
            max_term_months: Set(max_term),
            requires_guarantors: Set(guarantors > 0),
            required_guarantors: Set(guarantors),
            active: Set(true),
            created_at: Set(Utc::now().into()),
        }
        .insert(db)
        .await?;
        println!("  Created loan type: {code}");
    }
    Ok(())
}

/// Seeds a demo member holding a funded fixed-savings account.
async fn seed_demo_member(db: &DatabaseConnection) -> anyhow::Result<()> {
    if members::Entity::find_by_id(DEMO_MEMBER_ID).one(db).await?.is_some() {
        println!("  Demo member already exists, skipping...");
        return Ok(());
    }

    let today = Utc::now().date_naive();
    members::ActiveModel {
        id: Set(DEMO_MEMBER_ID),
        full_name: Set("Demo Member".to_string()),
        email: Set(Some("demo@coopbank.dev".to_string())),
        phone: Set(None),
        active: Set(true),
        joined_on: Set(today),
        created_at: Set(Utc::now().into()),
        updated_at: Set(Utc::now().into()),
    }
    .insert(db)
    .await?;
    println!("  Created demo member: demo@coopbank.dev");

    let Some(fixed) = account_types::Entity::find()
        .filter(account_types::Column::Code.eq("AHO-FIJ"))
        .one(db)
        .await?
    else {
        eprintln!("  Fixed savings type missing, no account opened");
        return Ok(());
    };

    let opened = SavingsRepository::new(db.clone(), PolicyConfig::default())
        .open_account(OpenAccountInput {
            member_id: DEMO_MEMBER_ID,
            account_type_id: fixed.id,
            initial_deposit: Decimal::new(500_000, 2),
            payroll_amount: Decimal::new(50_000, 2),
            opened_on: today,
            actor: SYSTEM_ACTOR,
        })
        .await?;
    println!("  Opened account {}", opened.account.account_number);
    Ok(())
}

/// Opens this month's mutual fund period.
async fn seed_fund_period(db: &DatabaseConnection) -> anyhow::Result<()> {
    let repo = FundRepository::new(db.clone(), PolicyConfig::default());
    let period = PeriodKey::containing(Utc::now().date_naive())?;
    if repo.find_by_period(period).await?.is_some() {
        println!("  Period {period} already open, skipping...");
        return Ok(());
    }
    repo.open_period(period, SYSTEM_ACTOR).await?;
    println!("  Opened fund period {period}");
    Ok(())
}
