//! Database migration runner for Coopbank.
//!
//! Usage:
//!   coopbank-migrator up      - Run all pending migrations
//!   coopbank-migrator down    - Roll back the last migration
//!   coopbank-migrator status  - Show migration status
//!   coopbank-migrator fresh   - Drop all tables and re-run migrations
//!
//! The connection string is read from `DATABASE_URL`.

use coopbank_db::migration::Migrator;
use sea_orm_migration::prelude::*;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // The CLI sets up its own tracing.
    cli::run_cli(Migrator).await;
}
