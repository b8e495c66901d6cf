//! Dividend periods and per-member dividends.
//!
//! One period per calendar year. The distributed total can never pass the
//! interest the period generated, and a member gets at most one dividend
//! per period.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(ENUMS_SQL).await?;
        db.execute_unprepared(DIVIDEND_PERIODS_SQL).await?;
        db.execute_unprepared(DIVIDENDS_SQL).await?;
        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_SQL).await?;
        Ok(())
    }
}

// Labels added to audit_entity must not be used in this same transaction.
const ENUMS_SQL: &str = r"
CREATE TYPE dividend_period_status AS ENUM ('OPEN', 'CLOSED', 'DISTRIBUTED');

ALTER TYPE audit_entity ADD VALUE IF NOT EXISTS 'DIVIDEND_PERIOD';
ALTER TYPE audit_entity ADD VALUE IF NOT EXISTS 'DIVIDEND';
";

const DIVIDEND_PERIODS_SQL: &str = r"
CREATE TABLE dividend_periods (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    year INTEGER NOT NULL CONSTRAINT uq_dividend_year UNIQUE,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    status dividend_period_status NOT NULL DEFAULT 'OPEN',
    total_interest_generated NUMERIC(18, 2) NOT NULL DEFAULT 0,
    total_distributed NUMERIC(18, 2) NOT NULL DEFAULT 0,
    closed_on DATE,
    closed_by UUID,
    distributed_on DATE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    created_by UUID NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_dividend_year CHECK (year BETWEEN 2000 AND 2100),
    CONSTRAINT chk_dividend_dates CHECK (end_date > start_date),
    CONSTRAINT chk_dividend_distribution CHECK (
        total_interest_generated >= 0
        AND total_distributed >= 0
        AND total_distributed <= total_interest_generated
    )
);

CREATE INDEX idx_dividend_periods_status ON dividend_periods(status);
";

const DIVIDENDS_SQL: &str = r"
CREATE TABLE dividends (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    period_id UUID NOT NULL REFERENCES dividend_periods(id),
    member_id UUID NOT NULL REFERENCES members(id),
    account_id UUID REFERENCES accounts(id),
    average_fixed_balance NUMERIC(18, 2) NOT NULL,
    loan_count INTEGER NOT NULL DEFAULT 0,
    qualifies BOOLEAN NOT NULL DEFAULT false,
    share_pct NUMERIC(5, 2) NOT NULL DEFAULT 0,
    amount NUMERIC(18, 2) NOT NULL,
    credited BOOLEAN NOT NULL DEFAULT false,
    credited_on DATE,
    entry_id UUID REFERENCES ledger_entries(id),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_dividend_per_member UNIQUE (period_id, member_id),
    CONSTRAINT chk_dividend_amount CHECK (amount >= 0),
    CONSTRAINT chk_dividend_balance CHECK (average_fixed_balance >= 0),
    CONSTRAINT chk_dividend_loans CHECK (loan_count >= 0),
    CONSTRAINT chk_dividend_share CHECK (share_pct BETWEEN 0 AND 100),
    CONSTRAINT chk_dividend_credited CHECK (credited OR entry_id IS NULL),
    CONSTRAINT uq_dividend_entry UNIQUE (entry_id)
);

CREATE INDEX idx_dividends_pending ON dividends(period_id) WHERE NOT credited;
";

// Enum labels added to audit_entity stay; Postgres cannot drop them.
const DROP_SQL: &str = r"
DROP TABLE IF EXISTS dividends CASCADE;
DROP TABLE IF EXISTS dividend_periods CASCADE;
DROP TYPE IF EXISTS dividend_period_status CASCADE;
";
