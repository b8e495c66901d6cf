//! Initial database migration.
//!
//! Creates members, savings accounts and their ledger, loans with schedules
//! and payments, the mutual-aid fund kardex, the audit log and the
//! notification outbox, together with the triggers that keep ledgers
//! append-only.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: ENUMS & SEQUENCES
        // ============================================================
        db.execute_unprepared(ENUMS_SQL).await?;
        db.execute_unprepared(SEQUENCES_SQL).await?;

        // ============================================================
        // PART 2: MEMBERS
        // ============================================================
        db.execute_unprepared(MEMBERS_SQL).await?;

        // ============================================================
        // PART 3: SAVINGS
        // ============================================================
        db.execute_unprepared(ACCOUNT_TYPES_SQL).await?;
        db.execute_unprepared(ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 4: LOANS
        // ============================================================
        db.execute_unprepared(LOAN_TYPES_SQL).await?;
        db.execute_unprepared(LOANS_SQL).await?;
        db.execute_unprepared(GUARANTORS_SQL).await?;
        db.execute_unprepared(INSTALLMENTS_SQL).await?;
        db.execute_unprepared(PAYMENTS_SQL).await?;

        // ============================================================
        // PART 5: LEDGER
        // ============================================================
        db.execute_unprepared(LEDGER_ENTRIES_SQL).await?;

        // ============================================================
        // PART 6: MUTUAL FUND
        // ============================================================
        db.execute_unprepared(MUTUAL_FUNDS_SQL).await?;
        db.execute_unprepared(AID_REQUESTS_SQL).await?;
        db.execute_unprepared(FUND_MOVEMENTS_SQL).await?;

        // ============================================================
        // PART 7: AUDIT & NOTIFICATIONS
        // ============================================================
        db.execute_unprepared(AUDIT_LOG_SQL).await?;
        db.execute_unprepared(NOTIFICATIONS_SQL).await?;

        // ============================================================
        // PART 8: TRIGGERS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ENUMS_SQL: &str = r"
CREATE TYPE account_status AS ENUM ('ACTIVE', 'CLOSED');

CREATE TYPE entry_type AS ENUM (
    'DEPOSIT',
    'WITHDRAW',
    'INTEREST',
    'LOAN_PAYMENT',
    'LOAN_DISBURSEMENT',
    'DIVIDEND',
    'ADJUSTMENT',
    'REVERSAL'
);

CREATE TYPE entry_status AS ENUM ('POSTED', 'REVERSED');

CREATE TYPE loan_status AS ENUM (
    'REQUESTED',
    'IN_REVIEW',
    'APPROVED',
    'REJECTED',
    'DISBURSED',
    'IN_REPAYMENT',
    'PAID',
    'DEFAULTED',
    'CANCELLED'
);

CREATE TYPE installment_status AS ENUM ('PENDING', 'OVERDUE', 'PAID', 'PAID_LATE');

CREATE TYPE payment_method AS ENUM ('CASH', 'TRANSFER', 'PAYROLL', 'CHECK');

CREATE TYPE fund_status AS ENUM ('OPEN', 'CLOSED');

CREATE TYPE movement_kind AS ENUM ('INFLOW', 'OUTFLOW', 'ADJUSTMENT', 'CLOSE', 'OPEN');

CREATE TYPE contribution_kind AS ENUM ('MONTHLY', 'EXTRAORDINARY', 'DONATION');

CREATE TYPE aid_kind AS ENUM ('MEDICAL_EMERGENCY', 'BEREAVEMENT', 'CALAMITY', 'OTHER');

CREATE TYPE aid_status AS ENUM (
    'PENDING',
    'IN_REVIEW',
    'APPROVED',
    'REJECTED',
    'DISBURSED',
    'CANCELLED'
);

CREATE TYPE audit_action AS ENUM (
    'CREATE',
    'UPDATE',
    'APPROVE',
    'REJECT',
    'REVERSE',
    'CLOSE',
    'DISBURSE',
    'PAY',
    'ACCRUE'
);

CREATE TYPE audit_entity AS ENUM (
    'ACCOUNT',
    'LEDGER_ENTRY',
    'LOAN',
    'INSTALLMENT',
    'PAYMENT',
    'GUARANTOR',
    'FUND',
    'FUND_MOVEMENT',
    'AID_REQUEST'
);

CREATE TYPE notification_kind AS ENUM (
    'INSTALLMENT_DUE_SOON',
    'INSTALLMENT_OVERDUE',
    'DEPOSIT',
    'WITHDRAWAL',
    'LOAN_PAYMENT',
    'LOAN_APPROVED',
    'LOAN_REJECTED',
    'DIVIDEND',
    'AID_APPROVED',
    'AID_REJECTED',
    'ALERT'
);

CREATE TYPE notification_channel AS ENUM ('EMAIL', 'SMS', 'IN_APP', 'WHATSAPP');

CREATE TYPE notification_priority AS ENUM ('LOW', 'NORMAL', 'HIGH', 'URGENT');
";

const SEQUENCES_SQL: &str = r"
CREATE SEQUENCE account_number_seq;
CREATE SEQUENCE loan_number_seq;
CREATE SEQUENCE receipt_number_seq;
CREATE SEQUENCE fund_movement_number_seq;
CREATE SEQUENCE aid_request_number_seq;
";

const MEMBERS_SQL: &str = r"
CREATE TABLE members (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    full_name VARCHAR(200) NOT NULL,
    email VARCHAR(255),
    phone VARCHAR(30),
    active BOOLEAN NOT NULL DEFAULT true,
    joined_on DATE NOT NULL DEFAULT CURRENT_DATE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE UNIQUE INDEX uq_members_email ON members(lower(email)) WHERE email IS NOT NULL;
";

const ACCOUNT_TYPES_SQL: &str = r"
CREATE TABLE account_types (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    code VARCHAR(20) NOT NULL UNIQUE,
    name VARCHAR(100) NOT NULL,
    annual_rate_pct NUMERIC(7, 4) NOT NULL DEFAULT 0,
    minimum_balance NUMERIC(18, 2) NOT NULL DEFAULT 0,
    withdrawable BOOLEAN NOT NULL DEFAULT true,
    payroll_deduction BOOLEAN NOT NULL DEFAULT false,
    active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_account_type_rate CHECK (annual_rate_pct >= 0),
    CONSTRAINT chk_account_type_minimum CHECK (minimum_balance >= 0)
);
";

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    account_number VARCHAR(20) NOT NULL UNIQUE,
    member_id UUID NOT NULL REFERENCES members(id),
    account_type_id UUID NOT NULL REFERENCES account_types(id),
    balance NUMERIC(18, 2) NOT NULL DEFAULT 0,
    payroll_amount NUMERIC(18, 2) NOT NULL DEFAULT 0,
    status account_status NOT NULL DEFAULT 'ACTIVE',
    opened_on DATE NOT NULL,
    closed_on DATE,
    notes TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_account_balance CHECK (balance >= 0),
    CONSTRAINT chk_account_payroll CHECK (payroll_amount >= 0),
    CONSTRAINT chk_account_closed CHECK (
        (status = 'ACTIVE' AND closed_on IS NULL)
        OR (status = 'CLOSED' AND closed_on IS NOT NULL AND balance = 0)
    )
);

CREATE UNIQUE INDEX uq_accounts_open_per_type ON accounts(member_id, account_type_id)
    WHERE status = 'ACTIVE';
CREATE INDEX idx_accounts_member ON accounts(member_id);
";

const LOAN_TYPES_SQL: &str = r"
CREATE TABLE loan_types (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    code VARCHAR(20) NOT NULL UNIQUE,
    name VARCHAR(100) NOT NULL,
    annual_rate_pct NUMERIC(7, 4) NOT NULL,
    savings_multiplier NUMERIC(7, 2) NOT NULL DEFAULT 1,
    min_term_months INTEGER NOT NULL DEFAULT 1,
    max_term_months INTEGER NOT NULL,
    requires_guarantors BOOLEAN NOT NULL DEFAULT false,
    required_guarantors INTEGER NOT NULL DEFAULT 0,
    active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_loan_type_rate CHECK (annual_rate_pct >= 0),
    CONSTRAINT chk_loan_type_terms CHECK (min_term_months > 0 AND max_term_months >= min_term_months),
    CONSTRAINT chk_loan_type_guarantors CHECK (required_guarantors >= 0)
);
";

const LOANS_SQL: &str = r"
CREATE TABLE loans (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    loan_number VARCHAR(20) NOT NULL UNIQUE,
    member_id UUID NOT NULL REFERENCES members(id),
    loan_type_id UUID NOT NULL REFERENCES loan_types(id),
    requested_amount NUMERIC(18, 2) NOT NULL,
    approved_amount NUMERIC(18, 2),
    annual_rate_pct NUMERIC(7, 4) NOT NULL,
    term_months INTEGER NOT NULL,
    monthly_payment NUMERIC(18, 2),
    total_payable NUMERIC(18, 2) NOT NULL DEFAULT 0,
    outstanding_balance NUMERIC(18, 2) NOT NULL DEFAULT 0,
    status loan_status NOT NULL DEFAULT 'REQUESTED',
    payroll_deduction BOOLEAN NOT NULL DEFAULT false,
    notes TEXT,
    approved_by UUID,
    requested_on DATE NOT NULL,
    approved_on DATE,
    disbursed_on DATE,
    first_payment_on DATE,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_loan_requested CHECK (requested_amount > 0),
    CONSTRAINT chk_loan_term CHECK (term_months > 0),
    CONSTRAINT chk_loan_outstanding CHECK (outstanding_balance >= 0),
    CONSTRAINT chk_loan_approved_amount CHECK (
        (status IN ('REQUESTED', 'IN_REVIEW', 'REJECTED') AND approved_amount IS NULL)
        OR (status NOT IN ('REQUESTED', 'IN_REVIEW', 'REJECTED') AND approved_amount > 0)
    )
);

CREATE INDEX idx_loans_member ON loans(member_id, status);
CREATE INDEX idx_loans_status ON loans(status);
";

const GUARANTORS_SQL: &str = r"
CREATE TABLE guarantors (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    loan_id UUID NOT NULL REFERENCES loans(id) ON DELETE CASCADE,
    member_id UUID NOT NULL REFERENCES members(id),
    accepted_on DATE NOT NULL,
    active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_guarantor_per_loan UNIQUE (loan_id, member_id)
);
";

const INSTALLMENTS_SQL: &str = r"
CREATE TABLE installments (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    loan_id UUID NOT NULL REFERENCES loans(id) ON DELETE CASCADE,
    number INTEGER NOT NULL,
    payment NUMERIC(18, 2) NOT NULL,
    principal NUMERIC(18, 2) NOT NULL,
    interest NUMERIC(18, 2) NOT NULL,
    penalty NUMERIC(18, 2) NOT NULL DEFAULT 0,
    principal_paid NUMERIC(18, 2) NOT NULL DEFAULT 0,
    interest_paid NUMERIC(18, 2) NOT NULL DEFAULT 0,
    penalty_paid NUMERIC(18, 2) NOT NULL DEFAULT 0,
    balance NUMERIC(18, 2) NOT NULL,
    due_date DATE NOT NULL,
    paid_on DATE,
    days_late INTEGER NOT NULL DEFAULT 0,
    status installment_status NOT NULL DEFAULT 'PENDING',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_installment_number UNIQUE (loan_id, number),
    CONSTRAINT chk_installment_number CHECK (number > 0),
    CONSTRAINT chk_installment_amounts CHECK (
        payment >= 0 AND principal >= 0 AND interest >= 0 AND penalty >= 0
        AND principal_paid >= 0 AND interest_paid >= 0 AND penalty_paid >= 0
        AND balance >= 0
    ),
    CONSTRAINT chk_installment_days_late CHECK (days_late >= 0)
);

CREATE INDEX idx_installments_due ON installments(due_date) WHERE status IN ('PENDING', 'OVERDUE');
";

const PAYMENTS_SQL: &str = r"
CREATE TABLE payments (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    loan_id UUID NOT NULL REFERENCES loans(id),
    installment_id UUID REFERENCES installments(id),
    amount NUMERIC(18, 2) NOT NULL,
    principal NUMERIC(18, 2) NOT NULL,
    interest NUMERIC(18, 2) NOT NULL,
    penalty NUMERIC(18, 2) NOT NULL,
    receipt_number VARCHAR(20) NOT NULL UNIQUE,
    method payment_method NOT NULL,
    paid_on DATE NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    created_by UUID NOT NULL,
    CONSTRAINT chk_payment_amount CHECK (amount > 0),
    CONSTRAINT chk_payment_split CHECK (
        principal >= 0 AND interest >= 0 AND penalty >= 0
        AND principal + interest + penalty = amount
    )
);

CREATE INDEX idx_payments_loan ON payments(loan_id, created_at);
";

const LEDGER_ENTRIES_SQL: &str = r"
CREATE TABLE ledger_entries (
    id UUID PRIMARY KEY,
    entry_type entry_type NOT NULL,
    amount NUMERIC(18, 2) NOT NULL,
    prior_balance NUMERIC(18, 2),
    new_balance NUMERIC(18, 2),
    account_id UUID REFERENCES accounts(id),
    loan_id UUID REFERENCES loans(id),
    receipt_number VARCHAR(20),
    reversal_of UUID REFERENCES ledger_entries(id),
    status entry_status NOT NULL DEFAULT 'POSTED',
    description TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    created_by UUID NOT NULL,
    CONSTRAINT chk_entry_amount CHECK (amount > 0),
    CONSTRAINT chk_entry_target CHECK ((account_id IS NULL) <> (loan_id IS NULL)),
    CONSTRAINT chk_entry_balances CHECK (
        account_id IS NULL
        OR (prior_balance IS NOT NULL AND new_balance IS NOT NULL AND new_balance >= 0)
    )
);

CREATE UNIQUE INDEX uq_entry_single_reversal ON ledger_entries(reversal_of)
    WHERE reversal_of IS NOT NULL;
CREATE INDEX idx_entries_account ON ledger_entries(account_id, created_at)
    WHERE account_id IS NOT NULL;
CREATE INDEX idx_entries_loan ON ledger_entries(loan_id) WHERE loan_id IS NOT NULL;
";

const MUTUAL_FUNDS_SQL: &str = r"
CREATE TABLE mutual_funds (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    period_key CHAR(6) NOT NULL CONSTRAINT uq_fund_period UNIQUE,
    start_date DATE NOT NULL,
    end_date DATE NOT NULL,
    status fund_status NOT NULL DEFAULT 'OPEN',
    total_inflow NUMERIC(18, 2) NOT NULL DEFAULT 0,
    total_outflow NUMERIC(18, 2) NOT NULL DEFAULT 0,
    available NUMERIC(18, 2) NOT NULL DEFAULT 0,
    closed_on DATE,
    closed_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    created_by UUID NOT NULL,
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_fund_period_key CHECK (period_key ~ '^(20[0-9]{2}|2100)(0[1-9]|1[0-2])$'),
    CONSTRAINT chk_fund_dates CHECK (end_date >= start_date),
    CONSTRAINT chk_fund_totals CHECK (
        total_inflow >= 0 AND total_outflow >= 0
        AND available = total_inflow - total_outflow AND available >= 0
    )
);
";

const AID_REQUESTS_SQL: &str = r"
CREATE TABLE aid_requests (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    request_number VARCHAR(20) NOT NULL UNIQUE,
    member_id UUID NOT NULL REFERENCES members(id),
    fund_id UUID NOT NULL REFERENCES mutual_funds(id),
    kind aid_kind NOT NULL,
    requested_amount NUMERIC(18, 2) NOT NULL,
    approved_amount NUMERIC(18, 2),
    justification TEXT NOT NULL,
    status aid_status NOT NULL DEFAULT 'PENDING',
    reviewed_by UUID,
    decided_at TIMESTAMPTZ,
    comments TEXT,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_aid_requested CHECK (requested_amount > 0),
    CONSTRAINT chk_aid_approved CHECK (approved_amount IS NULL OR approved_amount > 0)
);

CREATE UNIQUE INDEX uq_aid_open_per_member ON aid_requests(member_id)
    WHERE status IN ('PENDING', 'IN_REVIEW');
CREATE INDEX idx_aid_fund_status ON aid_requests(fund_id, status);
";

const FUND_MOVEMENTS_SQL: &str = r"
CREATE TABLE fund_movements (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    fund_id UUID NOT NULL REFERENCES mutual_funds(id),
    member_id UUID REFERENCES members(id),
    kind movement_kind NOT NULL,
    contribution_kind contribution_kind,
    amount NUMERIC(18, 2) NOT NULL,
    prior_balance NUMERIC(18, 2) NOT NULL,
    new_balance NUMERIC(18, 2) NOT NULL,
    movement_number VARCHAR(20) NOT NULL UNIQUE,
    aid_request_id UUID REFERENCES aid_requests(id),
    concept TEXT NOT NULL DEFAULT '',
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    created_by UUID NOT NULL,
    CONSTRAINT chk_movement_amount CHECK (amount >= 0 AND new_balance >= 0),
    CONSTRAINT chk_movement_member CHECK (
        kind NOT IN ('INFLOW', 'OUTFLOW') OR (member_id IS NOT NULL AND amount > 0)
    )
);

CREATE INDEX idx_movements_fund ON fund_movements(fund_id, created_at);
";

const AUDIT_LOG_SQL: &str = r"
CREATE TABLE audit_log (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    actor UUID NOT NULL,
    action audit_action NOT NULL,
    entity audit_entity NOT NULL,
    entity_id UUID NOT NULL,
    description TEXT NOT NULL,
    before JSONB,
    after JSONB,
    occurred_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_audit_entity ON audit_log(entity, entity_id, occurred_at);
CREATE INDEX idx_audit_actor ON audit_log(actor, occurred_at);
";

const NOTIFICATIONS_SQL: &str = r"
CREATE TABLE notifications (
    id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
    member_id UUID NOT NULL REFERENCES members(id),
    kind notification_kind NOT NULL,
    channel notification_channel NOT NULL DEFAULT 'IN_APP',
    priority notification_priority NOT NULL DEFAULT 'NORMAL',
    subject VARCHAR(200) NOT NULL,
    body TEXT NOT NULL,
    reference_id UUID,
    dedupe_key VARCHAR(120) UNIQUE,
    sent BOOLEAN NOT NULL DEFAULT false,
    sent_at TIMESTAMPTZ,
    attempts INTEGER NOT NULL DEFAULT 0,
    last_error TEXT,
    scheduled_for TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_notifications_unsent ON notifications(created_at) WHERE sent = false;
CREATE INDEX idx_notifications_member ON notifications(member_id, created_at);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: guard_ledger_entry
-- Ledger entries are append-only; the only permitted update flips
-- POSTED to REVERSED without touching any other column.
-- ============================================================
CREATE OR REPLACE FUNCTION guard_ledger_entry()
RETURNS TRIGGER AS $$
BEGIN
    IF TG_OP = 'DELETE' THEN
        RAISE EXCEPTION 'Ledger entries cannot be deleted';
    END IF;

    IF OLD.status <> 'POSTED' OR NEW.status <> 'REVERSED' THEN
        RAISE EXCEPTION 'Ledger entry % may only move from POSTED to REVERSED', OLD.id;
    END IF;

    IF ROW(NEW.id, NEW.entry_type, NEW.amount, NEW.prior_balance, NEW.new_balance,
           NEW.account_id, NEW.loan_id, NEW.receipt_number, NEW.reversal_of,
           NEW.description, NEW.created_at, NEW.created_by)
       IS DISTINCT FROM
       ROW(OLD.id, OLD.entry_type, OLD.amount, OLD.prior_balance, OLD.new_balance,
           OLD.account_id, OLD.loan_id, OLD.receipt_number, OLD.reversal_of,
           OLD.description, OLD.created_at, OLD.created_by) THEN
        RAISE EXCEPTION 'Ledger entry % is immutable', OLD.id;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_guard_ledger_entry
BEFORE UPDATE OR DELETE ON ledger_entries
FOR EACH ROW
EXECUTE FUNCTION guard_ledger_entry();

-- ============================================================
-- FUNCTION: reject_mutation
-- Write-once tables: fund movements, payments, audit log
-- ============================================================
CREATE OR REPLACE FUNCTION reject_mutation()
RETURNS TRIGGER AS $$
BEGIN
    RAISE EXCEPTION '% rows are append-only', TG_TABLE_NAME;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_fund_movements_append_only
BEFORE UPDATE OR DELETE ON fund_movements
FOR EACH ROW
EXECUTE FUNCTION reject_mutation();

CREATE TRIGGER trg_payments_append_only
BEFORE UPDATE OR DELETE ON payments
FOR EACH ROW
EXECUTE FUNCTION reject_mutation();

CREATE TRIGGER trg_audit_log_append_only
BEFORE UPDATE OR DELETE ON audit_log
FOR EACH ROW
EXECUTE FUNCTION reject_mutation();

-- ============================================================
-- FUNCTION: guard_closed_fund
-- A CLOSED fund period accepts no further movements
-- ============================================================
CREATE OR REPLACE FUNCTION guard_closed_fund()
RETURNS TRIGGER AS $$
DECLARE
    current_status fund_status;
BEGIN
    SELECT status INTO current_status FROM mutual_funds WHERE id = NEW.fund_id;
    IF current_status = 'CLOSED' THEN
        RAISE EXCEPTION 'Fund period is closed';
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_guard_closed_fund
BEFORE INSERT ON fund_movements
FOR EACH ROW
EXECUTE FUNCTION guard_closed_fund();

-- ============================================================
-- FUNCTION: guard_installment_status
-- Installment states only move forward
-- ============================================================
CREATE OR REPLACE FUNCTION installment_status_rank(s installment_status)
RETURNS INTEGER AS $$
    SELECT CASE s
        WHEN 'PENDING' THEN 0
        WHEN 'OVERDUE' THEN 1
        ELSE 2
    END;
$$ LANGUAGE sql IMMUTABLE;

CREATE OR REPLACE FUNCTION guard_installment_status()
RETURNS TRIGGER AS $$
BEGIN
    IF NEW.status <> OLD.status AND (
        installment_status_rank(NEW.status) <= installment_status_rank(OLD.status)
    ) THEN
        RAISE EXCEPTION 'Installment % cannot move from % to %', OLD.id, OLD.status, NEW.status;
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_guard_installment_status
BEFORE UPDATE OF status ON installments
FOR EACH ROW
EXECUTE FUNCTION guard_installment_status();

-- ============================================================
-- FUNCTION: guard_self_guarantee
-- A borrower cannot guarantee their own loan
-- ============================================================
CREATE OR REPLACE FUNCTION guard_self_guarantee()
RETURNS TRIGGER AS $$
BEGIN
    IF EXISTS (SELECT 1 FROM loans WHERE id = NEW.loan_id AND member_id = NEW.member_id) THEN
        RAISE EXCEPTION 'A member cannot guarantee their own loan';
    END IF;
    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_guard_self_guarantee
BEFORE INSERT OR UPDATE ON guarantors
FOR EACH ROW
EXECUTE FUNCTION guard_self_guarantee();
";

const DROP_ALL_SQL: &str = r"
-- ============================================================
-- DROP ALL: Rollback migration
-- Order matters due to foreign key constraints
-- ============================================================

-- Drop triggers
DROP TRIGGER IF EXISTS trg_guard_self_guarantee ON guarantors;
DROP TRIGGER IF EXISTS trg_guard_installment_status ON installments;
DROP TRIGGER IF EXISTS trg_guard_closed_fund ON fund_movements;
DROP TRIGGER IF EXISTS trg_audit_log_append_only ON audit_log;
DROP TRIGGER IF EXISTS trg_payments_append_only ON payments;
DROP TRIGGER IF EXISTS trg_fund_movements_append_only ON fund_movements;
DROP TRIGGER IF EXISTS trg_guard_ledger_entry ON ledger_entries;

-- Drop functions
DROP FUNCTION IF EXISTS guard_self_guarantee();
DROP FUNCTION IF EXISTS guard_installment_status();
DROP FUNCTION IF EXISTS installment_status_rank(installment_status);
DROP FUNCTION IF EXISTS guard_closed_fund();
DROP FUNCTION IF EXISTS reject_mutation();
DROP FUNCTION IF EXISTS guard_ledger_entry();

-- Drop tables (reverse order of creation)
DROP TABLE IF EXISTS notifications CASCADE;
DROP TABLE IF EXISTS audit_log CASCADE;
DROP TABLE IF EXISTS fund_movements CASCADE;
DROP TABLE IF EXISTS aid_requests CASCADE;
DROP TABLE IF EXISTS mutual_funds CASCADE;
DROP TABLE IF EXISTS ledger_entries CASCADE;
DROP TABLE IF EXISTS payments CASCADE;
DROP TABLE IF EXISTS installments CASCADE;
DROP TABLE IF EXISTS guarantors CASCADE;
DROP TABLE IF EXISTS loans CASCADE;
DROP TABLE IF EXISTS loan_types CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;
DROP TABLE IF EXISTS account_types CASCADE;
DROP TABLE IF EXISTS members CASCADE;

-- Drop sequences
DROP SEQUENCE IF EXISTS aid_request_number_seq;
DROP SEQUENCE IF EXISTS fund_movement_number_seq;
DROP SEQUENCE IF EXISTS receipt_number_seq;
DROP SEQUENCE IF EXISTS loan_number_seq;
DROP SEQUENCE IF EXISTS account_number_seq;

-- Drop enums
DROP TYPE IF EXISTS notification_priority CASCADE;
DROP TYPE IF EXISTS notification_channel CASCADE;
DROP TYPE IF EXISTS notification_kind CASCADE;
DROP TYPE IF EXISTS audit_entity CASCADE;
DROP TYPE IF EXISTS audit_action CASCADE;
DROP TYPE IF EXISTS aid_status CASCADE;
DROP TYPE IF EXISTS aid_kind CASCADE;
DROP TYPE IF EXISTS contribution_kind CASCADE;
DROP TYPE IF EXISTS movement_kind CASCADE;
DROP TYPE IF EXISTS fund_status CASCADE;
DROP TYPE IF EXISTS payment_method CASCADE;
DROP TYPE IF EXISTS installment_status CASCADE;
DROP TYPE IF EXISTS loan_status CASCADE;
DROP TYPE IF EXISTS entry_status CASCADE;
DROP TYPE IF EXISTS entry_type CASCADE;
DROP TYPE IF EXISTS account_status CASCADE;
";
