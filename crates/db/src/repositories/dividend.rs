//! Yearly dividend periods and the crediting of each member's share.
//!
//! Lock order when crediting: period, then dividend, then the receiving
//! account. Every dividend is credited in its own transaction and flagged
//! in the same commit as its ledger entry, so a rerun only picks up what is
//! still pending.

use chrono::{DateTime, Days, NaiveDate, NaiveTime, Utc};
use coopbank_core::audit::{AuditAction, AuditEntity, AuditRecord};
use coopbank_core::dividend::{
    BalancePoint, DividendError, DividendPeriodSnapshot, DividendPeriodStatus, DividendService,
    MemberEligibility,
};
use coopbank_core::notification::NotificationTemplates;
use coopbank_core::savings::{EntryType, SavingsService};
use coopbank_shared::PolicyConfig;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::hooks::SideEffects;
use super::savings::{Posting, SavingsRepository};
use crate::entities::{
    account_types, accounts, dividend_periods, dividends, ledger_entries, loans, members, payments,
    sea_orm_active_enums::{
        AccountStatus as DbAccountStatus, DividendPeriodStatus as DbDividendPeriodStatus,
        LoanStatus as DbLoanStatus,
    },
};
use crate::error::RepositoryError;

/// A dividend after crediting.
#[derive(Debug, Clone, Serialize)]
pub struct CreditedDividend {
    /// The dividend, now flagged as credited.
    pub dividend: dividends::Model,
    /// DIVIDEND entry on the member's account; `None` for a zero share.
    pub posting: Option<Posting>,
}

/// Outcome of a crediting run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CreditReport {
    /// Dividends pending when the run started.
    pub pending: usize,
    /// Dividends credited by this run.
    pub credited: usize,
    /// Dividends skipped after an error; they stay pending.
    pub failed: usize,
    /// The period reached DISTRIBUTED.
    pub distributed: bool,
}

/// Dividend repository.
#[derive(Debug, Clone)]
pub struct DividendRepository {
    db: DatabaseConnection,
    policy: PolicyConfig,
}

impl DividendRepository {
    /// Creates a new dividend repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, policy: PolicyConfig) -> Self {
        Self { db, policy }
    }

    /// Opens the period of `year`.
    pub async fn open_period(&self, year: i32, actor: Uuid) -> Result<dividend_periods::Model, RepositoryError> {
        let txn = self.db.begin().await?;

        let exists = dividend_periods::Entity::find()
            .filter(dividend_periods::Column::Year.eq(year))
            .count(&txn)
            .await?
            > 0;
        let bounds = DividendService::open_period(year, exists)?;

        let now = Utc::now().into();
        let period = dividend_periods::ActiveModel {
            id: Set(Uuid::new_v4()),
            year: Set(year),
            start_date: Set(bounds.start_date),
            end_date: Set(bounds.end_date),
            status: Set(DbDividendPeriodStatus::Open),
            total_interest_generated: Set(Decimal::ZERO),
            total_distributed: Set(Decimal::ZERO),
            closed_on: Set(None),
            closed_by: Set(None),
            distributed_on: Set(None),
            created_at: Set(now),
            created_by: Set(actor),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|err| RepositoryError::from(err).unique_as("uq_dividend_year", DividendError::DuplicatePeriod(year)))?;

        txn.commit().await?;
        info!(period_id = %period.id, year, "dividend period opened");

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                AuditAction::Create,
                AuditEntity::DividendPeriod,
                period.id,
                format!("Opened dividend period {year}"),
                Utc::now(),
            )
            .with_after(&period),
        );
        effects.publish(&self.db).await;

        Ok(period)
    }

    /// Closes the period and fixes its pool.
    ///
    /// The pool is the loan interest paid within the year unless
    /// `interest_generated` sets it explicitly.
    pub async fn close_period(
        &self,
        period_id: Uuid,
        interest_generated: Option<Decimal>,
        actor: Uuid,
    ) -> Result<dividend_periods::Model, RepositoryError> {
        let txn = self.db.begin().await?;
        let period = Self::lock_period(&txn, period_id).await?;

        let generated = match interest_generated {
            Some(amount) => amount,
            None => Self::interest_paid(&txn, period.start_date, period.end_date).await?,
        };
        let status = DividendService::close_period(&DividendPeriodSnapshot::from(&period), generated)?;

        let before = period.clone();
        let today = Utc::now().date_naive();
        let mut active: dividend_periods::ActiveModel = period.into();
        active.status = Set(status.into());
        active.total_interest_generated = Set(generated);
        active.closed_on = Set(Some(today));
        active.closed_by = Set(Some(actor));
        active.updated_at = Set(Utc::now().into());
        let period = active.update(&txn).await?;

        txn.commit().await?;
        info!(
            period_id = %period.id,
            year = period.year,
            interest_generated = %generated,
            "dividend period closed"
        );

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                AuditAction::Close,
                AuditEntity::DividendPeriod,
                period.id,
                format!("Closed dividend period {} with a pool of {generated}", period.year),
                Utc::now(),
            )
            .with_before(&before)
            .with_after(&period),
        );
        effects.publish(&self.db).await;

        Ok(period)
    }

    /// Computes every active member's eligibility and records their shares.
    pub async fn calculate(&self, period_id: Uuid, actor: Uuid) -> Result<Vec<dividends::Model>, RepositoryError> {
        let period = self.find(period_id).await?;
        let member_ids: Vec<Uuid> = members::Entity::find()
            .select_only()
            .column(members::Column::Id)
            .filter(members::Column::Active.eq(true))
            .order_by_asc(members::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut eligible = Vec::with_capacity(member_ids.len());
        for member_id in member_ids {
            let member = Self::member_eligibility(&self.db, member_id, period.start_date, period.end_date).await?;
            if member.average_fixed_balance > Decimal::ZERO || member.loan_count > 0 {
                eligible.push(member);
            }
        }

        self.allocate(period_id, &eligible, actor).await
    }

    /// Records one share per member for a closed period.
    ///
    /// Fails with `AlreadyCalculated` when the period already has shares.
    pub async fn allocate(
        &self,
        period_id: Uuid,
        members: &[MemberEligibility],
        actor: Uuid,
    ) -> Result<Vec<dividends::Model>, RepositoryError> {
        let txn = self.db.begin().await?;
        let period = Self::lock_period(&txn, period_id).await?;

        let existing = dividends::Entity::find()
            .filter(dividends::Column::PeriodId.eq(period.id))
            .count(&txn)
            .await?;
        if existing > 0 {
            return Err(DividendError::AlreadyCalculated(period.year).into());
        }

        let shares = DividendService::allocate(
            &DividendPeriodSnapshot::from(&period),
            members,
            self.policy.dividend_min_loans,
        )?;

        let now = Utc::now().into();
        let mut rows = Vec::with_capacity(shares.len());
        for share in shares {
            let row = dividends::ActiveModel {
                id: Set(Uuid::new_v4()),
                period_id: Set(period.id),
                member_id: Set(share.member_id),
                account_id: Set(None),
                average_fixed_balance: Set(share.average_fixed_balance),
                loan_count: Set(i32::try_from(share.loan_count).unwrap_or(i32::MAX)),
                qualifies: Set(share.qualifies),
                share_pct: Set(share.share_pct),
                amount: Set(share.amount),
                credited: Set(false),
                credited_on: Set(None),
                entry_id: Set(None),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(|err| {
                RepositoryError::from(err)
                    .unique_as("uq_dividend_per_member", DividendError::AlreadyCalculated(period.year))
            })?;
            rows.push(row);
        }

        txn.commit().await?;
        let allocated: Decimal = rows.iter().map(|row| row.amount).sum();
        info!(
            period_id = %period.id,
            year = period.year,
            members = rows.len(),
            qualifying = rows.iter().filter(|row| row.qualifies).count(),
            pool = %period.total_interest_generated,
            allocated = %allocated,
            "dividends calculated"
        );

        let mut effects = SideEffects::new();
        effects.audit(AuditRecord::new(
            actor,
            AuditAction::Update,
            AuditEntity::DividendPeriod,
            period.id,
            format!(
                "Calculated {} dividends totalling {allocated} for {}",
                rows.len(),
                period.year
            ),
            Utc::now(),
        ));
        effects.publish(&self.db).await;

        Ok(rows)
    }

    /// Credits one dividend to the member's fixed account.
    ///
    /// Returns `None` when it was already credited. A zero share is flagged
    /// without a ledger entry.
    pub async fn credit_one(&self, dividend_id: Uuid, actor: Uuid) -> Result<Option<CreditedDividend>, RepositoryError> {
        let txn = self.db.begin().await?;

        let period_id = dividends::Entity::find_by_id(dividend_id)
            .one(&txn)
            .await?
            .ok_or(DividendError::DividendNotFound(dividend_id))?
            .period_id;
        let period = Self::lock_period(&txn, period_id).await?;
        let dividend = dividends::Entity::find_by_id(dividend_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(DividendError::DividendNotFound(dividend_id))?;
        if dividend.credited {
            txn.rollback().await?;
            return Ok(None);
        }

        let total_distributed = DividendService::credit(
            &DividendPeriodSnapshot::from(&period),
            dividend.id,
            dividend.amount,
            dividend.credited,
        )?;

        let posting = if dividend.amount > Decimal::ZERO {
            let account_id = Self::credit_account(&txn, dividend.member_id)
                .await?
                .ok_or(DividendError::NoCreditAccount(dividend.member_id))?;
            let (account, withdrawable) = SavingsRepository::lock_account(&txn, account_id).await?;
            let change = SavingsService::credit(
                &SavingsRepository::snapshot(&account, withdrawable),
                dividend.amount,
                EntryType::Dividend,
            )?;
            let description = format!("Dividend {}", period.year);
            Some(SavingsRepository::post(&txn, account, &change, None, description, actor).await?)
        } else {
            None
        };

        let now = Utc::now();
        let before = dividend.clone();
        let mut active: dividends::ActiveModel = dividend.into();
        active.credited = Set(true);
        active.credited_on = Set(Some(now.date_naive()));
        active.account_id = Set(posting.as_ref().map(|p| p.account.id));
        active.entry_id = Set(posting.as_ref().map(|p| p.entry.id));
        active.updated_at = Set(now.into());
        let dividend = active.update(&txn).await?;

        let mut period: dividend_periods::ActiveModel = period.into();
        period.total_distributed = Set(total_distributed);
        period.updated_at = Set(now.into());
        period.update(&txn).await?;

        txn.commit().await?;
        info!(
            dividend_id = %dividend.id,
            member_id = %dividend.member_id,
            amount = %dividend.amount,
            total_distributed = %total_distributed,
            "dividend credited"
        );

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                AuditAction::Disburse,
                AuditEntity::Dividend,
                dividend.id,
                format!("Credited dividend of {}", dividend.amount),
                Utc::now(),
            )
            .with_before(&before)
            .with_after(&dividend),
        );
        if let Some(posting) = &posting {
            effects
                .audit(SavingsRepository::entry_audit(posting, actor, AuditAction::Create))
                .notify(NotificationTemplates::dividend(
                    posting.account.member_id,
                    posting.entry.id,
                    &posting.account.account_number,
                    posting.entry.amount,
                ));
        }
        effects.publish(&self.db).await;

        Ok(Some(CreditedDividend { dividend, posting }))
    }

    /// Credits every pending dividend of the period, then marks it
    /// DISTRIBUTED when none is left.
    ///
    /// Safe to rerun: credited dividends are skipped and failed ones stay
    /// pending for the next run.
    pub async fn credit(&self, period_id: Uuid, actor: Uuid) -> Result<CreditReport, RepositoryError> {
        let pending: Vec<Uuid> = dividends::Entity::find()
            .select_only()
            .column(dividends::Column::Id)
            .filter(dividends::Column::PeriodId.eq(period_id))
            .filter(dividends::Column::Credited.eq(false))
            .order_by_asc(dividends::Column::CreatedAt)
            .order_by_asc(dividends::Column::Id)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut report = CreditReport {
            pending: pending.len(),
            ..CreditReport::default()
        };

        for id in pending {
            match self.credit_one(id, actor).await {
                Ok(Some(_)) => report.credited += 1,
                Ok(None) => {}
                Err(err) => {
                    report.failed += 1;
                    warn!(dividend_id = %id, error = %err, "dividend credit failed, skipping");
                }
            }
        }

        if report.failed == 0 {
            match self.finish(period_id, actor).await {
                Ok(_) => report.distributed = true,
                Err(RepositoryError::Dividend(DividendError::InvalidTransition {
                    from: DividendPeriodStatus::Distributed,
                    ..
                })) => report.distributed = true,
                Err(err) => return Err(err),
            }
        }

        info!(
            period_id = %period_id,
            pending = report.pending,
            credited = report.credited,
            failed = report.failed,
            distributed = report.distributed,
            "dividend credit run complete"
        );
        Ok(report)
    }

    /// CLOSED -> DISTRIBUTED once every share is credited.
    pub async fn finish(&self, period_id: Uuid, actor: Uuid) -> Result<dividend_periods::Model, RepositoryError> {
        let txn = self.db.begin().await?;
        let period = Self::lock_period(&txn, period_id).await?;

        let calculated = dividends::Entity::find()
            .filter(dividends::Column::PeriodId.eq(period.id))
            .count(&txn)
            .await?;
        let pending = dividends::Entity::find()
            .filter(dividends::Column::PeriodId.eq(period.id))
            .filter(dividends::Column::Credited.eq(false))
            .count(&txn)
            .await?;
        let status = DividendService::finish(&DividendPeriodSnapshot::from(&period), calculated, pending)?;

        let before = period.clone();
        let mut active: dividend_periods::ActiveModel = period.into();
        active.status = Set(status.into());
        active.distributed_on = Set(Some(Utc::now().date_naive()));
        active.updated_at = Set(Utc::now().into());
        let period = active.update(&txn).await?;

        txn.commit().await?;
        info!(
            period_id = %period.id,
            year = period.year,
            total_distributed = %period.total_distributed,
            "dividend period distributed"
        );

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                AuditAction::Update,
                AuditEntity::DividendPeriod,
                period.id,
                format!("Distributed {} for {}", period.total_distributed, period.year),
                Utc::now(),
            )
            .with_before(&before)
            .with_after(&period),
        );
        effects.publish(&self.db).await;

        Ok(period)
    }

    /// Average fixed balance and loan count of one member over a range.
    pub async fn eligibility(
        &self,
        member_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<MemberEligibility, RepositoryError> {
        Self::member_eligibility(&self.db, member_id, start, end).await
    }

    /// Loan interest paid between `start` and `end`, inclusive.
    pub async fn interest_generated(&self, start: NaiveDate, end: NaiveDate) -> Result<Decimal, RepositoryError> {
        Self::interest_paid(&self.db, start, end).await
    }

    /// Finds a period by id.
    pub async fn find(&self, period_id: Uuid) -> Result<dividend_periods::Model, RepositoryError> {
        dividend_periods::Entity::find_by_id(period_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| DividendError::PeriodNotFound(period_id).into())
    }

    /// Finds the period of a year, if opened.
    pub async fn find_by_year(&self, year: i32) -> Result<Option<dividend_periods::Model>, RepositoryError> {
        let period = dividend_periods::Entity::find()
            .filter(dividend_periods::Column::Year.eq(year))
            .one(&self.db)
            .await?;
        Ok(period)
    }

    /// Shares of a period, largest first.
    pub async fn dividends(&self, period_id: Uuid) -> Result<Vec<dividends::Model>, RepositoryError> {
        let rows = dividends::Entity::find()
            .filter(dividends::Column::PeriodId.eq(period_id))
            .order_by_desc(dividends::Column::Amount)
            .order_by_asc(dividends::Column::MemberId)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn lock_period(
        txn: &DatabaseTransaction,
        period_id: Uuid,
    ) -> Result<dividend_periods::Model, RepositoryError> {
        dividend_periods::Entity::find_by_id(period_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| DividendError::PeriodNotFound(period_id).into())
    }

    async fn interest_paid<C: ConnectionTrait>(
        conn: &C,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Decimal, RepositoryError> {
        let interest: Vec<Decimal> = payments::Entity::find()
            .select_only()
            .column(payments::Column::Interest)
            .filter(payments::Column::PaidOn.between(start, end))
            .into_tuple()
            .all(conn)
            .await?;
        Ok(interest.into_iter().sum())
    }

    /// The member's open fixed account with the largest balance.
    async fn credit_account(txn: &DatabaseTransaction, member_id: Uuid) -> Result<Option<Uuid>, RepositoryError> {
        let account = accounts::Entity::find()
            .inner_join(account_types::Entity)
            .filter(accounts::Column::MemberId.eq(member_id))
            .filter(accounts::Column::Status.eq(DbAccountStatus::Active))
            .filter(account_types::Column::Withdrawable.eq(false))
            .order_by_desc(accounts::Column::Balance)
            .order_by_asc(accounts::Column::OpenedOn)
            .one(txn)
            .await?;
        Ok(account.map(|a| a.id))
    }

    async fn member_eligibility<C: ConnectionTrait>(
        conn: &C,
        member_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<MemberEligibility, RepositoryError> {
        let from = day_start(start);
        let until = day_start(end.checked_add_days(Days::new(1)).unwrap_or(end));

        let fixed_accounts: Vec<Uuid> = accounts::Entity::find()
            .select_only()
            .column(accounts::Column::Id)
            .inner_join(account_types::Entity)
            .filter(accounts::Column::MemberId.eq(member_id))
            .filter(account_types::Column::Withdrawable.eq(false))
            .into_tuple()
            .all(conn)
            .await?;

        let mut average = Decimal::ZERO;
        for account_id in fixed_accounts {
            let opening = ledger_entries::Entity::find()
                .filter(ledger_entries::Column::AccountId.eq(account_id))
                .filter(ledger_entries::Column::CreatedAt.lt(from))
                .order_by_desc(ledger_entries::Column::CreatedAt)
                .order_by_desc(ledger_entries::Column::Id)
                .one(conn)
                .await?
                .and_then(|entry| entry.new_balance)
                .unwrap_or(Decimal::ZERO);
            let points: Vec<BalancePoint> = ledger_entries::Entity::find()
                .filter(ledger_entries::Column::AccountId.eq(account_id))
                .filter(ledger_entries::Column::CreatedAt.gte(from))
                .filter(ledger_entries::Column::CreatedAt.lt(until))
                .order_by_asc(ledger_entries::Column::CreatedAt)
                .order_by_asc(ledger_entries::Column::Id)
                .all(conn)
                .await?
                .into_iter()
                .filter_map(|entry| {
                    entry.new_balance.map(|balance| BalancePoint {
                        on: entry.created_at.with_timezone(&Utc).date_naive(),
                        balance,
                    })
                })
                .collect();
            average += DividendService::average_balance(opening, &points, start, end);
        }

        // Loans disbursed by year end that were still running at some point
        // during the year.
        let loan_count = loans::Entity::find()
            .filter(loans::Column::MemberId.eq(member_id))
            .filter(loans::Column::DisbursedOn.lte(end))
            .filter(loans::Column::Status.is_in([
                DbLoanStatus::Disbursed,
                DbLoanStatus::InRepayment,
                DbLoanStatus::Paid,
                DbLoanStatus::Defaulted,
            ]))
            .filter(
                Condition::any()
                    .add(loans::Column::DisbursedOn.gte(start))
                    .add(loans::Column::Status.ne(DbLoanStatus::Paid))
                    .add(loans::Column::UpdatedAt.gte(from)),
            )
            .count(conn)
            .await?;

        Ok(MemberEligibility {
            member_id,
            average_fixed_balance: average,
            loan_count: u32::try_from(loan_count).unwrap_or(u32::MAX),
        })
    }
}

fn day_start(date: NaiveDate) -> DateTime<Utc> {
    date.and_time(NaiveTime::MIN).and_utc()
}
