//! Ledger reconciliation runs.
//!
//! Stored balances are compared with balances replayed from the append-only
//! ledgers. Mismatches are reported, never corrected.

use coopbank_core::fund::{FundTotals, MovementSnapshot};
use coopbank_core::reconciliation::{AccountReconciliation, ReconciliationService};
use coopbank_core::savings::EntrySnapshot;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, QuerySelect};
use serde::Serialize;
use tracing::{error, info};
use uuid::Uuid;

use super::fund::FundRepository;
use crate::entities::{accounts, fund_movements, ledger_entries, mutual_funds};
use crate::error::RepositoryError;

/// What a mismatch was found on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subject {
    /// Savings account.
    Account,
    /// Mutual fund period.
    Fund,
}

/// One failed check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Checked object kind.
    pub subject: Subject,
    /// Checked object id.
    pub id: Uuid,
    /// Stable error code.
    pub code: &'static str,
    /// Human-readable detail.
    pub detail: String,
}

/// Summary of a full run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReconciliationReport {
    /// Accounts replayed.
    pub accounts_checked: usize,
    /// Funds replayed.
    pub funds_checked: usize,
    /// Failed checks.
    pub mismatches: Vec<Mismatch>,
}

impl ReconciliationReport {
    /// True when every check passed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.mismatches.is_empty()
    }
}

/// Reconciliation repository.
#[derive(Debug, Clone)]
pub struct ReconciliationRepository {
    db: DatabaseConnection,
}

impl ReconciliationRepository {
    /// Creates a new reconciliation repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Replays one account's ledger against its stored balance.
    pub async fn verify_account(&self, account_id: Uuid) -> Result<AccountReconciliation, RepositoryError> {
        let account = accounts::Entity::find_by_id(account_id)
            .one(&self.db)
            .await?
            .ok_or(RepositoryError::not_found("account", account_id))?;

        let entries: Vec<EntrySnapshot> = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::AccountId.eq(account_id))
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.db)
            .await?
            .iter()
            .map(EntrySnapshot::from)
            .collect();

        Ok(ReconciliationService::verify_account(account.id, account.balance, &entries)?)
    }

    /// Recomputes one fund's totals from its kardex.
    pub async fn verify_fund(&self, fund_id: Uuid) -> Result<FundTotals, RepositoryError> {
        let fund = mutual_funds::Entity::find_by_id(fund_id)
            .one(&self.db)
            .await?
            .ok_or(RepositoryError::not_found("fund", fund_id))?;

        let movements: Vec<MovementSnapshot> = fund_movements::Entity::find()
            .filter(fund_movements::Column::FundId.eq(fund_id))
            .all(&self.db)
            .await?
            .iter()
            .map(MovementSnapshot::from)
            .collect();

        Ok(ReconciliationService::verify_fund(
            fund.id,
            &FundRepository::stored_totals(&fund),
            &movements,
        )?)
    }

    /// Checks every account and every fund.
    ///
    /// Only reconciliation failures are collected; database errors abort the
    /// run.
    pub async fn run(&self) -> Result<ReconciliationReport, RepositoryError> {
        let mut report = ReconciliationReport::default();

        let account_ids: Vec<Uuid> = accounts::Entity::find()
            .select_only()
            .column(accounts::Column::Id)
            .order_by_asc(accounts::Column::AccountNumber)
            .into_tuple()
            .all(&self.db)
            .await?;
        for id in account_ids {
            report.accounts_checked += 1;
            if let Some(mismatch) = Self::classify(Subject::Account, id, self.verify_account(id).await)? {
                report.mismatches.push(mismatch);
            }
        }

        let fund_ids: Vec<Uuid> = mutual_funds::Entity::find()
            .select_only()
            .column(mutual_funds::Column::Id)
            .order_by_asc(mutual_funds::Column::PeriodKey)
            .into_tuple()
            .all(&self.db)
            .await?;
        for id in fund_ids {
            report.funds_checked += 1;
            if let Some(mismatch) = Self::classify(Subject::Fund, id, self.verify_fund(id).await)? {
                report.mismatches.push(mismatch);
            }
        }

        info!(
            accounts = report.accounts_checked,
            funds = report.funds_checked,
            mismatches = report.mismatches.len(),
            "reconciliation finished"
        );
        Ok(report)
    }

    fn classify<T>(
        subject: Subject,
        id: Uuid,
        result: Result<T, RepositoryError>,
    ) -> Result<Option<Mismatch>, RepositoryError> {
        match result {
            Ok(_) => Ok(None),
            Err(RepositoryError::Reconciliation(err)) => {
                error!(?subject, %id, code = err.error_code(), error = %err, "reconciliation mismatch");
                Ok(Some(Mismatch {
                    subject,
                    id,
                    code: err.error_code(),
                    detail: err.to_string(),
                }))
            }
            Err(err) => Err(err),
        }
    }
}
