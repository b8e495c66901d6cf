//! Daily delinquency run.
//!
//! Each installment is accrued in its own transaction so one failure does
//! not hold back the rest of the sweep.

use chrono::{Days, NaiveDate, Utc};
use coopbank_core::audit::{AuditAction, AuditEntity, AuditRecord, SYSTEM_ACTOR};
use coopbank_core::delinquency::{Accrual, DelinquencyService};
use coopbank_core::loan::{InstallmentSnapshot, LoanError, LoanStatus};
use coopbank_core::notification::NotificationTemplates;
use coopbank_shared::PolicyConfig;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::hooks::SideEffects;
use super::notification::NotificationRepository;
use crate::entities::{
    installments, loans,
    sea_orm_active_enums::{InstallmentStatus as DbInstallmentStatus, LoanStatus as DbLoanStatus},
};
use crate::error::RepositoryError;

/// Result of accruing one installment.
#[derive(Debug, Clone, Serialize)]
pub struct AccruedInstallment {
    /// Installment after the update.
    pub installment: installments::Model,
    /// Derived lateness and penalty.
    pub accrual: Accrual,
}

/// Outcome of a sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Installments examined.
    pub scanned: usize,
    /// Installments whose penalty or state changed.
    pub accrued: usize,
    /// Overdue reminders enqueued.
    pub reminders: usize,
    /// Installments skipped after an error.
    pub failed: usize,
}

/// Delinquency repository.
#[derive(Debug, Clone)]
pub struct DelinquencyRepository {
    db: DatabaseConnection,
    policy: PolicyConfig,
}

impl DelinquencyRepository {
    /// Creates a new delinquency repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, policy: PolicyConfig) -> Self {
        Self { db, policy }
    }

    /// Accrues the penalty of one installment as of `as_of`.
    ///
    /// Returns `None` when nothing changed: the installment is settled, not
    /// yet due, already up to date, or its loan no longer takes payments.
    pub async fn accrue_installment(
        &self,
        installment_id: Uuid,
        as_of: NaiveDate,
    ) -> Result<Option<AccruedInstallment>, RepositoryError> {
        let txn = self.db.begin().await?;

        let loan_id = installments::Entity::find_by_id(installment_id)
            .one(&txn)
            .await?
            .ok_or(LoanError::InstallmentNotFound(installment_id))?
            .loan_id;
        let loan = loans::Entity::find_by_id(loan_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(LoanError::LoanNotFound(loan_id))?;
        let installment = installments::Entity::find_by_id(installment_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(LoanError::InstallmentNotFound(installment_id))?;

        if !LoanStatus::from(loan.status).accepts_payments() {
            txn.rollback().await?;
            return Ok(None);
        }

        let snapshot = InstallmentSnapshot::from(&installment);
        let Some(accrual) =
            DelinquencyService::refresh(&snapshot, as_of, self.policy.daily_penalty_rate_pct)
        else {
            txn.rollback().await?;
            return Ok(None);
        };
        if accrual.penalty == installment.penalty
            && accrual.days_late == installment.days_late
            && accrual.status == snapshot.status
        {
            txn.rollback().await?;
            return Ok(None);
        }

        let before = installment.clone();
        let mut active: installments::ActiveModel = installment.into();
        active.penalty = Set(accrual.penalty);
        active.days_late = Set(accrual.days_late);
        active.status = Set(accrual.status.into());
        active.updated_at = Set(Utc::now().into());
        let installment = active.update(&txn).await?;

        txn.commit().await?;
        info!(
            installment_id = %installment.id,
            loan_number = %loan.loan_number,
            days_late = accrual.days_late,
            penalty = %accrual.penalty,
            "penalty accrued"
        );

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                SYSTEM_ACTOR,
                AuditAction::Accrue,
                AuditEntity::Installment,
                installment.id,
                format!(
                    "Installment {} of loan {} is {} days late",
                    installment.number, loan.loan_number, accrual.days_late
                ),
                Utc::now(),
            )
            .with_before(&before)
            .with_after(&installment),
        );
        if DelinquencyService::overdue_reminder_due(
            accrual.days_late,
            self.policy.overdue_reminder_interval_days,
        ) {
            effects.notify(NotificationTemplates::installment_overdue(
                loan.member_id,
                installment.id,
                &loan.loan_number,
                installment.number,
                accrual.days_late,
                accrual.penalty,
                as_of,
            ));
        }
        effects.publish(&self.db).await;

        Ok(Some(AccruedInstallment {
            installment,
            accrual,
        }))
    }

    /// Accrues every unsettled installment past its due date.
    pub async fn sweep(&self, as_of: NaiveDate) -> Result<SweepReport, RepositoryError> {
        let candidates: Vec<Uuid> = installments::Entity::find()
            .select_only()
            .column(installments::Column::Id)
            .filter(
                installments::Column::Status
                    .is_in([DbInstallmentStatus::Pending, DbInstallmentStatus::Overdue]),
            )
            .filter(installments::Column::DueDate.lt(as_of))
            .order_by_asc(installments::Column::DueDate)
            .into_tuple()
            .all(&self.db)
            .await?;

        let mut report = SweepReport {
            scanned: candidates.len(),
            ..SweepReport::default()
        };

        for id in candidates {
            match self.accrue_installment(id, as_of).await {
                Ok(Some(accrued)) => {
                    report.accrued += 1;
                    if DelinquencyService::overdue_reminder_due(
                        accrued.accrual.days_late,
                        self.policy.overdue_reminder_interval_days,
                    ) {
                        report.reminders += 1;
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    report.failed += 1;
                    warn!(installment_id = %id, error = %err, "accrual failed, skipping");
                }
            }
        }

        info!(
            %as_of,
            scanned = report.scanned,
            accrued = report.accrued,
            reminders = report.reminders,
            failed = report.failed,
            "delinquency sweep finished"
        );
        Ok(report)
    }

    /// Enqueues reminders for installments falling due within the window.
    ///
    /// Returns the number of new notifications; repeats on the same day are
    /// absorbed by the dedupe key.
    pub async fn remind_due_soon(&self, as_of: NaiveDate) -> Result<usize, RepositoryError> {
        let horizon = as_of
            .checked_add_days(Days::new(u64::from(self.policy.due_soon_days)))
            .unwrap_or(NaiveDate::MAX);

        let rows = installments::Entity::find()
            .filter(installments::Column::Status.eq(DbInstallmentStatus::Pending))
            .filter(installments::Column::DueDate.between(as_of, horizon))
            .find_also_related(loans::Entity)
            .filter(loans::Column::Status.is_in([DbLoanStatus::Disbursed, DbLoanStatus::InRepayment]))
            .order_by_asc(installments::Column::DueDate)
            .all(&self.db)
            .await?;

        let outbox = NotificationRepository::new(self.db.clone());
        let mut sent = 0;
        for (installment, loan) in rows {
            let Some(loan) = loan else { continue };
            if !DelinquencyService::is_due_soon(
                installment.status.into(),
                installment.due_date,
                as_of,
                self.policy.due_soon_days,
            ) {
                continue;
            }
            let draft = NotificationTemplates::installment_due_soon(
                loan.member_id,
                installment.id,
                &loan.loan_number,
                installment.number,
                installment.payment,
                installment.due_date,
                as_of,
            );
            if outbox.enqueue(&draft).await? {
                sent += 1;
            }
        }

        info!(%as_of, sent, "due-soon reminders enqueued");
        Ok(sent)
    }
}
