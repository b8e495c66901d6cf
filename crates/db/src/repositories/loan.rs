//! Loan lifecycle repository.
//!
//! Transitions are planned by [`LoanService`] against the locked loan row.
//! Payments lock the loan first, then the targeted installment.

use chrono::{NaiveDate, Utc};
use coopbank_core::amortization::AmortizationService;
use coopbank_core::audit::{AuditAction, AuditEntity, AuditRecord};
use coopbank_core::loan::{
    Eligibility, GuarantorCheck, GuarantorService, InstallmentSnapshot, LoanError, LoanRequestInput,
    LoanService, LoanStatus, LoanTypeTerms, PaymentAllocation, PaymentCapacity, PaymentMethod,
    PaymentService,
};
use coopbank_core::notification::NotificationTemplates;
use coopbank_core::numbering::DocumentKind;
use coopbank_shared::PolicyConfig;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::hooks::SideEffects;
use super::numbering::next_number;
use crate::entities::{
    account_types, accounts, guarantors, installments, ledger_entries, loan_types, loans, members,
    payments,
    sea_orm_active_enums::{
        AccountStatus as DbAccountStatus, EntryStatus as DbEntryStatus, EntryType as DbEntryType,
        InstallmentStatus as DbInstallmentStatus, LoanStatus as DbLoanStatus,
    },
};
use crate::error::RepositoryError;

/// Input for a new loan request.
#[derive(Debug, Clone)]
pub struct LoanRequest {
    /// Borrower.
    pub member_id: Uuid,
    /// Loan type.
    pub loan_type_id: Uuid,
    /// Requested principal.
    pub amount: Decimal,
    /// Requested term in months.
    pub term_months: i32,
    /// Whether installments are deducted from payroll.
    pub payroll_deduction: bool,
    /// Free-text notes.
    pub notes: Option<String>,
    /// Request date, also used for the loan number.
    pub requested_on: NaiveDate,
    /// User performing the operation.
    pub actor: Uuid,
}

/// Input for approving a loan.
#[derive(Debug, Clone)]
pub struct ApproveLoanInput {
    /// Loan to approve.
    pub loan_id: Uuid,
    /// Approved principal.
    pub approved_amount: Decimal,
    /// Due date of the first installment.
    pub first_payment_on: NaiveDate,
    /// Approval date.
    pub approved_on: NaiveDate,
    /// User performing the operation.
    pub actor: Uuid,
}

/// Input for a loan payment.
#[derive(Debug, Clone)]
pub struct PaymentInput {
    /// Loan being paid.
    pub loan_id: Uuid,
    /// Installment to pay; the oldest unpaid one when `None`.
    pub installment_id: Option<Uuid>,
    /// Amount received.
    pub amount: Decimal,
    /// How it was paid.
    pub method: PaymentMethod,
    /// Payment date; penalties are derived for this day.
    pub paid_on: NaiveDate,
    /// User performing the operation.
    pub actor: Uuid,
}

/// An approved loan with its fresh schedule.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovedLoan {
    /// The loan.
    pub loan: loans::Model,
    /// Installments ordered by number.
    pub installments: Vec<installments::Model>,
}

/// A disbursed loan and its ledger entry.
#[derive(Debug, Clone, Serialize)]
pub struct Disbursement {
    /// The loan.
    pub loan: loans::Model,
    /// LOAN_DISBURSEMENT entry.
    pub entry: ledger_entries::Model,
}

/// Everything written by one payment.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    /// Payment row.
    pub payment: payments::Model,
    /// Loan after the payment.
    pub loan: loans::Model,
    /// Installment after the payment, if one was targeted.
    pub installment: Option<installments::Model>,
    /// LOAN_PAYMENT entry.
    pub entry: ledger_entries::Model,
    /// How the amount was split.
    pub allocation: PaymentAllocation,
}

/// Eligibility of a member for a prospective loan.
#[derive(Debug, Clone, Serialize)]
pub struct EligibilityReport {
    /// Savings ceiling and guarantor requirement.
    pub eligibility: Eligibility,
    /// Installment burden against estimated income.
    pub capacity: PaymentCapacity,
    /// Installment the new loan would carry.
    pub new_installment: Decimal,
}

/// Loan repository.
#[derive(Debug, Clone)]
pub struct LoanRepository {
    db: DatabaseConnection,
    policy: PolicyConfig,
}

impl LoanRepository {
    /// Creates a new loan repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, policy: PolicyConfig) -> Self {
        Self { db, policy }
    }

    /// Records a loan request, freezing the loan type's rate.
    pub async fn request_loan(&self, input: LoanRequest) -> Result<loans::Model, RepositoryError> {
        let txn = self.db.begin().await?;

        let member = members::Entity::find_by_id(input.member_id)
            .one(&txn)
            .await?
            .ok_or(RepositoryError::not_found("member", input.member_id))?;
        let loan_type = loan_types::Entity::find_by_id(input.loan_type_id)
            .one(&txn)
            .await?
            .ok_or(LoanError::LoanTypeNotFound(input.loan_type_id))?;

        let rate = LoanService::validate_request(
            &LoanTypeTerms::from(&loan_type),
            &LoanRequestInput {
                member_id: input.member_id,
                amount: input.amount,
                term_months: input.term_months,
                member_active: member.active,
            },
        )?;

        let now = Utc::now().into();
        let loan_number = next_number(&txn, DocumentKind::Loan, input.requested_on).await?;
        let loan = loans::ActiveModel {
            id: Set(Uuid::new_v4()),
            loan_number: Set(loan_number),
            member_id: Set(input.member_id),
            loan_type_id: Set(input.loan_type_id),
            requested_amount: Set(input.amount),
            approved_amount: Set(None),
            annual_rate_pct: Set(rate),
            term_months: Set(input.term_months),
            monthly_payment: Set(None),
            total_payable: Set(Decimal::ZERO),
            outstanding_balance: Set(Decimal::ZERO),
            status: Set(DbLoanStatus::Requested),
            payroll_deduction: Set(input.payroll_deduction),
            notes: Set(input.notes.clone()),
            approved_by: Set(None),
            requested_on: Set(input.requested_on),
            approved_on: Set(None),
            disbursed_on: Set(None),
            first_payment_on: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await?;

        txn.commit().await?;
        info!(
            loan_id = %loan.id,
            loan_number = %loan.loan_number,
            member_id = %loan.member_id,
            amount = %loan.requested_amount,
            term_months = loan.term_months,
            "loan requested"
        );

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                input.actor,
                AuditAction::Create,
                AuditEntity::Loan,
                loan.id,
                format!("Requested loan {}", loan.loan_number),
                Utc::now(),
            )
            .with_after(&loan),
        );
        effects.publish(&self.db).await;

        Ok(loan)
    }

    /// Checks a prospective loan against the member's fixed savings and
    /// payroll capacity.
    ///
    /// Fixed savings is the balance of the member's open account whose type
    /// is funded by payroll deduction.
    pub async fn eligibility(
        &self,
        member_id: Uuid,
        loan_type_id: Uuid,
        amount: Decimal,
        term_months: i32,
    ) -> Result<EligibilityReport, RepositoryError> {
        let loan_type = loan_types::Entity::find_by_id(loan_type_id)
            .one(&self.db)
            .await?
            .ok_or(LoanError::LoanTypeNotFound(loan_type_id))?;
        let terms = LoanTypeTerms::from(&loan_type);

        let open_accounts = accounts::Entity::find()
            .filter(accounts::Column::MemberId.eq(member_id))
            .filter(accounts::Column::Status.eq(DbAccountStatus::Active))
            .find_also_related(account_types::Entity)
            .all(&self.db)
            .await?;

        let fixed_savings = open_accounts
            .iter()
            .filter(|(_, kind)| kind.as_ref().is_some_and(|k| k.payroll_deduction))
            .map(|(account, _)| account.balance)
            .reduce(|a, b| a + b);
        let payroll_savings: Decimal = open_accounts.iter().map(|(account, _)| account.payroll_amount).sum();

        let current_installments: Decimal = loans::Entity::find()
            .filter(loans::Column::MemberId.eq(member_id))
            .filter(loans::Column::Status.is_in([DbLoanStatus::Disbursed, DbLoanStatus::InRepayment]))
            .all(&self.db)
            .await?
            .iter()
            .filter_map(|loan| loan.monthly_payment)
            .sum();

        let new_installment =
            AmortizationService::compute_monthly_payment(amount, terms.annual_rate_pct, term_months)
                .map_err(LoanError::from)?;

        Ok(EligibilityReport {
            eligibility: GuarantorService::eligibility(fixed_savings, &terms, amount),
            capacity: GuarantorService::payment_capacity(current_installments, new_installment, payroll_savings),
            new_installment,
        })
    }

    /// Adds a guarantor, reactivating an earlier removed one if present.
    pub async fn add_guarantor(
        &self,
        loan_id: Uuid,
        guarantor_id: Uuid,
        accepted_on: NaiveDate,
        actor: Uuid,
    ) -> Result<guarantors::Model, RepositoryError> {
        let txn = self.db.begin().await?;
        let loan = Self::lock_loan(&txn, loan_id).await?;

        let guarantor = members::Entity::find_by_id(guarantor_id)
            .one(&txn)
            .await?
            .ok_or(RepositoryError::not_found("member", guarantor_id))?;
        let rows = guarantors::Entity::find()
            .filter(guarantors::Column::LoanId.eq(loan.id))
            .all(&txn)
            .await?;
        let active: Vec<Uuid> = rows.iter().filter(|g| g.active).map(|g| g.member_id).collect();

        GuarantorService::validate_add(
            LoanStatus::from(loan.status),
            loan.member_id,
            guarantor_id,
            guarantor.active,
            &active,
        )?;

        let row = if let Some(previous) = rows.into_iter().find(|g| g.member_id == guarantor_id) {
            let mut revived: guarantors::ActiveModel = previous.into();
            revived.active = Set(true);
            revived.accepted_on = Set(accepted_on);
            revived.update(&txn).await?
        } else {
            guarantors::ActiveModel {
                id: Set(Uuid::new_v4()),
                loan_id: Set(loan_id),
                member_id: Set(guarantor_id),
                accepted_on: Set(accepted_on),
                active: Set(true),
                created_at: Set(Utc::now().into()),
            }
            .insert(&txn)
            .await?
        };

        txn.commit().await?;
        info!(loan_id = %loan_id, guarantor_id = %guarantor_id, "guarantor added");

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                AuditAction::Create,
                AuditEntity::Guarantor,
                row.id,
                format!("Guarantor added to loan {}", loan.loan_number),
                Utc::now(),
            )
            .with_after(&row),
        );
        effects.publish(&self.db).await;

        Ok(row)
    }

    /// Deactivates a guarantor.
    pub async fn remove_guarantor(
        &self,
        loan_id: Uuid,
        guarantor_id: Uuid,
        actor: Uuid,
    ) -> Result<guarantors::Model, RepositoryError> {
        let txn = self.db.begin().await?;
        let loan = Self::lock_loan(&txn, loan_id).await?;
        LoanService::ensure_editable(LoanStatus::from(loan.status))?;

        let row = guarantors::Entity::find()
            .filter(guarantors::Column::LoanId.eq(loan_id))
            .filter(guarantors::Column::MemberId.eq(guarantor_id))
            .filter(guarantors::Column::Active.eq(true))
            .one(&txn)
            .await?
            .ok_or(RepositoryError::not_found("guarantor", guarantor_id))?;
        let before = row.clone();

        let mut inactive: guarantors::ActiveModel = row.into();
        inactive.active = Set(false);
        let row = inactive.update(&txn).await?;

        txn.commit().await?;
        info!(loan_id = %loan_id, guarantor_id = %guarantor_id, "guarantor removed");

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                AuditAction::Update,
                AuditEntity::Guarantor,
                row.id,
                format!("Guarantor removed from loan {}", loan.loan_number),
                Utc::now(),
            )
            .with_before(&before)
            .with_after(&row),
        );
        effects.publish(&self.db).await;

        Ok(row)
    }

    /// Guarantor coverage of a loan.
    pub async fn guarantor_check(&self, loan_id: Uuid) -> Result<GuarantorCheck, RepositoryError> {
        let loan = self.find(loan_id).await?;
        Self::coverage(&self.db, &loan).await
    }

    /// REQUESTED -> IN_REVIEW.
    pub async fn start_review(&self, loan_id: Uuid, actor: Uuid) -> Result<loans::Model, RepositoryError> {
        self.transition(loan_id, actor, AuditAction::Update, LoanService::start_review)
            .await
    }

    /// IN_REPAYMENT -> CANCELLED.
    pub async fn cancel(&self, loan_id: Uuid, actor: Uuid) -> Result<loans::Model, RepositoryError> {
        self.transition(loan_id, actor, AuditAction::Update, LoanService::cancel)
            .await
    }

    /// IN_REPAYMENT -> DEFAULTED.
    pub async fn mark_defaulted(&self, loan_id: Uuid, actor: Uuid) -> Result<loans::Model, RepositoryError> {
        self.transition(loan_id, actor, AuditAction::Update, LoanService::mark_defaulted)
            .await
    }

    /// Approves a loan and replaces its schedule.
    pub async fn approve(&self, input: ApproveLoanInput) -> Result<ApprovedLoan, RepositoryError> {
        let txn = self.db.begin().await?;
        let loan = Self::lock_loan(&txn, input.loan_id).await?;

        let gate = if self.policy.enforce_guarantors_on_approve {
            Some(Self::coverage(&txn, &loan).await?)
        } else {
            None
        };

        let plan = LoanService::approve(
            LoanStatus::from(loan.status),
            input.approved_amount,
            loan.annual_rate_pct,
            loan.term_months,
            input.first_payment_on,
            gate.as_ref(),
        )?;

        installments::Entity::delete_many()
            .filter(installments::Column::LoanId.eq(loan.id))
            .exec(&txn)
            .await?;

        let now = Utc::now().into();
        let mut schedule = Vec::with_capacity(plan.schedule.rows.len());
        for row in &plan.schedule.rows {
            let inserted = installments::ActiveModel {
                id: Set(Uuid::new_v4()),
                loan_id: Set(loan.id),
                number: Set(row.number),
                payment: Set(row.payment),
                principal: Set(row.principal),
                interest: Set(row.interest),
                penalty: Set(Decimal::ZERO),
                principal_paid: Set(Decimal::ZERO),
                interest_paid: Set(Decimal::ZERO),
                penalty_paid: Set(Decimal::ZERO),
                balance: Set(row.balance),
                due_date: Set(row.due_date),
                paid_on: Set(None),
                days_late: Set(0),
                status: Set(DbInstallmentStatus::Pending),
                created_at: Set(now),
                updated_at: Set(now),
            }
            .insert(&txn)
            .await?;
            schedule.push(inserted);
        }

        let before = loan.clone();
        let mut active: loans::ActiveModel = loan.into();
        active.status = Set(plan.status.into());
        active.approved_amount = Set(Some(plan.approved_amount));
        active.monthly_payment = Set(Some(plan.monthly_payment));
        active.total_payable = Set(plan.total_payable);
        active.outstanding_balance = Set(plan.outstanding_balance);
        active.approved_by = Set(Some(input.actor));
        active.approved_on = Set(Some(input.approved_on));
        active.first_payment_on = Set(Some(input.first_payment_on));
        active.updated_at = Set(now);
        let loan = active.update(&txn).await?;

        txn.commit().await?;
        info!(
            loan_id = %loan.id,
            approved_amount = %plan.approved_amount,
            monthly_payment = %plan.monthly_payment,
            installments = schedule.len(),
            "loan approved"
        );

        let mut effects = SideEffects::new();
        effects
            .audit(
                AuditRecord::new(
                    input.actor,
                    AuditAction::Approve,
                    AuditEntity::Loan,
                    loan.id,
                    format!("Approved loan {}", loan.loan_number),
                    Utc::now(),
                )
                .with_before(&before)
                .with_after(&loan),
            )
            .notify(NotificationTemplates::loan_approved(
                loan.member_id,
                loan.id,
                &loan.loan_number,
                plan.approved_amount,
                plan.monthly_payment,
            ));
        effects.publish(&self.db).await;

        Ok(ApprovedLoan {
            loan,
            installments: schedule,
        })
    }

    /// Rejects a loan, appending the reason to its notes.
    pub async fn reject(&self, loan_id: Uuid, reason: &str, actor: Uuid) -> Result<loans::Model, RepositoryError> {
        let txn = self.db.begin().await?;
        let loan = Self::lock_loan(&txn, loan_id).await?;

        let (status, notes) = LoanService::reject(LoanStatus::from(loan.status), reason, loan.notes.as_deref())?;

        let before = loan.clone();
        let mut active: loans::ActiveModel = loan.into();
        active.status = Set(status.into());
        active.notes = Set(Some(notes));
        active.updated_at = Set(Utc::now().into());
        let loan = active.update(&txn).await?;

        txn.commit().await?;
        info!(loan_id = %loan.id, "loan rejected");

        let mut effects = SideEffects::new();
        effects
            .audit(
                AuditRecord::new(
                    actor,
                    AuditAction::Reject,
                    AuditEntity::Loan,
                    loan.id,
                    format!("Rejected loan {}: {}", loan.loan_number, reason.trim()),
                    Utc::now(),
                )
                .with_before(&before)
                .with_after(&loan),
            )
            .notify(NotificationTemplates::loan_rejected(
                loan.member_id,
                loan.id,
                &loan.loan_number,
                reason.trim(),
            ));
        effects.publish(&self.db).await;

        Ok(loan)
    }

    /// Hands over the approved principal.
    pub async fn disburse(
        &self,
        loan_id: Uuid,
        disbursed_on: NaiveDate,
        actor: Uuid,
    ) -> Result<Disbursement, RepositoryError> {
        let txn = self.db.begin().await?;
        let loan = Self::lock_loan(&txn, loan_id).await?;

        let status = LoanService::disburse(LoanStatus::from(loan.status))?;
        let amount = loan
            .approved_amount
            .ok_or(LoanError::InvalidAmount(Decimal::ZERO))?;

        let now = Utc::now().into();
        let entry = ledger_entries::ActiveModel {
            id: Set(Uuid::now_v7()),
            entry_type: Set(DbEntryType::LoanDisbursement),
            amount: Set(amount),
            prior_balance: Set(None),
            new_balance: Set(None),
            account_id: Set(None),
            loan_id: Set(Some(loan.id)),
            receipt_number: Set(None),
            reversal_of: Set(None),
            status: Set(DbEntryStatus::Posted),
            description: Set(format!("Disbursement of loan {}", loan.loan_number)),
            created_at: Set(now),
            created_by: Set(actor),
        }
        .insert(&txn)
        .await?;

        let before = loan.clone();
        let mut active: loans::ActiveModel = loan.into();
        active.status = Set(status.into());
        active.disbursed_on = Set(Some(disbursed_on));
        active.updated_at = Set(now);
        let loan = active.update(&txn).await?;

        txn.commit().await?;
        info!(loan_id = %loan.id, entry_id = %entry.id, amount = %amount, "loan disbursed");

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                AuditAction::Disburse,
                AuditEntity::Loan,
                loan.id,
                format!("Disbursed loan {}", loan.loan_number),
                Utc::now(),
            )
            .with_before(&before)
            .with_after(&loan),
        );
        effects.publish(&self.db).await;

        Ok(Disbursement { loan, entry })
    }

    /// Applies a payment to a loan and one of its installments.
    pub async fn apply_payment(&self, input: PaymentInput) -> Result<PaymentReceipt, RepositoryError> {
        let txn = self.db.begin().await?;
        let loan = Self::lock_loan(&txn, input.loan_id).await?;

        let target = match input.installment_id {
            Some(id) => {
                let row = installments::Entity::find_by_id(id)
                    .lock_exclusive()
                    .one(&txn)
                    .await?
                    .ok_or(LoanError::InstallmentNotFound(id))?;
                if row.loan_id != loan.id {
                    return Err(LoanError::InstallmentMismatch(id).into());
                }
                Some(row)
            }
            None => {
                installments::Entity::find()
                    .filter(installments::Column::LoanId.eq(loan.id))
                    .filter(
                        installments::Column::Status
                            .is_in([DbInstallmentStatus::Pending, DbInstallmentStatus::Overdue]),
                    )
                    .order_by_asc(installments::Column::Number)
                    .lock_exclusive()
                    .one(&txn)
                    .await?
            }
        };

        let snapshot = target.as_ref().map(InstallmentSnapshot::from);
        let plan = PaymentService::plan(
            LoanStatus::from(loan.status),
            loan.outstanding_balance,
            snapshot.as_ref(),
            input.amount,
            input.paid_on,
            self.policy.daily_penalty_rate_pct,
        )?;
        let allocation = plan.allocation;

        let now = Utc::now().into();
        let installment = match (target, allocation.installment) {
            (Some(row), Some(update)) => {
                let mut active: installments::ActiveModel = row.into();
                active.penalty = Set(update.penalty);
                active.days_late = Set(update.days_late);
                active.penalty_paid = Set(update.penalty_paid);
                active.interest_paid = Set(update.interest_paid);
                active.principal_paid = Set(update.principal_paid);
                active.status = Set(update.status.into());
                active.paid_on = Set(update.paid_on);
                active.updated_at = Set(now);
                Some(active.update(&txn).await?)
            }
            _ => None,
        };

        let receipt_number = next_number(&txn, DocumentKind::Receipt, input.paid_on).await?;
        let payment = payments::ActiveModel {
            id: Set(Uuid::new_v4()),
            loan_id: Set(loan.id),
            installment_id: Set(installment.as_ref().map(|i| i.id)),
            amount: Set(input.amount),
            principal: Set(allocation.principal),
            interest: Set(allocation.interest),
            penalty: Set(allocation.penalty),
            receipt_number: Set(receipt_number.clone()),
            method: Set(input.method.into()),
            paid_on: Set(input.paid_on),
            created_at: Set(now),
            created_by: Set(input.actor),
        }
        .insert(&txn)
        .await?;

        let entry = ledger_entries::ActiveModel {
            id: Set(Uuid::now_v7()),
            entry_type: Set(DbEntryType::LoanPayment),
            amount: Set(input.amount),
            prior_balance: Set(None),
            new_balance: Set(None),
            account_id: Set(None),
            loan_id: Set(Some(loan.id)),
            receipt_number: Set(Some(receipt_number.clone())),
            reversal_of: Set(None),
            status: Set(DbEntryStatus::Posted),
            description: Set(format!("Payment on loan {}", loan.loan_number)),
            created_at: Set(now),
            created_by: Set(input.actor),
        }
        .insert(&txn)
        .await?;

        let before = loan.clone();
        let mut active: loans::ActiveModel = loan.into();
        active.outstanding_balance = Set(plan.loan.outstanding_balance);
        active.status = Set(plan.loan.status.into());
        active.updated_at = Set(now);
        let loan = active.update(&txn).await?;

        txn.commit().await?;
        info!(
            loan_id = %loan.id,
            payment_id = %payment.id,
            receipt_number = %receipt_number,
            amount = %input.amount,
            penalty = %allocation.penalty,
            interest = %allocation.interest,
            principal = %allocation.principal,
            outstanding = %loan.outstanding_balance,
            status = %plan.loan.status,
            "payment applied"
        );

        let mut effects = SideEffects::new();
        effects
            .audit(
                AuditRecord::new(
                    input.actor,
                    AuditAction::Pay,
                    AuditEntity::Payment,
                    payment.id,
                    format!("Payment {receipt_number} on loan {}", loan.loan_number),
                    Utc::now(),
                )
                .with_after(&payment),
            )
            .audit(
                AuditRecord::new(
                    input.actor,
                    AuditAction::Update,
                    AuditEntity::Loan,
                    loan.id,
                    format!("Outstanding balance now {}", loan.outstanding_balance),
                    Utc::now(),
                )
                .with_before(&before)
                .with_after(&loan),
            )
            .notify(NotificationTemplates::loan_payment(
                loan.member_id,
                payment.id,
                &loan.loan_number,
                &receipt_number,
                input.amount,
                loan.outstanding_balance,
            ));
        effects.publish(&self.db).await;

        Ok(PaymentReceipt {
            payment,
            loan,
            installment,
            entry,
            allocation,
        })
    }

    /// Deletes a loan that is still editable, with its guarantors.
    pub async fn delete_request(&self, loan_id: Uuid, actor: Uuid) -> Result<(), RepositoryError> {
        let txn = self.db.begin().await?;
        let loan = Self::lock_loan(&txn, loan_id).await?;
        LoanService::ensure_editable(LoanStatus::from(loan.status))?;

        guarantors::Entity::delete_many()
            .filter(guarantors::Column::LoanId.eq(loan.id))
            .exec(&txn)
            .await?;
        installments::Entity::delete_many()
            .filter(installments::Column::LoanId.eq(loan.id))
            .exec(&txn)
            .await?;
        loans::Entity::delete_by_id(loan.id).exec(&txn).await?;

        txn.commit().await?;
        info!(loan_id = %loan.id, loan_number = %loan.loan_number, "loan request deleted");

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                AuditAction::Update,
                AuditEntity::Loan,
                loan.id,
                format!("Deleted loan request {}", loan.loan_number),
                Utc::now(),
            )
            .with_before(&loan),
        );
        effects.publish(&self.db).await;

        Ok(())
    }

    /// Finds a loan by id.
    pub async fn find(&self, loan_id: Uuid) -> Result<loans::Model, RepositoryError> {
        loans::Entity::find_by_id(loan_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| LoanError::LoanNotFound(loan_id).into())
    }

    /// Installments of a loan ordered by number.
    pub async fn installments(&self, loan_id: Uuid) -> Result<Vec<installments::Model>, RepositoryError> {
        let rows = installments::Entity::find()
            .filter(installments::Column::LoanId.eq(loan_id))
            .order_by_asc(installments::Column::Number)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Payments of a loan, oldest first.
    pub async fn payments(&self, loan_id: Uuid) -> Result<Vec<payments::Model>, RepositoryError> {
        let rows = payments::Entity::find()
            .filter(payments::Column::LoanId.eq(loan_id))
            .order_by_asc(payments::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn transition(
        &self,
        loan_id: Uuid,
        actor: Uuid,
        action: AuditAction,
        plan: fn(LoanStatus) -> Result<LoanStatus, LoanError>,
    ) -> Result<loans::Model, RepositoryError> {
        let txn = self.db.begin().await?;
        let loan = Self::lock_loan(&txn, loan_id).await?;
        let from = LoanStatus::from(loan.status);
        let next = plan(from)?;

        let before = loan.clone();
        let mut active: loans::ActiveModel = loan.into();
        active.status = Set(next.into());
        active.updated_at = Set(Utc::now().into());
        let loan = active.update(&txn).await?;

        txn.commit().await?;
        info!(loan_id = %loan.id, from = %from, to = %next, "loan status changed");

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                action,
                AuditEntity::Loan,
                loan.id,
                format!("Loan {} moved from {from} to {next}", loan.loan_number),
                Utc::now(),
            )
            .with_before(&before)
            .with_after(&loan),
        );
        effects.publish(&self.db).await;

        Ok(loan)
    }

    async fn lock_loan(txn: &DatabaseTransaction, loan_id: Uuid) -> Result<loans::Model, RepositoryError> {
        loans::Entity::find_by_id(loan_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| LoanError::LoanNotFound(loan_id).into())
    }

    async fn coverage<C: sea_orm::ConnectionTrait>(
        conn: &C,
        loan: &loans::Model,
    ) -> Result<GuarantorCheck, RepositoryError> {
        let loan_type = loan_types::Entity::find_by_id(loan.loan_type_id)
            .one(conn)
            .await?
            .ok_or(LoanError::LoanTypeNotFound(loan.loan_type_id))?;
        let count = guarantors::Entity::find()
            .filter(guarantors::Column::LoanId.eq(loan.id))
            .filter(guarantors::Column::Active.eq(true))
            .count(conn)
            .await?;

        Ok(GuarantorService::check(
            &LoanTypeTerms::from(&loan_type),
            i32::try_from(count).unwrap_or(i32::MAX),
        ))
    }
}
