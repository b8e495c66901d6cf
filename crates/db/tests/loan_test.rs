//! Integration tests for the loan lifecycle and delinquency accrual.

mod common;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use coopbank_core::loan::{Eligibility, LoanError, PaymentMethod};
use coopbank_db::entities::sea_orm_active_enums::{InstallmentStatus, LoanStatus};
use coopbank_db::repositories::{ApproveLoanInput, LoanRequest, OpenAccountInput, PaymentInput};
use coopbank_db::{DelinquencyRepository, LoanRepository, RepositoryError, SavingsRepository};
use coopbank_shared::PolicyConfig;

struct Fixture {
    repo: LoanRepository,
    member_id: Uuid,
    loan_type_id: Uuid,
}

async fn fixture(db: &DatabaseConnection, required_guarantors: i32) -> Fixture {
    let member = common::create_member(db, "Borrower").await;
    let loan_type = common::create_loan_type(db, dec!(18), required_guarantors).await;
    Fixture {
        repo: LoanRepository::new(db.clone(), PolicyConfig::default()),
        member_id: member.id,
        loan_type_id: loan_type.id,
    }
}

fn request(fx: &Fixture, amount: Decimal) -> LoanRequest {
    LoanRequest {
        member_id: fx.member_id,
        loan_type_id: fx.loan_type_id,
        amount,
        term_months: 12,
        payroll_deduction: true,
        notes: None,
        requested_on: common::date(2026, 1, 10),
        actor: Uuid::new_v4(),
    }
}

/// Requests, approves and disburses 15,000 at 18% over 12 months.
async fn disbursed_loan(fx: &Fixture) -> Uuid {
    let loan = fx.repo.request_loan(request(fx, dec!(15000))).await.unwrap();
    fx.repo.start_review(loan.id, Uuid::new_v4()).await.unwrap();
    fx.repo
        .approve(ApproveLoanInput {
            loan_id: loan.id,
            approved_amount: dec!(15000),
            first_payment_on: common::date(2026, 2, 15),
            approved_on: common::date(2026, 1, 12),
            actor: Uuid::new_v4(),
        })
        .await
        .unwrap();
    fx.repo
        .disburse(loan.id, common::date(2026, 1, 15), Uuid::new_v4())
        .await
        .unwrap();
    loan.id
}

fn payment(loan_id: Uuid, amount: Decimal, paid_on: chrono::NaiveDate) -> PaymentInput {
    PaymentInput {
        loan_id,
        installment_id: None,
        amount,
        method: PaymentMethod::Cash,
        paid_on,
        actor: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn test_request_freezes_rate_and_numbers_loan() {
    let Some(db) = common::connect().await else { return };
    let fx = fixture(&db, 0).await;

    let loan = fx.repo.request_loan(request(&fx, dec!(5000))).await.unwrap();
    assert_eq!(loan.status, LoanStatus::Requested);
    assert_eq!(loan.annual_rate_pct, dec!(18));
    assert!(loan.loan_number.starts_with("PRE-2026-"));
    assert_eq!(loan.monthly_payment, None);
}

#[tokio::test]
async fn test_approval_writes_schedule() {
    let Some(db) = common::connect().await else { return };
    let fx = fixture(&db, 0).await;
    let loan = fx.repo.request_loan(request(&fx, dec!(15000))).await.unwrap();

    let approved = fx
        .repo
        .approve(ApproveLoanInput {
            loan_id: loan.id,
            approved_amount: dec!(15000),
            first_payment_on: common::date(2026, 2, 15),
            approved_on: common::date(2026, 1, 12),
            actor: Uuid::new_v4(),
        })
        .await
        .unwrap();

    assert_eq!(approved.loan.status, LoanStatus::Approved);
    assert_eq!(approved.loan.monthly_payment, Some(dec!(1375.20)));
    assert_eq!(approved.loan.total_payable, dec!(16502.40));
    assert_eq!(approved.loan.outstanding_balance, dec!(16502.40));
    assert_eq!(approved.installments.len(), 12);
    assert_eq!(approved.installments[0].interest, dec!(225.00));
    assert_eq!(approved.installments[11].balance, Decimal::ZERO);
}

#[tokio::test]
async fn test_payment_settles_oldest_installment() {
    let Some(db) = common::connect().await else { return };
    let fx = fixture(&db, 0).await;
    let loan_id = disbursed_loan(&fx).await;

    let receipt = fx
        .repo
        .apply_payment(payment(loan_id, dec!(1375.20), common::date(2026, 2, 15)))
        .await
        .unwrap();

    assert!(receipt.payment.receipt_number.starts_with("REC-2026-"));
    assert_eq!(receipt.allocation.interest, dec!(225.00));
    assert_eq!(receipt.allocation.principal, dec!(1150.20));
    assert_eq!(receipt.loan.outstanding_balance, dec!(15127.20));
    assert_eq!(receipt.loan.status, LoanStatus::InRepayment);
    let installment = receipt.installment.unwrap();
    assert_eq!(installment.number, 1);
    assert_eq!(installment.status, InstallmentStatus::Paid);
    assert_eq!(receipt.entry.receipt_number, Some(receipt.payment.receipt_number.clone()));

    let next = fx
        .repo
        .apply_payment(payment(loan_id, dec!(100), common::date(2026, 3, 1)))
        .await
        .unwrap();
    assert_eq!(next.installment.unwrap().number, 2);
}

#[tokio::test]
async fn test_payment_against_foreign_installment_is_refused() {
    let Some(db) = common::connect().await else { return };
    let fx = fixture(&db, 0).await;
    let first = disbursed_loan(&fx).await;
    let second = disbursed_loan(&fx).await;
    let foreign = fx.repo.installments(second).await.unwrap().remove(0);

    let mut input = payment(first, dec!(100), common::date(2026, 2, 1));
    input.installment_id = Some(foreign.id);
    let err = fx.repo.apply_payment(input).await.unwrap_err();
    assert!(matches!(err, RepositoryError::Loan(LoanError::InstallmentMismatch(id)) if id == foreign.id));
    assert!(fx.repo.payments(first).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_payment_before_disbursement_is_refused() {
    let Some(db) = common::connect().await else { return };
    let fx = fixture(&db, 0).await;
    let loan = fx.repo.request_loan(request(&fx, dec!(1000))).await.unwrap();

    let err = fx
        .repo
        .apply_payment(payment(loan.id, dec!(100), common::date(2026, 2, 1)))
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Loan(LoanError::PaymentNotAllowed(_))));
}

#[tokio::test]
async fn test_guarantors_and_approval_gate() {
    let Some(db) = common::connect().await else { return };
    let fx = fixture(&db, 2).await;
    let policy = PolicyConfig {
        enforce_guarantors_on_approve: true,
        ..PolicyConfig::default()
    };
    let repo = LoanRepository::new(db.clone(), policy);
    let loan = repo.request_loan(request(&fx, dec!(8000))).await.unwrap();

    let self_guarantee = repo
        .add_guarantor(loan.id, fx.member_id, common::date(2026, 1, 11), Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(self_guarantee, RepositoryError::Loan(LoanError::SelfGuarantee)));

    let first = common::create_member(&db, "Guarantor One").await;
    repo.add_guarantor(loan.id, first.id, common::date(2026, 1, 11), Uuid::new_v4())
        .await
        .unwrap();

    let approve = ApproveLoanInput {
        loan_id: loan.id,
        approved_amount: dec!(8000),
        first_payment_on: common::date(2026, 2, 15),
        approved_on: common::date(2026, 1, 12),
        actor: Uuid::new_v4(),
    };
    let gated = repo.approve(approve.clone()).await.unwrap_err();
    assert!(matches!(
        gated,
        RepositoryError::Loan(LoanError::GuarantorsRequired { required: 2, actual: 1 })
    ));

    let second = common::create_member(&db, "Guarantor Two").await;
    repo.add_guarantor(loan.id, second.id, common::date(2026, 1, 11), Uuid::new_v4())
        .await
        .unwrap();
    assert!(repo.guarantor_check(loan.id).await.unwrap().satisfied);
    assert_eq!(repo.approve(approve).await.unwrap().loan.status, LoanStatus::Approved);
}

#[tokio::test]
async fn test_reject_and_delete_request() {
    let Some(db) = common::connect().await else { return };
    let fx = fixture(&db, 0).await;

    let rejected = fx.repo.request_loan(request(&fx, dec!(900))).await.unwrap();
    let rejected = fx
        .repo
        .reject(rejected.id, "insufficient capacity", Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(rejected.status, LoanStatus::Rejected);
    assert!(rejected.notes.unwrap().contains("insufficient capacity"));

    let pending = fx.repo.request_loan(request(&fx, dec!(900))).await.unwrap();
    fx.repo.delete_request(pending.id, Uuid::new_v4()).await.unwrap();
    assert!(matches!(
        fx.repo.find(pending.id).await.unwrap_err(),
        RepositoryError::Loan(LoanError::LoanNotFound(_))
    ));
}

#[tokio::test]
async fn test_eligibility_uses_fixed_savings_and_payroll() {
    let Some(db) = common::connect().await else { return };
    let fx = fixture(&db, 2).await;
    let fixed = common::create_account_type(&db, dec!(0), false, true).await;
    SavingsRepository::new(db.clone(), PolicyConfig::default())
        .open_account(OpenAccountInput {
            member_id: fx.member_id,
            account_type_id: fixed.id,
            initial_deposit: dec!(2000),
            payroll_amount: dec!(500),
            opened_on: common::date(2026, 1, 2),
            actor: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let report = fx
        .repo
        .eligibility(fx.member_id, fx.loan_type_id, dec!(15000), 12)
        .await
        .unwrap();
    assert_eq!(
        report.eligibility,
        Eligibility::RequiresGuarantors {
            max_without_guarantors: dec!(6000),
            required: 2
        }
    );
    assert_eq!(report.new_installment, dec!(1375.20));
    assert_eq!(report.capacity.estimated_capacity, dec!(2000.00));
    assert!(report.capacity.can_pay);
}

#[tokio::test]
async fn test_accrual_marks_installment_overdue() {
    let Some(db) = common::connect().await else { return };
    let fx = fixture(&db, 0).await;
    let loan_id = disbursed_loan(&fx).await;
    let first = fx.repo.installments(loan_id).await.unwrap().remove(0);
    let delinquency = DelinquencyRepository::new(db.clone(), PolicyConfig::default());

    assert!(delinquency
        .accrue_installment(first.id, common::date(2026, 2, 15))
        .await
        .unwrap()
        .is_none());

    let accrued = delinquency
        .accrue_installment(first.id, common::date(2026, 2, 25))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(accrued.installment.status, InstallmentStatus::Overdue);
    assert_eq!(accrued.installment.days_late, 10);
    assert_eq!(accrued.installment.penalty, dec!(13.75));

    let again = delinquency
        .accrue_installment(first.id, common::date(2026, 2, 25))
        .await
        .unwrap();
    assert!(again.is_none());

    let receipt = fx
        .repo
        .apply_payment(payment(loan_id, dec!(1388.95), common::date(2026, 2, 25)))
        .await
        .unwrap();
    assert_eq!(receipt.allocation.penalty, dec!(13.75));
    assert_eq!(receipt.installment.unwrap().status, InstallmentStatus::PaidLate);
}
