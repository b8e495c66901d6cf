//! Integration tests for dividend periods and crediting.

mod common;

use chrono::{Datelike, Utc};
use futures::future::join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::DatabaseConnection;
use uuid::Uuid;

use coopbank_core::dividend::{BalancePoint, DividendError, DividendService, MemberEligibility};
use coopbank_db::entities::sea_orm_active_enums::{DividendPeriodStatus, EntryType};
use coopbank_db::repositories::{ApproveLoanInput, LoanRequest, OpenAccountInput};
use coopbank_db::{DividendRepository, LoanRepository, RepositoryError, SavingsRepository};
use coopbank_shared::PolicyConfig;

/// Picks a year no earlier run has opened.
async fn free_year(repo: &DividendRepository) -> i32 {
    loop {
        let year = 2030 + i32::from(Uuid::new_v4().as_bytes()[0] % 71);
        if repo.find_by_year(year).await.unwrap().is_none() {
            return year;
        }
    }
}

/// Opens a fixed (non-withdrawable) account for a new member.
async fn fixed_saver(db: &DatabaseConnection, name: &str, initial: Decimal) -> (Uuid, Uuid) {
    let member = common::create_member(db, name).await;
    let account_id = open_fixed(db, member.id, initial).await;
    (member.id, account_id)
}

async fn open_fixed(db: &DatabaseConnection, member_id: Uuid, initial: Decimal) -> Uuid {
    let fixed = common::create_account_type(db, dec!(0), false, true).await;
    SavingsRepository::new(db.clone(), PolicyConfig::default())
        .open_account(OpenAccountInput {
            member_id,
            account_type_id: fixed.id,
            initial_deposit: initial,
            payroll_amount: dec!(100),
            opened_on: Utc::now().date_naive(),
            actor: Uuid::new_v4(),
        })
        .await
        .unwrap()
        .account
        .id
}

fn eligible(member_id: Uuid, balance: Decimal, loans: u32) -> MemberEligibility {
    MemberEligibility {
        member_id,
        average_fixed_balance: balance,
        loan_count: loans,
    }
}

/// Opens a free year and closes it with the given pool.
async fn closed_period(repo: &DividendRepository, pool: Decimal) -> Uuid {
    let year = free_year(repo).await;
    let period = repo.open_period(year, Uuid::new_v4()).await.unwrap();
    assert_eq!(period.status, DividendPeriodStatus::Open);
    let closed = repo.close_period(period.id, Some(pool), Uuid::new_v4()).await.unwrap();
    assert_eq!(closed.status, DividendPeriodStatus::Closed);
    assert_eq!(closed.total_interest_generated, pool);
    period.id
}

#[tokio::test]
async fn test_credit_is_idempotent_and_bounded_by_pool() {
    let Some(db) = common::connect().await else { return };
    let repo = DividendRepository::new(db.clone(), PolicyConfig::default());
    let savings = SavingsRepository::new(db.clone(), PolicyConfig::default());
    let (alice, alice_account) = fixed_saver(&db, "Alice", dec!(100)).await;
    let (bob, bob_account) = fixed_saver(&db, "Bob", dec!(100)).await;
    let carol = common::create_member(&db, "Carol").await;

    let period_id = closed_period(&repo, dec!(1000.00)).await;
    let shares = repo
        .allocate(
            period_id,
            &[
                eligible(alice, dec!(3000), 2),
                eligible(bob, dec!(1000), 3),
                eligible(carol.id, dec!(500), 1),
            ],
            Uuid::new_v4(),
        )
        .await
        .unwrap();
    assert_eq!(shares.len(), 3);
    let carol_share = shares.iter().find(|s| s.member_id == carol.id).unwrap();
    assert!(!carol_share.qualifies);
    assert_eq!(carol_share.amount, Decimal::ZERO);

    let report = repo.credit(period_id, Uuid::new_v4()).await.unwrap();
    assert_eq!(report.pending, 3);
    assert_eq!(report.credited, 3);
    assert_eq!(report.failed, 0);
    assert!(report.distributed);

    assert_eq!(savings.find(alice_account).await.unwrap().balance, dec!(850.00));
    assert_eq!(savings.find(bob_account).await.unwrap().balance, dec!(350.00));
    let entries = savings.entries(alice_account).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1].entry_type, EntryType::Dividend);

    let period = repo.find(period_id).await.unwrap();
    assert_eq!(period.status, DividendPeriodStatus::Distributed);
    assert_eq!(period.total_distributed, dec!(1000.00));
    assert!(period.distributed_on.is_some());

    // A second run and a direct re-credit change nothing.
    let rerun = repo.credit(period_id, Uuid::new_v4()).await.unwrap();
    assert_eq!(rerun.pending, 0);
    assert_eq!(rerun.credited, 0);
    assert!(rerun.distributed);

    let alice_share = repo
        .dividends(period_id)
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.member_id == alice)
        .unwrap();
    assert!(alice_share.credited);
    assert_eq!(alice_share.account_id, Some(alice_account));
    assert!(repo.credit_one(alice_share.id, Uuid::new_v4()).await.unwrap().is_none());

    assert_eq!(savings.find(alice_account).await.unwrap().balance, dec!(850.00));
    assert_eq!(savings.entries(alice_account).await.unwrap().len(), 2);
    assert_eq!(repo.find(period_id).await.unwrap().total_distributed, dec!(1000.00));
}

#[tokio::test]
async fn test_concurrent_credit_runs_pay_each_share_once() {
    let Some(db) = common::connect().await else { return };
    let repo = DividendRepository::new(db.clone(), PolicyConfig::default());
    let savings = SavingsRepository::new(db.clone(), PolicyConfig::default());
    let (alice, alice_account) = fixed_saver(&db, "Alice", dec!(50)).await;
    let (bob, bob_account) = fixed_saver(&db, "Bob", dec!(50)).await;

    let period_id = closed_period(&repo, dec!(100.00)).await;
    repo.allocate(
        period_id,
        &[eligible(alice, dec!(1), 2), eligible(bob, dec!(1), 2)],
        Uuid::new_v4(),
    )
    .await
    .unwrap();

    let runs = (0..4).map(|_| repo.credit(period_id, Uuid::new_v4()));
    let reports: Vec<_> = join_all(runs).await.into_iter().map(Result::unwrap).collect();

    assert_eq!(reports.iter().map(|r| r.credited).sum::<usize>(), 2);
    assert!(reports.iter().all(|r| r.failed == 0 && r.distributed));
    assert_eq!(savings.find(alice_account).await.unwrap().balance, dec!(100.00));
    assert_eq!(savings.find(bob_account).await.unwrap().balance, dec!(100.00));
    assert_eq!(repo.find(period_id).await.unwrap().total_distributed, dec!(100.00));
}

#[tokio::test]
async fn test_member_without_fixed_account_keeps_period_closed() {
    let Some(db) = common::connect().await else { return };
    let repo = DividendRepository::new(db.clone(), PolicyConfig::default());
    let (alice, _) = fixed_saver(&db, "Alice", dec!(10)).await;
    let dave = common::create_member(&db, "Dave").await;

    let period_id = closed_period(&repo, dec!(90.00)).await;
    repo.allocate(
        period_id,
        &[eligible(alice, dec!(200), 2), eligible(dave.id, dec!(100), 2)],
        Uuid::new_v4(),
    )
    .await
    .unwrap();

    let report = repo.credit(period_id, Uuid::new_v4()).await.unwrap();
    assert_eq!(report.credited, 1);
    assert_eq!(report.failed, 1);
    assert!(!report.distributed);
    let period = repo.find(period_id).await.unwrap();
    assert_eq!(period.status, DividendPeriodStatus::Closed);
    assert_eq!(period.total_distributed, dec!(60.00));

    let dave_share = repo
        .dividends(period_id)
        .await
        .unwrap()
        .into_iter()
        .find(|s| s.member_id == dave.id)
        .unwrap();
    assert!(matches!(
        repo.credit_one(dave_share.id, Uuid::new_v4()).await.unwrap_err(),
        RepositoryError::Dividend(DividendError::NoCreditAccount(id)) if id == dave.id
    ));
    assert!(matches!(
        repo.finish(period_id, Uuid::new_v4()).await.unwrap_err(),
        RepositoryError::Dividend(DividendError::PendingCredits(1))
    ));

    open_fixed(&db, dave.id, Decimal::ZERO).await;
    let rerun = repo.credit(period_id, Uuid::new_v4()).await.unwrap();
    assert_eq!(rerun.credited, 1);
    assert!(rerun.distributed);
    assert_eq!(repo.find(period_id).await.unwrap().total_distributed, dec!(90.00));
}

#[tokio::test]
async fn test_period_rules() {
    let Some(db) = common::connect().await else { return };
    let repo = DividendRepository::new(db.clone(), PolicyConfig::default());
    let (alice, _) = fixed_saver(&db, "Alice", dec!(10)).await;
    let year = free_year(&repo).await;

    let period = repo.open_period(year, Uuid::new_v4()).await.unwrap();
    assert_eq!(period.start_date, common::date(year, 1, 1));
    assert_eq!(period.end_date, common::date(year, 12, 31));
    assert!(matches!(
        repo.open_period(year, Uuid::new_v4()).await.unwrap_err(),
        RepositoryError::Dividend(DividendError::DuplicatePeriod(y)) if y == year
    ));
    assert!(matches!(
        repo.open_period(1999, Uuid::new_v4()).await.unwrap_err(),
        RepositoryError::Dividend(DividendError::InvalidYear(1999))
    ));

    let members = [eligible(alice, dec!(10), 2)];
    assert!(matches!(
        repo.allocate(period.id, &members, Uuid::new_v4()).await.unwrap_err(),
        RepositoryError::Dividend(DividendError::InvalidTransition { .. })
    ));
    assert!(matches!(
        repo.credit(period.id, Uuid::new_v4()).await.unwrap_err(),
        RepositoryError::Dividend(DividendError::InvalidTransition { .. })
    ));

    // Without an explicit pool the period takes the interest paid that year.
    let closed = repo.close_period(period.id, None, Uuid::new_v4()).await.unwrap();
    let paid = repo.interest_generated(period.start_date, period.end_date).await.unwrap();
    assert_eq!(closed.total_interest_generated, paid);

    assert!(matches!(
        repo.credit(period.id, Uuid::new_v4()).await.unwrap_err(),
        RepositoryError::Dividend(DividendError::NotCalculated(y)) if y == year
    ));
    repo.allocate(period.id, &members, Uuid::new_v4()).await.unwrap();
    assert!(matches!(
        repo.allocate(period.id, &members, Uuid::new_v4()).await.unwrap_err(),
        RepositoryError::Dividend(DividendError::AlreadyCalculated(y)) if y == year
    ));
}

#[tokio::test]
async fn test_eligibility_counts_fixed_balance_and_loans() {
    let Some(db) = common::connect().await else { return };
    let repo = DividendRepository::new(db.clone(), PolicyConfig::default());
    let loans = LoanRepository::new(db.clone(), PolicyConfig::default());
    let (member_id, _) = fixed_saver(&db, "Borrower", dec!(1200.00)).await;

    // Withdrawable savings do not count toward the average.
    let regular = common::create_account_type(&db, dec!(0), true, false).await;
    SavingsRepository::new(db.clone(), PolicyConfig::default())
        .open_account(OpenAccountInput {
            member_id,
            account_type_id: regular.id,
            initial_deposit: dec!(5000.00),
            payroll_amount: dec!(0),
            opened_on: Utc::now().date_naive(),
            actor: Uuid::new_v4(),
        })
        .await
        .unwrap();

    let year = Utc::now().year();
    let loan_type = common::create_loan_type(&db, dec!(18), 0).await;
    for _ in 0..2 {
        let loan = loans
            .request_loan(LoanRequest {
                member_id,
                loan_type_id: loan_type.id,
                amount: dec!(1000),
                term_months: 12,
                payroll_deduction: true,
                notes: None,
                requested_on: common::date(year, 1, 10),
                actor: Uuid::new_v4(),
            })
            .await
            .unwrap();
        loans.start_review(loan.id, Uuid::new_v4()).await.unwrap();
        loans
            .approve(ApproveLoanInput {
                loan_id: loan.id,
                approved_amount: dec!(1000),
                first_payment_on: common::date(year, 2, 15),
                approved_on: common::date(year, 1, 12),
                actor: Uuid::new_v4(),
            })
            .await
            .unwrap();
        loans.disburse(loan.id, common::date(year, 1, 15), Uuid::new_v4()).await.unwrap();
    }

    let start = common::date(year, 1, 1);
    let end = common::date(year, 12, 31);
    let eligibility = repo.eligibility(member_id, start, end).await.unwrap();
    assert_eq!(eligibility.loan_count, 2);

    let expected = DividendService::average_balance(
        Decimal::ZERO,
        &[BalancePoint {
            on: Utc::now().date_naive(),
            balance: dec!(1200.00),
        }],
        start,
        end,
    );
    assert_eq!(eligibility.average_fixed_balance, expected);
    assert!(eligibility.average_fixed_balance > Decimal::ZERO);
    assert!(eligibility.average_fixed_balance <= dec!(1200.00));

    // The year before saw neither savings nor loans.
    let before = repo
        .eligibility(member_id, common::date(year - 1, 1, 1), common::date(year - 1, 12, 31))
        .await
        .unwrap();
    assert_eq!(before.average_fixed_balance, Decimal::ZERO);
    assert_eq!(before.loan_count, 0);
}
