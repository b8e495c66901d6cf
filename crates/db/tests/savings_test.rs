//! Integration tests for the savings ledger.
//!
//! Every scenario ends with a reconciliation of the touched accounts.

#![allow(clippy::uninlined_format_args)]

mod common;

use futures::future::join_all;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, ActiveValue::Set, DatabaseConnection, EntityTrait};
use uuid::Uuid;

use coopbank_core::savings::SavingsError;
use coopbank_db::entities::{ledger_entries, sea_orm_active_enums::EntryStatus};
use coopbank_db::{
    ReconciliationRepository, RepositoryError, SavingsRepository,
    repositories::{MovementInput, OpenAccountInput},
};
use coopbank_shared::PolicyConfig;

async fn open_account(db: &DatabaseConnection, initial: rust_decimal::Decimal) -> Uuid {
    let member = common::create_member(db, "Savings Member").await;
    let account_type = common::create_account_type(db, dec!(0), true, false).await;
    let repo = SavingsRepository::new(db.clone(), PolicyConfig::default());
    repo.open_account(OpenAccountInput {
        member_id: member.id,
        account_type_id: account_type.id,
        initial_deposit: initial,
        payroll_amount: dec!(0),
        opened_on: common::date(2026, 1, 5),
        actor: Uuid::new_v4(),
    })
    .await
    .unwrap()
    .account
    .id
}

fn movement(account_id: Uuid, amount: rust_decimal::Decimal) -> MovementInput {
    MovementInput {
        account_id,
        amount,
        memo: None,
        actor: Uuid::new_v4(),
    }
}

#[tokio::test]
async fn test_open_deposit_withdraw_reconciles() {
    let Some(db) = common::connect().await else { return };
    let repo = SavingsRepository::new(db.clone(), PolicyConfig::default());
    let account_id = open_account(&db, dec!(1000.00)).await;

    let deposit = repo.deposit(movement(account_id, dec!(250.50))).await.unwrap();
    assert_eq!(deposit.account.balance, dec!(1250.50));
    assert_eq!(deposit.entry.prior_balance, Some(dec!(1000.00)));
    assert_eq!(deposit.entry.new_balance, Some(dec!(1250.50)));

    let withdrawal = repo.withdraw(movement(account_id, dec!(200.00))).await.unwrap();
    assert_eq!(withdrawal.account.balance, dec!(1050.50));

    let check = ReconciliationRepository::new(db.clone())
        .verify_account(account_id)
        .await
        .unwrap();
    assert_eq!(check.balance, dec!(1050.50));
    assert_eq!(check.entries, 3);
}

#[tokio::test]
async fn test_overdraw_is_refused_and_leaves_no_trace() {
    let Some(db) = common::connect().await else { return };
    let repo = SavingsRepository::new(db.clone(), PolicyConfig::default());
    let account_id = open_account(&db, dec!(100.00)).await;

    let err = repo
        .withdraw(movement(account_id, dec!(100.01)))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RepositoryError::Savings(SavingsError::InsufficientFunds { .. })
    ));

    assert_eq!(repo.find(account_id).await.unwrap().balance, dec!(100.00));
    assert_eq!(repo.entries(account_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_reverse_deposit_restores_balance_once() {
    let Some(db) = common::connect().await else { return };
    let repo = SavingsRepository::new(db.clone(), PolicyConfig::default());
    let account_id = open_account(&db, dec!(500.00)).await;

    let deposit = repo.deposit(movement(account_id, dec!(300.00))).await.unwrap();
    let reversal = repo
        .reverse(deposit.entry.id, "duplicate deposit", Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(reversal.account.balance, dec!(500.00));
    assert_eq!(reversal.entry.reversal_of, Some(deposit.entry.id));

    let original = ledger_entries::Entity::find_by_id(deposit.entry.id)
        .one(&db)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.status, EntryStatus::Reversed);

    let again = repo
        .reverse(deposit.entry.id, "second try", Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(again, RepositoryError::Savings(SavingsError::AlreadyReversed(_))));

    assert!(ReconciliationRepository::new(db.clone())
        .verify_account(account_id)
        .await
        .is_ok());
}

#[tokio::test]
async fn test_reverse_withdrawal_after_funds_left_is_blocked() {
    let Some(db) = common::connect().await else { return };
    let repo = SavingsRepository::new(db.clone(), PolicyConfig::default());
    let account_id = open_account(&db, dec!(100.00)).await;

    let deposit = repo.deposit(movement(account_id, dec!(50.00))).await.unwrap();
    repo.withdraw(movement(account_id, dec!(120.00))).await.unwrap();

    let err = repo
        .reverse(deposit.entry.id, "wrong account", Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, RepositoryError::Savings(SavingsError::WouldGoNegative { .. })));
}

#[tokio::test]
async fn test_liquidate_and_close() {
    let Some(db) = common::connect().await else { return };
    let repo = SavingsRepository::new(db.clone(), PolicyConfig::default());
    let account_id = open_account(&db, dec!(75.25)).await;

    assert!(matches!(
        repo.close_account(account_id, "member request", Uuid::new_v4())
            .await
            .unwrap_err(),
        RepositoryError::Savings(SavingsError::NonZeroBalance(_))
    ));

    let closed = repo
        .liquidate_and_close(account_id, "member request", Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(closed.account.balance, dec!(0));
    assert_eq!(closed.closing_entry.map(|e| e.amount), Some(dec!(75.25)));
    assert!(closed.account.closed_on.is_some());

    assert!(matches!(
        repo.deposit(movement(account_id, dec!(1))).await.unwrap_err(),
        RepositoryError::Savings(SavingsError::AccountClosed)
    ));
}

#[tokio::test]
async fn test_fixed_account_refuses_withdrawals_until_liquidated() {
    let Some(db) = common::connect().await else { return };
    let repo = SavingsRepository::new(db.clone(), PolicyConfig::default());
    let member = common::create_member(&db, "Fixed Saver").await;
    let fixed = common::create_account_type(&db, dec!(0), false, true).await;
    let account_id = repo
        .open_account(OpenAccountInput {
            member_id: member.id,
            account_type_id: fixed.id,
            initial_deposit: dec!(500.00),
            payroll_amount: dec!(100.00),
            opened_on: common::date(2026, 1, 5),
            actor: Uuid::new_v4(),
        })
        .await
        .unwrap()
        .account
        .id;

    for amount in [dec!(100.00), dec!(500.00)] {
        assert!(matches!(
            repo.withdraw(movement(account_id, amount)).await.unwrap_err(),
            RepositoryError::Savings(SavingsError::NotWithdrawable)
        ));
    }
    let account = repo.find(account_id).await.unwrap();
    assert_eq!(account.balance, dec!(500.00));
    assert_eq!(repo.entries(account_id).await.unwrap().len(), 1);

    let closed = repo
        .liquidate_and_close(account_id, "resignation", Uuid::new_v4())
        .await
        .unwrap();
    assert_eq!(closed.closing_entry.map(|e| e.amount), Some(dec!(500.00)));
    assert_eq!(closed.account.balance, dec!(0));
}

#[tokio::test]
async fn test_concurrent_duplicate_open_reports_domain_error() {
    let Some(db) = common::connect().await else { return };
    let member = common::create_member(&db, "Double Opener").await;
    let account_type = common::create_account_type(&db, dec!(0), true, false).await;

    let tasks = (0..4).map(|_| {
        let repo = SavingsRepository::new(db.clone(), PolicyConfig::default());
        async move {
            repo.open_account(OpenAccountInput {
                member_id: member.id,
                account_type_id: account_type.id,
                initial_deposit: dec!(0),
                payroll_amount: dec!(0),
                opened_on: common::date(2026, 1, 5),
                actor: Uuid::new_v4(),
            })
            .await
        }
    });
    let results = join_all(tasks).await;

    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    for err in results.into_iter().filter_map(Result::err) {
        assert!(
            matches!(err, RepositoryError::Savings(SavingsError::DuplicateOpenAccount)),
            "{err:?}"
        );
    }
}

#[tokio::test]
async fn test_ledger_entries_are_immutable() {
    let Some(db) = common::connect().await else { return };
    let account_id = open_account(&db, dec!(10.00)).await;
    let repo = SavingsRepository::new(db.clone(), PolicyConfig::default());
    let entry = repo.entries(account_id).await.unwrap().remove(0);

    let mut tampered: ledger_entries::ActiveModel = entry.clone().into();
    tampered.amount = Set(dec!(9999.00));
    assert!(tampered.update(&db).await.is_err());

    assert!(ledger_entries::Entity::delete_by_id(entry.id).exec(&db).await.is_err());
}

#[tokio::test]
async fn test_concurrent_deposits_keep_balance_consistent() {
    let Some(db) = common::connect().await else { return };
    let account_id = open_account(&db, dec!(0)).await;

    let tasks = (0..50).map(|_| {
        let repo = SavingsRepository::new(db.clone(), PolicyConfig::default());
        async move { repo.deposit(movement(account_id, dec!(10.00))).await }
    });
    let results = join_all(tasks).await;
    let failures = results.iter().filter(|r| r.is_err()).count();
    assert_eq!(failures, 0, "{:?}", results.iter().find(|r| r.is_err()));

    let check = ReconciliationRepository::new(db.clone())
        .verify_account(account_id)
        .await
        .unwrap();
    assert_eq!(check.balance, dec!(500.00));
    assert_eq!(check.entries, 50);
}
