//! Property tests for the savings ledger.
//!
//! An in-memory ledger applies random operations through the service and is
//! reconciled after every step.

use chrono::{TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use uuid::Uuid;

use super::service::SavingsService;
use super::types::{AccountSnapshot, AccountStatus, BalanceChange, EntrySnapshot, EntryStatus};
use crate::reconciliation::ReconciliationService;

#[derive(Debug, Clone)]
enum Op {
    Deposit(i64),
    Withdraw(i64),
    Reverse(usize),
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (1i64..1_000_000).prop_map(Op::Deposit),
        (1i64..1_000_000).prop_map(Op::Withdraw),
        (0usize..64).prop_map(Op::Reverse),
    ]
}

struct Ledger {
    account: AccountSnapshot,
    entries: Vec<EntrySnapshot>,
}

impl Ledger {
    fn new() -> Self {
        Self {
            account: AccountSnapshot {
                id: Uuid::now_v7(),
                balance: Decimal::ZERO,
                status: AccountStatus::Active,
                withdrawable: true,
            },
            entries: Vec::new(),
        }
    }

    fn post(&mut self, change: &BalanceChange, reversal_of: Option<Uuid>) {
        self.account.balance = change.new_balance;
        self.entries.push(EntrySnapshot {
            id: Uuid::now_v7(),
            entry_type: change.entry_type,
            amount: change.amount,
            prior_balance: Some(change.prior_balance),
            new_balance: Some(change.new_balance),
            account_id: Some(self.account.id),
            reversal_of,
            status: EntryStatus::Posted,
            created_at: Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap(),
        });
    }

    fn apply(&mut self, op: &Op) {
        let now = Utc.with_ymd_and_hms(2026, 1, 10, 9, 0, 0).unwrap();
        match *op {
            Op::Deposit(cents) => {
                if let Ok(change) = SavingsService::deposit(&self.account, Decimal::new(cents, 2)) {
                    self.post(&change, None);
                }
            }
            Op::Withdraw(cents) => {
                if let Ok(change) =
                    SavingsService::withdraw(&self.account, Decimal::new(cents, 2))
                {
                    self.post(&change, None);
                }
            }
            Op::Reverse(index) => {
                if self.entries.is_empty() {
                    return;
                }
                let idx = index % self.entries.len();
                let original = self.entries[idx].clone();
                if let Ok(change) =
                    SavingsService::reverse(&self.account, &original, "correction", now, 30)
                {
                    self.entries[idx].status = EntryStatus::Reversed;
                    self.post(&change, Some(original.id));
                }
            }
        }
    }
}

proptest! {
    /// Stored balance always equals the ledger-derived balance and never
    /// goes negative.
    #[test]
    fn prop_ledger_reconciles(ops in prop::collection::vec(op(), 1..40)) {
        let mut ledger = Ledger::new();
        for op in &ops {
            ledger.apply(op);
            prop_assert!(ledger.account.balance >= Decimal::ZERO);
            let check = ReconciliationService::verify_account(
                ledger.account.id,
                ledger.account.balance,
                &ledger.entries,
            );
            prop_assert!(check.is_ok(), "{:?}", check);
        }
    }

    /// Depositing and then reversing the deposit restores the balance.
    #[test]
    fn prop_deposit_reversal_round_trip(
        start_cents in 0i64..1_000_000,
        amount_cents in 1i64..1_000_000,
    ) {
        let mut ledger = Ledger::new();
        if start_cents > 0 {
            ledger.apply(&Op::Deposit(start_cents));
        }
        let before = ledger.account.balance;

        ledger.apply(&Op::Deposit(amount_cents));
        let last = ledger.entries.len() - 1;
        ledger.apply(&Op::Reverse(last));

        prop_assert_eq!(ledger.account.balance, before);
        prop_assert_eq!(ledger.entries[last].status, EntryStatus::Reversed);
        prop_assert!(ReconciliationService::verify_account(
            ledger.account.id,
            ledger.account.balance,
            &ledger.entries,
        ).is_ok());
    }

    /// A refused withdrawal leaves the account untouched.
    #[test]
    fn prop_rejected_withdrawal_is_inert(
        balance_cents in 0i64..1_000_000,
        excess_cents in 1i64..1_000_000,
    ) {
        let account = AccountSnapshot {
            id: Uuid::nil(),
            balance: Decimal::new(balance_cents, 2),
            status: AccountStatus::Active,
            withdrawable: true,
        };
        let before = account.clone();
        let amount = Decimal::new(balance_cents + excess_cents, 2);

        prop_assert!(SavingsService::withdraw(&account, amount).is_err());
        prop_assert_eq!(account, before);
    }
}
