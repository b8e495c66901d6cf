//! Savings ledger service.
//!
//! Pure planning functions: each validates the operation against a locked
//! snapshot and returns the balance change to persist. Nothing here touches
//! storage.

use chrono::{DateTime, Duration, Utc};
use coopbank_shared::types::is_whole_cents;
use rust_decimal::Decimal;

use super::error::SavingsError;
use super::types::{
    AccountSnapshot, AccountStatus, BalanceChange, EntrySnapshot, EntryStatus, EntryType,
    OpenAccountCheck,
};

/// Stateless service for savings account operations.
pub struct SavingsService;

impl SavingsService {
    /// Plans a deposit.
    pub fn deposit(account: &AccountSnapshot, amount: Decimal) -> Result<BalanceChange, SavingsError> {
        Self::credit(account, amount, EntryType::Deposit)
    }

    /// Plans a credit of the given type (`Deposit`, `Interest`, `Dividend`).
    ///
    /// Any other entry type is refused.
    pub fn credit(
        account: &AccountSnapshot,
        amount: Decimal,
        entry_type: EntryType,
    ) -> Result<BalanceChange, SavingsError> {
        if entry_type.balance_sign() != Some(Decimal::ONE) {
            return Err(SavingsError::UnsupportedEntryType(entry_type));
        }
        Self::require_positive(amount)?;
        Self::require_open(account)?;

        Ok(BalanceChange {
            entry_type,
            amount,
            prior_balance: account.balance,
            new_balance: account.balance + amount,
        })
    }

    /// Plans a withdrawal.
    pub fn withdraw(account: &AccountSnapshot, amount: Decimal) -> Result<BalanceChange, SavingsError> {
        Self::require_positive(amount)?;
        Self::require_open(account)?;

        if !account.withdrawable {
            return Err(SavingsError::NotWithdrawable);
        }
        Self::debit(account, amount)
    }

    /// Plans the withdrawal of the whole balance ahead of closing.
    ///
    /// Ignores the withdrawable flag. Returns `None` for an empty account.
    pub fn liquidate(account: &AccountSnapshot) -> Result<Option<BalanceChange>, SavingsError> {
        Self::require_open(account)?;
        if account.balance <= Decimal::ZERO {
            return Ok(None);
        }
        Self::debit(account, account.balance).map(Some)
    }

    fn debit(account: &AccountSnapshot, amount: Decimal) -> Result<BalanceChange, SavingsError> {
        if account.balance < amount {
            return Err(SavingsError::InsufficientFunds {
                balance: account.balance,
                requested: amount,
            });
        }

        Ok(BalanceChange {
            entry_type: EntryType::Withdraw,
            amount,
            prior_balance: account.balance,
            new_balance: account.balance - amount,
        })
    }

    /// Plans the reversal of `entry`.
    ///
    /// The returned change has type `Reversal` and applies the inverse of the
    /// original movement to the account's current balance.
    pub fn reverse(
        account: &AccountSnapshot,
        entry: &EntrySnapshot,
        reason: &str,
        now: DateTime<Utc>,
        window_days: u32,
    ) -> Result<BalanceChange, SavingsError> {
        if reason.trim().is_empty() {
            return Err(SavingsError::ReasonRequired);
        }
        if entry.status == EntryStatus::Reversed {
            return Err(SavingsError::AlreadyReversed(entry.id));
        }
        if !entry.entry_type.is_reversible() || entry.account_id != Some(account.id) {
            return Err(SavingsError::UnsupportedReversal(entry.entry_type));
        }

        let age = now - entry.created_at;
        if age > Duration::days(i64::from(window_days)) {
            return Err(SavingsError::TooOld {
                age_days: age.num_days(),
                window_days,
            });
        }
        Self::require_open(account)?;

        let new_balance = match entry.entry_type {
            EntryType::Deposit => {
                if account.balance < entry.amount {
                    return Err(SavingsError::WouldGoNegative {
                        balance: account.balance,
                        amount: entry.amount,
                    });
                }
                account.balance - entry.amount
            }
            _ => account.balance + entry.amount,
        };

        Ok(BalanceChange {
            entry_type: EntryType::Reversal,
            amount: entry.amount,
            prior_balance: account.balance,
            new_balance,
        })
    }

    /// Validates an account opening.
    pub fn validate_opening(check: &OpenAccountCheck) -> Result<(), SavingsError> {
        if !check.member_active {
            return Err(SavingsError::MemberInactive);
        }
        if !check.account_type_active {
            return Err(SavingsError::AccountTypeInactive);
        }
        if check.has_open_account_of_type {
            return Err(SavingsError::DuplicateOpenAccount);
        }
        if check.initial_deposit < Decimal::ZERO {
            return Err(SavingsError::InvalidAmount(check.initial_deposit));
        }
        if check.initial_deposit < check.minimum_balance {
            return Err(SavingsError::BelowMinimumBalance {
                minimum: check.minimum_balance,
                amount: check.initial_deposit,
            });
        }
        Ok(())
    }

    /// Validates that an account may be closed.
    pub fn validate_close(account: &AccountSnapshot) -> Result<(), SavingsError> {
        Self::require_open(account)?;
        if !account.balance.is_zero() {
            return Err(SavingsError::NonZeroBalance(account.balance));
        }
        Ok(())
    }

    fn require_positive(amount: Decimal) -> Result<(), SavingsError> {
        if amount <= Decimal::ZERO || !is_whole_cents(amount) {
            return Err(SavingsError::InvalidAmount(amount));
        }
        Ok(())
    }

    fn require_open(account: &AccountSnapshot) -> Result<(), SavingsError> {
        if account.status == AccountStatus::Closed {
            return Err(SavingsError::AccountClosed);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn account(balance: Decimal, withdrawable: bool) -> AccountSnapshot {
        AccountSnapshot {
            id: Uuid::new_v4(),
            balance,
            status: AccountStatus::Active,
            withdrawable,
        }
    }

    fn entry_for(
        account: &AccountSnapshot,
        entry_type: EntryType,
        amount: Decimal,
        created_at: DateTime<Utc>,
    ) -> EntrySnapshot {
        EntrySnapshot {
            id: Uuid::new_v4(),
            entry_type,
            amount,
            prior_balance: None,
            new_balance: None,
            account_id: Some(account.id),
            reversal_of: None,
            status: EntryStatus::Posted,
            created_at,
        }
    }

    #[test]
    fn test_deposit_then_withdraw() {
        let acct = account(dec!(0), true);
        let dep = SavingsService::deposit(&acct, dec!(500.00)).unwrap();
        assert_eq!(dep.prior_balance, dec!(0));
        assert_eq!(dep.new_balance, dec!(500.00));
        assert_eq!(dep.entry_type, EntryType::Deposit);

        let acct = AccountSnapshot { balance: dep.new_balance, ..acct };
        let wd = SavingsService::withdraw(&acct, dec!(200.00)).unwrap();
        assert_eq!(wd.new_balance, dec!(300.00));
        assert_eq!(wd.entry_type, EntryType::Withdraw);
    }

    #[test]
    fn test_withdraw_insufficient_funds() {
        let acct = account(dec!(300.00), true);
        let err = SavingsService::withdraw(&acct, dec!(400.00)).unwrap_err();
        assert_eq!(
            err,
            SavingsError::InsufficientFunds {
                balance: dec!(300.00),
                requested: dec!(400.00)
            }
        );
    }

    #[test]
    fn test_non_positive_amounts_rejected() {
        let acct = account(dec!(100), true);
        assert_eq!(
            SavingsService::deposit(&acct, dec!(0)).unwrap_err(),
            SavingsError::InvalidAmount(dec!(0))
        );
        assert_eq!(
            SavingsService::withdraw(&acct, dec!(-5)).unwrap_err(),
            SavingsError::InvalidAmount(dec!(-5))
        );
    }

    #[test]
    fn test_sub_cent_amounts_rejected() {
        let acct = account(dec!(100), true);
        assert_eq!(
            SavingsService::deposit(&acct, dec!(0.004)).unwrap_err(),
            SavingsError::InvalidAmount(dec!(0.004))
        );
        assert_eq!(
            SavingsService::withdraw(&acct, dec!(10.125)).unwrap_err(),
            SavingsError::InvalidAmount(dec!(10.125))
        );
        assert!(SavingsService::deposit(&acct, dec!(10.500)).is_ok());
    }

    #[test]
    fn test_fixed_account_only_liquidates() {
        let acct = account(dec!(1000), false);
        assert_eq!(
            SavingsService::withdraw(&acct, dec!(100)).unwrap_err(),
            SavingsError::NotWithdrawable
        );
        assert_eq!(
            SavingsService::withdraw(&acct, dec!(1000)).unwrap_err(),
            SavingsError::NotWithdrawable
        );
        let change = SavingsService::liquidate(&acct).unwrap().unwrap();
        assert_eq!(change.amount, dec!(1000));
        assert_eq!(change.new_balance, dec!(0));
        assert_eq!(change.entry_type, EntryType::Withdraw);
    }

    #[test]
    fn test_liquidate_empty_account() {
        assert_eq!(SavingsService::liquidate(&account(dec!(0), false)).unwrap(), None);
    }

    #[test]
    fn test_closed_account_rejects_movements() {
        let acct = AccountSnapshot {
            status: AccountStatus::Closed,
            ..account(dec!(0), true)
        };
        assert_eq!(
            SavingsService::deposit(&acct, dec!(10)).unwrap_err(),
            SavingsError::AccountClosed
        );
    }

    #[test]
    fn test_credit_rejects_debit_types() {
        let acct = account(dec!(10), true);
        assert!(SavingsService::credit(&acct, dec!(1), EntryType::Interest).is_ok());
        assert!(SavingsService::credit(&acct, dec!(1), EntryType::Dividend).is_ok());
        assert!(SavingsService::credit(&acct, dec!(1), EntryType::Withdraw).is_err());
    }

    #[test]
    fn test_reverse_deposit_restores_balance() {
        let now = Utc::now();
        let acct = account(dec!(300.00), true);
        let dep = entry_for(&acct, EntryType::Deposit, dec!(200.00), now - Duration::days(2));

        let change = SavingsService::reverse(&acct, &dep, "duplicated", now, 30).unwrap();
        assert_eq!(change.entry_type, EntryType::Reversal);
        assert_eq!(change.prior_balance, dec!(300.00));
        assert_eq!(change.new_balance, dec!(100.00));
    }

    #[test]
    fn test_reverse_withdraw_adds_back() {
        let now = Utc::now();
        let acct = account(dec!(50.00), true);
        let wd = entry_for(&acct, EntryType::Withdraw, dec!(25.00), now);
        let change = SavingsService::reverse(&acct, &wd, "teller error", now, 30).unwrap();
        assert_eq!(change.new_balance, dec!(75.00));
    }

    #[test]
    fn test_reverse_rules() {
        let now = Utc::now();
        let acct = account(dec!(100.00), true);

        let old = entry_for(&acct, EntryType::Deposit, dec!(10), now - Duration::days(31));
        assert!(matches!(
            SavingsService::reverse(&acct, &old, "late", now, 30),
            Err(SavingsError::TooOld { age_days: 31, .. })
        ));

        let edge = entry_for(&acct, EntryType::Deposit, dec!(10), now - Duration::days(30));
        assert!(SavingsService::reverse(&acct, &edge, "edge", now, 30).is_ok());

        let past_edge = entry_for(
            &acct,
            EntryType::Deposit,
            dec!(10),
            now - Duration::days(30) - Duration::seconds(1),
        );
        assert!(matches!(
            SavingsService::reverse(&acct, &past_edge, "edge", now, 30),
            Err(SavingsError::TooOld { age_days: 30, .. })
        ));

        let nearly_a_day_over = entry_for(
            &acct,
            EntryType::Deposit,
            dec!(10),
            now - Duration::days(30) - Duration::hours(23),
        );
        assert!(matches!(
            SavingsService::reverse(&acct, &nearly_a_day_over, "late", now, 30),
            Err(SavingsError::TooOld { .. })
        ));

        let mut reversed = entry_for(&acct, EntryType::Deposit, dec!(10), now);
        reversed.status = EntryStatus::Reversed;
        assert_eq!(
            SavingsService::reverse(&acct, &reversed, "again", now, 30).unwrap_err(),
            SavingsError::AlreadyReversed(reversed.id)
        );

        let interest = entry_for(&acct, EntryType::Interest, dec!(10), now);
        assert_eq!(
            SavingsService::reverse(&acct, &interest, "no", now, 30).unwrap_err(),
            SavingsError::UnsupportedReversal(EntryType::Interest)
        );

        let big = entry_for(&acct, EntryType::Deposit, dec!(150), now);
        assert!(matches!(
            SavingsService::reverse(&acct, &big, "spent", now, 30),
            Err(SavingsError::WouldGoNegative { .. })
        ));

        let fine = entry_for(&acct, EntryType::Deposit, dec!(10), now);
        assert_eq!(
            SavingsService::reverse(&acct, &fine, "  ", now, 30).unwrap_err(),
            SavingsError::ReasonRequired
        );
    }

    #[test]
    fn test_reverse_entry_of_other_account() {
        let now = Utc::now();
        let acct = account(dec!(100), true);
        let other = account(dec!(100), true);
        let dep = entry_for(&other, EntryType::Deposit, dec!(10), now);
        assert!(SavingsService::reverse(&acct, &dep, "wrong", now, 30).is_err());
    }

    #[test]
    fn test_validate_opening() {
        let ok = OpenAccountCheck {
            member_active: true,
            account_type_active: true,
            has_open_account_of_type: false,
            minimum_balance: dec!(100),
            initial_deposit: dec!(100),
        };
        assert!(SavingsService::validate_opening(&ok).is_ok());

        let dup = OpenAccountCheck {
            has_open_account_of_type: true,
            ..ok.clone()
        };
        assert_eq!(
            SavingsService::validate_opening(&dup).unwrap_err(),
            SavingsError::DuplicateOpenAccount
        );

        let low = OpenAccountCheck {
            initial_deposit: dec!(50),
            ..ok.clone()
        };
        assert!(matches!(
            SavingsService::validate_opening(&low),
            Err(SavingsError::BelowMinimumBalance { .. })
        ));

        let inactive = OpenAccountCheck {
            member_active: false,
            ..ok
        };
        assert_eq!(
            SavingsService::validate_opening(&inactive).unwrap_err(),
            SavingsError::MemberInactive
        );
    }

    #[test]
    fn test_validate_close() {
        assert!(SavingsService::validate_close(&account(dec!(0), true)).is_ok());
        assert_eq!(
            SavingsService::validate_close(&account(dec!(0.01), true)).unwrap_err(),
            SavingsError::NonZeroBalance(dec!(0.01))
        );
    }
}
