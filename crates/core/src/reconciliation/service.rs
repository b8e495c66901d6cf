//! Reconciliation service.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::error::ReconciliationError;
use crate::fund::{FundService, FundTotals, MovementSnapshot};
use crate::savings::{EntrySnapshot, EntryType};

/// Result of a clean account reconciliation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccountReconciliation {
    /// Account id.
    pub account_id: Uuid,
    /// Balance derived from the ledger (equals the stored balance).
    pub balance: Decimal,
    /// Number of entries replayed.
    pub entries: usize,
}

/// Stateless reconciliation checks.
pub struct ReconciliationService;

impl ReconciliationService {
    /// Signed effect of one entry on its account's balance.
    ///
    /// `types` maps entry ids of the same account to their types so that a
    /// reversal can take the opposite sign of the entry it cancels.
    pub fn signed_amount(
        entry: &EntrySnapshot,
        types: &HashMap<Uuid, EntryType>,
    ) -> Result<Decimal, ReconciliationError> {
        if let Some(sign) = entry.entry_type.balance_sign() {
            return Ok(sign * entry.amount);
        }

        match entry.entry_type {
            EntryType::Reversal => {
                let original = entry
                    .reversal_of
                    .and_then(|id| types.get(&id))
                    .and_then(EntryType::balance_sign)
                    .ok_or(ReconciliationError::OrphanReversal(entry.id))?;
                Ok(-original * entry.amount)
            }
            EntryType::Adjustment => match (entry.prior_balance, entry.new_balance) {
                (Some(prior), Some(new)) if new >= prior => Ok(entry.amount),
                (Some(_), Some(_)) => Ok(-entry.amount),
                _ => Err(ReconciliationError::AmountMismatch(entry.id)),
            },
            _ => Ok(Decimal::ZERO),
        }
    }

    /// Replays `entries` (oldest first) and returns the derived balance.
    pub fn derive_balance(entries: &[EntrySnapshot]) -> Result<Decimal, ReconciliationError> {
        let types: HashMap<Uuid, EntryType> =
            entries.iter().map(|e| (e.id, e.entry_type)).collect();

        entries.iter().try_fold(Decimal::ZERO, |acc, entry| {
            Ok(acc + Self::signed_amount(entry, &types)?)
        })
    }

    /// Full account check: per-entry deltas, the prior/new chain, and the
    /// stored balance against the replayed one.
    pub fn verify_account(
        account_id: Uuid,
        stored_balance: Decimal,
        entries: &[EntrySnapshot],
    ) -> Result<AccountReconciliation, ReconciliationError> {
        let types: HashMap<Uuid, EntryType> =
            entries.iter().map(|e| (e.id, e.entry_type)).collect();

        let mut running = Decimal::ZERO;
        for entry in entries {
            let delta = Self::signed_amount(entry, &types)?;

            if let (Some(prior), Some(new)) = (entry.prior_balance, entry.new_balance) {
                if prior != running {
                    return Err(ReconciliationError::BrokenChain {
                        entry_id: entry.id,
                        expected: running,
                        found: prior,
                    });
                }
                if new - prior != delta {
                    return Err(ReconciliationError::AmountMismatch(entry.id));
                }
            }
            running += delta;
        }

        if running != stored_balance {
            return Err(ReconciliationError::BalanceMismatch {
                account_id,
                stored: stored_balance,
                derived: running,
            });
        }

        Ok(AccountReconciliation {
            account_id,
            balance: running,
            entries: entries.len(),
        })
    }

    /// Compares stored fund totals with totals recomputed from movements.
    pub fn verify_fund(
        fund_id: Uuid,
        stored: &FundTotals,
        movements: &[MovementSnapshot],
    ) -> Result<FundTotals, ReconciliationError> {
        let derived = FundService::recompute_totals(movements);
        if derived != *stored {
            return Err(ReconciliationError::FundTotalsMismatch {
                fund_id,
                stored: stored.available,
                derived: derived.available,
            });
        }
        Ok(derived)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fund::MovementKind;
    use crate::savings::EntryStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn entry(entry_type: EntryType, amount: Decimal, prior: Decimal, new: Decimal) -> EntrySnapshot {
        EntrySnapshot {
            id: Uuid::now_v7(),
            entry_type,
            amount,
            prior_balance: Some(prior),
            new_balance: Some(new),
            account_id: Some(Uuid::nil()),
            reversal_of: None,
            status: EntryStatus::Posted,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_scenario_deposit_withdraw_reverse() {
        let dep = entry(EntryType::Deposit, dec!(500), dec!(0), dec!(500));
        let wd = entry(EntryType::Withdraw, dec!(200), dec!(500), dec!(300));
        let mut rev = entry(EntryType::Reversal, dec!(200), dec!(300), dec!(500));
        rev.reversal_of = Some(wd.id);

        let entries = vec![dep, wd, rev];
        assert_eq!(ReconciliationService::derive_balance(&entries).unwrap(), dec!(500));
        let result = ReconciliationService::verify_account(Uuid::nil(), dec!(500), &entries).unwrap();
        assert_eq!(result.entries, 3);
    }

    #[test]
    fn test_reversed_deposit_cancels() {
        let dep = entry(EntryType::Deposit, dec!(80), dec!(0), dec!(80));
        let mut rev = entry(EntryType::Reversal, dec!(80), dec!(80), dec!(0));
        rev.reversal_of = Some(dep.id);
        assert_eq!(
            ReconciliationService::derive_balance(&[dep, rev]).unwrap(),
            dec!(0)
        );
    }

    #[test]
    fn test_mismatch_detected() {
        let entries = vec![entry(EntryType::Deposit, dec!(100), dec!(0), dec!(100))];
        let err =
            ReconciliationService::verify_account(Uuid::nil(), dec!(90), &entries).unwrap_err();
        assert!(matches!(err, ReconciliationError::BalanceMismatch { .. }));
        assert_eq!(err.category(), coopbank_shared::ErrorCategory::IntegrityViolation);
    }

    #[test]
    fn test_broken_chain_detected() {
        let entries = vec![
            entry(EntryType::Deposit, dec!(100), dec!(0), dec!(100)),
            entry(EntryType::Deposit, dec!(50), dec!(90), dec!(140)),
        ];
        assert!(matches!(
            ReconciliationService::verify_account(Uuid::nil(), dec!(150), &entries),
            Err(ReconciliationError::BrokenChain { .. })
        ));
    }

    #[test]
    fn test_amount_mismatch_detected() {
        let entries = vec![entry(EntryType::Deposit, dec!(100), dec!(0), dec!(110))];
        assert!(matches!(
            ReconciliationService::verify_account(Uuid::nil(), dec!(100), &entries),
            Err(ReconciliationError::AmountMismatch(_))
        ));
    }

    #[test]
    fn test_orphan_reversal() {
        let mut rev = entry(EntryType::Reversal, dec!(10), dec!(0), dec!(10));
        rev.reversal_of = Some(Uuid::new_v4());
        assert_eq!(
            ReconciliationService::derive_balance(&[rev.clone()]).unwrap_err(),
            ReconciliationError::OrphanReversal(rev.id)
        );
    }

    #[test]
    fn test_adjustment_sign_follows_balances() {
        let dep = entry(EntryType::Deposit, dec!(100), dec!(0), dec!(100));
        let adj = entry(EntryType::Adjustment, dec!(5), dec!(100), dec!(95));
        assert_eq!(
            ReconciliationService::derive_balance(&[dep, adj]).unwrap(),
            dec!(95)
        );
    }

    #[test]
    fn test_fund_totals() {
        let movements = vec![
            MovementSnapshot { kind: MovementKind::Open, amount: dec!(0) },
            MovementSnapshot { kind: MovementKind::Inflow, amount: dec!(100) },
            MovementSnapshot { kind: MovementKind::Outflow, amount: dec!(30) },
        ];
        let stored = FundTotals {
            total_inflow: dec!(100),
            total_outflow: dec!(30),
            available: dec!(70),
        };
        assert!(ReconciliationService::verify_fund(Uuid::nil(), &stored, &movements).is_ok());

        let wrong = FundTotals { available: dec!(60), ..stored };
        assert!(ReconciliationService::verify_fund(Uuid::nil(), &wrong, &movements).is_err());
    }
}
