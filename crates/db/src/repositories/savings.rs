//! Savings accounts and their ledger.
//!
//! Every balance change runs in one transaction: lock the account row, plan
//! the change with [`SavingsService`], update the balance and append the
//! matching ledger entry.

use chrono::{NaiveDate, Utc};
use coopbank_core::audit::{AuditAction, AuditEntity, AuditRecord};
use coopbank_core::notification::NotificationTemplates;
use coopbank_core::numbering::DocumentKind;
use coopbank_core::savings::{
    AccountSnapshot, AccountStatus, BalanceChange, EntrySnapshot, EntryType, OpenAccountCheck,
    SavingsError, SavingsService,
};
use coopbank_shared::PolicyConfig;
use coopbank_shared::types::{PageRequest, PageResponse};
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
    account_types, accounts, ledger_entries, members,
    sea_orm_active_enums::{AccountStatus as DbAccountStatus, EntryStatus as DbEntryStatus},
};
use crate::error::RepositoryError;

/// Input for opening an account.
#[derive(Debug, Clone)]
pub struct OpenAccountInput {
    /// Owner.
    pub member_id: Uuid,
    /// Account type.
    pub account_type_id: Uuid,
    /// Opening deposit; zero for none.
    pub initial_deposit: Decimal,
    /// Monthly payroll deduction credited to the account.
    pub payroll_amount: Decimal,
    /// Opening date, also used for the account number.
    pub opened_on: NaiveDate,
    /// User performing the operation.
    pub actor: Uuid,
}

/// Input for a single balance movement.
#[derive(Debug, Clone)]
pub struct MovementInput {
    /// Target account.
    pub account_id: Uuid,
    /// Positive amount.
    pub amount: Decimal,
    /// Free-text description stored on the entry.
    pub memo: Option<String>,
    /// User performing the operation.
    pub actor: Uuid,
}

/// Account state after a posting together with the appended entry.
#[derive(Debug, Clone, Serialize)]
pub struct Posting {
    /// Account after the change.
    pub account: accounts::Model,
    /// Appended ledger entry.
    pub entry: ledger_entries::Model,
}

/// A newly opened account.
#[derive(Debug, Clone, Serialize)]
pub struct OpenedAccount {
    /// The account.
    pub account: accounts::Model,
    /// Opening deposit entry, when one was made.
    pub opening_entry: Option<ledger_entries::Model>,
}

/// An account closed by liquidation.
#[derive(Debug, Clone, Serialize)]
pub struct ClosedAccount {
    /// The closed account.
    pub account: accounts::Model,
    /// Withdrawal that emptied it, when the balance was not already zero.
    pub closing_entry: Option<ledger_entries::Model>,
}

/// Savings repository.
#[derive(Debug, Clone)]
pub struct SavingsRepository {
    db: DatabaseConnection,
    policy: PolicyConfig,
}

impl SavingsRepository {
    /// Creates a new savings repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, policy: PolicyConfig) -> Self {
        Self { db, policy }
    }

    /// Opens an account, posting the initial deposit if any.
    pub async fn open_account(&self, input: OpenAccountInput) -> Result<OpenedAccount, RepositoryError> {
        let txn = self.db.begin().await?;

        let member = members::Entity::find_by_id(input.member_id)
            .one(&txn)
            .await?
            .ok_or(RepositoryError::not_found("member", input.member_id))?;
        let account_type = account_types::Entity::find_by_id(input.account_type_id)
            .one(&txn)
            .await?
            .ok_or(RepositoryError::not_found("account type", input.account_type_id))?;
        let open_of_type = accounts::Entity::find()
            .filter(accounts::Column::MemberId.eq(input.member_id))
            .filter(accounts::Column::AccountTypeId.eq(input.account_type_id))
            .filter(accounts::Column::Status.eq(DbAccountStatus::Active))
            .count(&txn)
            .await?;

        SavingsService::validate_opening(&OpenAccountCheck {
            member_active: member.active,
            account_type_active: account_type.active,
            has_open_account_of_type: open_of_type > 0,
            minimum_balance: account_type.minimum_balance,
            initial_deposit: input.initial_deposit,
        })?;
        if input.payroll_amount < Decimal::ZERO {
            return Err(SavingsError::InvalidAmount(input.payroll_amount).into());
        }

        let now = Utc::now().into();
        let account_number = next_number(&txn, DocumentKind::Account, input.opened_on).await?;
        let account = accounts::ActiveModel {
            id: Set(Uuid::new_v4()),
            account_number: Set(account_number),
            member_id: Set(input.member_id),
            account_type_id: Set(input.account_type_id),
            balance: Set(Decimal::ZERO),
            payroll_amount: Set(input.payroll_amount),
            status: Set(DbAccountStatus::Active),
            opened_on: Set(input.opened_on),
            closed_on: Set(None),
            notes: Set(None),
            created_at: Set(now),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|err| {
            RepositoryError::from(err).unique_as("uq_accounts_open_per_type", SavingsError::DuplicateOpenAccount)
        })?;

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                input.actor,
                AuditAction::Create,
                AuditEntity::Account,
                account.id,
                format!("Opened account {}", account.account_number),
                Utc::now(),
            )
            .with_after(&account),
        );

        let (account, opening_entry) = if input.initial_deposit > Decimal::ZERO {
            let change = SavingsService::deposit(
                &Self::snapshot(&account, account_type.withdrawable),
                input.initial_deposit,
            )?;
            let posting =
                Self::post(&txn, account, &change, None, "Opening deposit".to_string(), input.actor)
                    .await?;
            (posting.account, Some(posting.entry))
        } else {
            (account, None)
        };

        txn.commit().await?;
        info!(
            account_id = %account.id,
            account_number = %account.account_number,
            member_id = %account.member_id,
            initial_deposit = %input.initial_deposit,
            "account opened"
        );
        effects.publish(&self.db).await;

        Ok(OpenedAccount {
            account,
            opening_entry,
        })
    }

    /// Deposits into an account.
    pub async fn deposit(&self, input: MovementInput) -> Result<Posting, RepositoryError> {
        self.credit(input, EntryType::Deposit).await
    }

    /// Credits interest earned on the account.
    pub async fn post_interest(&self, input: MovementInput) -> Result<Posting, RepositoryError> {
        self.credit(input, EntryType::Interest).await
    }

    async fn credit(&self, input: MovementInput, entry_type: EntryType) -> Result<Posting, RepositoryError> {
        let txn = self.db.begin().await?;
        let (account, withdrawable) = Self::lock_account(&txn, input.account_id).await?;

        let change = SavingsService::credit(&Self::snapshot(&account, withdrawable), input.amount, entry_type)?;
        let description = input
            .memo
            .clone()
            .unwrap_or_else(|| entry_type.as_str().to_lowercase());
        let posting = Self::post(&txn, account, &change, None, description, input.actor).await?;

        txn.commit().await?;
        info!(
            account_id = %posting.account.id,
            entry_id = %posting.entry.id,
            entry_type = %entry_type,
            amount = %input.amount,
            new_balance = %change.new_balance,
            "credit posted"
        );

        let mut effects = SideEffects::new();
        effects.audit(Self::entry_audit(&posting, input.actor, AuditAction::Create));
        if entry_type == EntryType::Deposit {
            effects.notify(NotificationTemplates::deposit(
                posting.account.member_id,
                posting.entry.id,
                &posting.account.account_number,
                change.amount,
                change.new_balance,
            ));
        }
        effects.publish(&self.db).await;

        Ok(posting)
    }

    /// Withdraws from an account.
    ///
    /// Fails with `NotWithdrawable` on fixed account types; those are only
    /// emptied by [`Self::liquidate_and_close`].
    pub async fn withdraw(&self, input: MovementInput) -> Result<Posting, RepositoryError> {
        let txn = self.db.begin().await?;
        let (account, withdrawable) = Self::lock_account(&txn, input.account_id).await?;

        let change = SavingsService::withdraw(&Self::snapshot(&account, withdrawable), input.amount)?;
        let description = input.memo.clone().unwrap_or_else(|| "withdrawal".to_string());
        let posting = Self::post(&txn, account, &change, None, description, input.actor).await?;

        txn.commit().await?;
        info!(
            account_id = %posting.account.id,
            entry_id = %posting.entry.id,
            amount = %input.amount,
            new_balance = %change.new_balance,
            "withdrawal posted"
        );

        let mut effects = SideEffects::new();
        effects
            .audit(Self::entry_audit(&posting, input.actor, AuditAction::Create))
            .notify(NotificationTemplates::withdrawal(
                posting.account.member_id,
                posting.entry.id,
                &posting.account.account_number,
                change.amount,
                change.new_balance,
            ));
        effects.publish(&self.db).await;

        Ok(posting)
    }

    /// Reverses a deposit or withdrawal.
    ///
    /// Locks the account before the entry. The original entry is flagged
    /// REVERSED and a REVERSAL entry referencing it is appended.
    pub async fn reverse(&self, entry_id: Uuid, reason: &str, actor: Uuid) -> Result<Posting, RepositoryError> {
        let txn = self.db.begin().await?;

        let unlocked = ledger_entries::Entity::find_by_id(entry_id)
            .one(&txn)
            .await?
            .ok_or(SavingsError::EntryNotFound(entry_id))?;
        let Some(account_id) = unlocked.account_id else {
            return Err(SavingsError::UnsupportedReversal(unlocked.entry_type.into()).into());
        };

        let (account, withdrawable) = Self::lock_account(&txn, account_id).await?;
        let original = ledger_entries::Entity::find_by_id(entry_id)
            .lock_exclusive()
            .one(&txn)
            .await?
            .ok_or(SavingsError::EntryNotFound(entry_id))?;

        let change = SavingsService::reverse(
            &Self::snapshot(&account, withdrawable),
            &EntrySnapshot::from(&original),
            reason,
            Utc::now(),
            self.policy.reversal_window_days,
        )?;

        let description = format!("Reversal: {}", reason.trim());
        let posting = Self::post(&txn, account, &change, Some(original.id), description, actor).await?;

        let mut flagged: ledger_entries::ActiveModel = original.clone().into();
        flagged.status = Set(DbEntryStatus::Reversed);
        flagged.update(&txn).await?;

        txn.commit().await?;
        info!(
            account_id = %posting.account.id,
            original_entry_id = %original.id,
            reversal_entry_id = %posting.entry.id,
            amount = %change.amount,
            new_balance = %change.new_balance,
            "entry reversed"
        );

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                AuditAction::Reverse,
                AuditEntity::LedgerEntry,
                original.id,
                format!("Reversed entry: {}", reason.trim()),
                Utc::now(),
            )
            .with_before(&original)
            .with_after(&posting.entry),
        );
        effects.publish(&self.db).await;

        Ok(posting)
    }

    /// Closes an account whose balance is already zero.
    pub async fn close_account(
        &self,
        account_id: Uuid,
        reason: &str,
        actor: Uuid,
    ) -> Result<accounts::Model, RepositoryError> {
        if reason.trim().is_empty() {
            return Err(SavingsError::ReasonRequired.into());
        }
        let txn = self.db.begin().await?;
        let (account, withdrawable) = Self::lock_account(&txn, account_id).await?;
        SavingsService::validate_close(&Self::snapshot(&account, withdrawable))?;

        let before = account.clone();
        let closed = Self::mark_closed(&txn, account, reason).await?;
        txn.commit().await?;
        info!(account_id = %closed.id, "account closed");

        let mut effects = SideEffects::new();
        effects.audit(Self::close_audit(&before, &closed, reason, actor));
        effects.publish(&self.db).await;

        Ok(closed)
    }

    /// Withdraws the full balance and closes the account, in one
    /// transaction. Works on non-withdrawable account types.
    pub async fn liquidate_and_close(
        &self,
        account_id: Uuid,
        reason: &str,
        actor: Uuid,
    ) -> Result<ClosedAccount, RepositoryError> {
        if reason.trim().is_empty() {
            return Err(SavingsError::ReasonRequired.into());
        }
        let txn = self.db.begin().await?;
        let (account, withdrawable) = Self::lock_account(&txn, account_id).await?;
        let before = account.clone();

        let (account, entry) = if let Some(change) =
            SavingsService::liquidate(&Self::snapshot(&account, withdrawable))?
        {
            let posting = Self::post(
                &txn,
                account,
                &change,
                None,
                format!("Liquidation: {}", reason.trim()),
                actor,
            )
            .await?;
            (posting.account, Some(posting.entry))
        } else {
            (account, None)
        };

        SavingsService::validate_close(&Self::snapshot(&account, withdrawable))?;
        let closed = Self::mark_closed(&txn, account, reason).await?;
        txn.commit().await?;
        info!(
            account_id = %closed.id,
            liquidated = %before.balance,
            "account liquidated and closed"
        );

        let mut effects = SideEffects::new();
        if let Some(entry) = &entry {
            effects.audit(
                AuditRecord::new(
                    actor,
                    AuditAction::Create,
                    AuditEntity::LedgerEntry,
                    entry.id,
                    "Closing withdrawal",
                    Utc::now(),
                )
                .with_after(entry),
            );
            effects.notify(NotificationTemplates::withdrawal(
                closed.member_id,
                entry.id,
                &closed.account_number,
                entry.amount,
                Decimal::ZERO,
            ));
        }
        effects.audit(Self::close_audit(&before, &closed, reason, actor));
        effects.publish(&self.db).await;

        Ok(ClosedAccount {
            account: closed,
            closing_entry: entry,
        })
    }

    /// Finds an account by id.
    pub async fn find(&self, account_id: Uuid) -> Result<accounts::Model, RepositoryError> {
        accounts::Entity::find_by_id(account_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| SavingsError::AccountNotFound(account_id).into())
    }

    /// Accounts of a member, oldest first.
    pub async fn for_member(&self, member_id: Uuid) -> Result<Vec<accounts::Model>, RepositoryError> {
        let rows = accounts::Entity::find()
            .filter(accounts::Column::MemberId.eq(member_id))
            .order_by_asc(accounts::Column::OpenedOn)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Ledger entries of an account, newest first.
    pub async fn statement(
        &self,
        account_id: Uuid,
        page: PageRequest,
    ) -> Result<PageResponse<ledger_entries::Model>, RepositoryError> {
        let query = ledger_entries::Entity::find().filter(ledger_entries::Column::AccountId.eq(account_id));
        let total = query.clone().count(&self.db).await?;
        let rows = query
            .order_by_desc(ledger_entries::Column::CreatedAt)
            .order_by_desc(ledger_entries::Column::Id)
            .offset(page.offset())
            .limit(page.limit())
            .all(&self.db)
            .await?;
        Ok(PageResponse::new(rows, page, total))
    }

    /// All entries of an account in posting order.
    pub async fn entries(&self, account_id: Uuid) -> Result<Vec<ledger_entries::Model>, RepositoryError> {
        let rows = ledger_entries::Entity::find()
            .filter(ledger_entries::Column::AccountId.eq(account_id))
            .order_by_asc(ledger_entries::Column::CreatedAt)
            .order_by_asc(ledger_entries::Column::Id)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    /// Locks the account row and returns it with its type's withdrawable
    /// flag.
    pub(super) async fn lock_account(
        txn: &DatabaseTransaction,
        account_id: Uuid,
    ) -> Result<(accounts::Model, bool), RepositoryError> {
        let account = accounts::Entity::find_by_id(account_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or(SavingsError::AccountNotFound(account_id))?;
        let account_type = account_types::Entity::find_by_id(account.account_type_id)
            .one(txn)
            .await?
            .ok_or(RepositoryError::not_found("account type", account.account_type_id))?;
        Ok((account, account_type.withdrawable))
    }

    pub(super) fn snapshot(account: &accounts::Model, withdrawable: bool) -> AccountSnapshot {
        AccountSnapshot {
            id: account.id,
            balance: account.balance,
            status: AccountStatus::from(account.status),
            withdrawable,
        }
    }

    /// Writes the new balance and appends the entry.
    pub(super) async fn post(
        txn: &DatabaseTransaction,
        account: accounts::Model,
        change: &BalanceChange,
        reversal_of: Option<Uuid>,
        description: String,
        actor: Uuid,
    ) -> Result<Posting, RepositoryError> {
        let now = Utc::now().into();
        let account_id = account.id;

        let mut active: accounts::ActiveModel = account.into();
        active.balance = Set(change.new_balance);
        active.updated_at = Set(now);
        let account = active.update(txn).await?;

        let entry = ledger_entries::ActiveModel {
            id: Set(Uuid::now_v7()),
            entry_type: Set(change.entry_type.into()),
            amount: Set(change.amount),
            prior_balance: Set(Some(change.prior_balance)),
            new_balance: Set(Some(change.new_balance)),
            account_id: Set(Some(account_id)),
            loan_id: Set(None),
            receipt_number: Set(None),
            reversal_of: Set(reversal_of),
            status: Set(DbEntryStatus::Posted),
            description: Set(description),
            created_at: Set(now),
            created_by: Set(actor),
        }
        .insert(txn)
        .await?;

        Ok(Posting { account, entry })
    }

    async fn mark_closed(
        txn: &DatabaseTransaction,
        account: accounts::Model,
        reason: &str,
    ) -> Result<accounts::Model, RepositoryError> {
        let line = format!("Closed: {}", reason.trim());
        let notes = match account.notes.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
            Some(existing) => format!("{existing}\n{line}"),
            None => line,
        };

        let now = Utc::now();
        let mut active: accounts::ActiveModel = account.into();
        active.status = Set(DbAccountStatus::Closed);
        active.closed_on = Set(Some(now.date_naive()));
        active.notes = Set(Some(notes));
        active.updated_at = Set(now.into());
        Ok(active.update(txn).await?)
    }

    pub(super) fn entry_audit(posting: &Posting, actor: Uuid, action: AuditAction) -> AuditRecord {
        AuditRecord::new(
            actor,
            action,
            AuditEntity::LedgerEntry,
            posting.entry.id,
            format!(
                "{} of {} on account {}",
                EntryType::from(posting.entry.entry_type),
                posting.entry.amount,
                posting.account.account_number
            ),
            Utc::now(),
        )
        .with_after(&posting.entry)
    }

    fn close_audit(before: &accounts::Model, after: &accounts::Model, reason: &str, actor: Uuid) -> AuditRecord {
        AuditRecord::new(
            actor,
            AuditAction::Close,
            AuditEntity::Account,
            after.id,
            format!("Closed account {}: {}", after.account_number, reason.trim()),
            Utc::now(),
        )
        .with_before(before)
        .with_after(after)
    }
}
