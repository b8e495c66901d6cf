//! Mutual-aid fund periods, their kardex and aid requests.
//!
//! Fund rows are locked before any movement is appended. After each append
//! the stored totals are recomputed from the full movement set.

use chrono::{NaiveDate, Utc};
use coopbank_core::audit::{AuditAction, AuditEntity, AuditRecord};
use coopbank_core::fund::{
    AidKind, AidStatus, ContributionKind, FundError, FundService, FundSnapshot, FundTotals,
    MovementPlan, MovementSnapshot, PeriodKey,
};
use coopbank_core::notification::NotificationTemplates;
use coopbank_core::numbering::DocumentKind;
use coopbank_shared::PolicyConfig;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use super::hooks::SideEffects;
use super::numbering::next_number;
use crate::entities::{
    aid_requests, fund_movements, members, mutual_funds,
    sea_orm_active_enums::{AidStatus as DbAidStatus, FundStatus as DbFundStatus},
};
use crate::error::RepositoryError;

/// Input for a member contribution.
#[derive(Debug, Clone)]
pub struct ContributionInput {
    /// Fund period receiving the money.
    pub fund_id: Uuid,
    /// Contributing member.
    pub member_id: Uuid,
    /// Amount, strictly above the configured minimum.
    pub amount: Decimal,
    /// Contribution kind.
    pub kind: ContributionKind,
    /// Free-text concept.
    pub concept: Option<String>,
    /// User performing the operation.
    pub actor: Uuid,
}

/// Input for an aid request.
#[derive(Debug, Clone)]
pub struct AidRequestInput {
    /// Fund period the aid is drawn from.
    pub fund_id: Uuid,
    /// Requesting member.
    pub member_id: Uuid,
    /// Aid kind.
    pub kind: AidKind,
    /// Requested amount.
    pub amount: Decimal,
    /// Why the aid is needed.
    pub justification: String,
    /// User performing the operation.
    pub actor: Uuid,
}

/// A kardex row and the fund after it.
#[derive(Debug, Clone, Serialize)]
pub struct FundPosting {
    /// Fund with recomputed totals.
    pub fund: mutual_funds::Model,
    /// Appended movement.
    pub movement: fund_movements::Model,
}

/// An approved aid request and its payout.
#[derive(Debug, Clone, Serialize)]
pub struct ApprovedAid {
    /// The request.
    pub request: aid_requests::Model,
    /// OUTFLOW movement and resulting fund.
    pub posting: FundPosting,
}

/// Fund repository.
#[derive(Debug, Clone)]
pub struct FundRepository {
    db: DatabaseConnection,
    policy: PolicyConfig,
}

impl FundRepository {
    /// Creates a new fund repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection, policy: PolicyConfig) -> Self {
        Self { db, policy }
    }

    /// Opens the fund for `period` with an OPEN marker movement.
    pub async fn open_period(&self, period: PeriodKey, actor: Uuid) -> Result<FundPosting, RepositoryError> {
        let txn = self.db.begin().await?;

        let exists = mutual_funds::Entity::find()
            .filter(mutual_funds::Column::PeriodKey.eq(period.to_string()))
            .count(&txn)
            .await?
            > 0;
        let bounds = FundService::open_period(period, exists)?;

        let now = Utc::now().into();
        let fund = mutual_funds::ActiveModel {
            id: Set(Uuid::new_v4()),
            period_key: Set(period.to_string()),
            start_date: Set(bounds.start_date),
            end_date: Set(bounds.end_date),
            status: Set(DbFundStatus::Open),
            total_inflow: Set(Decimal::ZERO),
            total_outflow: Set(Decimal::ZERO),
            available: Set(Decimal::ZERO),
            closed_on: Set(None),
            closed_by: Set(None),
            created_at: Set(now),
            created_by: Set(actor),
            updated_at: Set(now),
        }
        .insert(&txn)
        .await
        .map_err(|err| {
            RepositoryError::from(err).unique_as("uq_fund_period", FundError::DuplicatePeriod(period.to_string()))
        })?;

        let movement = Self::append(
            &txn,
            &fund,
            &FundService::opening_movement(),
            MovementSource::default(),
            format!("Opening of period {period}"),
            actor,
            bounds.start_date,
        )
        .await?;

        txn.commit().await?;
        info!(fund_id = %fund.id, period = %period, "fund period opened");

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                AuditAction::Create,
                AuditEntity::Fund,
                fund.id,
                format!("Opened fund period {period}"),
                Utc::now(),
            )
            .with_after(&fund),
        );
        effects.publish(&self.db).await;

        Ok(FundPosting { fund, movement })
    }

    /// Records a member contribution as an INFLOW.
    pub async fn contribute(&self, input: ContributionInput) -> Result<FundPosting, RepositoryError> {
        let txn = self.db.begin().await?;
        let fund = Self::lock_fund(&txn, input.fund_id).await?;
        let member = members::Entity::find_by_id(input.member_id)
            .one(&txn)
            .await?
            .ok_or(RepositoryError::not_found("member", input.member_id))?;

        let snapshot = Self::snapshot(&fund)?;
        let plan = FundService::contribute(&snapshot, input.amount, self.policy.min_contribution, member.active)?;

        let concept = input
            .concept
            .clone()
            .unwrap_or_else(|| format!("{} contribution", input.kind));
        let movement = Self::append(
            &txn,
            &fund,
            &plan,
            MovementSource {
                member_id: Some(input.member_id),
                contribution_kind: Some(input.kind),
                aid_request_id: None,
            },
            concept,
            input.actor,
            Utc::now().date_naive(),
        )
        .await?;
        let fund = Self::refresh_totals(&txn, fund).await?;

        txn.commit().await?;
        info!(
            fund_id = %fund.id,
            member_id = %input.member_id,
            movement_number = %movement.movement_number,
            amount = %input.amount,
            available = %fund.available,
            "contribution recorded"
        );

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                input.actor,
                AuditAction::Create,
                AuditEntity::FundMovement,
                movement.id,
                format!("Contribution {} to period {}", movement.movement_number, fund.period_key),
                Utc::now(),
            )
            .with_after(&movement),
        );
        effects.publish(&self.db).await;

        Ok(FundPosting { fund, movement })
    }

    /// Files an aid request. A member may hold one unresolved request.
    pub async fn submit_aid(&self, input: AidRequestInput) -> Result<aid_requests::Model, RepositoryError> {
        let txn = self.db.begin().await?;
        let fund = Self::lock_fund(&txn, input.fund_id).await?;
        let member = members::Entity::find_by_id(input.member_id)
            .one(&txn)
            .await?
            .ok_or(RepositoryError::not_found("member", input.member_id))?;

        let has_open = aid_requests::Entity::find()
            .filter(aid_requests::Column::MemberId.eq(input.member_id))
            .filter(aid_requests::Column::Status.is_in([DbAidStatus::Pending, DbAidStatus::InReview]))
            .count(&txn)
            .await?
            > 0;

        FundService::submit_aid(
            &Self::snapshot(&fund)?,
            input.amount,
            self.policy.max_aid_amount,
            &input.justification,
            has_open,
            member.active,
        )?;

        let now = Utc::now();
        let request_number = next_number(&txn, DocumentKind::AidRequest, now.date_naive()).await?;
        let request = aid_requests::ActiveModel {
            id: Set(Uuid::new_v4()),
            request_number: Set(request_number),
            member_id: Set(input.member_id),
            fund_id: Set(fund.id),
            kind: Set(input.kind.into()),
            requested_amount: Set(input.amount),
            approved_amount: Set(None),
            justification: Set(input.justification.trim().to_string()),
            status: Set(DbAidStatus::Pending),
            reviewed_by: Set(None),
            decided_at: Set(None),
            comments: Set(None),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(&txn)
        .await
        .map_err(|err| RepositoryError::from(err).unique_as("uq_aid_open_per_member", FundError::PendingRequestExists))?;

        txn.commit().await?;
        info!(
            request_id = %request.id,
            request_number = %request.request_number,
            member_id = %request.member_id,
            amount = %request.requested_amount,
            "aid request submitted"
        );

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                input.actor,
                AuditAction::Create,
                AuditEntity::AidRequest,
                request.id,
                format!("Submitted aid request {}", request.request_number),
                Utc::now(),
            )
            .with_after(&request),
        );
        effects.publish(&self.db).await;

        Ok(request)
    }

    /// PENDING -> IN_REVIEW.
    pub async fn start_aid_review(&self, request_id: Uuid, actor: Uuid) -> Result<aid_requests::Model, RepositoryError> {
        self.transition_aid(request_id, actor, AuditAction::Update, None, FundService::start_aid_review)
            .await
    }

    /// PENDING/IN_REVIEW -> CANCELLED.
    pub async fn cancel_aid(&self, request_id: Uuid, actor: Uuid) -> Result<aid_requests::Model, RepositoryError> {
        self.transition_aid(request_id, actor, AuditAction::Update, None, FundService::cancel_aid)
            .await
    }

    /// APPROVED -> DISBURSED.
    pub async fn mark_aid_disbursed(&self, request_id: Uuid, actor: Uuid) -> Result<aid_requests::Model, RepositoryError> {
        self.transition_aid(request_id, actor, AuditAction::Disburse, None, FundService::mark_aid_disbursed)
            .await
    }

    /// Rejects a request with a reason.
    pub async fn reject_aid(
        &self,
        request_id: Uuid,
        reason: &str,
        actor: Uuid,
    ) -> Result<aid_requests::Model, RepositoryError> {
        let request = self
            .transition_aid(
                request_id,
                actor,
                AuditAction::Reject,
                Some(reason.trim().to_string()),
                |status| FundService::reject_aid(status, reason),
            )
            .await?;

        let mut effects = SideEffects::new();
        effects.notify(NotificationTemplates::aid_rejected(
            request.member_id,
            request.id,
            &request.request_number,
            reason.trim(),
        ));
        effects.publish(&self.db).await;

        Ok(request)
    }

    /// Approves a request and pays it out of the fund as an OUTFLOW.
    pub async fn approve_aid(
        &self,
        request_id: Uuid,
        approved_amount: Decimal,
        comments: Option<String>,
        actor: Uuid,
    ) -> Result<ApprovedAid, RepositoryError> {
        let txn = self.db.begin().await?;

        let fund_id = Self::find_request(&txn, request_id).await?.fund_id;
        let fund = Self::lock_fund(&txn, fund_id).await?;
        let request = Self::lock_request(&txn, request_id).await?;

        let plan = FundService::approve_aid(&Self::snapshot(&fund)?, request.status.into(), approved_amount)?;

        let movement = Self::append(
            &txn,
            &fund,
            &plan,
            MovementSource {
                member_id: Some(request.member_id),
                contribution_kind: None,
                aid_request_id: Some(request.id),
            },
            format!("Aid {} ({})", request.request_number, AidKind::from(request.kind)),
            actor,
            Utc::now().date_naive(),
        )
        .await?;
        let fund = Self::refresh_totals(&txn, fund).await?;

        let before = request.clone();
        let now = Utc::now().into();
        let mut active: aid_requests::ActiveModel = request.into();
        active.status = Set(DbAidStatus::Approved);
        active.approved_amount = Set(Some(approved_amount));
        active.reviewed_by = Set(Some(actor));
        active.decided_at = Set(Some(now));
        active.comments = Set(comments);
        active.updated_at = Set(now);
        let request = active.update(&txn).await?;

        txn.commit().await?;
        info!(
            request_id = %request.id,
            movement_number = %movement.movement_number,
            amount = %approved_amount,
            available = %fund.available,
            "aid approved"
        );

        let mut effects = SideEffects::new();
        effects
            .audit(
                AuditRecord::new(
                    actor,
                    AuditAction::Approve,
                    AuditEntity::AidRequest,
                    request.id,
                    format!("Approved aid request {}", request.request_number),
                    Utc::now(),
                )
                .with_before(&before)
                .with_after(&request),
            )
            .notify(NotificationTemplates::aid_approved(
                request.member_id,
                request.id,
                &request.request_number,
                approved_amount,
            ));
        effects.publish(&self.db).await;

        Ok(ApprovedAid {
            request,
            posting: FundPosting { fund, movement },
        })
    }

    /// Closes a period once every request in it is decided.
    ///
    /// The CLOSE marker is appended before the status flips, since a closed
    /// fund accepts no movements.
    pub async fn close_period(&self, fund_id: Uuid, actor: Uuid) -> Result<FundPosting, RepositoryError> {
        let txn = self.db.begin().await?;
        let fund = Self::lock_fund(&txn, fund_id).await?;
        let fund = Self::refresh_totals(&txn, fund).await?;

        let unresolved = aid_requests::Entity::find()
            .filter(aid_requests::Column::FundId.eq(fund.id))
            .filter(aid_requests::Column::Status.is_in([DbAidStatus::Pending, DbAidStatus::InReview]))
            .count(&txn)
            .await?;
        let plan = FundService::close_period(&Self::snapshot(&fund)?, unresolved)?;

        let today = Utc::now().date_naive();
        let movement = Self::append(
            &txn,
            &fund,
            &plan,
            MovementSource::default(),
            format!("Closing of period {}", fund.period_key),
            actor,
            today,
        )
        .await?;

        let before = fund.clone();
        let mut active: mutual_funds::ActiveModel = fund.into();
        active.status = Set(DbFundStatus::Closed);
        active.closed_on = Set(Some(today));
        active.closed_by = Set(Some(actor));
        active.updated_at = Set(Utc::now().into());
        let fund = active.update(&txn).await?;

        txn.commit().await?;
        info!(fund_id = %fund.id, period = %fund.period_key, available = %fund.available, "fund period closed");

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                AuditAction::Close,
                AuditEntity::Fund,
                fund.id,
                format!("Closed fund period {}", fund.period_key),
                Utc::now(),
            )
            .with_before(&before)
            .with_after(&fund),
        );
        effects.publish(&self.db).await;

        Ok(FundPosting { fund, movement })
    }

    /// Finds a fund by id.
    pub async fn find(&self, fund_id: Uuid) -> Result<mutual_funds::Model, RepositoryError> {
        mutual_funds::Entity::find_by_id(fund_id)
            .one(&self.db)
            .await?
            .ok_or_else(|| FundError::FundNotFound(fund_id).into())
    }

    /// Finds the fund of a period, if opened.
    pub async fn find_by_period(&self, period: PeriodKey) -> Result<Option<mutual_funds::Model>, RepositoryError> {
        let fund = mutual_funds::Entity::find()
            .filter(mutual_funds::Column::PeriodKey.eq(period.to_string()))
            .one(&self.db)
            .await?;
        Ok(fund)
    }

    /// Every fund, oldest period first.
    pub async fn all(&self) -> Result<Vec<mutual_funds::Model>, RepositoryError> {
        let funds = mutual_funds::Entity::find()
            .order_by_asc(mutual_funds::Column::PeriodKey)
            .all(&self.db)
            .await?;
        Ok(funds)
    }

    /// Kardex of a fund in posting order.
    pub async fn kardex(&self, fund_id: Uuid) -> Result<Vec<fund_movements::Model>, RepositoryError> {
        Self::movements(&self.db, fund_id).await
    }

    /// Aid requests of a fund, oldest first.
    pub async fn aid_requests(&self, fund_id: Uuid) -> Result<Vec<aid_requests::Model>, RepositoryError> {
        let rows = aid_requests::Entity::find()
            .filter(aid_requests::Column::FundId.eq(fund_id))
            .order_by_asc(aid_requests::Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(rows)
    }

    async fn transition_aid<F>(
        &self,
        request_id: Uuid,
        actor: Uuid,
        action: AuditAction,
        comments: Option<String>,
        plan: F,
    ) -> Result<aid_requests::Model, RepositoryError>
    where
        F: FnOnce(AidStatus) -> Result<AidStatus, FundError>,
    {
        let txn = self.db.begin().await?;
        let request = Self::lock_request(&txn, request_id).await?;
        let from = AidStatus::from(request.status);
        let next = plan(from)?;

        let before = request.clone();
        let now = Utc::now().into();
        let mut active: aid_requests::ActiveModel = request.into();
        active.status = Set(next.into());
        if matches!(next, AidStatus::Rejected) {
            active.reviewed_by = Set(Some(actor));
            active.decided_at = Set(Some(now));
        }
        if comments.is_some() {
            active.comments = Set(comments);
        }
        active.updated_at = Set(now);
        let request = active.update(&txn).await?;

        txn.commit().await?;
        info!(request_id = %request.id, from = %from, to = %next, "aid request status changed");

        let mut effects = SideEffects::new();
        effects.audit(
            AuditRecord::new(
                actor,
                action,
                AuditEntity::AidRequest,
                request.id,
                format!("Aid request {} moved from {from} to {next}", request.request_number),
                Utc::now(),
            )
            .with_before(&before)
            .with_after(&request),
        );
        effects.publish(&self.db).await;

        Ok(request)
    }

    async fn append(
        txn: &DatabaseTransaction,
        fund: &mutual_funds::Model,
        plan: &MovementPlan,
        source: MovementSource,
        concept: String,
        actor: Uuid,
        date: NaiveDate,
    ) -> Result<fund_movements::Model, RepositoryError> {
        let movement_number = next_number(txn, DocumentKind::FundMovement, date).await?;
        let movement = fund_movements::ActiveModel {
            id: Set(Uuid::now_v7()),
            fund_id: Set(fund.id),
            member_id: Set(source.member_id),
            kind: Set(plan.kind.into()),
            contribution_kind: Set(source.contribution_kind.map(Into::into)),
            amount: Set(plan.amount),
            prior_balance: Set(plan.prior_balance),
            new_balance: Set(plan.new_balance),
            movement_number: Set(movement_number),
            aid_request_id: Set(source.aid_request_id),
            concept: Set(concept),
            created_at: Set(Utc::now().into()),
            created_by: Set(actor),
        }
        .insert(txn)
        .await?;
        Ok(movement)
    }

    async fn refresh_totals(
        txn: &DatabaseTransaction,
        fund: mutual_funds::Model,
    ) -> Result<mutual_funds::Model, RepositoryError> {
        let movements = Self::movements(txn, fund.id).await?;
        let snapshots: Vec<MovementSnapshot> = movements.iter().map(MovementSnapshot::from).collect();
        let totals = FundService::recompute_totals(&snapshots);

        if totals == Self::stored_totals(&fund) {
            return Ok(fund);
        }

        let mut active: mutual_funds::ActiveModel = fund.into();
        active.total_inflow = Set(totals.total_inflow);
        active.total_outflow = Set(totals.total_outflow);
        active.available = Set(totals.available);
        active.updated_at = Set(Utc::now().into());
        Ok(active.update(txn).await?)
    }

    async fn movements<C: ConnectionTrait>(
        conn: &C,
        fund_id: Uuid,
    ) -> Result<Vec<fund_movements::Model>, RepositoryError> {
        let rows = fund_movements::Entity::find()
            .filter(fund_movements::Column::FundId.eq(fund_id))
            .order_by_asc(fund_movements::Column::CreatedAt)
            .order_by_asc(fund_movements::Column::Id)
            .all(conn)
            .await?;
        Ok(rows)
    }

    async fn lock_fund(txn: &DatabaseTransaction, fund_id: Uuid) -> Result<mutual_funds::Model, RepositoryError> {
        mutual_funds::Entity::find_by_id(fund_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| FundError::FundNotFound(fund_id).into())
    }

    async fn find_request(txn: &DatabaseTransaction, request_id: Uuid) -> Result<aid_requests::Model, RepositoryError> {
        aid_requests::Entity::find_by_id(request_id)
            .one(txn)
            .await?
            .ok_or_else(|| FundError::AidRequestNotFound(request_id).into())
    }

    async fn lock_request(txn: &DatabaseTransaction, request_id: Uuid) -> Result<aid_requests::Model, RepositoryError> {
        aid_requests::Entity::find_by_id(request_id)
            .lock_exclusive()
            .one(txn)
            .await?
            .ok_or_else(|| FundError::AidRequestNotFound(request_id).into())
    }

    pub(crate) fn snapshot(fund: &mutual_funds::Model) -> Result<FundSnapshot, RepositoryError> {
        Ok(FundSnapshot {
            id: fund.id,
            period: PeriodKey::parse(fund.period_key.trim())?,
            status: fund.status.into(),
            totals: Self::stored_totals(fund),
        })
    }

    pub(crate) const fn stored_totals(fund: &mutual_funds::Model) -> FundTotals {
        FundTotals {
            total_inflow: fund.total_inflow,
            total_outflow: fund.total_outflow,
            available: fund.available,
        }
    }
}

/// Who and what a movement is attributed to.
#[derive(Debug, Clone, Copy, Default)]
struct MovementSource {
    member_id: Option<Uuid>,
    contribution_kind: Option<ContributionKind>,
    aid_request_id: Option<Uuid>,
}
