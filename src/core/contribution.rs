//! Contribution business logic - Members paying their share into the club.
//!
//! A contribution starts pending. Approving it writes exactly one
//! `cash-contribution` ledger entry, no matter how many times approval runs.
//! An approved contribution cannot be rejected afterwards.

use crate::{
    core::{
        auth::ClubRoster,
        ledger::{self, LedgerEvent},
        user::find_user,
    },
    entities::{Contribution, ContributionStatus, contribution, user},
    errors::{Error, Result},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, instrument};

/// The creator's verdict on a contribution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContributionDecision {
    Approve,
    Reject { reason: Option<String> },
}

async fn find_contribution<C>(db: &C, contribution_id: i64) -> Result<contribution::Model>
where
    C: ConnectionTrait,
{
    Contribution::find_by_id(contribution_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Contribution", contribution_id))
}

/// Records a pending contribution of `actor`. Member-only.
///
/// Several contributions for the same month are allowed.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn create_contribution(
    db: &DatabaseConnection,
    club_id: i64,
    amount: Decimal,
    month: i32,
    year: i32,
    actor: &user::Model,
) -> Result<contribution::Model> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount { amount });
    }
    if !(1..=12).contains(&month) {
        return Err(Error::InvalidInput {
            message: format!("month {month} is not between 1 and 12"),
        });
    }

    ClubRoster::load(db, club_id)
        .await?
        .require_member(actor.id)?;

    let now = Utc::now();
    let model = contribution::ActiveModel {
        user_id: Set(actor.id),
        club_id: Set(club_id),
        amount: Set(amount),
        month: Set(month),
        year: Set(year),
        status: Set(ContributionStatus::Pending),
        rejection_reason: Set(None),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(db)
    .await?;

    info!(contribution_id = model.id, %amount, "Contribution submitted");
    Ok(model)
}

/// Contributions of `user`, optionally within one club, newest first.
pub async fn list_user_contributions(
    db: &DatabaseConnection,
    user: &user::Model,
    club_id: Option<i64>,
) -> Result<Vec<contribution::Model>> {
    let mut query = Contribution::find().filter(contribution::Column::UserId.eq(user.id));
    if let Some(club_id) = club_id {
        query = query.filter(contribution::Column::ClubId.eq(club_id));
    }
    query
        .order_by_desc(contribution::Column::CreatedAt)
        .order_by_desc(contribution::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Every contribution of a club, newest first. Creator-only.
pub async fn list_club_contributions(
    db: &DatabaseConnection,
    club_id: i64,
    actor: &user::Model,
) -> Result<Vec<contribution::Model>> {
    ClubRoster::load(db, club_id)
        .await?
        .require_creator(actor.id)?;

    Contribution::find()
        .filter(contribution::Column::ClubId.eq(club_id))
        .order_by_desc(contribution::Column::CreatedAt)
        .order_by_desc(contribution::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Number of contributions awaiting review in a club. Creator-only.
pub async fn count_pending_contributions(
    db: &DatabaseConnection,
    club_id: i64,
    actor: &user::Model,
) -> Result<u64> {
    ClubRoster::load(db, club_id)
        .await?
        .require_creator(actor.id)?;

    Contribution::find()
        .filter(contribution::Column::ClubId.eq(club_id))
        .filter(contribution::Column::Status.eq(ContributionStatus::Pending))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Approves or rejects a contribution. Creator-only.
///
/// Approval may be repeated; it never writes a second ledger entry.
/// Rejection fails once the contribution is approved.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn review_contribution(
    db: &DatabaseConnection,
    contribution_id: i64,
    decision: ContributionDecision,
    actor: &user::Model,
) -> Result<contribution::Model> {
    let txn = db.begin().await?;

    let contribution = find_contribution(&txn, contribution_id).await?;
    ClubRoster::load(&txn, contribution.club_id)
        .await?
        .require_creator(actor.id)?;

    match decision {
        ContributionDecision::Approve => {
            let mut active: contribution::ActiveModel = contribution.into();
            active.status = Set(ContributionStatus::Approved);
            active.rejection_reason = Set(None);
            active.updated_at = Set(Utc::now());
            let approved = active.update(&txn).await?;

            let member = find_user(&txn, approved.user_id).await?;
            let booked = ledger::project(
                &txn,
                LedgerEvent::ContributionApproved {
                    contribution: &approved,
                    member_name: &member.full_name,
                    approved_by: actor.id,
                },
            )
            .await?;

            txn.commit().await?;
            info!(contribution_id, booked, "Contribution approved");
            Ok(approved)
        }
        ContributionDecision::Reject { reason } => {
            let result = Contribution::update_many()
                .col_expr(
                    contribution::Column::Status,
                    Expr::value(ContributionStatus::Rejected),
                )
                .col_expr(contribution::Column::RejectionReason, Expr::value(reason))
                .col_expr(contribution::Column::UpdatedAt, Expr::value(Utc::now()))
                .filter(contribution::Column::Id.eq(contribution_id))
                .filter(contribution::Column::Status.ne(ContributionStatus::Approved))
                .exec(&txn)
                .await?;
            if result.rows_affected == 0 {
                return Err(Error::ContributionAlreadyApproved { contribution_id });
            }

            let rejected = find_contribution(&txn, contribution_id).await?;
            txn.commit().await?;
            info!(contribution_id, "Contribution rejected");
            Ok(rejected)
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::ledger::{EntryFilter, list_entries};
    use crate::entities::LedgerKind;
    use crate::test_utils::*;
    use rust_decimal::dec;
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[tokio::test]
    async fn test_create_contribution_validation() {
        let db = MockDatabase::new(DatabaseBackend::Sqlite).into_connection();
        let actor = user_model(1, "ana");

        let err = create_contribution(&db, 1, dec!(0), 3, 2025, &actor)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidAmount { .. }));

        let err = create_contribution(&db, 1, dec!(50), 13, 2025, &actor)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));
    }

    #[tokio::test]
    async fn test_only_members_contribute() -> Result<()> {
        let db = setup_test_db().await?;
        let (_creator, member, club) = setup_club_with_member(&db).await?;
        let outsider = create_test_user(&db, "zoe").await?;

        let err = create_contribution(&db, club.id, dec!(50.00), 3, 2025, &outsider)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotClubMember { .. }));

        create_contribution(&db, club.id, dec!(50.00), 3, 2025, &member).await?;
        create_contribution(&db, club.id, dec!(25.00), 3, 2025, &member).await?;
        assert_eq!(list_user_contributions(&db, &member, Some(club.id)).await?.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_approval_books_one_entry() -> Result<()> {
        let db = setup_test_db().await?;
        let (creator, member, club) = setup_club_with_member(&db).await?;
        let contribution =
            create_contribution(&db, club.id, dec!(50.00), 3, 2025, &member).await?;
        assert_eq!(count_pending_contributions(&db, club.id, &creator).await?, 1);

        let err = review_contribution(&db, contribution.id, ContributionDecision::Approve, &member)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotClubCreator { .. }));

        for _ in 0..2 {
            let approved =
                review_contribution(&db, contribution.id, ContributionDecision::Approve, &creator)
                    .await?;
            assert_eq!(approved.status, ContributionStatus::Approved);
        }

        let entries = list_entries(&db, club.id, EntryFilter::default(), &creator).await?;
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].kind, LedgerKind::CashContribution);
        assert_eq!(entries[0].amount, dec!(50.00));
        assert_eq!(entries[0].category, format!("Contribution {}", member.full_name));
        assert_eq!(entries[0].description.as_deref(), Some("Contribution for 03/2025"));
        assert_eq!(count_pending_contributions(&db, club.id, &creator).await?, 0);

        let err = review_contribution(
            &db,
            contribution.id,
            ContributionDecision::Reject { reason: None },
            &creator,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::ContributionAlreadyApproved { .. }));
        Ok(())
    }

    #[tokio::test]
    async fn test_rejection_keeps_reason_and_allows_later_approval() -> Result<()> {
        let db = setup_test_db().await?;
        let (creator, member, club) = setup_club_with_member(&db).await?;
        let contribution =
            create_contribution(&db, club.id, dec!(50.00), 4, 2025, &member).await?;

        let rejected = review_contribution(
            &db,
            contribution.id,
            ContributionDecision::Reject {
                reason: Some("receipt unreadable".to_string()),
            },
            &creator,
        )
        .await?;
        assert_eq!(rejected.status, ContributionStatus::Rejected);
        assert_eq!(rejected.rejection_reason.as_deref(), Some("receipt unreadable"));
        assert!(list_entries(&db, club.id, EntryFilter::default(), &creator).await?.is_empty());

        let approved =
            review_contribution(&db, contribution.id, ContributionDecision::Approve, &creator)
                .await?;
        assert_eq!(approved.rejection_reason, None);
        assert_eq!(list_club_contributions(&db, club.id, &creator).await?.len(), 1);
        Ok(())
    }
}
