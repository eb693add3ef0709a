//! Club business logic - Creating clubs and reading their membership.
//!
//! A club has one creator, who is added to the member table when the club is
//! created and is treated as a member by [`ClubRoster`] regardless.

use crate::{
    core::auth::ClubRoster,
    entities::{
        Club, ClubMember, ClubStatus, Contribution, ContributionStatus, User, club, club_member,
        contribution, user,
    },
    errors::{Error, Result},
};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{Condition, QueryOrder, Set, TransactionTrait, prelude::*, sea_query::OnConflict};
use std::collections::HashMap;
use tracing::{info, instrument};

/// Fields of a club the creator may change. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct ClubPatch {
    pub name: Option<String>,
    pub monthly_amount: Option<Decimal>,
    pub status: Option<ClubStatus>,
}

/// Savings figures of one member within a club.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClubStatistics {
    /// Approved contributions of the caller
    pub my_approved_total: Decimal,
    /// Approved contributions of everyone
    pub club_approved_total: Decimal,
    /// Caller's contributions still awaiting review
    pub my_pending_count: u64,
    pub is_creator: bool,
}

/// Share of one member in the club's approved contributions.
#[derive(Debug, Clone)]
pub struct MemberParticipation {
    pub user: user::Model,
    pub approved_total: Decimal,
    /// Percentage of the club total, rounded to 2 decimals
    pub percentage: Decimal,
}

fn validate_club_fields(name: Option<&str>, monthly_amount: Option<Decimal>) -> Result<()> {
    if name.is_some_and(|n| n.trim().is_empty()) {
        return Err(Error::InvalidInput {
            message: "club name must not be empty".to_string(),
        });
    }
    match monthly_amount {
        Some(amount) if amount <= Decimal::ZERO => Err(Error::InvalidAmount { amount }),
        _ => Ok(()),
    }
}

/// Inserts the membership row unless it already exists.
pub(crate) async fn add_member_if_absent<C>(db: &C, club_id: i64, user_id: i64) -> Result<()>
where
    C: ConnectionTrait,
{
    let membership = club_member::ActiveModel {
        user_id: Set(user_id),
        club_id: Set(club_id),
        joined_at: Set(chrono::Utc::now()),
    };
    ClubMember::insert(membership)
        .on_conflict(
            OnConflict::columns([club_member::Column::UserId, club_member::Column::ClubId])
                .do_nothing()
                .to_owned(),
        )
        .exec_without_returning(db)
        .await?;
    Ok(())
}

/// Creates an active club owned by `creator`, who also becomes its first member.
#[instrument(skip(db, creator), fields(creator_id = creator.id))]
pub async fn create_club(
    db: &DatabaseConnection,
    name: String,
    monthly_amount: Decimal,
    creator: &user::Model,
) -> Result<club::Model> {
    validate_club_fields(Some(&name), Some(monthly_amount))?;

    let txn = db.begin().await?;

    let club = club::ActiveModel {
        name: Set(name.trim().to_string()),
        monthly_amount: Set(monthly_amount),
        status: Set(ClubStatus::Active),
        creator_id: Set(creator.id),
        created_at: Set(chrono::Utc::now()),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    add_member_if_absent(&txn, club.id, creator.id).await?;

    txn.commit().await?;

    info!(club_id = club.id, "Club created");
    Ok(club)
}

pub async fn get_club(db: &DatabaseConnection, club_id: i64) -> Result<Option<club::Model>> {
    Club::find_by_id(club_id).one(db).await.map_err(Into::into)
}

async fn member_club_condition(db: &DatabaseConnection, user_id: i64) -> Result<Condition> {
    let club_ids: Vec<i64> = ClubMember::find()
        .filter(club_member::Column::UserId.eq(user_id))
        .all(db)
        .await?
        .into_iter()
        .map(|m| m.club_id)
        .collect();

    Ok(Condition::any()
        .add(club::Column::CreatorId.eq(user_id))
        .add(club::Column::Id.is_in(club_ids)))
}

/// Clubs the user created or belongs to, newest first.
pub async fn list_member_clubs(db: &DatabaseConnection, user: &user::Model) -> Result<Vec<club::Model>> {
    Club::find()
        .filter(member_club_condition(db, user.id).await?)
        .order_by_desc(club::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Like [`list_member_clubs`], restricted to active clubs.
pub async fn list_active_member_clubs(
    db: &DatabaseConnection,
    user: &user::Model,
) -> Result<Vec<club::Model>> {
    Club::find()
        .filter(member_club_condition(db, user.id).await?)
        .filter(club::Column::Status.eq(ClubStatus::Active))
        .order_by_desc(club::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Clubs the user created, newest first.
pub async fn list_created_clubs(db: &DatabaseConnection, user: &user::Model) -> Result<Vec<club::Model>> {
    Club::find()
        .filter(club::Column::CreatorId.eq(user.id))
        .order_by_desc(club::Column::CreatedAt)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Members of a club, creator included, ordered by id. Member-only.
pub async fn list_members(
    db: &DatabaseConnection,
    club_id: i64,
    actor: &user::Model,
) -> Result<Vec<user::Model>> {
    let roster = ClubRoster::load(db, club_id).await?;
    roster.require_member(actor.id)?;

    User::find()
        .filter(user::Column::Id.is_in(roster.member_ids()))
        .order_by_asc(user::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Applies a patch to a club. Creator-only.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn update_club(
    db: &DatabaseConnection,
    club_id: i64,
    patch: ClubPatch,
    actor: &user::Model,
) -> Result<club::Model> {
    validate_club_fields(patch.name.as_deref(), patch.monthly_amount)?;

    let roster = ClubRoster::load(db, club_id).await?;
    roster.require_creator(actor.id)?;

    let mut active: club::ActiveModel = roster.club.into();
    if let Some(name) = patch.name {
        active.name = Set(name.trim().to_string());
    }
    if let Some(amount) = patch.monthly_amount {
        active.monthly_amount = Set(amount);
    }
    if let Some(status) = patch.status {
        active.status = Set(status);
    }

    let updated = active.update(db).await?;
    info!(club_id, status = ?updated.status, "Club updated");
    Ok(updated)
}

async fn approved_contributions(db: &DatabaseConnection, club_id: i64) -> Result<Vec<contribution::Model>> {
    Contribution::find()
        .filter(contribution::Column::ClubId.eq(club_id))
        .filter(contribution::Column::Status.eq(ContributionStatus::Approved))
        .all(db)
        .await
        .map_err(Into::into)
}

/// Savings summary for the caller. Member-only.
pub async fn club_statistics(
    db: &DatabaseConnection,
    club_id: i64,
    actor: &user::Model,
) -> Result<ClubStatistics> {
    let roster = ClubRoster::load(db, club_id).await?;
    roster.require_member(actor.id)?;

    let approved = approved_contributions(db, club_id).await?;
    let club_approved_total = approved.iter().map(|c| c.amount).sum();
    let my_approved_total = approved
        .iter()
        .filter(|c| c.user_id == actor.id)
        .map(|c| c.amount)
        .sum();

    let my_pending_count = Contribution::find()
        .filter(contribution::Column::ClubId.eq(club_id))
        .filter(contribution::Column::UserId.eq(actor.id))
        .filter(contribution::Column::Status.eq(ContributionStatus::Pending))
        .count(db)
        .await?;

    Ok(ClubStatistics {
        my_approved_total,
        club_approved_total,
        my_pending_count,
        is_creator: roster.is_creator(actor.id),
    })
}

/// Each member's share of the approved contributions, largest first. Creator-only.
pub async fn member_participation(
    db: &DatabaseConnection,
    club_id: i64,
    actor: &user::Model,
) -> Result<Vec<MemberParticipation>> {
    let roster = ClubRoster::load(db, club_id).await?;
    roster.require_creator(actor.id)?;

    let mut totals: HashMap<i64, Decimal> = HashMap::new();
    for c in approved_contributions(db, club_id).await? {
        *totals.entry(c.user_id).or_default() += c.amount;
    }
    let club_total: Decimal = totals.values().copied().sum();

    let members = User::find()
        .filter(user::Column::Id.is_in(roster.member_ids()))
        .all(db)
        .await?;

    let mut participation: Vec<MemberParticipation> = members
        .into_iter()
        .map(|user| {
            let approved_total = totals.get(&user.id).copied().unwrap_or_default();
            let percentage = if club_total > Decimal::ZERO {
                (approved_total / club_total * Decimal::ONE_HUNDRED)
                    .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
            } else {
                Decimal::ZERO
            };
            MemberParticipation {
                user,
                approved_total,
                percentage,
            }
        })
        .collect();

    participation.sort_by(|a, b| {
        b.approved_total
            .cmp(&a.approved_total)
            .then(a.user.id.cmp(&b.user.id))
    });
    Ok(participation)
}
