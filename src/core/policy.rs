//! Club policies - The ordered house rules of a club.
//!
//! Members read them; only the club creator writes them.

use crate::{
    core::auth::ClubRoster,
    entities::{Policy, policy, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*};
use tracing::{info, instrument};

/// Field changes for [`update_policy`]
#[derive(Debug, Clone, Default)]
pub struct PolicyPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub position: Option<i32>,
}

fn require_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::InvalidInput {
            message: "policy title must not be empty".to_string(),
        });
    }
    Ok(())
}

async fn find_policy<C>(db: &C, policy_id: i64) -> Result<policy::Model>
where
    C: ConnectionTrait,
{
    Policy::find_by_id(policy_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Policy", policy_id))
}

/// Policies of a club in display order. Member-only.
pub async fn list_policies(
    db: &DatabaseConnection,
    club_id: i64,
    actor: &user::Model,
) -> Result<Vec<policy::Model>> {
    ClubRoster::load(db, club_id)
        .await?
        .require_member(actor.id)?;

    Policy::find()
        .filter(policy::Column::ClubId.eq(club_id))
        .order_by_asc(policy::Column::Position)
        .order_by_asc(policy::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Appends a policy after the last one. Creator-only.
#[instrument(skip(db, description, actor), fields(actor_id = actor.id))]
pub async fn create_policy(
    db: &DatabaseConnection,
    club_id: i64,
    title: &str,
    description: &str,
    actor: &user::Model,
) -> Result<policy::Model> {
    require_title(title)?;

    let txn = db.begin().await?;

    ClubRoster::load(&txn, club_id)
        .await?
        .require_creator(actor.id)?;

    let position = Policy::find()
        .filter(policy::Column::ClubId.eq(club_id))
        .order_by_desc(policy::Column::Position)
        .one(&txn)
        .await?
        .map_or(1, |last| last.position + 1);

    let now = Utc::now();
    let policy = policy::ActiveModel {
        club_id: Set(club_id),
        title: Set(title.trim().to_string()),
        description: Set(description.to_string()),
        position: Set(position),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(policy_id = policy.id, position, "Policy created");
    Ok(policy)
}

/// Creator-only.
#[instrument(skip(db, patch, actor), fields(actor_id = actor.id))]
pub async fn update_policy(
    db: &DatabaseConnection,
    policy_id: i64,
    patch: PolicyPatch,
    actor: &user::Model,
) -> Result<policy::Model> {
    let policy = find_policy(db, policy_id).await?;
    ClubRoster::load(db, policy.club_id)
        .await?
        .require_creator(actor.id)?;

    let mut active: policy::ActiveModel = policy.into();
    if let Some(title) = patch.title {
        require_title(&title)?;
        active.title = Set(title.trim().to_string());
    }
    if let Some(description) = patch.description {
        active.description = Set(description);
    }
    if let Some(position) = patch.position {
        active.position = Set(position);
    }
    active.updated_at = Set(Utc::now());

    active.update(db).await.map_err(Into::into)
}

/// Creator-only.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn delete_policy(
    db: &DatabaseConnection,
    policy_id: i64,
    actor: &user::Model,
) -> Result<()> {
    let policy = find_policy(db, policy_id).await?;
    ClubRoster::load(db, policy.club_id)
        .await?
        .require_creator(actor.id)?;

    Policy::delete_by_id(policy_id).exec(db).await?;
    info!(policy_id, "Policy deleted");
    Ok(())
}

/// Applies `(policy_id, position)` pairs in one transaction. Ids belonging to
/// another club are skipped. Creator-only.
#[instrument(skip(db, order, actor), fields(actor_id = actor.id))]
pub async fn reorder_policies(
    db: &DatabaseConnection,
    club_id: i64,
    order: &[(i64, i32)],
    actor: &user::Model,
) -> Result<Vec<policy::Model>> {
    let txn = db.begin().await?;

    ClubRoster::load(&txn, club_id)
        .await?
        .require_creator(actor.id)?;

    let now = Utc::now();
    for &(policy_id, position) in order {
        let Some(policy) = Policy::find_by_id(policy_id)
            .filter(policy::Column::ClubId.eq(club_id))
            .one(&txn)
            .await?
        else {
            continue;
        };
        let mut active: policy::ActiveModel = policy.into();
        active.position = Set(position);
        active.updated_at = Set(now);
        active.update(&txn).await?;
    }

    let policies = Policy::find()
        .filter(policy::Column::ClubId.eq(club_id))
        .order_by_asc(policy::Column::Position)
        .order_by_asc(policy::Column::Id)
        .all(&txn)
        .await?;

    txn.commit().await?;
    Ok(policies)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_positions_are_appended() -> Result<()> {
        let db = setup_test_db().await?;
        let (creator, member, club) = setup_club_with_member(&db).await?;

        let first = create_policy(&db, club.id, "Punctuality", "Pay by the 5th", &creator).await?;
        let second = create_policy(&db, club.id, "Late fees", "2% per week", &creator).await?;
        assert_eq!(first.position, 1);
        assert_eq!(second.position, 2);

        let err = create_policy(&db, club.id, "Nope", "", &member).await.unwrap_err();
        assert!(matches!(err, Error::NotClubCreator { .. }));
        let err = create_policy(&db, club.id, "  ", "", &creator).await.unwrap_err();
        assert!(matches!(err, Error::InvalidInput { .. }));

        let titles: Vec<_> = list_policies(&db, club.id, &member)
            .await?
            .into_iter()
            .map(|p| p.title)
            .collect();
        assert_eq!(titles, ["Punctuality", "Late fees"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_reorder_ignores_foreign_policies() -> Result<()> {
        let db = setup_test_db().await?;
        let (creator, _member, club) = setup_club_with_member(&db).await?;
        let other_club = create_test_club(&db, &creator).await?;

        let a = create_policy(&db, club.id, "A", "", &creator).await?;
        let b = create_policy(&db, club.id, "B", "", &creator).await?;
        let foreign = create_policy(&db, other_club.id, "X", "", &creator).await?;

        let reordered =
            reorder_policies(&db, club.id, &[(a.id, 2), (b.id, 1), (foreign.id, 0)], &creator)
                .await?;
        let ids: Vec<_> = reordered.iter().map(|p| p.id).collect();
        assert_eq!(ids, [b.id, a.id]);

        let untouched = find_policy(&db, foreign.id).await?;
        assert_eq!(untouched.position, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_update_and_delete() -> Result<()> {
        let db = setup_test_db().await?;
        let (creator, member, club) = setup_club_with_member(&db).await?;
        let policy = create_policy(&db, club.id, "Old", "text", &creator).await?;

        let patch = PolicyPatch {
            title: Some("New".to_string()),
            ..Default::default()
        };
        let err = update_policy(&db, policy.id, patch.clone(), &member)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotClubCreator { .. }));

        let updated = update_policy(&db, policy.id, patch, &creator).await?;
        assert_eq!(updated.title, "New");
        assert_eq!(updated.description, "text");

        delete_policy(&db, policy.id, &creator).await?;
        assert!(list_policies(&db, club.id, &member).await?.is_empty());
        let err = delete_policy(&db, policy.id, &creator).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        Ok(())
    }
}
