//! Invitation business logic - How clubs grow.
//!
//! The creator invites a registered user by email; the invitee accepts or
//! rejects. Accepting adds the invitee to the member set in the same
//! transaction that closes the invitation.

use crate::{
    core::{auth::ClubRoster, club::add_member_if_absent, user::find_user},
    entities::{Invitation, InvitationStatus, User, invitation, user},
    errors::{Error, Result},
};
use chrono::Utc;
use sea_orm::{QueryOrder, Set, TransactionTrait, prelude::*, sea_query::Expr};
use tracing::{info, instrument};

async fn find_invitation<C>(db: &C, invitation_id: i64) -> Result<invitation::Model>
where
    C: ConnectionTrait,
{
    Invitation::find_by_id(invitation_id)
        .one(db)
        .await?
        .ok_or_else(|| Error::not_found("Invitation", invitation_id))
}

/// Invites the user registered under `invited_email` to a club. Creator-only.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn send_invitation(
    db: &DatabaseConnection,
    club_id: i64,
    invited_email: &str,
    actor: &user::Model,
) -> Result<invitation::Model> {
    let txn = db.begin().await?;

    let roster = ClubRoster::load(&txn, club_id).await?;
    roster.require_creator(actor.id)?;

    let invitee = User::find()
        .filter(user::Column::Email.eq(invited_email))
        .one(&txn)
        .await?
        .ok_or_else(|| Error::not_found("User", invited_email))?;

    if invitee.id == actor.id {
        return Err(Error::SelfInvitation);
    }
    if roster.is_member(invitee.id) {
        return Err(Error::AlreadyMember { user_id: invitee.id });
    }

    let pending = Invitation::find()
        .filter(invitation::Column::ClubId.eq(club_id))
        .filter(invitation::Column::InvitedUserId.eq(invitee.id))
        .filter(invitation::Column::Status.eq(InvitationStatus::Pending))
        .one(&txn)
        .await?;
    if pending.is_some() {
        return Err(Error::InvitationAlreadyPending { user_id: invitee.id });
    }

    let now = Utc::now();
    let model = invitation::ActiveModel {
        club_id: Set(club_id),
        invited_user_id: Set(invitee.id),
        inviter_user_id: Set(actor.id),
        status: Set(InvitationStatus::Pending),
        created_at: Set(now),
        updated_at: Set(now),
        ..Default::default()
    }
    .insert(&txn)
    .await?;

    txn.commit().await?;

    info!(invitation_id = model.id, invited_user_id = invitee.id, "Invitation sent");
    Ok(model)
}

/// Pending invitations addressed to `user`, newest first.
pub async fn list_pending_invitations(
    db: &DatabaseConnection,
    user: &user::Model,
) -> Result<Vec<invitation::Model>> {
    Invitation::find()
        .filter(invitation::Column::InvitedUserId.eq(user.id))
        .filter(invitation::Column::Status.eq(InvitationStatus::Pending))
        .order_by_desc(invitation::Column::CreatedAt)
        .order_by_desc(invitation::Column::Id)
        .all(db)
        .await
        .map_err(Into::into)
}

pub async fn count_pending_invitations(db: &DatabaseConnection, user: &user::Model) -> Result<u64> {
    Invitation::find()
        .filter(invitation::Column::InvitedUserId.eq(user.id))
        .filter(invitation::Column::Status.eq(InvitationStatus::Pending))
        .count(db)
        .await
        .map_err(Into::into)
}

/// Closes a pending invitation addressed to `actor` with `outcome`.
async fn respond<C>(
    db: &C,
    invitation_id: i64,
    outcome: InvitationStatus,
    actor: &user::Model,
) -> Result<invitation::Model>
where
    C: ConnectionTrait,
{
    let invitation = find_invitation(db, invitation_id).await?;
    if invitation.invited_user_id != actor.id {
        return Err(Error::NotInvitee { invitation_id });
    }

    let result = Invitation::update_many()
        .col_expr(invitation::Column::Status, Expr::value(outcome))
        .col_expr(invitation::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(invitation::Column::Id.eq(invitation_id))
        .filter(invitation::Column::Status.eq(InvitationStatus::Pending))
        .exec(db)
        .await?;
    if result.rows_affected == 0 {
        return Err(Error::InvitationAlreadyProcessed { invitation_id });
    }

    find_invitation(db, invitation_id).await
}

/// Accepts an invitation and joins the club. Invitee only.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn accept_invitation(
    db: &DatabaseConnection,
    invitation_id: i64,
    actor: &user::Model,
) -> Result<invitation::Model> {
    let txn = db.begin().await?;

    let invitation = respond(&txn, invitation_id, InvitationStatus::Accepted, actor).await?;
    add_member_if_absent(&txn, invitation.club_id, actor.id).await?;

    txn.commit().await?;

    info!(invitation_id, club_id = invitation.club_id, "Invitation accepted");
    Ok(invitation)
}

/// Declines an invitation. Invitee only.
#[instrument(skip(db, actor), fields(actor_id = actor.id))]
pub async fn reject_invitation(
    db: &DatabaseConnection,
    invitation_id: i64,
    actor: &user::Model,
) -> Result<invitation::Model> {
    let txn = db.begin().await?;
    let invitation = respond(&txn, invitation_id, InvitationStatus::Rejected, actor).await?;
    txn.commit().await?;

    info!(invitation_id, "Invitation rejected");
    Ok(invitation)
}

/// Number of invitations of a club that were accepted or rejected. Creator-only.
pub async fn count_responded_invitations(
    db: &DatabaseConnection,
    club_id: i64,
    actor: &user::Model,
) -> Result<u64> {
    ClubRoster::load(db, club_id)
        .await?
        .require_creator(actor.id)?;

    Invitation::find()
        .filter(invitation::Column::ClubId.eq(club_id))
        .filter(invitation::Column::Status.ne(InvitationStatus::Pending))
        .count(db)
        .await
        .map_err(Into::into)
}

/// The user who sent an invitation.
pub async fn inviter(db: &DatabaseConnection, invitation: &invitation::Model) -> Result<user::Model> {
    find_user(db, invitation.inviter_user_id).await
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::club::list_members;
    use crate::test_utils::*;

    #[tokio::test]
    async fn test_invitation_flow() -> Result<()> {
        let db = setup_test_db().await?;
        let ana = create_test_user(&db, "ana").await?;
        let bruno = create_test_user(&db, "bruno").await?;
        let club = create_test_club(&db, &ana).await?;

        let invitation = send_invitation(&db, club.id, &bruno.email, &ana).await?;
        assert_eq!(invitation.status, InvitationStatus::Pending);
        assert_eq!(count_pending_invitations(&db, &bruno).await?, 1);
        assert_eq!(list_pending_invitations(&db, &bruno).await?[0].id, invitation.id);
        assert_eq!(inviter(&db, &invitation).await?.id, ana.id);

        let err = send_invitation(&db, club.id, &bruno.email, &ana).await.unwrap_err();
        assert!(matches!(err, Error::InvitationAlreadyPending { .. }));

        let err = accept_invitation(&db, invitation.id, &ana).await.unwrap_err();
        assert!(matches!(err, Error::NotInvitee { .. }));

        let accepted = accept_invitation(&db, invitation.id, &bruno).await?;
        assert_eq!(accepted.status, InvitationStatus::Accepted);
        assert_eq!(list_members(&db, club.id, &bruno).await?.len(), 2);

        let err = reject_invitation(&db, invitation.id, &bruno).await.unwrap_err();
        assert!(matches!(err, Error::InvitationAlreadyProcessed { .. }));

        let err = send_invitation(&db, club.id, &bruno.email, &ana).await.unwrap_err();
        assert!(matches!(err, Error::AlreadyMember { .. }));
        assert_eq!(count_responded_invitations(&db, club.id, &ana).await?, 1);
        Ok(())
    }

    #[tokio::test]
    async fn test_invitation_guards() -> Result<()> {
        let db = setup_test_db().await?;
        let ana = create_test_user(&db, "ana").await?;
        let bruno = create_test_user(&db, "bruno").await?;
        let carla = create_test_user(&db, "carla").await?;
        let club = create_test_club(&db, &ana).await?;
        add_member(&db, &club, &bruno).await?;

        let err = send_invitation(&db, club.id, &ana.email, &ana).await.unwrap_err();
        assert!(matches!(err, Error::SelfInvitation));

        let err = send_invitation(&db, club.id, "ghost@example.com", &ana).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "User", .. }));

        let err = send_invitation(&db, club.id, &carla.email, &bruno).await.unwrap_err();
        assert!(matches!(err, Error::NotClubCreator { .. }));

        let invitation = send_invitation(&db, club.id, &carla.email, &ana).await?;
        let rejected = reject_invitation(&db, invitation.id, &carla).await?;
        assert_eq!(rejected.status, InvitationStatus::Rejected);
        assert_eq!(list_members(&db, club.id, &ana).await?.len(), 2);

        // A rejected invitation does not block a new one.
        send_invitation(&db, club.id, &carla.email, &ana).await?;
        Ok(())
    }
}
