//! Membership and authorization predicates.
//!
//! A club's creator is always a member, whether or not the membership table
//! lists them. Every member check in the crate goes through [`ClubRoster`] so
//! that rule lives in exactly one place.

use crate::{
    entities::{Club, ClubMember, club, club_member, loan},
    errors::{Error, Result},
};
use sea_orm::prelude::*;
use std::collections::HashSet;

/// A club together with the ids of its explicitly listed members.
#[derive(Debug, Clone)]
pub struct ClubRoster {
    /// The club record
    pub club: club::Model,
    members: HashSet<i64>,
}

impl ClubRoster {
    /// Builds a roster from already loaded data.
    pub fn new(club: club::Model, member_ids: impl IntoIterator<Item = i64>) -> Self {
        Self {
            club,
            members: member_ids.into_iter().collect(),
        }
    }

    /// Loads a club and its member set.
    ///
    /// # Errors
    /// Returns `NotFound` if the club does not exist.
    pub async fn load<C>(db: &C, club_id: i64) -> Result<Self>
    where
        C: ConnectionTrait,
    {
        let club = Club::find_by_id(club_id)
            .one(db)
            .await?
            .ok_or_else(|| Error::not_found("Club", club_id))?;

        let members = ClubMember::find()
            .filter(club_member::Column::ClubId.eq(club_id))
            .all(db)
            .await?
            .into_iter()
            .map(|m| m.user_id);

        Ok(Self::new(club, members))
    }

    /// Id of the club
    #[must_use]
    pub const fn club_id(&self) -> i64 {
        self.club.id
    }

    #[must_use]
    pub const fn is_creator(&self, user_id: i64) -> bool {
        self.club.creator_id == user_id
    }

    /// Creator or listed member.
    #[must_use]
    pub fn is_member(&self, user_id: i64) -> bool {
        self.is_creator(user_id) || self.members.contains(&user_id)
    }

    /// Ids of every member, creator included, in ascending order.
    #[must_use]
    pub fn member_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.members.iter().copied().collect();
        if !self.members.contains(&self.club.creator_id) {
            ids.push(self.club.creator_id);
        }
        ids.sort_unstable();
        ids
    }

    /// # Errors
    /// Returns [`Error::NotClubCreator`] unless `user_id` created the club.
    pub fn require_creator(&self, user_id: i64) -> Result<()> {
        if self.is_creator(user_id) {
            Ok(())
        } else {
            Err(Error::NotClubCreator {
                club_id: self.club.id,
            })
        }
    }

    /// # Errors
    /// Returns [`Error::NotClubMember`] unless `user_id` is a member.
    pub fn require_member(&self, user_id: i64) -> Result<()> {
        if self.is_member(user_id) {
            Ok(())
        } else {
            Err(Error::NotClubMember {
                club_id: self.club.id,
            })
        }
    }
}

/// Whether `user_id` vouched for the loan.
#[must_use]
pub const fn is_referrer(loan: &loan::Model, user_id: i64) -> bool {
    loan.referrer_id == user_id
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::entities::ClubStatus;
    use crate::test_utils::{add_member, create_test_club, create_test_user, setup_test_db};
    use rust_decimal::dec;

    fn club_created_by(creator_id: i64) -> club::Model {
        club::Model {
            id: 1,
            name: "Natillera del barrio".to_string(),
            monthly_amount: dec!(50.00),
            status: ClubStatus::Active,
            creator_id,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_creator_is_member_without_listing() {
        let roster = ClubRoster::new(club_created_by(10), []);
        assert!(roster.is_creator(10));
        assert!(roster.is_member(10));
        assert!(roster.require_member(10).is_ok());
        assert_eq!(roster.member_ids(), vec![10]);
    }

    #[test]
    fn test_listed_member_is_not_creator() {
        let roster = ClubRoster::new(club_created_by(10), [10, 20]);
        assert!(roster.is_member(20));
        assert!(!roster.is_creator(20));
        assert!(matches!(
            roster.require_creator(20),
            Err(Error::NotClubCreator { club_id: 1 })
        ));
        assert!(matches!(
            roster.require_member(30),
            Err(Error::NotClubMember { club_id: 1 })
        ));
        assert_eq!(roster.member_ids(), vec![10, 20]);
    }

    #[tokio::test]
    async fn test_load_reads_membership_table() -> Result<()> {
        let db = setup_test_db().await?;
        let creator = create_test_user(&db, "ana").await?;
        let member = create_test_user(&db, "bruno").await?;
        let outsider = create_test_user(&db, "carla").await?;
        let club = create_test_club(&db, &creator).await?;
        add_member(&db, &club, &member).await?;

        let roster = ClubRoster::load(&db, club.id).await?;
        assert!(roster.is_member(creator.id));
        assert!(roster.is_member(member.id));
        assert!(!roster.is_member(outsider.id));
        Ok(())
    }

    #[tokio::test]
    async fn test_load_missing_club() -> Result<()> {
        let db = setup_test_db().await?;
        let err = ClubRoster::load(&db, 99).await.unwrap_err();
        assert!(matches!(err, Error::NotFound { entity: "Club", .. }));
        Ok(())
    }
}
