//! Club membership - Join table between users and clubs.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Membership database model, keyed by (`user_id`, `club_id`)
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "club_members")]
pub struct Model {
    /// Member user
    #[sea_orm(primary_key, auto_increment = false)]
    pub user_id: i64,
    /// Club joined
    #[sea_orm(primary_key, auto_increment = false)]
    pub club_id: i64,
    /// When the user joined
    pub joined_at: DateTimeUtc,
}

/// Defines relationships between membership rows and their endpoints
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// The member
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    /// The club
    #[sea_orm(
        belongs_to = "super::club::Entity",
        from = "Column::ClubId",
        to = "super::club::Column::Id",
        on_delete = "Cascade"
    )]
    Club,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::club::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Club.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
