//! Invitation entity - A creator's offer for a user to join a club.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Invitation lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum InvitationStatus {
    /// Awaiting the invitee's answer
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Invitee joined the club
    #[sea_orm(string_value = "accepted")]
    Accepted,
    /// Invitee declined
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Invitation database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invitations")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub club_id: i64,
    pub invited_user_id: i64,
    pub inviter_user_id: i64,
    pub status: InvitationStatus,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::club::Entity",
        from = "Column::ClubId",
        to = "super::club::Column::Id",
        on_delete = "Cascade"
    )]
    Club,
}

impl Related<super::club::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Club.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
