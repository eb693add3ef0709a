//! Club entity - A savings group ("natillera").
//!
//! A club has exactly one creator, who holds the privileged role, and a member
//! set stored in `club_members`. The creator counts as a member for
//! authorization even if no membership row exists.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a club
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ClubStatus {
    /// Accepting contributions and loans
    #[sea_orm(string_value = "active")]
    Active,
    /// Closed for new activity
    #[sea_orm(string_value = "inactive")]
    Inactive,
}

/// Club database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "clubs")]
pub struct Model {
    /// Unique identifier for the club
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Display name
    pub name: String,
    /// Expected monthly contribution per member
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub monthly_amount: Decimal,
    /// Active or inactive
    pub status: ClubStatus,
    /// User who created the club and administers it
    pub creator_id: i64,
    /// When the club was created
    pub created_at: DateTimeUtc,
}

/// Defines relationships between Club and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each club has one creator
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatorId",
        to = "super::user::Column::Id"
    )]
    Creator,
    /// One club has many membership rows
    #[sea_orm(has_many = "super::club_member::Entity")]
    Members,
    /// One club has many loans
    #[sea_orm(has_many = "super::loan::Entity")]
    Loans,
    /// One club has many ledger entries
    #[sea_orm(has_many = "super::ledger_entry::Entity")]
    LedgerEntries,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl Related<super::club_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Members.def()
    }
}

impl Related<super::loan::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Loans.def()
    }
}

impl Related<super::ledger_entry::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::LedgerEntries.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
