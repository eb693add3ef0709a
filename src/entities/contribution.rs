//! Contribution entity - A member's periodic payment into the club.
//!
//! Contributions start pending and are reviewed by the club creator. Approval
//! projects exactly one `cash-contribution` ledger entry.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Review status of a contribution
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum ContributionStatus {
    /// Waiting for the creator
    #[sea_orm(string_value = "pending")]
    Pending,
    /// Counted in the club's cash
    #[sea_orm(string_value = "approved")]
    Approved,
    /// Refused, see `rejection_reason`
    #[sea_orm(string_value = "rejected")]
    Rejected,
}

/// Contribution database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "contributions")]
pub struct Model {
    /// Unique identifier for the contribution
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Contributing member
    pub user_id: i64,
    /// Receiving club
    pub club_id: i64,
    /// Contributed amount
    #[sea_orm(column_type = "Decimal(Some((10, 2)))")]
    pub amount: Decimal,
    /// Month the contribution covers (1-12)
    pub month: i32,
    /// Year the contribution covers
    pub year: i32,
    /// Review status
    pub status: ContributionStatus,
    /// Set only when rejected
    pub rejection_reason: Option<String>,
    /// When the contribution was submitted
    pub created_at: DateTimeUtc,
    /// Last review or edit
    pub updated_at: DateTimeUtc,
}

/// Defines relationships between Contribution and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each contribution belongs to one user
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
    /// Each contribution belongs to one club
    #[sea_orm(
        belongs_to = "super::club::Entity",
        from = "Column::ClubId",
        to = "super::club::Column::Id"
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
