//! User entity - Local mirror of an identity-provider account.
//!
//! Token verification happens outside this crate; every operation receives an
//! already-resolved `user::Model` keyed by the provider's stable UID.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// User database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    /// Unique identifier for the user
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Stable UID issued by the identity provider
    #[sea_orm(unique)]
    pub external_uid: String,
    /// Login email, unique across users
    #[sea_orm(unique)]
    pub email: String,
    /// Public handle, unique across users
    #[sea_orm(unique)]
    pub username: String,
    /// Display name
    pub full_name: String,
    /// When the account was mirrored locally
    pub created_at: DateTimeUtc,
}

/// Defines relationships between User and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One user has many club memberships
    #[sea_orm(has_many = "super::club_member::Entity")]
    Memberships,
    /// One user has many contributions
    #[sea_orm(has_many = "super::contribution::Entity")]
    Contributions,
}

impl Related<super::club_member::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Memberships.def()
    }
}

impl Related<super::contribution::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Contributions.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
