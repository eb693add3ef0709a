//! Raffle entity - A lottery or raffle fundraiser run by a club.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Raffle flavour. Lotteries get 101 numbered tickets up front.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum RaffleKind {
    #[sea_orm(string_value = "lottery")]
    Lottery,
    #[sea_orm(string_value = "raffle")]
    Raffle,
}

/// Raffle lifecycle. `Finalized` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum RaffleStatus {
    #[sea_orm(string_value = "active")]
    Active,
    #[sea_orm(string_value = "finalized")]
    Finalized,
}

/// Raffle database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "raffles")]
pub struct Model {
    /// Unique identifier for the raffle
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Organising club
    pub club_id: i64,
    /// Lottery or raffle
    pub kind: RaffleKind,
    pub title: String,
    pub description: Option<String>,
    pub created_at: DateTimeUtc,
    /// Scheduled draw date, overwritten with the actual draw time on finalization
    pub draw_date: Option<DateTimeUtc>,
    pub status: RaffleStatus,
    /// Club creator who set the raffle up
    pub creator_id: i64,
    /// Three-digit winning number, set on finalization
    pub winning_number: Option<String>,
}

/// Defines relationships between Raffle and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each raffle belongs to one club
    #[sea_orm(
        belongs_to = "super::club::Entity",
        from = "Column::ClubId",
        to = "super::club::Column::Id"
    )]
    Club,
    /// One raffle has many tickets
    #[sea_orm(has_many = "super::ticket::Entity")]
    Tickets,
}

impl Related<super::club::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Club.def()
    }
}

impl Related<super::ticket::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Tickets.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
