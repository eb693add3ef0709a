//! Ticket entity - One numbered slot of a lottery.
//!
//! `(raffle_id, number)` is unique; the index is created alongside the table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Claim state of a ticket
#[derive(Clone, Copy, Debug, PartialEq, Eq, EnumIter, DeriveActiveEnum, Serialize, Deserialize)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(16))")]
#[serde(rename_all = "lowercase")]
pub enum TicketState {
    #[sea_orm(string_value = "available")]
    Available,
    #[sea_orm(string_value = "taken")]
    Taken,
}

/// Ticket database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tickets")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    pub raffle_id: i64,
    /// Three-digit number, `"000"` to `"100"`
    pub number: String,
    pub state: TicketState,
    /// Member holding the ticket
    pub claimed_by: Option<i64>,
    pub claimed_at: Option<DateTimeUtc>,
    /// Whether the holder has paid for the ticket
    pub paid: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::raffle::Entity",
        from = "Column::RaffleId",
        to = "super::raffle::Column::Id",
        on_delete = "Cascade"
    )]
    Raffle,
}

impl Related<super::raffle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Raffle.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
